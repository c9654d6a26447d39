#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use trendline_kernel_contracts::measurement::{
    NodeIdentity, NodeMeasurements, RunMeasurementStore,
};
use trendline_kernel_contracts::SchemaVersion;

use crate::StorageError;

pub const RUN_STORE_SCHEMA_VERSION: SchemaVersion = SchemaVersion(1);

#[derive(Debug, Serialize, Deserialize)]
struct RunStoreDocument {
    schema_version: u32,
    checksum_sha256: String,
    nodes: BTreeMap<NodeIdentity, NodeMeasurements>,
}

/// JSON form of one run's measurement store.
///
/// The checksum covers the compact serialization of `nodes`; node order is the
/// map order and each node keeps its measurement order, so the digest is stable.
#[derive(Debug, Default, Clone, Copy)]
pub struct RunStoreCodec;

impl RunStoreCodec {
    pub fn encode(&self, store: &RunMeasurementStore) -> Result<Vec<u8>, StorageError> {
        let doc = RunStoreDocument {
            schema_version: RUN_STORE_SCHEMA_VERSION.0,
            checksum_sha256: nodes_checksum(store.nodes())?,
            nodes: store.nodes().clone(),
        };
        Ok(serde_json::to_vec_pretty(&doc)?)
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<RunMeasurementStore, StorageError> {
        let doc = serde_json::from_slice::<RunStoreDocument>(bytes)?;
        if doc.schema_version != RUN_STORE_SCHEMA_VERSION.0 {
            return Err(StorageError::SchemaMismatch {
                expected: RUN_STORE_SCHEMA_VERSION.0,
                got: doc.schema_version,
            });
        }
        let computed = nodes_checksum(&doc.nodes)?;
        if !computed.eq_ignore_ascii_case(&doc.checksum_sha256) {
            return Err(StorageError::ChecksumMismatch {
                stored: doc.checksum_sha256,
                computed,
            });
        }
        Ok(RunMeasurementStore::from_nodes(doc.nodes))
    }
}

fn nodes_checksum(
    nodes: &BTreeMap<NodeIdentity, NodeMeasurements>,
) -> Result<String, StorageError> {
    let canonical = serde_json::to_vec(nodes)?;
    Ok(format!("{:x}", Sha256::digest(&canonical)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use trendline_kernel_contracts::measurement::{Measurement, RunMeasurementStoreBuilder};

    fn id(s: &str) -> NodeIdentity {
        NodeIdentity::new(s).unwrap()
    }

    fn sample_store() -> RunMeasurementStore {
        let mut builder = RunMeasurementStoreBuilder::new();
        builder.record(&id("suite/caseA"), Measurement::new("latency_ms", "12.5"));
        builder.record(&id("suite/caseA"), Measurement::new("rss_mb", "310"));
        builder.record(&id("suite/caseB"), Measurement::new("latency_ms", "slow"));
        builder.build()
    }

    #[test]
    fn at_codec_01_document_carries_version_checksum_and_nodes() {
        let bytes = RunStoreCodec.encode(&sample_store()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["schema_version"], 1);
        assert_eq!(value["checksum_sha256"].as_str().unwrap().len(), 64);
        assert_eq!(value["nodes"]["suite/caseA"][0]["name"], "latency_ms");
        assert_eq!(value["nodes"]["suite/caseA"][1]["value"], "310");
        assert_eq!(value["nodes"]["suite/caseB"][0]["value"], "slow");
    }

    #[test]
    fn at_codec_02_decode_restores_order_and_values() {
        let store = sample_store();
        let decoded = RunStoreCodec
            .decode(&RunStoreCodec.encode(&store).unwrap())
            .unwrap();
        assert_eq!(decoded, store);
        let names: Vec<&str> = decoded
            .node(&id("suite/caseA"))
            .unwrap()
            .iter()
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(names, vec!["latency_ms", "rss_mb"]);
    }

    #[test]
    fn at_codec_03_tampered_values_fail_checksum() {
        let bytes = RunStoreCodec.encode(&sample_store()).unwrap();
        let tampered = String::from_utf8(bytes).unwrap().replace("12.5", "99.9");
        assert!(matches!(
            RunStoreCodec.decode(tampered.as_bytes()),
            Err(StorageError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn at_codec_04_unknown_schema_version_is_rejected() {
        let raw = br#"{"schema_version":2,"checksum_sha256":"00","nodes":{}}"#;
        assert!(matches!(
            RunStoreCodec.decode(raw),
            Err(StorageError::SchemaMismatch { expected: 1, got: 2 })
        ));
    }

    #[test]
    fn at_codec_05_garbage_is_a_json_error() {
        assert!(matches!(
            RunStoreCodec.decode(b"not json"),
            Err(StorageError::Json(_))
        ));
        assert!(matches!(
            RunStoreCodec.decode(br#"{"schema_version":1,"checksum_sha256":"x","nodes":{"":[]}}"#),
            Err(StorageError::Json(_))
        ));
    }
}
