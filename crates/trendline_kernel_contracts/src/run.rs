#![forbid(unsafe_code)]

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::common::{validate_path_token, validate_text};
use crate::{ContractViolation, Validate};

pub const JOB_NAME_MAX_LEN: usize = 256;
pub const RUN_DISPLAY_NAME_MAX_LEN: usize = 256;

/// Name of the job whose runs form one history. May contain `/` for folders.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobName(String);

impl JobName {
    pub fn new(name: impl Into<String>) -> Result<Self, ContractViolation> {
        let name = name.into();
        validate_path_token("job_name", &name, JOB_NAME_MAX_LEN)?;
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }
}

impl fmt::Display for JobName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for JobName {
    type Error = ContractViolation;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<JobName> for String {
    fn from(value: JobName) -> Self {
        value.0
    }
}

/// One run of one job. Ordered by job, then run number.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunKey {
    pub job: JobName,
    pub number: u64,
}

impl RunKey {
    pub fn v1(job: JobName, number: u64) -> Result<Self, ContractViolation> {
        let key = Self { job, number };
        key.validate()?;
        Ok(key)
    }
}

impl Validate for RunKey {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.number == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "run_key.number",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}

impl fmt::Display for RunKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.job, self.number)
    }
}

/// The slice of a host run that history and charting read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunInfo {
    pub key: RunKey,
    pub display_name: String,
    /// Execution node the run was built on, when the host reports one.
    pub built_on: Option<String>,
    /// Still executing; its results are incomplete.
    pub building: bool,
}

impl RunInfo {
    pub fn v1(
        key: RunKey,
        display_name: String,
        built_on: Option<String>,
        building: bool,
    ) -> Result<Self, ContractViolation> {
        let info = Self {
            key,
            display_name,
            built_on,
            building,
        };
        info.validate()?;
        Ok(info)
    }

    /// Finished run labelled `#<number>`.
    pub fn completed(key: RunKey) -> Self {
        Self {
            display_name: format!("#{}", key.number),
            key,
            built_on: None,
            building: false,
        }
    }
}

impl Validate for RunInfo {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.key.validate()?;
        validate_text(
            "run_info.display_name",
            &self.display_name,
            RUN_DISPLAY_NAME_MAX_LEN,
        )?;
        if let Some(built_on) = &self.built_on {
            validate_text("run_info.built_on", built_on, RUN_DISPLAY_NAME_MAX_LEN)?;
        }
        Ok(())
    }
}
