#![forbid(unsafe_code)]

use regex::{Matches, Regex};
use serde::Deserialize;
use trendline_kernel_contracts::measurement::Measurement;

const FRAGMENT_OPEN_TAG: &str = "<measurement>";

/// One fragment per line: `.` does not cross line breaks and `+?` stops at the
/// first closing tag, so adjacent fragments never merge.
pub const MEASUREMENT_FRAGMENT_PATTERN: &str = r"<measurement>.+?</measurement>";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MeasurementFragment {
    name: String,
    value: String,
}

/// Pulls `<measurement><name>..</name><value>..</value></measurement>` fragments
/// out of free-form test output.
///
/// Fragments that do not deserialize are skipped without error. Extraction is
/// lazy and can be restarted by calling [`OutputExtractor::extract`] again on
/// the same text, which always yields the same sequence.
#[derive(Debug, Clone)]
pub struct OutputExtractor {
    fragment: Regex,
}

impl Default for OutputExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputExtractor {
    pub fn new() -> Self {
        Self {
            fragment: Regex::new(MEASUREMENT_FRAGMENT_PATTERN)
                .expect("MEASUREMENT_FRAGMENT_PATTERN must compile"),
        }
    }

    pub fn extract<'r, 't>(&'r self, text: &'t str) -> ExtractedMeasurements<'r, 't> {
        ExtractedMeasurements {
            matches: self.fragment.find_iter(text),
        }
    }
}

pub struct ExtractedMeasurements<'r, 't> {
    matches: Matches<'r, 't>,
}

impl Iterator for ExtractedMeasurements<'_, '_> {
    type Item = Measurement;

    fn next(&mut self) -> Option<Measurement> {
        for candidate in self.matches.by_ref() {
            if let Some(measurement) = parse_candidate(candidate.as_str()) {
                return Some(measurement);
            }
        }
        None
    }
}

fn parse_candidate(candidate: &str) -> Option<Measurement> {
    if let Some(measurement) = parse_fragment(candidate) {
        return Some(measurement);
    }
    // A stray opening tag earlier on the line swallows the real fragment into
    // the match; retry from the innermost opening tag.
    let inner = candidate[1..].rfind(FRAGMENT_OPEN_TAG)? + 1;
    parse_fragment(&candidate[inner..])
}

fn parse_fragment(fragment: &str) -> Option<Measurement> {
    quick_xml::de::from_str::<MeasurementFragment>(fragment)
        .ok()
        .map(|f| Measurement::new(f.name, f.value))
}
