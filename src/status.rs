//! The canonical test status vocabulary.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The outcome of a single test in a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum TestStatus {
    Unknown, // "UNKNOWN", also the fallback for unrecognized names
    Pass,    // "PASS"
    Ok,      // "OK"
    Error,   // "ERROR"
    Timeout, // "TIMEOUT"
    NotRun,  // "NOTRUN"
    Fail,    // "FAIL"
    Crash,   // "CRASH"
    Skip,    // "SKIP"
    Assert,  // "ASSERT"
}

impl TestStatus {
    /// Every status, in code order.
    pub const ALL: [TestStatus; 10] = [
        TestStatus::Unknown,
        TestStatus::Pass,
        TestStatus::Ok,
        TestStatus::Error,
        TestStatus::Timeout,
        TestStatus::NotRun,
        TestStatus::Fail,
        TestStatus::Crash,
        TestStatus::Skip,
        TestStatus::Assert,
    ];

    /// Looks up a status by its canonical name. Names outside the vocabulary
    /// map to `Unknown`, so callers that need strictness must compare the
    /// canonical name of the result against their input.
    pub fn from_name(name: &str) -> Self {
        match name {
            "PASS" => TestStatus::Pass,
            "OK" => TestStatus::Ok,
            "ERROR" => TestStatus::Error,
            "TIMEOUT" => TestStatus::Timeout,
            "NOTRUN" => TestStatus::NotRun,
            "FAIL" => TestStatus::Fail,
            "CRASH" => TestStatus::Crash,
            "SKIP" => TestStatus::Skip,
            "ASSERT" => TestStatus::Assert,
            _ => TestStatus::Unknown,
        }
    }

    /// The canonical upper-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            TestStatus::Unknown => "UNKNOWN",
            TestStatus::Pass => "PASS",
            TestStatus::Ok => "OK",
            TestStatus::Error => "ERROR",
            TestStatus::Timeout => "TIMEOUT",
            TestStatus::NotRun => "NOTRUN",
            TestStatus::Fail => "FAIL",
            TestStatus::Crash => "CRASH",
            TestStatus::Skip => "SKIP",
            TestStatus::Assert => "ASSERT",
        }
    }

    /// The numeric code used by result storage.
    pub fn code(self) -> i64 {
        match self {
            TestStatus::Unknown => 0,
            TestStatus::Pass => 1,
            TestStatus::Ok => 2,
            TestStatus::Error => 3,
            TestStatus::Timeout => 4,
            TestStatus::NotRun => 5,
            TestStatus::Fail => 6,
            TestStatus::Crash => 7,
            TestStatus::Skip => 8,
            TestStatus::Assert => 9,
        }
    }

    /// Parses a user-supplied status name, case-insensitively.
    ///
    /// The input is upper-cased, looked up, and the canonical name of the
    /// result is compared back against the upper-cased input. A mismatch means
    /// the lookup fell back to `Unknown` for a name it did not recognize, so
    /// near-misses like `"PASSS"` are rejected instead of silently becoming
    /// `UNKNOWN`.
    pub fn parse_strict(input: &str) -> Option<Self> {
        let upper = input.to_ascii_uppercase();
        let status = TestStatus::from_name(&upper);
        (status.as_str() == upper).then_some(status)
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<TestStatus> for String {
    fn from(status: TestStatus) -> Self {
        status.as_str().to_string()
    }
}

impl TryFrom<String> for TestStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, String> {
        TestStatus::parse_strict(&value).ok_or_else(|| format!("invalid test status: \"{}\"", value))
    }
}
