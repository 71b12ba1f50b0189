//! Test run metadata, as handed over by the run store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Identifier assigned to a run by the run store
pub type RunId = i64;

/// One browser/platform execution of the full test suite
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRun {
    pub id: RunId,
    pub browser_name: String,
    #[serde(default)]
    pub browser_version: String,
    #[serde(default)]
    pub os_name: String,
    #[serde(default)]
    pub labels: BTreeSet<String>,
    pub time_start: DateTime<Utc>,
}

impl TestRun {
    pub fn new(id: RunId, browser_name: impl Into<String>, time_start: DateTime<Utc>) -> Self {
        Self {
            id,
            browser_name: browser_name.into(),
            browser_version: String::new(),
            os_name: String::new(),
            labels: BTreeSet::new(),
            time_start,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.insert(label.into());
        self
    }

    /// 浏览器名按大小写不敏感比较，与解析器使用相同的小写规则
    pub fn is_browser(&self, browser_name: &str) -> bool {
        self.browser_name.to_lowercase() == browser_name.to_lowercase()
    }
}
