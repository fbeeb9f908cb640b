// ABOUTME: Seams to the operating system primitives the bridge depends on
// ABOUTME: Component invocation, content queries and package resolution, modeled after Android

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

pub const ACTION_VIEW: &str = "android.intent.action.VIEW";
pub const FLAG_ACTIVITY_CLEAR_TOP: u32 = 0x0400_0000;
pub const FLAG_ACTIVITY_SINGLE_TOP: u32 = 0x2000_0000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// Nothing on the device can handle the invocation
    #[error("No handler found: {0}")]
    NoHandler(String),
    #[error("Platform facility unavailable: {0}")]
    Unavailable(String),
    #[error("Platform call failed: {0}")]
    Failed(String),
}

/// An invocation addressed to another component, or the data it returns
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    pub action: String,
    pub data: Option<String>,
    pub package: Option<String>,
    pub extras: BTreeMap<String, String>,
    pub flags: u32,
}

impl Intent {
    pub fn view(data: impl Into<String>) -> Self {
        Self {
            action: ACTION_VIEW.to_string(),
            data: Some(data.into()),
            ..Default::default()
        }
    }

    /// Reply intents carry only extras
    pub fn with_extras<K, V>(extras: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            extras: extras
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            ..Default::default()
        }
    }

    pub fn put_extra(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.extras.insert(key.into(), value.into());
    }

    pub fn extra(&self, key: &str) -> Option<&str> {
        self.extras.get(key).map(String::as_str)
    }

    pub fn has_flag(&self, flag: u32) -> bool {
        self.flags & flag == flag
    }
}

/// Result rows of a content query; the column set is known even without rows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cursor {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl Cursor {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Builds a single-row cursor from `(column, value)` pairs
    pub fn single_row<K: Into<String>>(cells: impl IntoIterator<Item = (K, Option<String>)>) -> Self {
        let (columns, row): (Vec<String>, Vec<Option<String>>) =
            cells.into_iter().map(|(k, v)| (k.into(), v)).unzip();
        Self {
            columns,
            rows: vec![row],
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Value of `column` in the first row, `None` when missing or null
    pub fn first_value(&self, column: &str) -> Option<&str> {
        let index = self.column_index(column)?;
        self.rows.first()?.get(index)?.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    Ok,
    Canceled,
    Other(i32),
}

impl ResultCode {
    pub fn from_raw(code: i32) -> Self {
        match code {
            -1 => ResultCode::Ok,
            0 => ResultCode::Canceled,
            other => ResultCode::Other(other),
        }
    }

    pub fn is_affirmed(self) -> bool {
        self == ResultCode::Ok
    }
}

/// Completion of an interactive invocation, delivered by the OS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityResult {
    pub request_code: i32,
    pub result_code: ResultCode,
    pub data: Option<Intent>,
}

/// Background query interface exposed by signer apps
#[async_trait]
pub trait ContentResolver: Send + Sync {
    async fn query(&self, uri: &str, projection: &[String]) -> Result<Option<Cursor>, PlatformError>;
}

/// Component resolution: which installed packages handle an invocation
pub trait PackageQuery: Send + Sync {
    fn query_intent_activities(&self, intent: &Intent) -> Result<Vec<String>, PlatformError>;
}

/// A live presentation context able to show another app's UI
pub trait Activity: Send + Sync {
    fn start_activity_for_result(&self, intent: Intent, request_code: i32) -> Result<(), PlatformError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_columns_without_rows() {
        let cursor = Cursor::new(vec!["rejected".into()]);
        assert_eq!(cursor.column_index("rejected"), Some(0));
        assert!(cursor.is_empty());
        assert_eq!(cursor.first_value("rejected"), None);
    }

    #[test]
    fn test_cursor_first_value() {
        let cursor = Cursor::single_row([("result", Some("abc".to_string())), ("event", None)]);
        assert_eq!(cursor.first_value("result"), Some("abc"));
        assert_eq!(cursor.first_value("event"), None);
        assert_eq!(cursor.first_value("missing"), None);
    }

    #[test]
    fn test_result_codes() {
        assert!(ResultCode::from_raw(-1).is_affirmed());
        assert_eq!(ResultCode::from_raw(0), ResultCode::Canceled);
        assert!(!ResultCode::from_raw(7).is_affirmed());
    }
}
