use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::text::{MultilineString, bundle};

/// One entry of a code cell's `outputs` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "output_type", rename_all = "snake_case")]
pub enum Output {
    Stream {
        name: String,
        text: MultilineString,
    },
    DisplayData {
        #[serde(default, with = "bundle")]
        data: Map<String, Value>,
        #[serde(default)]
        metadata: Map<String, Value>,
    },
    ExecuteResult {
        execution_count: Option<i64>,
        #[serde(default, with = "bundle")]
        data: Map<String, Value>,
        #[serde(default)]
        metadata: Map<String, Value>,
    },
    Error {
        ename: String,
        evalue: String,
        #[serde(default)]
        traceback: Vec<String>,
    },
}

impl Output {
    pub fn stream(name: &str, text: &str) -> Self {
        Output::Stream {
            name: name.to_string(),
            text: text.into(),
        }
    }

    pub fn error(ename: &str, evalue: &str, traceback: Vec<String>) -> Self {
        Output::Error {
            ename: ename.to_string(),
            evalue: evalue.to_string(),
            traceback,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Output::Error { .. })
    }

    /// Plain text carried by the output, if any: stream text or `text/plain` data.
    pub fn text(&self) -> Option<&str> {
        match self {
            Output::Stream { text, .. } => Some(text.as_str()),
            Output::DisplayData { data, .. } | Output::ExecuteResult { data, .. } => {
                data.get("text/plain").and_then(Value::as_str)
            }
            Output::Error { .. } => None,
        }
    }
}
