use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::output::Output;
use super::text::MultilineString;

pub const TAG_SKIP_EXECUTION: &str = "skip-execution";
pub const TAG_RAISES_EXCEPTION: &str = "raises-exception";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cell_type", rename_all = "lowercase")]
pub enum Cell {
    Code(CodeCell),
    Markdown(TextCell),
    Raw(TextCell),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeCell {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub source: MultilineString,
    #[serde(default)]
    pub execution_count: Option<i64>,
    #[serde(default)]
    pub outputs: Vec<Output>,
}

/// Markdown and raw cells share one shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextCell {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub source: MultilineString,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Map<String, Value>>,
}

impl Cell {
    pub fn code(source: &str) -> Self {
        Cell::Code(CodeCell {
            source: source.into(),
            ..Default::default()
        })
    }

    pub fn markdown(source: &str) -> Self {
        Cell::Markdown(TextCell {
            source: source.into(),
            ..Default::default()
        })
    }

    pub fn cell_type(&self) -> &'static str {
        match self {
            Cell::Code(_) => "code",
            Cell::Markdown(_) => "markdown",
            Cell::Raw(_) => "raw",
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Cell::Code(c) => c.id.as_deref(),
            Cell::Markdown(c) | Cell::Raw(c) => c.id.as_deref(),
        }
    }

    pub fn set_id(&mut self, id: String) {
        match self {
            Cell::Code(c) => c.id = Some(id),
            Cell::Markdown(c) | Cell::Raw(c) => c.id = Some(id),
        }
    }

    pub fn source(&self) -> &str {
        match self {
            Cell::Code(c) => c.source.as_str(),
            Cell::Markdown(c) | Cell::Raw(c) => c.source.as_str(),
        }
    }

    pub fn as_code(&self) -> Option<&CodeCell> {
        match self {
            Cell::Code(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_code_mut(&mut self) -> Option<&mut CodeCell> {
        match self {
            Cell::Code(c) => Some(c),
            _ => None,
        }
    }
}

impl CodeCell {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.metadata
            .get("tags")
            .and_then(Value::as_array)
            .is_some_and(|tags| tags.iter().any(|t| t.as_str() == Some(tag)))
    }

    /// Blank cells and cells tagged `skip-execution` are never sent to the kernel.
    pub fn should_execute(&self) -> bool {
        !self.source.as_str().trim().is_empty() && !self.has_tag(TAG_SKIP_EXECUTION)
    }

    pub fn clear_outputs(&mut self) {
        self.outputs.clear();
        self.execution_count = None;
    }

    /// Concatenated stream text of the given stream name (`stdout`/`stderr`).
    pub fn stream_text(&self, name: &str) -> String {
        self.outputs
            .iter()
            .filter_map(|o| match o {
                Output::Stream { name: n, text } if n == name => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn code_cell_round_trips_null_execution_count() {
        let cell = Cell::code("print(1)\n");
        let value = serde_json::to_value(&cell).unwrap();
        assert_eq!(value["cell_type"], json!("code"));
        assert_eq!(value["execution_count"], Value::Null);
        assert_eq!(value["source"], json!(["print(1)\n"]));
        assert!(value.get("id").is_none());
    }

    #[test]
    fn tags_control_execution() {
        let mut cell = CodeCell {
            source: "x = 1".into(),
            ..Default::default()
        };
        assert!(cell.should_execute());
        cell.metadata.insert("tags".into(), json!([TAG_SKIP_EXECUTION]));
        assert!(!cell.should_execute());

        let blank = CodeCell {
            source: "  \n".into(),
            ..Default::default()
        };
        assert!(!blank.should_execute());
    }
}
