//! Multi-line string handling shared by cell sources, stream text and
//! mime bundles. On disk these are either one string or a list of lines;
//! in memory they are always one joined string.
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Text that is written as a list of lines, each keeping its trailing newline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultilineString(pub String);

impl MultilineString {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn push_str(&mut self, text: &str) {
        self.0.push_str(text);
    }
}

impl From<&str> for MultilineString {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for MultilineString {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrLines {
    One(String),
    Lines(Vec<String>),
}

impl StringOrLines {
    fn join(self) -> String {
        match self {
            StringOrLines::One(s) => s,
            StringOrLines::Lines(lines) => lines.concat(),
        }
    }
}

impl Serialize for MultilineString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(split_lines(&self.0))
    }
}

impl<'de> Deserialize<'de> for MultilineString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self(StringOrLines::deserialize(deserializer)?.join()))
    }
}

/// Split text into lines, keeping line terminators. Empty input yields no lines.
pub fn split_lines(text: &str) -> Vec<&str> {
    text.split_inclusive('\n').collect()
}

/// Mime-bundle values are multi-line strings unless the mime type is JSON.
fn is_json_mime(mime: &str) -> bool {
    mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json"))
}

/// Serde adapter for `data` mime bundles of display outputs.
pub mod bundle {
    use super::*;

    pub fn serialize<S: Serializer>(data: &Map<String, Value>, serializer: S) -> Result<S::Ok, S::Error> {
        split_bundle(data).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Map<String, Value>, D::Error> {
        let raw = Map::<String, Value>::deserialize(deserializer)?;
        Ok(join_bundle(raw))
    }

    pub(crate) fn join_bundle(raw: Map<String, Value>) -> Map<String, Value> {
        raw.into_iter()
            .map(|(mime, value)| {
                let value = match value {
                    Value::Array(items) if !is_json_mime(&mime) && items.iter().all(Value::is_string) => {
                        Value::String(items.iter().filter_map(Value::as_str).collect())
                    }
                    other => other,
                };
                (mime, value)
            })
            .collect()
    }

    fn split_bundle(data: &Map<String, Value>) -> Map<String, Value> {
        data.iter()
            .map(|(mime, value)| {
                let value = match value {
                    Value::String(s) if !is_json_mime(mime) => Value::Array(
                        split_lines(s)
                            .into_iter()
                            .map(|line| Value::String(line.to_string()))
                            .collect(),
                    ),
                    other => other.clone(),
                };
                (mime.clone(), value)
            })
            .collect()
    }
}
