//! Turning iopub messages into notebook outputs.
use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::trace;

use super::message::Message;
use crate::notebook::{CodeCell, Output};

/// Applies the iopub messages of one `execute_request` to its cell.
#[derive(Debug, Default)]
pub struct OutputCollector {
    /// Set by `clear_output(wait=True)`: clear right before the next output
    clear_pending: bool,
    /// `transient.display_id` -> indices into `cell.outputs`
    display_ids: HashMap<String, Vec<usize>>,
}

impl OutputCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `msg` to `cell`. Returns true once the kernel reports `idle`.
    pub fn handle(&mut self, msg: &Message, cell: &mut CodeCell) -> bool {
        let content = &msg.content;
        match msg.msg_type() {
            "status" => return msg.content_str("execution_state") == Some("idle"),
            "execute_input" => {
                if let Some(count) = content.get("execution_count").and_then(Value::as_i64) {
                    cell.execution_count = Some(count);
                }
            }
            "clear_output" => {
                if content.get("wait").and_then(Value::as_bool).unwrap_or(false) {
                    self.clear_pending = true;
                } else {
                    self.clear(cell);
                }
            }
            "stream" => {
                let name = msg.content_str("name").unwrap_or("stdout");
                let text = msg.content_str("text").unwrap_or_default();
                self.flush_pending_clear(cell);
                let coalesce = matches!(cell.outputs.last(), Some(Output::Stream { name: last, .. }) if last == name);
                match cell.outputs.last_mut() {
                    Some(Output::Stream { text: existing, .. }) if coalesce => existing.push_str(text),
                    _ => cell.outputs.push(Output::stream(name, text)),
                }
            }
            "display_data" => {
                self.flush_pending_clear(cell);
                if let Some(id) = display_id(content) {
                    self.display_ids.entry(id.to_string()).or_default().push(cell.outputs.len());
                }
                cell.outputs.push(Output::DisplayData {
                    data: object(content, "data"),
                    metadata: object(content, "metadata"),
                });
            }
            "execute_result" => {
                self.flush_pending_clear(cell);
                if let Some(id) = display_id(content) {
                    self.display_ids.entry(id.to_string()).or_default().push(cell.outputs.len());
                }
                cell.outputs.push(Output::ExecuteResult {
                    execution_count: content.get("execution_count").and_then(Value::as_i64),
                    data: object(content, "data"),
                    metadata: object(content, "metadata"),
                });
            }
            "error" => {
                self.flush_pending_clear(cell);
                let traceback = content
                    .get("traceback")
                    .and_then(Value::as_array)
                    .map(|lines| lines.iter().filter_map(Value::as_str).map(String::from).collect())
                    .unwrap_or_default();
                cell.outputs.push(Output::error(
                    msg.content_str("ename").unwrap_or_default(),
                    msg.content_str("evalue").unwrap_or_default(),
                    traceback,
                ));
            }
            "update_display_data" => {
                if let Some(id) = display_id(content) {
                    self.update_display(cell, id, object(content, "data"), object(content, "metadata"));
                }
            }
            other => trace!("Ignoring iopub message {}", other),
        }
        false
    }

    fn clear(&mut self, cell: &mut CodeCell) {
        cell.outputs.clear();
        self.display_ids.clear();
        self.clear_pending = false;
    }

    fn flush_pending_clear(&mut self, cell: &mut CodeCell) {
        if self.clear_pending {
            self.clear(cell);
        }
    }

    fn update_display(&mut self, cell: &mut CodeCell, id: &str, new_data: Map<String, Value>, new_metadata: Map<String, Value>) {
        let Some(indices) = self.display_ids.get(id) else {
            return;
        };
        for &i in indices {
            match cell.outputs.get_mut(i) {
                Some(Output::DisplayData { data, metadata } | Output::ExecuteResult { data, metadata, .. }) => {
                    *data = new_data.clone();
                    *metadata = new_metadata.clone();
                }
                _ => {}
            }
        }
    }
}

fn display_id(content: &Value) -> Option<&str> {
    content.get("transient")?.get("display_id")?.as_str()
}

fn object(content: &Value, key: &str) -> Map<String, Value> {
    content
        .get(key)
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}
