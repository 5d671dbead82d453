//! Execution seam between the orchestration layer and whatever actually
//! runs code.
//!
//! `Executor` is the dependency the `api` layer is handed: given a loaded
//! notebook and its configuration, execute it in place. `CellRunner` is the
//! narrower per-session interface a kernel implementation provides, and
//! `run_cells` is the shared loop that walks a notebook with one.
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::core::params::ExecutionConfig;
use crate::error::{CellExecutionError, Result};
use crate::notebook::{CodeCell, Notebook, TAG_RAISES_EXCEPTION};
use crate::types::ErrorPolicy;

/// Executes a notebook's code cells in place.
///
/// Implementations mutate `notebook` as cells run so that a failure part way
/// through leaves the outputs of every cell that did run.
pub trait Executor {
    fn execute(&self, notebook: &mut Notebook, config: &ExecutionConfig) -> Result<()>;
}

impl<E: Executor + ?Sized> Executor for &E {
    fn execute(&self, notebook: &mut Notebook, config: &ExecutionConfig) -> Result<()> {
        (**self).execute(notebook, config)
    }
}

/// Outcome reported by the kernel for one `execute_request`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyStatus {
    Ok,
    Error {
        ename: String,
        evalue: String,
        traceback: Vec<String>,
    },
    /// The kernel refused to run the request
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellReply {
    pub status: ReplyStatus,
    pub execution_count: Option<i64>,
}

impl CellReply {
    pub fn ok(execution_count: i64) -> Self {
        Self {
            status: ReplyStatus::Ok,
            execution_count: Some(execution_count),
        }
    }
}

/// One live kernel session able to run cells in sequence.
pub trait CellRunner {
    /// `language_info` reported by the kernel at startup.
    fn language_info(&self) -> Option<Value>;

    /// Run `cell`'s source, appending outputs to the cell as they arrive.
    fn run_cell(&mut self, cell_index: usize, cell: &mut CodeCell, timeout: Option<Duration>) -> Result<CellReply>;
}

/// Counters for one pass over a notebook.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub executed: usize,
    pub skipped: usize,
    pub errors: usize,
}

/// Execute every runnable code cell of `notebook`, in order, with `runner`.
pub fn run_cells<R: CellRunner + ?Sized>(
    notebook: &mut Notebook,
    config: &ExecutionConfig,
    runner: &mut R,
) -> Result<RunSummary> {
    if let Some(info) = runner.language_info() {
        notebook.set_language_info(info);
    }

    let mut summary = RunSummary::default();
    let total = notebook.cells.len();

    for (index, cell) in notebook.cells.iter_mut().enumerate() {
        let Some(code) = cell.as_code_mut() else {
            continue;
        };
        if !code.should_execute() {
            debug!("Skipping cell {}/{}", index + 1, total);
            summary.skipped += 1;
            continue;
        }

        debug!("Executing cell {}/{}", index + 1, total);
        code.clear_outputs();
        let started = timestamp();
        let reply = runner.run_cell(index, code, config.timeout)?;
        if config.record_timing {
            record_timing(code, started, timestamp());
        }
        if reply.execution_count.is_some() {
            code.execution_count = reply.execution_count;
        }
        summary.executed += 1;

        match reply.status {
            ReplyStatus::Ok => {}
            ReplyStatus::Aborted => warn!("Kernel aborted execution of cell {}", index),
            ReplyStatus::Error {
                ename,
                evalue,
                traceback,
            } => {
                summary.errors += 1;
                let tolerated = config.error_policy == ErrorPolicy::Continue || code.has_tag(TAG_RAISES_EXCEPTION);
                if tolerated {
                    info!("Cell {} raised {}: {} (continuing)", index, ename, evalue);
                    continue;
                }
                return Err(CellExecutionError {
                    cell_index: index,
                    source: code.source.as_str().to_string(),
                    ename,
                    evalue,
                    traceback,
                }
                .into());
            }
        }
    }

    Ok(summary)
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn record_timing(cell: &mut CodeCell, started: String, finished: String) {
    let entry = cell
        .metadata
        .entry("execution")
        .or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
        *entry = Value::Object(Map::new());
    }
    if let Value::Object(execution) = entry {
        execution.insert("shell.execute_reply.started".into(), Value::String(started));
        execution.insert("shell.execute_reply".into(), Value::String(finished));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::notebook::{Cell, Output};
    use serde_json::json;

    /// Runs `print(x)` and `raise Name()` lines; everything else is a no-op.
    struct Scripted {
        count: i64,
        seen: Vec<usize>,
    }

    impl Scripted {
        fn new() -> Self {
            Self { count: 0, seen: vec![] }
        }
    }

    impl CellRunner for Scripted {
        fn language_info(&self) -> Option<Value> {
            Some(json!({"name": "python"}))
        }

        fn run_cell(&mut self, index: usize, cell: &mut CodeCell, _timeout: Option<Duration>) -> Result<CellReply> {
            self.count += 1;
            self.seen.push(index);
            for line in cell.source.as_str().lines() {
                if let Some(arg) = line.strip_prefix("print(").and_then(|s| s.strip_suffix(')')) {
                    cell.outputs.push(Output::stream("stdout", &format!("{arg}\n")));
                } else if let Some(name) = line.strip_prefix("raise ").and_then(|s| s.strip_suffix("()")) {
                    cell.outputs.push(Output::error(name, "", vec![]));
                    return Ok(CellReply {
                        status: ReplyStatus::Error {
                            ename: name.into(),
                            evalue: String::new(),
                            traceback: vec![],
                        },
                        execution_count: Some(self.count),
                    });
                }
            }
            Ok(CellReply::ok(self.count))
        }
    }

    fn notebook(sources: &[&str]) -> Notebook {
        Notebook::with_cells(sources.iter().map(|s| Cell::code(s)).collect())
    }

    #[test]
    fn runs_cells_in_order_and_assigns_counts() {
        let mut nb = notebook(&["print(1)", "print(2)"]);
        let summary = run_cells(&mut nb, &ExecutionConfig::default(), &mut Scripted::new()).unwrap();
        assert_eq!(summary.executed, 2);
        let counts: Vec<_> = nb.code_cells().map(|c| c.execution_count).collect();
        assert_eq!(counts, vec![Some(1), Some(2)]);
        assert_eq!(nb.language_info(), Some(&json!({"name": "python"})));
        let cell = nb.cells[0].as_code().unwrap();
        assert!(cell.metadata["execution"]["shell.execute_reply"].is_string());
    }

    #[test]
    fn abort_policy_stops_at_first_error() {
        let mut nb = notebook(&["print(1)", "raise ValueError()", "print(3)"]);
        let mut runner = Scripted::new();
        let err = run_cells(&mut nb, &ExecutionConfig::default(), &mut runner).unwrap_err();
        match err {
            Error::CellExecution(e) => {
                assert_eq!(e.cell_index, 1);
                assert_eq!(e.ename, "ValueError");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(runner.seen, vec![0, 1]);
        assert!(nb.cells[2].as_code().unwrap().outputs.is_empty());
    }

    #[test]
    fn continue_policy_and_tag_tolerate_errors() {
        let config = ExecutionConfig {
            error_policy: ErrorPolicy::Continue,
            ..Default::default()
        };
        let mut nb = notebook(&["raise KeyError()", "print(2)"]);
        let summary = run_cells(&mut nb, &config, &mut Scripted::new()).unwrap();
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.executed, 2);

        let mut nb = notebook(&["raise KeyError()", "print(2)"]);
        if let Some(code) = nb.cells[0].as_code_mut() {
            code.metadata.insert("tags".into(), json!([TAG_RAISES_EXCEPTION]));
        }
        assert!(run_cells(&mut nb, &ExecutionConfig::default(), &mut Scripted::new()).is_ok());
    }

    #[test]
    fn previous_results_are_replaced_not_skipped() {
        let mut nb = notebook(&["print(1)", "", "print(2)"]);
        nb.cells.insert(1, Cell::markdown("notes"));
        if let Some(code) = nb.cells[0].as_code_mut() {
            code.execution_count = Some(7);
            code.outputs.push(Output::stream("stdout", "stale\n"));
        }
        let mut runner = Scripted::new();
        let summary = run_cells(&mut nb, &ExecutionConfig::default(), &mut runner).unwrap();
        assert_eq!(runner.seen, vec![0, 3]);
        assert_eq!(summary.skipped, 1);
        let first = nb.cells[0].as_code().unwrap();
        assert_eq!(first.execution_count, Some(1));
        assert_eq!(first.stream_text("stdout"), "1\n");
    }
}
