#![allow(dead_code)]

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::{Value, json};

use nbrun::core::executor::{CellReply, CellRunner, Executor, ReplyStatus, run_cells};
use nbrun::{Cell, CodeCell, ExecutionConfig, Notebook, Output, Result, write_notebook};

/// Tiny stand-in for a Python kernel.
///
/// Understands `print(x)` (stdout `x\n`) and `raise Name()` (error output
/// plus an error reply). Any other line runs silently. A fresh session with
/// its own execution counter is used for every notebook.
#[derive(Default)]
pub struct ScriptedExecutor {
    /// Working directory of each notebook executed, in call order
    pub working_dirs: RefCell<Vec<PathBuf>>,
}

struct ScriptedSession {
    count: i64,
}

impl CellRunner for ScriptedSession {
    fn language_info(&self) -> Option<Value> {
        Some(json!({"name": "python", "file_extension": ".py"}))
    }

    fn run_cell(&mut self, _index: usize, cell: &mut CodeCell, _timeout: Option<Duration>) -> Result<CellReply> {
        self.count += 1;
        for line in cell.source.as_str().lines() {
            let line = line.trim();
            if let Some(arg) = line.strip_prefix("print(").and_then(|s| s.strip_suffix(')')) {
                let arg = arg.trim_matches(|c| c == '"' || c == '\'');
                match cell.outputs.last_mut() {
                    Some(Output::Stream { name, text }) if name == "stdout" => {
                        text.push_str(&format!("{arg}\n"));
                    }
                    _ => cell.outputs.push(Output::stream("stdout", &format!("{arg}\n"))),
                }
            } else if let Some(name) = line.strip_prefix("raise ").and_then(|s| s.strip_suffix("()")) {
                let traceback = vec!["Traceback (most recent call last):".to_string(), format!("{name}: ")];
                cell.outputs.push(Output::error(name, "", traceback.clone()));
                return Ok(CellReply {
                    status: ReplyStatus::Error {
                        ename: name.to_string(),
                        evalue: String::new(),
                        traceback,
                    },
                    execution_count: Some(self.count),
                });
            }
        }
        Ok(CellReply::ok(self.count))
    }
}

impl Executor for ScriptedExecutor {
    fn execute(&self, notebook: &mut Notebook, config: &ExecutionConfig) -> Result<()> {
        self.working_dirs
            .borrow_mut()
            .push(config.working_dir.clone().unwrap_or_default());
        run_cells(notebook, config, &mut ScriptedSession { count: 0 })?;
        Ok(())
    }
}

/// Write a notebook of code cells with the given sources to `dir/name`.
pub fn write_code_notebook(dir: &Path, name: &str, sources: &[&str]) -> PathBuf {
    let cells = sources.iter().map(|s| Cell::code(s)).collect();
    let path = dir.join(name);
    write_notebook(&Notebook::with_cells(cells), &path).unwrap();
    path
}

/// Stdout text of every code cell, in order.
pub fn stdout_per_cell(notebook: &Notebook) -> Vec<String> {
    notebook.code_cells().map(|c| c.stream_text("stdout")).collect()
}

pub fn execution_counts(notebook: &Notebook) -> Vec<Option<i64>> {
    notebook.code_cells().map(|c| c.execution_count).collect()
}
