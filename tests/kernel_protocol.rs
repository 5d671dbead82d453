//! Drives `KernelExecutor` end to end against the scripted kernel binary, so
//! readiness, output routing, timeouts and kernel death go over real sockets.
mod common;

use std::fs;
use std::path::Path;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;

use common::{execution_counts, stdout_per_cell, write_code_notebook};
use nbrun::{Error, ExecutionConfig, KernelError, KernelExecutor, OutputMode, execute_notebook, read_notebook};

const KERNEL_NAME: &str = "fake";

/// A kernels directory holding a `fake` kernelspec for the scripted kernel.
fn install_fake_kernel() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let spec_dir = dir.path().join(KERNEL_NAME);
    fs::create_dir_all(&spec_dir).unwrap();
    let spec = json!({
        "argv": [env!("CARGO_BIN_EXE_nbrun-fake-kernel"), "-f", "{connection_file}"],
        "display_name": "Fake",
        "language": "fake-python",
    });
    fs::write(spec_dir.join("kernel.json"), spec.to_string()).unwrap();
    dir
}

fn config(timeout_secs: u64) -> ExecutionConfig {
    ExecutionConfig {
        kernel_name: KERNEL_NAME.into(),
        startup_timeout: Duration::from_secs(30),
        ..Default::default()
    }
    .with_timeout_secs(timeout_secs)
}

fn run(kernels: &TempDir, notebook: &Path, timeout_secs: u64) -> nbrun::Result<nbrun::NotebookRun> {
    let executor = KernelExecutor::with_kernel_dirs(vec![kernels.path().to_path_buf()]);
    execute_notebook(notebook, OutputMode::Suffixed, &executor, &config(timeout_secs))
}

#[test]
fn streams_outputs_and_counts_from_the_kernel() {
    let kernels = install_fake_kernel();
    let dir = tempfile::tempdir().unwrap();
    let input = write_code_notebook(dir.path(), "nb.ipynb", &["print(1)", "print(2)\nprint(3)"]);

    let out = run(&kernels, &input, 60).unwrap();
    let executed = read_notebook(&out.output).unwrap();

    assert_eq!(stdout_per_cell(&executed), vec!["1\n", "2\n3\n"]);
    assert_eq!(execution_counts(&executed), vec![Some(1), Some(2)]);
    // consecutive stream messages coalesce into one output
    assert_eq!(executed.code_cells().nth(1).unwrap().outputs.len(), 1);
    assert_eq!(executed.language_info().unwrap()["name"], "fake-python");
}

#[test]
fn kernel_runs_in_the_notebook_directory() {
    let kernels = install_fake_kernel();
    let dir = tempfile::tempdir().unwrap();
    let input = write_code_notebook(dir.path(), "nb.ipynb", &["cwd()"]);

    let out = run(&kernels, &input, 60).unwrap();
    let executed = read_notebook(&out.output).unwrap();

    let reported = stdout_per_cell(&executed)[0].trim_end().to_string();
    assert_eq!(
        fs::canonicalize(reported).unwrap(),
        fs::canonicalize(dir.path()).unwrap()
    );
}

#[test]
fn cell_error_stops_execution_and_keeps_earlier_outputs() {
    let kernels = install_fake_kernel();
    let dir = tempfile::tempdir().unwrap();
    let input = write_code_notebook(dir.path(), "nb.ipynb", &["print(1)", "raise ValueError()", "print(3)"]);

    let err = run(&kernels, &input, 60).unwrap_err();
    let Error::CellExecution(cell_err) = &err else {
        panic!("expected a cell execution error, got {err:?}");
    };
    assert_eq!(cell_err.cell_index, 1);
    assert_eq!(cell_err.ename, "ValueError");
    assert_eq!(cell_err.traceback.len(), 2);

    let executed = read_notebook(&dir.path().join("nb-output.ipynb")).unwrap();
    assert_eq!(execution_counts(&executed), vec![Some(1), Some(2), None]);
    let cells: Vec<_> = executed.code_cells().collect();
    assert_eq!(cells[0].stream_text("stdout"), "1\n");
    assert!(cells[1].outputs.iter().any(|o| o.is_error()));
    assert!(cells[2].outputs.is_empty());
}

#[test]
fn timeout_interrupts_the_kernel_and_keeps_partial_output() {
    let kernels = install_fake_kernel();
    let dir = tempfile::tempdir().unwrap();
    let input = write_code_notebook(dir.path(), "nb.ipynb", &["print(1)", "print(x)\nsleep(30)", "print(3)"]);

    let err = run(&kernels, &input, 2).unwrap_err();
    assert!(
        matches!(err, Error::CellTimeout { cell_index: 1, timeout } if timeout == Duration::from_secs(2)),
        "unexpected error {err:?}"
    );
    assert!(err.is_execution_failure());

    let executed = read_notebook(&dir.path().join("nb-output.ipynb")).unwrap();
    assert_eq!(stdout_per_cell(&executed), vec!["1\n", "x\n", ""]);
}

#[test]
fn kernel_exit_is_reported_as_an_execution_failure() {
    let kernels = install_fake_kernel();
    let dir = tempfile::tempdir().unwrap();
    let input = write_code_notebook(dir.path(), "nb.ipynb", &["print(1)", "exit()", "print(3)"]);

    let err = run(&kernels, &input, 60).unwrap_err();
    assert!(
        matches!(err, Error::Kernel(KernelError::DeadKernel | KernelError::Transport(_))),
        "unexpected error {err:?}"
    );
    assert!(err.is_execution_failure());

    let executed = read_notebook(&dir.path().join("nb-output.ipynb")).unwrap();
    let stdout = stdout_per_cell(&executed);
    assert_eq!(stdout[0], "1\n");
    assert_eq!(stdout[2], "");
}

#[test]
fn unknown_kernel_name_is_rejected() {
    let kernels = install_fake_kernel();
    let dir = tempfile::tempdir().unwrap();
    let input = write_code_notebook(dir.path(), "nb.ipynb", &["print(1)"]);

    let executor = KernelExecutor::with_kernel_dirs(vec![kernels.path().to_path_buf()]);
    let config = ExecutionConfig {
        kernel_name: "julia-1.10".into(),
        ..Default::default()
    };
    let err = execute_notebook(&input, OutputMode::Suffixed, &executor, &config).unwrap_err();
    assert!(matches!(err, Error::Kernel(KernelError::NoSuchKernel(ref name)) if name == "julia-1.10"));
}
