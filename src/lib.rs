#![doc = r#"
nbrun — execute Jupyter notebooks from the command line or from Rust.

This crate loads `.ipynb` documents (nbformat v4), runs their code cells in
order against a Jupyter kernel, and writes the executed document back to
disk: next to the input as `<name>-output.ipynb`, or in place. The executed
notebook is written even when a cell fails, so the traceback can be read
from the output file. It powers the `nbrun` CLI and can be embedded in your
own Rust applications.

Stability
---------
The public library API is experimental in initial releases. Breaking changes
can occur.

Requirements
------------
- A Jupyter kernel installed on the machine (for `python3`, `ipykernel`).
- Rust 2024 edition toolchain.

Add dependency
--------------
```toml
[dependencies]
nbrun = "0.1"
```

Quick start: execute a notebook
-------------------------------
```rust,no_run
use std::path::Path;
use nbrun::{ExecutionConfig, KernelExecutor, OutputMode, execute_notebook};

fn main() -> nbrun::Result<()> {
    let config = ExecutionConfig::default().with_timeout_secs(120);
    let run = execute_notebook(
        Path::new("analysis/report.ipynb"),
        OutputMode::Suffixed,
        &KernelExecutor::new(),
        &config,
    )?;
    println!("wrote {}", run.output.display());
    Ok(())
}
```

Handle cell failures
--------------------
```rust,no_run
use std::path::Path;
use nbrun::{Error, ExecutionConfig, KernelExecutor, OutputMode, execute_notebook};

fn main() {
    let result = execute_notebook(
        Path::new("analysis/report.ipynb"),
        OutputMode::InPlace,
        &KernelExecutor::new(),
        &ExecutionConfig::default(),
    );
    match result {
        Ok(_) => {}
        Err(Error::CellExecution(e)) => eprintln!("cell {} raised {}", e.cell_index, e.ename),
        Err(e) => eprintln!("{e}"),
    }
}
```

Custom executors
----------------
Anything implementing [`Executor`] can stand in for the kernel, and
[`run_cells`] drives any [`CellRunner`] through the standard cell loop
(skipping, output clearing, timing metadata and error policy).

Modules
-------
- [`api`] — high-level entrypoints (`execute_notebook`, `execute_notebooks`).
- [`core`] — execution config, output paths, executor traits and the cell loop.
- [`kernel`] — Jupyter kernel discovery, launch and messaging.
- [`notebook`] — the nbformat v4 document model.
- [`io`] — notebook reader and writer.
- [`types`] — output mode and error policy enums.
- [`error`] — crate-level `Error` and `Result`.
"#]

// Core modules (public)
pub mod api;
pub mod core;
pub mod error;
pub mod io;
pub mod kernel;
pub mod notebook;
pub mod types;

// Curated public API surface
// Types
pub use core::params::ExecutionConfig;
pub use error::{CellExecutionError, Error, KernelError, Result};
pub use notebook::{Cell, CodeCell, Notebook, Output};
pub use types::{ErrorPolicy, OutputMode};

// Execution
pub use core::executor::{CellRunner, Executor, run_cells};
pub use core::paths::output_path;
pub use kernel::KernelExecutor;

// Reader/writer
pub use io::{NotebookGuard, read_notebook, write_notebook};

// High-level API re-exports
pub use api::{NotebookRun, execute_notebook, execute_notebooks};
