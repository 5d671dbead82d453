use std::path::{Path, PathBuf};

use tracing::info;
use tracing_subscriber::EnvFilter;

use nbrun::api::execute_notebook;
use nbrun::core::executor::Executor;
use nbrun::core::params::ExecutionConfig;
use nbrun::core::paths::output_path;
use nbrun::kernel::KernelExecutor;
use nbrun::{OutputMode, Result};

use super::args::CliArgs;

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Message printed when a notebook fails while executing.
fn failure_message(input: &Path, output: &Path) -> String {
    format!(
        "Error executing {}.\nSee {} for the traceback.",
        input.display(),
        output.display()
    )
}

/// Execute every notebook in order with `executor`. The first failure is
/// reported and returned unchanged; later notebooks are not run.
fn run_notebooks<E: Executor + ?Sized>(
    paths: &[PathBuf],
    mode: OutputMode,
    executor: &E,
    config: &ExecutionConfig,
) -> Result<()> {
    for path in paths {
        println!("Running {}", path.display());
        match execute_notebook(path, mode, executor, config) {
            Ok(run) => info!("Successfully executed: {:?} -> {:?}", run.input, run.output),
            Err(e) => {
                if e.is_execution_failure() {
                    eprintln!("{}", failure_message(path, &output_path(path, mode)));
                }
                return Err(e);
            }
        }
    }
    Ok(())
}

pub fn run(args: CliArgs) -> Result<()> {
    init_logging(args.log);

    let config = ExecutionConfig {
        kernel_name: args.kernel,
        ..Default::default()
    }
    .with_timeout_secs(args.timeout);
    info!(
        "Executing {} notebook(s), timeout {:?}, kernel {}",
        args.notebook_paths.len(),
        config.timeout,
        config.kernel_name
    );

    run_notebooks(&args.notebook_paths, args.output_mode, &KernelExecutor::new(), &config)
}
