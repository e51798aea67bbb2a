use crate::commands::{EXIT_FAILURE, EXIT_INVALID_INPUT};
use crate::output;

use std::path::PathBuf;

use clap::Args;
use color_eyre::Result;

use hyperion_engine::execution::DEFAULT_TIMEOUT_TASKGROUP_MINUTES;
use hyperion_engine::{progress_channel, DocumentParameters, DocumentReader, ExecutionEvent};

/// Run a task document
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the document (YAML, or JSON with a .json extension)
    pub file: PathBuf,

    /// Only run tasks carrying one of these tags (can be repeated)
    #[arg(long = "tag", short = 't', value_name = "TAG")]
    pub tags: Vec<String>,

    /// Minutes to wait for a parallel task group
    #[arg(
        long,
        value_name = "MIN",
        env = "HYPERION_TIMEOUT_TASKGROUP",
        default_value_t = DEFAULT_TIMEOUT_TASKGROUP_MINUTES
    )]
    pub timeout_taskgroup: u64,

    /// Directory for generated scripts (default: system temp directory)
    #[arg(long, value_name = "DIR")]
    pub temporary_path: Option<PathBuf>,

    /// Working directory for execution
    #[arg(long, short = 'w', value_name = "DIR")]
    pub working_dir: Option<PathBuf>,
}

impl RunArgs {
    fn parameters(&self) -> Result<DocumentParameters> {
        let working_dir = match &self.working_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()?,
        };
        if !working_dir.is_dir() {
            color_eyre::eyre::bail!("Working directory not found: {}", working_dir.display());
        }

        let mut parameters = DocumentParameters::new()
            .with_tags(self.tags.clone())
            .with_timeout_minutes(self.timeout_taskgroup)
            .with_working_dir(working_dir);

        if let Some(path) = &self.temporary_path {
            if !path.is_dir() {
                color_eyre::eyre::bail!(
                    "Temporary path '{}' does not exist or is not a directory",
                    path.display()
                );
            }
            parameters = parameters.with_temporary_path(path);
        }

        Ok(parameters)
    }
}

pub async fn execute(args: RunArgs) -> Result<()> {
    let path = &args.file;

    if !path.exists() {
        color_eyre::eyre::bail!("Document not found: {}", path.display());
    }

    let parameters = args.parameters()?;

    output::status("Reading", &format!("{}", path.display()));
    let document = match DocumentReader::default().read_file(path) {
        Ok(document) => document,
        Err(e) => {
            output::block(&e.to_string());
            std::process::exit(EXIT_INVALID_INPUT);
        }
    };

    if !args.tags.is_empty() {
        output::info(&format!("Tag filter: {}", args.tags.join(", ")));
    }

    let (tx, mut rx) = progress_channel();
    let parameters = parameters.with_progress(tx);

    // Spawn execution in background
    let exec_handle = tokio::spawn(async move { document.execute(&parameters).await });

    // Work items detached by a group timeout may keep a sender alive,
    // so the loop ends on the completion event rather than on channel close.
    while let Some(event) = rx.recv().await {
        if render(&event) {
            break;
        }
    }

    let result = exec_handle.await?;
    if !result.success() {
        std::process::exit(EXIT_FAILURE);
    }

    Ok(())
}

/// Print one event, returning true once the document finished
fn render(event: &ExecutionEvent) -> bool {
    match event {
        ExecutionEvent::DocumentStarted {
            total_matrix,
            total_groups,
        } => {
            println!();
            if *total_matrix > 0 {
                output::header(&format!(
                    "Document ({} task groups, {} matrix rows)",
                    total_groups, total_matrix
                ));
            } else {
                output::header(&format!("Document ({} task groups)", total_groups));
            }
        }

        ExecutionEvent::DocumentCompleted { success, duration } => {
            println!();
            if *success {
                output::success(&format!(
                    "Document completed successfully in {:.2}s",
                    duration.as_secs_f64()
                ));
            } else {
                output::failure(&format!(
                    "Document failed after {:.2}s",
                    duration.as_secs_f64()
                ));
            }
            return true;
        }

        ExecutionEvent::MatrixStarted { title, index, total } => {
            output::status("Matrix", &format!("[{}/{}] {}", index + 1, total, title));
        }

        ExecutionEvent::TaskGroupStarted {
            title,
            parallel,
            work_items,
        } => {
            output::group_header(title, *work_items, *parallel);
        }

        ExecutionEvent::TaskGroupCompleted {
            title,
            success,
            failures,
            duration,
        } => {
            if *success {
                output::dim_success(&format!(
                    "  Group '{}' OK ({:.2}s)",
                    title,
                    duration.as_secs_f64()
                ));
            } else {
                output::dim_failure(&format!(
                    "  Group '{}' FAIL, {} failure(s) ({:.2}s)",
                    title,
                    failures,
                    duration.as_secs_f64()
                ));
            }
        }

        ExecutionEvent::TaskGroupTimedOut { title, unfinished } => {
            output::warning(&format!(
                "  Group '{}' timed out with {} unfinished item(s)",
                title, unfinished
            ));
        }

        ExecutionEvent::TaskStarted { title, .. } => {
            println!("    {}", title);
        }

        ExecutionEvent::TaskCompleted {
            title,
            success,
            variable,
            value,
            ..
        } => {
            if *success {
                output::dim_success(&format!("      OK {}", title));
            } else {
                output::dim_failure(&format!("      FAIL {}", title));
            }
            if !value.is_empty() {
                output::dim(&format!("      [var] {} = {}", variable, value));
            }
        }

        ExecutionEvent::TaskSkipped { title, reason, .. } => {
            output::warning(&format!("    {} skipped: {}", title, reason));
        }
    }
    false
}
