use crate::commands::EXIT_INVALID_INPUT;
use crate::output;

use std::path::PathBuf;

use clap::Args;
use color_eyre::Result;

use hyperion_engine::{Document, DocumentReader};

/// Check that task documents can be read
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Paths to the documents
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

pub fn execute(args: ValidateArgs) -> Result<()> {
    let reader = DocumentReader::default();
    let mut invalid = 0;

    for path in &args.files {
        output::status("Validating", &format!("{}", path.display()));

        match reader.read_file(path) {
            Ok(document) => output::check(&summary(&document)),
            Err(e) => {
                invalid += 1;
                output::block(&e.to_string());
            }
        }
    }

    println!();
    if invalid > 0 {
        output::failure(&format!(
            "{} of {} document(s) invalid",
            invalid,
            args.files.len()
        ));
        std::process::exit(EXIT_INVALID_INPUT);
    }

    output::success("All documents are valid");
    Ok(())
}

fn summary(document: &Document) -> String {
    let groups = document.task_groups();
    let tasks: usize = groups.iter().map(|group| group.tasks().len()).sum();
    format!(
        "Structure: {} task groups, {} tasks, {} matrix rows",
        groups.len(),
        tasks,
        document.matrix().len()
    )
}
