mod commands;
mod output;
mod server;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use tracing_subscriber::EnvFilter;

use commands::{run::RunArgs, serve::ServeArgs, validate::ValidateArgs};

#[derive(Parser, Debug)]
#[command(name = "hyperion")]
#[command(author, version, about = "Run document-driven task pipelines")]
#[command(propagate_version = true)]
struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a task document
    Run(RunArgs),

    /// Validate task documents without running them
    Validate(ValidateArgs),

    /// Show which task kinds this machine can run
    Capabilities,

    /// Accept documents over HTTP and run them in the background
    Serve(ServeArgs),
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run(args) => commands::run::execute(args).await,
        Commands::Validate(args) => commands::validate::execute(args),
        Commands::Capabilities => commands::capabilities::execute().await,
        Commands::Serve(args) => commands::serve::execute(args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from([
            "hyperion",
            "run",
            "doc.yml",
            "-t",
            "build",
            "--tag",
            "ci",
            "--timeout-taskgroup",
            "5",
            "-w",
            "/tmp",
            "--verbose",
        ])
        .unwrap();

        assert!(cli.verbose);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.file, std::path::PathBuf::from("doc.yml"));
                assert_eq!(args.tags, vec!["build", "ci"]);
                assert_eq!(args.timeout_taskgroup, 5);
                assert_eq!(args.working_dir, Some(std::path::PathBuf::from("/tmp")));
                assert!(args.temporary_path.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_serve() {
        let cli = Cli::try_parse_from(["hyperion", "serve", "--port", "9090", "-w", "/tmp"]).unwrap();
        match cli.command {
            Commands::Serve(args) => {
                assert_eq!(args.host, "127.0.0.1");
                assert_eq!(args.port, 9090);
                assert_eq!(args.working_dir, Some(std::path::PathBuf::from("/tmp")));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_validate_requires_file() {
        assert!(Cli::try_parse_from(["hyperion", "validate"]).is_err());
        let cli = Cli::try_parse_from(["hyperion", "validate", "a.yml", "b.json"]).unwrap();
        match cli.command {
            Commands::Validate(args) => assert_eq!(args.files.len(), 2),
            other => panic!("unexpected command {:?}", other),
        }
    }
}
