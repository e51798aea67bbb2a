use crate::output;
use crate::server::{self, AppState, ServerConfig};

use std::path::PathBuf;

use clap::Args;
use color_eyre::Result;

use hyperion_engine::execution::DEFAULT_TIMEOUT_TASKGROUP_MINUTES;
use hyperion_engine::DocumentParameters;

/// Accept documents over HTTP
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(long, short = 'p', default_value_t = 8080)]
    pub port: u16,

    /// Minutes to wait for a parallel task group, unless a request sets `timeout`
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

impl ServeArgs {
    fn parameters(&self) -> Result<DocumentParameters> {
        let working_dir = match &self.working_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()?,
        };
        if !working_dir.is_dir() {
            color_eyre::eyre::bail!("Working directory not found: {}", working_dir.display());
        }

        let mut parameters = DocumentParameters::new()
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

pub async fn execute(args: ServeArgs) -> Result<()> {
    let state = AppState::new(args.parameters()?);
    let config = ServerConfig {
        host: args.host.clone(),
        port: args.port,
    };

    output::status("Serving", &format!("http://{}:{}/documents", config.host, config.port));
    server::start_server(config, state).await
}
