mod app;
mod buffer;
mod cli;
mod config;
mod dispatcher;
mod host;
mod paths;
mod prompt;
mod provider;
mod transport;

use clap::Parser;
use dispatcher::Mode;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Streamed text goes to stdout; keep logs on stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Args::parse();

    let config_path = match args.config {
        Some(p) => p,
        None => paths::config_path()?,
    };
    let cfg = config::Config::load(&config_path)?;
    tracing::debug!(?config_path, ?cfg, "resolved config");

    match args.cmd {
        cli::Command::Suggest(edit) => app::cmd_edit(&cfg, Mode::Suggest, edit).await,
        cli::Command::Change(edit) => app::cmd_edit(&cfg, Mode::Change, edit).await,
        cli::Command::Config => app::cmd_config(&cfg),
    }
}
