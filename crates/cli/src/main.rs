// mobilecoder: interactive desktop CLI entry point.

use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use mobilecoder_session::local_fs::LocalFs;
use mobilecoder_session::store::SqliteStore;
use mobilecoder_session::Session;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod help;
mod output;
mod repl;
mod terminal;

use config::Config;
use output::{OutputFormat, Style};
use repl::Repl;
use terminal::Terminal;

#[derive(Parser)]
#[command(name = "mobilecoder", about = "Sync local files with MobileCoder workspaces")]
struct Cli {
    /// Read configuration from this file instead of ~/.mobilecoder/config.toml.
    #[arg(long)]
    config: Option<PathBuf>,

    /// SQLite store to use; overrides config and MOBILECODER_STORE_PATH.
    #[arg(long)]
    store: Option<PathBuf>,

    /// Emit one JSON object per response.
    #[arg(long)]
    json: bool,

    /// Skip the welcome banner.
    #[arg(long)]
    no_banner: bool,

    /// Write a default config file (to --config or ~/.mobilecoder/config.toml) and exit.
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.init_config {
        let path = cli
            .config
            .clone()
            .or_else(config::global_config_path)
            .context("no home directory; pass --config <path>")?;
        let written = init_config(&path)?;
        println!("Wrote default config to {}", written.display());
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load config from `{}`", path.display()))?,
        None => Config::load(),
    }
    .apply_env();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();

    let store_path = cli.store.clone().unwrap_or_else(|| config.store_path.clone());
    let store = SqliteStore::open(&store_path)
        .with_context(|| format!("failed to open store at `{}`", store_path.display()))?;
    let auth = store.auth();
    let local = LocalFs::current_dir().context("failed to resolve the working directory")?;
    info!(store = %store_path.display(), cwd = %local.cwd().display(), "starting session");

    let format = OutputFormat::detect(cli.json);
    let style = Style::new(config.color && format == OutputFormat::Human && io::stdout().is_terminal());
    if format == OutputFormat::Human && !cli.no_banner {
        println!("{}", output::banner(style));
    }

    let mut terminal = Terminal::stdio(format);
    let mut repl = Repl::new(Session::new(store, auth, local), format, style, config.prompt_name);
    repl.run(&mut terminal, &mut io::stdout()).await.context("terminal output failed")
}

/// Write `Config::default()` to `path`, refusing to replace an existing file.
fn init_config(path: &Path) -> anyhow::Result<PathBuf> {
    if path.exists() {
        anyhow::bail!("config file `{}` already exists", path.display());
    }
    Config::default()
        .save_to(path)
        .with_context(|| format!("failed to write config to `{}`", path.display()))?;
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_flags() {
        let cli = Cli::parse_from(["mobilecoder", "--json", "--no-banner", "--store", "/tmp/s.db"]);
        assert!(cli.json);
        assert!(cli.no_banner);
        assert_eq!(cli.store, Some(PathBuf::from("/tmp/s.db")));
        assert!(cli.config.is_none());
        assert!(!cli.init_config);
    }

    #[test]
    fn init_config_writes_defaults_once() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested/config.toml");

        assert_eq!(init_config(&path).unwrap(), path);
        assert_eq!(Config::load_from(&path).unwrap(), Config::default());

        let err = init_config(&path).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }
}
