//! examboard server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) layered with
//! `EXAMBOARD_*` environment variables, opens the SQLite store and serves the
//! HTTP API.
//!
//! Admins have no password login. Create one and mint a session token with:
//!
//! ```text
//! examboard create-admin ADM1 root
//! examboard admin-token ADM1
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use examboard_api::{AppState, ServerConfig, credentials, session::SessionKeys};
use examboard_core::{
  auth::AuthContext,
  identity::{Admin, Identity, IdentityKey},
  store::SchoolStore,
};
use examboard_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "examboard school server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the HTTP API (the default).
  Serve,
  /// Print the argon2 hash for a password entered on stdin and exit.
  HashPassword,
  /// Create an admin account.
  CreateAdmin {
    /// Identity key of the new admin.
    key:      String,
    username: String,
  },
  /// Print a session token for an existing admin.
  AdminToken { key: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  match cli.command.unwrap_or(Command::Serve) {
    Command::HashPassword => {
      let password = read_password()?;
      let hash = credentials::hash_secret(&password).context("failed to hash password")?;
      println!("{hash}");
      Ok(())
    }
    Command::CreateAdmin { key, username } => {
      let cfg = load_config(&cli.config)?;
      let store = open_store(&cfg).await?;
      let admin = store
        .create_admin(Admin { key: IdentityKey::normalize(&key), username })
        .await
        .context("failed to create admin")?;
      println!("created admin {}", admin.key);
      Ok(())
    }
    Command::AdminToken { key } => {
      let cfg = load_config(&cli.config)?;
      let store = open_store(&cfg).await?;
      let identity = store
        .get_identity(IdentityKey::normalize(&key))
        .await
        .context("failed to look up admin")?;
      let Some(admin @ Identity::Admin(_)) = identity else {
        anyhow::bail!("no admin with key {key}");
      };
      let keys = SessionKeys::new(&cfg.session_secret, cfg.session_ttl_minutes);
      let token = keys
        .issue(&AuthContext::for_identity(&admin))
        .context("failed to issue token")?;
      println!("{token}");
      Ok(())
    }
    Command::Serve => serve(load_config(&cli.config)?).await,
  }
}

async fn serve(cfg: ServerConfig) -> anyhow::Result<()> {
  let store = open_store(&cfg).await?;
  let address = format!("{}:{}", cfg.host, cfg.port);

  let state = AppState::new(Arc::new(store), cfg);
  let app = examboard_api::router(state);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

fn load_config(path: &Path) -> anyhow::Result<ServerConfig> {
  let settings = config::Config::builder()
    .add_source(config::File::from(path).required(false))
    .add_source(config::Environment::with_prefix("EXAMBOARD").try_parsing(true))
    .build()
    .context("failed to read config file")?;

  let cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;
  cfg.validate().context("invalid configuration")?;
  Ok(cfg)
}

async fn open_store(cfg: &ServerConfig) -> anyhow::Result<SqliteStore> {
  let store_path = expand_tilde(&cfg.store_path);
  SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))
}

/// Read a password from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  let stdin = io::stdin();
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  stdin.lock().read_line(&mut line)?;
  Ok(line.trim_end_matches(['\n', '\r']).to_string())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tilde_expands_to_home() {
    let Ok(home) = std::env::var("HOME") else { return };
    assert_eq!(expand_tilde(Path::new("~/exam.db")), PathBuf::from(home).join("exam.db"));
    assert_eq!(expand_tilde(Path::new("/tmp/exam.db")), PathBuf::from("/tmp/exam.db"));
  }

  #[test]
  fn missing_config_file_uses_defaults_and_environment() {
    let cfg: ServerConfig = config::Config::builder()
      .set_override("session_secret", "s3cret")
      .unwrap()
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap();
    assert_eq!(cfg.port, 3000);
    assert_eq!(cfg.session_ttl_minutes, 1440);
    assert_eq!(cfg.login_max_attempts, 5);
    assert_eq!(cfg.login_window_seconds, 300);
  }

  #[test]
  fn short_secrets_are_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    std::fs::write(&path, "session_secret = \"change-me\"\n").unwrap();
    let err = load_config(&path).unwrap_err();
    assert!(format!("{err:#}").contains("session_secret must be at least"));

    std::fs::write(
      &path,
      "session_secret = \"a-long-enough-session-secret\"\nsession_ttl_minutes = 0\n",
    )
    .unwrap();
    let err = load_config(&path).unwrap_err();
    assert!(format!("{err:#}").contains("session_ttl_minutes"));

    std::fs::write(&path, "session_secret = \"a-long-enough-session-secret\"\n").unwrap();
    assert_eq!(load_config(&path).unwrap().session_ttl_minutes, 1440);
  }

  #[test]
  fn cli_defaults_to_serve() {
    let cli = Cli::parse_from(["examboard"]);
    assert!(cli.command.is_none());
    assert_eq!(cli.config, PathBuf::from("config.toml"));

    let cli = Cli::parse_from(["examboard", "create-admin", "adm1", "root"]);
    assert!(matches!(cli.command, Some(Command::CreateAdmin { .. })));
  }
}
