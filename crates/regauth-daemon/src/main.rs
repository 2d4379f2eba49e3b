//! regauth-daemon - Cluster Registration Authority
//!
//! Serves the registration endpoint over HTTP. Accepted tokens come from the
//! configuration file, a JSON tokens file, or `--token` flags; registrations
//! live in memory for the lifetime of the process.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use regauth_core::RegistrationAuthority;
use regauth_core::config::{AuthorityConfig, load_tokens_file};
use regauth_daemon::handlers::router;
use tokio::signal::unix::{SignalKind, signal};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// regauth daemon - cluster registration authority
#[derive(Parser, Debug)]
#[command(name = "regauth-daemon")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on (overrides the configuration file; default
    /// 127.0.0.1:8080)
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Accepted token; may be given multiple times
    #[arg(long = "token")]
    tokens: Vec<String>,

    /// JSON file holding an array of {"token": "..."} objects
    #[arg(long)]
    tokens_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log to file instead of stdout
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Args {
    /// Loads the configuration file, if any, and applies flag overrides.
    fn resolve_config(&self) -> Result<AuthorityConfig> {
        let mut config = match &self.config {
            Some(path) => AuthorityConfig::from_file(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => AuthorityConfig::default(),
        };

        if let Some(listen) = self.listen {
            config.listen = listen;
        }
        config.tokens.extend(self.tokens.iter().cloned());
        if let Some(path) = &self.tokens_file {
            // Merged with any tokens_file named in the configuration.
            let extra = load_tokens_file(path)
                .with_context(|| format!("failed to load tokens from {}", path.display()))?;
            config.tokens.extend(extra);
        }
        Ok(config)
    }
}

fn init_logging(args: &Args) -> Result<()> {
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    if let Some(log_file) = &args.log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .with_context(|| format!("failed to open log file {}", log_file.display()))?;

        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(file)
                    .with_ansi(false),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            },
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args)?;

    let config = args.resolve_config()?;
    let tokens = config
        .accepted_tokens()
        .context("invalid token configuration")?;
    let authority = Arc::new(RegistrationAuthority::new(tokens));

    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("failed to bind {}", config.listen))?;

    info!(
        addr = %config.listen,
        accepted_tokens = authority.accepted_token_count(),
        "Registration authority listening"
    );

    axum::serve(listener, router(authority))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("registration server error")?;

    info!("Registration authority stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;

    use super::*;

    #[test]
    fn test_flags_without_config_file() {
        let args = Args::try_parse_from([
            "regauth-daemon",
            "--listen",
            "127.0.0.1:9999",
            "--token",
            "abc",
            "--token",
            "def",
        ])
        .unwrap();
        let config = args.resolve_config().unwrap();
        assert_eq!(config.listen, "127.0.0.1:9999".parse().unwrap());
        assert_eq!(config.accepted_tokens().unwrap().len(), 2);
    }

    #[test]
    fn test_flags_extend_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("regauth.toml");
        std::fs::write(
            &config_path,
            "listen = \"127.0.0.1:7000\"\ntokens = [\"from-config\"]\n",
        )
        .unwrap();
        let tokens_path = dir.path().join("tokens.json");
        std::fs::write(&tokens_path, r#"[{"token": "from-tokens-file"}]"#).unwrap();

        let argv: Vec<OsString> = vec![
            "regauth-daemon".into(),
            "--config".into(),
            config_path.into_os_string(),
            "--tokens-file".into(),
            tokens_path.into_os_string(),
            "--token".into(),
            "from-flag".into(),
        ];
        let args = Args::try_parse_from(argv).unwrap();
        let config = args.resolve_config().unwrap();

        assert_eq!(config.listen, "127.0.0.1:7000".parse().unwrap());
        let tokens = config.accepted_tokens().unwrap();
        for token in ["from-config", "from-tokens-file", "from-flag"] {
            assert!(tokens.contains(token), "missing {token}");
        }
    }

    #[test]
    fn test_no_tokens_is_rejected() {
        let args = Args::try_parse_from(["regauth-daemon"]).unwrap();
        let config = args.resolve_config().unwrap();
        assert!(config.accepted_tokens().is_err());
    }
}
