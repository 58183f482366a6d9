//! CLI configuration.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};

use dccu_client::{ClientConfig, SupabaseBackend};
use dccu_core::SessionTokens;
use dccu_proto::Session;

use crate::Args;

/// Environment variable holding the session token secret.
pub const JWT_SECRET_VAR: &str = "DCCU_JWT_SECRET";

/// Codename used when a level is given without one.
pub const DEFAULT_CODENAME: &str = "AGENT";

/// Resolved CLI configuration.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Hosted backend settings, when present.
    pub client: Option<ClientConfig>,
    /// Session the commands run under.
    pub session: Option<Session>,
    /// Directory for the local consoles.
    pub data_dir: PathBuf,
}

impl CliConfig {
    /// Build configuration from command-line arguments.
    pub fn from_args(args: &Args) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(args.timeout);
        let client = match (&args.url, &args.anon_key) {
            (Some(url), Some(key)) => Some(ClientConfig::new(url, key)),
            _ => ClientConfig::from_env().ok(),
        }
        .map(|c| c.with_timeout(timeout));

        let session = resolve_session(args)?;

        let data_dir = match &args.data_dir {
            Some(dir) => dir.clone(),
            None => dirs::data_local_dir()
                .context("no local data directory; pass --data-dir")?
                .join("dccu"),
        };

        Ok(Self {
            client,
            session,
            data_dir,
        })
    }

    /// Path of the local console store.
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("local")
    }

    /// Connect a backend for the hosted tables.
    pub fn backend(&self) -> anyhow::Result<Arc<SupabaseBackend>> {
        let Some(config) = &self.client else {
            bail!("missing Supabase environment variables");
        };
        Ok(Arc::new(SupabaseBackend::new(config.clone())?))
    }
}

fn resolve_session(args: &Args) -> anyhow::Result<Option<Session>> {
    if let Some(token) = &args.token {
        let tokens = SessionTokens::from_env(JWT_SECRET_VAR)
            .with_context(|| format!("{} must be set to verify --token", JWT_SECRET_VAR))?;
        let session = tokens.verify(token).context("invalid session token")?;
        return Ok(Some(session));
    }

    Ok(args.level.map(|level| {
        let codename = args
            .codename
            .clone()
            .unwrap_or_else(|| DEFAULT_CODENAME.to_string());
        Session::new(codename, level)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use dccu_proto::ClearanceLevel;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["dccu", "--data-dir", "/tmp/dccu-test"];
        argv.extend_from_slice(extra);
        argv.extend_from_slice(&["site", "show"]);
        Args::parse_from(argv)
    }

    #[test]
    fn test_explicit_backend_args() {
        let args = parse(&[
            "--url",
            "https://project.supabase.co/",
            "--anon-key",
            "anon",
            "--timeout",
            "5",
        ]);
        let config = CliConfig::from_args(&args).unwrap();
        let client = config.client.as_ref().unwrap();
        assert_eq!(client.url, "https://project.supabase.co");
        assert_eq!(client.timeout, Duration::from_secs(5));
        assert_eq!(config.data_dir, PathBuf::from("/tmp/dccu-test"));
        assert_eq!(config.store_path(), PathBuf::from("/tmp/dccu-test/local"));
    }

    #[test]
    fn test_level_without_codename() {
        let args = parse(&["--level", "beta"]);
        let config = CliConfig::from_args(&args).unwrap();
        let session = config.session.unwrap();
        assert_eq!(session.codename, DEFAULT_CODENAME);
        assert_eq!(session.level, ClearanceLevel::Beta);
    }

    #[test]
    fn test_no_level_no_session() {
        let args = parse(&["--codename", "ORACLE"]);
        let config = CliConfig::from_args(&args).unwrap();
        assert!(config.session.is_none());
    }

    #[test]
    fn test_backend_requires_config() {
        let config = CliConfig {
            client: None,
            session: None,
            data_dir: PathBuf::from("/tmp"),
        };
        let err = config.backend().unwrap_err();
        assert_eq!(err.to_string(), "missing Supabase environment variables");
    }
}
