//! DCCU Command-Line Console
//!
//! Lists and edits the clearance-filtered backend tables, watches them for
//! live changes, and manages the local ops board, vault and site settings.

mod commands;
mod config;
mod formatter;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use dccu_core::{FeatureKey, OpsPriority, OpsStatus};
use dccu_proto::{ClearanceLevel, TableName};

use config::CliConfig;
use formatter::OutputFormat;

/// DCCU Command-Line Console
#[derive(Parser, Debug)]
#[command(name = "dccu")]
#[command(version, about = "DCCU Command-Line Console")]
pub struct Args {
    /// Backend project URL
    #[arg(long, env = "SUPABASE_URL", global = true)]
    pub url: Option<String>,

    /// Backend anon key
    #[arg(long, env = "SUPABASE_ANON_KEY", hide_env_values = true, global = true)]
    pub anon_key: Option<String>,

    /// Display identifier for audit entries
    #[arg(long, env = "DCCU_CODENAME", global = true)]
    pub codename: Option<String>,

    /// Clearance level (ALPHA, BETA, GAMMA or DELTA)
    #[arg(long, env = "DCCU_LEVEL", global = true)]
    pub level: Option<ClearanceLevel>,

    /// Signed session token; overrides --codename and --level
    #[arg(long, env = "DCCU_TOKEN", hide_env_values = true, global = true)]
    pub token: Option<String>,

    /// Output format
    #[arg(long, default_value = "table", value_enum, global = true)]
    pub format: OutputFormat,

    /// Directory for the local consoles
    #[arg(long, env = "DCCU_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 30, global = true)]
    pub timeout: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the rows of a table visible at the current clearance
    List {
        table: TableName,
    },

    /// Insert a row (ALPHA only)
    Insert {
        table: TableName,
        /// Row fields as a JSON object
        #[arg(long)]
        json: String,
    },

    /// Update a row by id (ALPHA only)
    Update {
        table: TableName,
        id: String,
        /// Changed fields as a JSON object
        #[arg(long)]
        json: String,
    },

    /// Delete a row by id (ALPHA only)
    Delete {
        table: TableName,
        id: String,
    },

    /// Print a table and reprint it on every change until interrupted
    Watch {
        table: TableName,
    },

    /// Ops task board
    #[command(subcommand)]
    Ops(OpsCommand),

    /// Vault of links and files
    #[command(subcommand)]
    Vault(VaultCommand),

    /// Site settings and audit log
    #[command(subcommand)]
    Site(SiteCommand),

    /// Issue a signed session token for the current codename and level
    Token {
        /// Token lifetime in seconds
        #[arg(long, default_value_t = 3600)]
        ttl: u64,
        /// Subject claim; defaults to the codename
        #[arg(long)]
        subject: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum OpsCommand {
    /// List tasks
    List {
        #[arg(long)]
        status: Option<OpsStatus>,
    },
    /// Add a task
    Add {
        title: String,
        #[arg(long)]
        detail: Option<String>,
        #[arg(long)]
        status: Option<OpsStatus>,
        #[arg(long)]
        priority: Option<OpsPriority>,
    },
    /// Edit a task
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        detail: Option<String>,
        #[arg(long)]
        priority: Option<OpsPriority>,
    },
    /// Move a task to another column
    Move { id: String, status: OpsStatus },
    /// Remove a task
    Remove { id: String },
}

#[derive(Subcommand, Debug)]
pub enum VaultCommand {
    /// List items
    List {
        #[arg(long)]
        tag: Option<String>,
    },
    /// Add a link
    Add {
        title: String,
        url: String,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// Add a file
    AddFile {
        title: String,
        path: PathBuf,
        #[arg(long, default_value = "application/octet-stream")]
        mime: String,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// Edit an item's title or tags
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        /// Replaces all tags when given
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// Remove an item
    Remove { id: String },
}

#[derive(Subcommand, Debug)]
pub enum SiteCommand {
    /// Show the settings
    Show,
    /// Flip a feature flag, or set it with --set
    Toggle {
        feature: FeatureKey,
        #[arg(long)]
        set: Option<bool>,
    },
    /// Set the announcement banner; an empty text clears it
    Announce { text: String },
    /// Switch maintenance mode
    Maintenance {
        #[arg(value_parser = parse_switch, action = clap::ArgAction::Set)]
        state: bool,
    },
    /// Show the audit log, newest first
    Audit {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Clear the audit log
    ClearAudit,
}

fn parse_switch(s: &str) -> Result<bool, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        other => Err(format!("expected 'on' or 'off', got '{}'", other)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("dccu_cli=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let formatter = formatter::create_formatter(args.format);

    let result = match CliConfig::from_args(&args) {
        Ok(config) => commands::run(&config, args.command, &*formatter).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", formatter.format_error(&format!("{:#}", e)));
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_switch() {
        assert_eq!(parse_switch("on"), Ok(true));
        assert_eq!(parse_switch("OFF"), Ok(false));
        assert!(parse_switch("maybe").is_err());
    }

    #[test]
    fn test_parse_commands() {
        let args = Args::parse_from([
            "dccu", "--level", "ALPHA", "--format", "json", "insert", "movies", "--json", "{}",
        ]);
        assert_eq!(args.level, Some(ClearanceLevel::Alpha));
        assert_eq!(args.format, OutputFormat::Json);
        assert!(matches!(
            args.command,
            Command::Insert { table: TableName::Movies, .. }
        ));

        let args = Args::parse_from(["dccu", "ops", "move", "t1", "done"]);
        assert!(matches!(
            args.command,
            Command::Ops(OpsCommand::Move { status: OpsStatus::Done, .. })
        ));

        let args = Args::parse_from(["dccu", "site", "toggle", "vault", "--set", "false"]);
        assert!(matches!(
            args.command,
            Command::Site(SiteCommand::Toggle { feature: FeatureKey::Vault, set: Some(false) })
        ));
    }

    #[test]
    fn test_unknown_table_rejected() {
        assert!(Args::try_parse_from(["dccu", "list", "suits"]).is_err());
    }
}
