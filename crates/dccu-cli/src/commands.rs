//! Command handlers.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{Map, Value};

use dccu_client::{Backend, TableView};
use dccu_core::{
    NewOpsTask, NewVaultItem, OpsBoard, OpsTask, SessionTokens, SiteConsole, SledStore, Vault,
    VaultItem,
};
use dccu_proto::{Row, Session, TableName};

use crate::config::{CliConfig, JWT_SECRET_VAR};
use crate::formatter::{
    audit_listing, rows_listing, settings_listing, tasks_listing, vault_listing, Formatter,
};
use crate::{Command, OpsCommand, SiteCommand, VaultCommand};

/// Run a command and return its output.
pub async fn run(
    config: &CliConfig,
    command: Command,
    formatter: &dyn Formatter,
) -> anyhow::Result<String> {
    let session = config.session.clone();

    match command {
        Command::List { table } => list_rows(config.backend()?, table, session, formatter).await,
        Command::Insert { table, json } => {
            let fields = parse_object(&json)?;
            insert_row(config.backend()?, table, session, fields, formatter).await
        }
        Command::Update { table, id, json } => {
            let fields = parse_object(&json)?;
            update_row(config.backend()?, table, session, &id, fields, formatter).await
        }
        Command::Delete { table, id } => {
            delete_row(config.backend()?, table, session, &id, formatter).await
        }
        Command::Watch { table } => watch_rows(config.backend()?, table, session, formatter).await,
        Command::Ops(cmd) => {
            let local = LocalConsoles::open(&config.store_path(), session)?;
            let output = ops_command(&local, cmd, formatter)?;
            local.flush()?;
            Ok(output)
        }
        Command::Vault(cmd) => {
            let local = LocalConsoles::open(&config.store_path(), session)?;
            let output = vault_command(&local, cmd, formatter)?;
            local.flush()?;
            Ok(output)
        }
        Command::Site(cmd) => {
            let local = LocalConsoles::open(&config.store_path(), session)?;
            let output = site_command(&local, cmd, formatter)?;
            local.flush()?;
            Ok(output)
        }
        Command::Token { ttl, subject } => {
            let tokens = SessionTokens::from_env(JWT_SECRET_VAR)
                .with_context(|| format!("{} must be set to issue tokens", JWT_SECRET_VAR))?;
            issue_token(&tokens, session.as_ref(), ttl, subject)
        }
    }
}

async fn list_rows<B: Backend>(
    backend: Arc<B>,
    table: TableName,
    session: Option<Session>,
    formatter: &dyn Formatter,
) -> anyhow::Result<String> {
    let view = TableView::for_table(backend, table, session);
    view.fetch().await?;
    Ok(formatter.format_listing(&rows_listing(&view.rows())))
}

async fn insert_row<B: Backend>(
    backend: Arc<B>,
    table: TableName,
    session: Option<Session>,
    fields: Map<String, Value>,
    formatter: &dyn Formatter,
) -> anyhow::Result<String> {
    let view = TableView::for_table(backend, table, session);
    let row = view.insert(&fields).await?;
    Ok(formatter.format_listing(&rows_listing(&[row])))
}

async fn update_row<B: Backend>(
    backend: Arc<B>,
    table: TableName,
    session: Option<Session>,
    id: &str,
    fields: Map<String, Value>,
    formatter: &dyn Formatter,
) -> anyhow::Result<String> {
    let view = TableView::for_table(backend, table, session);
    let row = view.update(id, &fields).await?;
    Ok(formatter.format_listing(&rows_listing(&[row])))
}

async fn delete_row<B: Backend>(
    backend: Arc<B>,
    table: TableName,
    session: Option<Session>,
    id: &str,
    formatter: &dyn Formatter,
) -> anyhow::Result<String> {
    let view = TableView::for_table(backend, table, session);
    view.remove(id).await?;
    Ok(formatter.format_message(&format!("Deleted {} from {}", id, table)))
}

/// Print the table on every settled change until Ctrl-C.
async fn watch_rows<B: Backend>(
    backend: Arc<B>,
    table: TableName,
    session: Option<Session>,
    formatter: &dyn Formatter,
) -> anyhow::Result<String> {
    let view = TableView::for_table(backend, table, session);
    let mut state = view.subscribe_state();
    view.mount().await?;

    if let Some(err) = view.snapshot().subscription_error {
        tracing::warn!(table = %table, error = %err, "live updates unavailable");
    }
    tracing::info!(table = %table, "watching for changes, press Ctrl-C to stop");

    let mut shown_rows: Option<Vec<Row>> = None;
    let mut shown_error: Option<String> = None;
    loop {
        let snapshot = state.borrow_and_update().clone();
        if !snapshot.loading {
            if snapshot.error.is_some() && snapshot.error != shown_error {
                if let Some(err) = &snapshot.error {
                    eprintln!("{}", formatter.format_error(err));
                }
                shown_error = snapshot.error.clone();
            } else if shown_rows.as_ref() != Some(&snapshot.rows) {
                println!("{}", formatter.format_listing(&rows_listing(&snapshot.rows)));
                shown_rows = Some(snapshot.rows);
                shown_error = None;
            }
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    view.unmount();
    Ok(String::new())
}

/// Local consoles sharing one sled store, audited by the site console.
pub struct LocalConsoles {
    store: Arc<SledStore>,
    site: Arc<SiteConsole>,
    ops: OpsBoard,
    vault: Vault,
}

impl LocalConsoles {
    /// Open the consoles at `path` and attribute audit entries to `session`.
    pub fn open(path: &Path, session: Option<Session>) -> anyhow::Result<Self> {
        let store = Arc::new(
            SledStore::open_path(path)
                .with_context(|| format!("failed to open local store at {}", path.display()))?,
        );
        let site = Arc::new(SiteConsole::open(store.clone()));
        site.set_session(session);
        let ops = OpsBoard::open(store.clone(), site.clone());
        let vault = Vault::open(store.clone(), site.clone());

        Ok(Self {
            store,
            site,
            ops,
            vault,
        })
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> anyhow::Result<()> {
        self.store.flush()?;
        Ok(())
    }
}

fn ops_command(
    local: &LocalConsoles,
    command: OpsCommand,
    formatter: &dyn Formatter,
) -> anyhow::Result<String> {
    let board = &local.ops;

    match command {
        OpsCommand::List { status } => {
            let tasks = match status {
                Some(status) => board.tasks_with_status(status),
                None => board.tasks(),
            };
            Ok(formatter.format_listing(&tasks_listing(&tasks)))
        }
        OpsCommand::Add {
            title,
            detail,
            status,
            priority,
        } => {
            let mut draft = NewOpsTask::new(title);
            if let Some(detail) = detail {
                draft = draft.with_detail(detail);
            }
            if let Some(status) = status {
                draft = draft.with_status(status);
            }
            if let Some(priority) = priority {
                draft = draft.with_priority(priority);
            }
            let task = board.add(draft)?;
            Ok(formatter.format_listing(&tasks_listing(&[task])))
        }
        OpsCommand::Update {
            id,
            title,
            detail,
            priority,
        } => {
            let mut task = find_task(board, &id)?;
            if let Some(title) = title {
                task.title = title;
            }
            if let Some(detail) = detail {
                task.detail = Some(detail).filter(|d| !d.is_empty());
            }
            if let Some(priority) = priority {
                task.priority = priority;
            }
            board.update(task)?;
            Ok(formatter.format_listing(&tasks_listing(&[find_task(board, &id)?])))
        }
        OpsCommand::Move { id, status } => {
            find_task(board, &id)?;
            board.move_task(&id, status)?;
            Ok(formatter.format_message(&format!("Moved {} to {}", id, status)))
        }
        OpsCommand::Remove { id } => {
            find_task(board, &id)?;
            board.remove(&id)?;
            Ok(formatter.format_message(&format!("Removed task {}", id)))
        }
    }
}

fn find_task(board: &OpsBoard, id: &str) -> anyhow::Result<OpsTask> {
    board
        .tasks()
        .into_iter()
        .find(|t| t.id == id)
        .ok_or_else(|| anyhow!("task not found: {}", id))
}

fn vault_command(
    local: &LocalConsoles,
    command: VaultCommand,
    formatter: &dyn Formatter,
) -> anyhow::Result<String> {
    let vault = &local.vault;

    match command {
        VaultCommand::List { tag } => {
            let items = match tag {
                Some(tag) => vault.find_by_tag(&tag),
                None => vault.items(),
            };
            Ok(formatter.format_listing(&vault_listing(&items)))
        }
        VaultCommand::Add { title, url, tags } => {
            let item = vault.add(NewVaultItem::link(title, url).with_tags(tags))?;
            Ok(formatter.format_listing(&vault_listing(&[item])))
        }
        VaultCommand::AddFile {
            title,
            path,
            mime,
            tags,
        } => {
            let bytes = std::fs::read(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let draft = NewVaultItem::file(title, BASE64.encode(&bytes), mime).with_tags(tags);
            let item = vault.add(draft)?;
            Ok(formatter.format_listing(&vault_listing(&[item])))
        }
        VaultCommand::Update { id, title, tags } => {
            let mut item = find_item(vault, &id)?;
            if let Some(title) = title {
                item.title = title;
            }
            if !tags.is_empty() {
                item.tags = tags;
            }
            vault.update(item.clone())?;
            Ok(formatter.format_listing(&vault_listing(&[item])))
        }
        VaultCommand::Remove { id } => {
            find_item(vault, &id)?;
            vault.remove(&id)?;
            Ok(formatter.format_message(&format!("Removed item {}", id)))
        }
    }
}

fn find_item(vault: &Vault, id: &str) -> anyhow::Result<VaultItem> {
    vault
        .items()
        .into_iter()
        .find(|i| i.id == id)
        .ok_or_else(|| anyhow!("vault item not found: {}", id))
}

fn site_command(
    local: &LocalConsoles,
    command: SiteCommand,
    formatter: &dyn Formatter,
) -> anyhow::Result<String> {
    let site = &local.site;

    match command {
        SiteCommand::Show => Ok(formatter.format_listing(&settings_listing(&site.settings()))),
        SiteCommand::Toggle { feature, set } => {
            let enabled = site.toggle_feature(feature, set)?;
            let state = if enabled { "on" } else { "off" };
            Ok(formatter.format_message(&format!("Feature {} is now {}", feature, state)))
        }
        SiteCommand::Announce { text } => {
            site.set_announcement(&text)?;
            if text.is_empty() {
                Ok(formatter.format_message("Announcement cleared"))
            } else {
                Ok(formatter.format_message("Announcement set"))
            }
        }
        SiteCommand::Maintenance { state } => {
            site.set_maintenance(state)?;
            let label = if state { "on" } else { "off" };
            Ok(formatter.format_message(&format!("Maintenance mode {}", label)))
        }
        SiteCommand::Audit { limit } => {
            let entries = site.audit();
            let start = limit.map_or(0, |n| entries.len().saturating_sub(n));
            Ok(formatter.format_listing(&audit_listing(&entries[start..])))
        }
        SiteCommand::ClearAudit => {
            site.clear_audit()?;
            Ok(formatter.format_message("Audit log cleared"))
        }
    }
}

fn issue_token(
    tokens: &SessionTokens,
    session: Option<&Session>,
    ttl_secs: u64,
    subject: Option<String>,
) -> anyhow::Result<String> {
    let Some(session) = session else {
        bail!("a session is required to issue a token; pass --level");
    };
    let subject = subject.unwrap_or_else(|| session.codename.clone());
    let token = tokens.issue(&subject, session, Duration::from_secs(ttl_secs))?;
    Ok(token)
}

fn parse_object(json: &str) -> anyhow::Result<Map<String, Value>> {
    match serde_json::from_str(json).context("invalid JSON")? {
        Value::Object(map) => Ok(map),
        other => bail!("expected a JSON object, got {}", other),
    }
}
