//! Output formatters.

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use comfy_table::{Cell, ContentArrangement, Table};
use serde_json::Value;

use dccu_core::{AuditEntry, OpsTask, SiteSettings, VaultItem};
use dccu_proto::{Row, CLEARANCE_FIELD, CREATED_AT_FIELD, UPDATED_AT_FIELD};

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format
    Table,
    /// JSON format
    Json,
    /// CSV format
    Csv,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

/// Rows of output with their JSON form.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub json: Value,
}

/// Trait for formatting output.
pub trait Formatter: Send + Sync {
    /// Format a listing.
    fn format_listing(&self, listing: &Listing) -> String;

    /// Format a simple message.
    fn format_message(&self, message: &str) -> String;

    /// Format an error message.
    fn format_error(&self, error: &str) -> String;
}

/// Create a formatter for the given output format.
pub fn create_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Table => Box::new(TableFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
        OutputFormat::Csv => Box::new(CsvFormatter),
    }
}

/// Table formatter using comfy-table.
pub struct TableFormatter;

impl Formatter for TableFormatter {
    fn format_listing(&self, listing: &Listing) -> String {
        if listing.rows.is_empty() {
            return "No results".to_string();
        }

        let mut table = Table::new();
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(listing.headers.iter().map(Cell::new).collect::<Vec<_>>());
        for row in &listing.rows {
            table.add_row(row.iter().map(Cell::new).collect::<Vec<_>>());
        }

        format!("{}\n({} row(s))", table, listing.rows.len())
    }

    fn format_message(&self, message: &str) -> String {
        message.to_string()
    }

    fn format_error(&self, error: &str) -> String {
        format!("Error: {}", error)
    }
}

/// JSON formatter.
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format_listing(&self, listing: &Listing) -> String {
        serde_json::to_string_pretty(&listing.json).unwrap_or_else(|_| "[]".to_string())
    }

    fn format_message(&self, message: &str) -> String {
        serde_json::json!({ "message": message }).to_string()
    }

    fn format_error(&self, error: &str) -> String {
        serde_json::json!({ "error": error }).to_string()
    }
}

/// CSV formatter.
pub struct CsvFormatter;

impl Formatter for CsvFormatter {
    fn format_listing(&self, listing: &Listing) -> String {
        let mut output = listing
            .headers
            .iter()
            .map(|h| quote_csv(h))
            .collect::<Vec<_>>()
            .join(",");
        for row in &listing.rows {
            output.push('\n');
            output.push_str(&row.iter().map(|c| quote_csv(c)).collect::<Vec<_>>().join(","));
        }
        output
    }

    fn format_message(&self, message: &str) -> String {
        message.to_string()
    }

    fn format_error(&self, error: &str) -> String {
        format!("error\n{}", quote_csv(error))
    }
}

/// Listing of backend rows. `id` leads, then the fields in first-seen order,
/// with clearance and timestamps last.
pub fn rows_listing(rows: &[Row]) -> Listing {
    const TRAILING: [&str; 3] = [CLEARANCE_FIELD, CREATED_AT_FIELD, UPDATED_AT_FIELD];

    let mut headers: Vec<String> = vec!["id".to_string()];
    for row in rows {
        for field in row.fields() {
            if !headers.contains(field) && !TRAILING.contains(&field.as_str()) {
                headers.push(field.clone());
            }
        }
    }
    headers.extend(TRAILING.iter().map(|f| f.to_string()));

    let cells = rows
        .iter()
        .map(|row| {
            headers
                .iter()
                .map(|h| row.get(h).map(format_value).unwrap_or_default())
                .collect()
        })
        .collect();

    Listing {
        headers,
        rows: cells,
        json: Value::Array(rows.iter().map(|r| Value::Object(r.as_map().clone())).collect()),
    }
}

/// Listing of ops tasks.
pub fn tasks_listing(tasks: &[OpsTask]) -> Listing {
    Listing {
        headers: ["id", "title", "status", "priority", "detail", "updated"]
            .map(String::from)
            .to_vec(),
        rows: tasks
            .iter()
            .map(|t| {
                vec![
                    t.id.clone(),
                    t.title.clone(),
                    t.status.to_string(),
                    t.priority.to_string(),
                    t.detail.clone().unwrap_or_default(),
                    format_millis(t.updated_at),
                ]
            })
            .collect(),
        json: serde_json::to_value(tasks).unwrap_or(Value::Null),
    }
}

/// Listing of vault items. File contents are summarized by size.
pub fn vault_listing(items: &[VaultItem]) -> Listing {
    Listing {
        headers: ["id", "type", "title", "tags", "target", "added"]
            .map(String::from)
            .to_vec(),
        rows: items
            .iter()
            .map(|i| {
                let target = match (&i.url, &i.data) {
                    (Some(url), _) => url.clone(),
                    (None, Some(data)) => format!(
                        "{} ({} bytes base64)",
                        i.mime.as_deref().unwrap_or("application/octet-stream"),
                        data.len()
                    ),
                    (None, None) => String::new(),
                };
                vec![
                    i.id.clone(),
                    i.kind.to_string(),
                    i.title.clone(),
                    i.tags.join(", "),
                    target,
                    format_millis(i.added_at),
                ]
            })
            .collect(),
        json: serde_json::to_value(items).unwrap_or(Value::Null),
    }
}

/// Listing of audit entries, newest first.
pub fn audit_listing(entries: &[AuditEntry]) -> Listing {
    Listing {
        headers: ["time", "actor", "action", "details"].map(String::from).to_vec(),
        rows: entries
            .iter()
            .rev()
            .map(|e| {
                vec![
                    format_millis(e.ts),
                    e.actor.clone(),
                    e.action.clone(),
                    e.details.clone().unwrap_or_default(),
                ]
            })
            .collect(),
        json: serde_json::to_value(entries.iter().rev().collect::<Vec<_>>()).unwrap_or(Value::Null),
    }
}

/// Settings as key/value pairs.
pub fn settings_listing(settings: &SiteSettings) -> Listing {
    let mut rows = vec![
        vec!["maintenance".to_string(), on_off(settings.maintenance)],
        vec!["announcement".to_string(), settings.announcement.clone()],
    ];
    for key in dccu_core::FeatureKey::ALL {
        rows.push(vec![
            format!("features.{}", key),
            on_off(settings.features.get(key)),
        ]);
    }

    Listing {
        headers: vec!["setting".to_string(), "value".to_string()],
        rows,
        json: serde_json::to_value(settings).unwrap_or(Value::Null),
    }
}

fn on_off(value: bool) -> String {
    let text = if value { "on" } else { "off" };
    text.to_string()
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn format_millis(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ms.to_string())
}

/// Quote a CSV cell when needed.
fn quote_csv(s: &str) -> String {
    if s.contains([',', '"', '\n']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dccu_core::{OpsPriority, OpsStatus};
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => Row::from(map),
            _ => Row::new(),
        }
    }

    #[test]
    fn test_rows_listing_column_order() {
        let rows = vec![
            row(json!({"clearance_level": "BETA", "id": "1", "name": "Oracle", "created_at": "t0", "updated_at": "t1"})),
            row(json!({"id": "2", "alias": "O", "name": "Barbara", "clearance_level": "GAMMA"})),
        ];
        let listing = rows_listing(&rows);

        assert_eq!(
            listing.headers,
            vec!["id", "name", "alias", "clearance_level", "created_at", "updated_at"]
        );
        assert_eq!(listing.rows[0][2], "");
        assert_eq!(listing.rows[1][3], "GAMMA");
        assert_eq!(listing.json.as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_tasks_listing() {
        let task = OpsTask {
            id: "t1".to_string(),
            title: "Patrol".to_string(),
            detail: None,
            status: OpsStatus::Blocked,
            priority: OpsPriority::High,
            created_at: 0,
            updated_at: 0,
        };
        let listing = tasks_listing(&[task]);
        assert_eq!(listing.rows[0][2], "blocked");
        assert_eq!(listing.rows[0][3], "high");
        assert_eq!(listing.rows[0][5], "1970-01-01 00:00:00");
    }

    #[test]
    fn test_table_formatter_empty() {
        let listing = rows_listing(&[]);
        assert_eq!(TableFormatter.format_listing(&listing), "No results");
        assert_eq!(JsonFormatter.format_listing(&listing), "[]");
    }

    #[test]
    fn test_csv_quoting() {
        assert_eq!(quote_csv("plain"), "plain");
        assert_eq!(quote_csv("a,b"), "\"a,b\"");
        assert_eq!(quote_csv("say \"hi\""), "\"say \"\"hi\"\"\"");

        let listing = Listing {
            headers: vec!["k".to_string(), "v".to_string()],
            rows: vec![vec!["x".to_string(), "1,2".to_string()]],
            json: Value::Null,
        };
        assert_eq!(CsvFormatter.format_listing(&listing), "k,v\nx,\"1,2\"");
    }

    #[test]
    fn test_settings_listing() {
        let listing = settings_listing(&SiteSettings::default());
        assert_eq!(listing.rows.len(), 2 + dccu_core::FeatureKey::ALL.len());
        assert_eq!(listing.rows[0], vec!["maintenance", "off"]);
    }
}
