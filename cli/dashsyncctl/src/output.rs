//! Output formatting for CLI commands.

use colored::Colorize;
use dashsync_reconcile::{FinalState, PolicyStatus, ReconciliationOutcome, WritePath};
use serde::Serialize;
use tabled::{Table, Tabled};

const CLI_SCHEMA_VERSION: &str = "dashsync.cli.v1";

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON format.
    Json,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Self {
        match value {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Table,
        }
    }
}

/// One `field | value` line of a detail table.
#[derive(Debug, Clone, Tabled)]
pub struct DetailRow {
    #[tabled(rename = "FIELD")]
    pub field: String,
    #[tabled(rename = "VALUE")]
    pub value: String,
}

impl DetailRow {
    pub fn new(field: impl Into<String>, value: impl ToString) -> Self {
        Self {
            field: field.into(),
            value: value.to_string(),
        }
    }
}

/// Print a single item in the specified format.
///
/// Table mode prints `rows`; JSON mode prints `data` wrapped in the schema
/// envelope.
pub fn print_single<T: Serialize>(data: &T, rows: Vec<DetailRow>, format: OutputFormat) {
    match format {
        OutputFormat::Table => println!("{}", Table::new(rows)),
        OutputFormat::Json => println!("{}", format_json(data, "{}")),
    }
}

/// Print a success message.
pub fn print_success(message: &str) {
    println!("{} {}", "Success:".green().bold(), message);
}

/// Print an info message.
pub fn print_info(message: &str) {
    println!("{} {}", "Info:".blue().bold(), message);
}

/// Serializable view of a reconciliation outcome.
#[derive(Debug, Serialize)]
pub struct OutcomeView {
    pub name: String,
    pub final_state: FinalState,
    pub attempts_used: u32,
    pub probes: u32,
    pub path: Option<WritePath>,
    pub policy: &'static str,
    pub policy_error: Option<String>,
    pub reason: Option<&'static str>,
    pub last_error: Option<String>,
    pub definition_digest: String,
}

impl OutcomeView {
    pub fn new(name: &str, outcome: &ReconciliationOutcome) -> Self {
        let policy_error = match &outcome.policy {
            PolicyStatus::Failed(e) => Some(e.to_string()),
            _ => None,
        };
        Self {
            name: name.to_string(),
            final_state: outcome.final_state,
            attempts_used: outcome.attempts_used,
            probes: outcome.probes,
            path: outcome.path,
            policy: outcome.policy.as_str(),
            policy_error,
            reason: outcome.reason(),
            last_error: outcome.last_error.as_ref().map(ToString::to_string),
            definition_digest: outcome.definition_digest.to_string(),
        }
    }

    pub fn rows(&self) -> Vec<DetailRow> {
        let mut rows = vec![
            DetailRow::new("Dashboard", &self.name),
            DetailRow::new("State", self.final_state),
            DetailRow::new(
                "Path",
                match self.path {
                    Some(WritePath::Created) => "created",
                    Some(WritePath::Updated) => "updated",
                    None => "-",
                },
            ),
            DetailRow::new("Write attempts", self.attempts_used),
            DetailRow::new("Probes", self.probes),
            DetailRow::new("Policy", self.policy),
            DetailRow::new("Digest", &self.definition_digest),
        ];
        if let Some(e) = &self.policy_error {
            rows.push(DetailRow::new("Policy error", e));
        }
        if let Some(e) = &self.last_error {
            rows.push(DetailRow::new("Last error", e));
        }
        rows
    }
}

/// Print a reconciliation outcome.
pub fn print_outcome(view: &OutcomeView, format: OutputFormat) {
    if format == OutputFormat::Table {
        let headline = match (view.final_state, view.policy) {
            (FinalState::Converged, "applied") => {
                format!("Dashboard '{}' is up to date.", view.name).green()
            }
            (FinalState::Failed, _) => format!(
                "Dashboard '{}' failed: {}.",
                view.name,
                view.reason.unwrap_or("unknown")
            )
            .red(),
            (FinalState::CreatedButUnconfirmed, _) => format!(
                "Dashboard '{}' was created but is not visible yet.",
                view.name
            )
            .yellow(),
            _ => format!("Dashboard '{}' was written but its ACL was not applied.", view.name)
                .yellow(),
        };
        println!("{}", headline.bold());
    }
    print_single(view, view.rows(), format);
}

fn format_json<T: Serialize + ?Sized>(data: &T, fallback: &str) -> String {
    let value = serde_json::to_value(data).unwrap_or_else(|_| serde_json::json!({}));
    let mapped = to_camel_case_keys(value);
    let wrapped = wrap_with_schema(mapped);
    let sorted = sort_json_value(wrapped);
    serde_json::to_string_pretty(&sorted).unwrap_or_else(|_| fallback.to_string())
}

fn wrap_with_schema(value: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "schemaVersion": CLI_SCHEMA_VERSION,
        "data": value
    })
}

fn sort_json_value(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Array(values) => {
            serde_json::Value::Array(values.into_iter().map(sort_json_value).collect())
        }
        serde_json::Value::Object(entries) => {
            let mut pairs: Vec<_> = entries.into_iter().collect();
            pairs.sort_by(|a, b| a.0.cmp(&b.0));
            let mut mapped = serde_json::Map::new();
            for (key, value) in pairs {
                mapped.insert(key, sort_json_value(value));
            }
            serde_json::Value::Object(mapped)
        }
        other => other,
    }
}

fn to_camel_case_keys(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Array(values) => {
            serde_json::Value::Array(values.into_iter().map(to_camel_case_keys).collect())
        }
        serde_json::Value::Object(entries) => serde_json::Value::Object(
            entries
                .into_iter()
                .map(|(key, value)| (snake_to_lower_camel(&key), to_camel_case_keys(value)))
                .collect(),
        ),
        other => other,
    }
}

fn snake_to_lower_camel(input: &str) -> String {
    let mut parts = input.split('_');
    let Some(first) = parts.next() else {
        return String::new();
    };
    let mut out = String::from(first);
    for part in parts {
        if part.is_empty() {
            continue;
        }
        let mut chars = part.chars();
        if let Some(first_char) = chars.next() {
            out.push(first_char.to_ascii_uppercase());
            out.extend(chars);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use dashsync_reconcile::{DefinitionDigest, ReconcileError, RemoteError};

    use super::*;

    fn unconfirmed() -> ReconciliationOutcome {
        ReconciliationOutcome {
            final_state: FinalState::CreatedButUnconfirmed,
            attempts_used: 2,
            last_error: Some(ReconcileError::VisibilityUnconfirmed { polls: 5 }),
            path: Some(WritePath::Created),
            probes: 6,
            policy: PolicyStatus::Failed(RemoteError::permanent(Some(403), "forbidden")),
            definition_digest: DefinitionDigest::of("<form/>"),
        }
    }

    #[test]
    fn test_outcome_json_is_wrapped_and_camel_cased() {
        let view = OutcomeView::new("ops", &unconfirmed());
        let json: serde_json::Value = serde_json::from_str(&format_json(&view, "{}")).unwrap();

        assert_eq!(json["schemaVersion"], CLI_SCHEMA_VERSION);
        let data = &json["data"];
        assert_eq!(data["finalState"], "created_but_unconfirmed");
        assert_eq!(data["attemptsUsed"], 2);
        assert_eq!(data["path"], "created");
        assert_eq!(data["policy"], "failed");
        assert_eq!(data["reason"], "visibility unconfirmed");
        assert!(data["policyError"].as_str().unwrap().contains("forbidden"));
        assert!(data["definitionDigest"].as_str().unwrap().starts_with("sha256:"));
    }

    #[test]
    fn test_outcome_rows_include_errors_only_when_present() {
        let rows = OutcomeView::new("ops", &unconfirmed()).rows();
        assert!(rows.iter().any(|r| r.field == "Policy error"));
        assert!(rows.iter().any(|r| r.field == "Last error"));

        let clean = ReconciliationOutcome {
            final_state: FinalState::Converged,
            last_error: None,
            policy: PolicyStatus::Applied,
            ..unconfirmed()
        };
        let rows = OutcomeView::new("ops", &clean).rows();
        assert!(!rows.iter().any(|r| r.field.ends_with("error")));
    }

    #[test]
    fn test_snake_to_lower_camel() {
        assert_eq!(snake_to_lower_camel("definition_digest"), "definitionDigest");
        assert_eq!(snake_to_lower_camel("name"), "name");
        assert_eq!(snake_to_lower_camel("a__b"), "aB");
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!(OutputFormat::parse("json"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("table"), OutputFormat::Table);
        assert_eq!(OutputFormat::parse("yaml"), OutputFormat::Table);
    }
}
