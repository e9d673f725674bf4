//! Dashboard definitions and their `eai:data` rendering.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Meta block Splunk writes for Studio dashboards saved from the UI.
const HIDDEN_ELEMENTS: &str =
    r#"{"hideEdit": false, "hideOpenInSearch": false, "hideExport": false}"#;

/// Errors produced while rendering a definition.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("dashboard definition is empty")]
    Empty,

    #[error("studio definition must be a JSON object")]
    NotAnObject,

    #[error("failed to serialize studio definition: {0}")]
    Json(#[from] serde_json::Error),
}

/// Studio colour theme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

/// A dashboard as stored in the views collection.
#[derive(Debug, Clone, PartialEq)]
pub enum DashboardDefinition {
    /// Classic Simple XML, sent verbatim.
    SimpleXml { xml: String },

    /// Dashboard Studio JSON wrapped in a version 2 envelope.
    ///
    /// `title` and `description` fall back to the fields of the same name in
    /// `definition`.
    Studio {
        title: Option<String>,
        description: Option<String>,
        theme: Theme,
        definition: serde_json::Value,
    },
}

impl DashboardDefinition {
    pub fn simple_xml(xml: impl Into<String>) -> Self {
        DashboardDefinition::SimpleXml { xml: xml.into() }
    }

    pub fn studio(definition: serde_json::Value, theme: Theme) -> Self {
        DashboardDefinition::Studio {
            title: None,
            description: None,
            theme,
            definition,
        }
    }

    /// Render the `eai:data` payload.
    pub fn render(&self) -> Result<String, DefinitionError> {
        match self {
            DashboardDefinition::SimpleXml { xml } => {
                if xml.trim().is_empty() {
                    return Err(DefinitionError::Empty);
                }
                Ok(xml.clone())
            }
            DashboardDefinition::Studio {
                title,
                description,
                theme,
                definition,
            } => {
                let object = definition.as_object().ok_or(DefinitionError::NotAnObject)?;
                let field = |key: &str| {
                    object
                        .get(key)
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string()
                };
                let title = title.clone().unwrap_or_else(|| field("title"));
                let description = description.clone().unwrap_or_else(|| field("description"));
                let json = serde_json::to_string(definition)?;

                Ok(format!(
                    concat!(
                        r#"<dashboard version="2" theme="{theme}">"#,
                        "<label>{label}</label>",
                        "<description>{description}</description>",
                        "<definition><![CDATA[{json}]]></definition>",
                        r#"<meta type="hiddenElements"><![CDATA[{hidden}]]></meta>"#,
                        "</dashboard>"
                    ),
                    theme = theme.as_str(),
                    label = escape_xml(&title),
                    description = escape_xml(&description),
                    json = escape_cdata(&json),
                    hidden = HIDDEN_ELEMENTS,
                ))
            }
        }
    }
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Split any `]]>` so the payload cannot terminate the CDATA section early.
fn escape_cdata(text: &str) -> String {
    text.replace("]]>", "]]]]><![CDATA[>")
}
