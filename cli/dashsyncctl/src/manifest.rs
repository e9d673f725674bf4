//! Dashboard manifest loading.
//!
//! A manifest names one dashboard, where its definition comes from, and the
//! ACL to apply:
//!
//! ```toml
//! name = "automated_dashboard_studio"
//!
//! [definition]
//! kind = "studio"          # or "simple_xml"
//! path = "dashboard.json"  # relative to the manifest
//! theme = "dark"
//!
//! [acl]
//! owner = "splunk"
//! read = ["user", "splunk"]
//! write = ["splunk"]
//! sharing = "app"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dashsync_reconcile::{AccessPolicy, ResourceDescriptor};
use dashsync_splunk::{DashboardDefinition, Theme};
use serde::Deserialize;

use crate::error::CliError;

/// Manifest file as written on disk.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    pub name: String,
    pub definition: DefinitionSource,
    pub acl: AccessPolicy,
}

/// Where the dashboard definition comes from.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DefinitionSource {
    /// Inline `xml` or an XML file at `path`, exactly one of them.
    SimpleXml {
        #[serde(default)]
        xml: Option<String>,
        #[serde(default)]
        path: Option<PathBuf>,
    },
    /// A Dashboard Studio JSON file.
    Studio {
        path: PathBuf,
        #[serde(default)]
        theme: Theme,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        description: Option<String>,
    },
}

impl DefinitionSource {
    pub fn kind(&self) -> &'static str {
        match self {
            DefinitionSource::SimpleXml { .. } => "simple_xml",
            DefinitionSource::Studio { .. } => "studio",
        }
    }
}

/// A manifest resolved into a descriptor.
#[derive(Debug, Clone)]
pub struct LoadedManifest {
    pub path: PathBuf,
    pub kind: &'static str,
    pub descriptor: ResourceDescriptor,
}

/// Read and resolve the manifest at `path`.
pub fn load_manifest(path: &Path) -> Result<LoadedManifest> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest: {}", path.display()))?;
    let manifest: Manifest = toml::from_str(&contents)
        .with_context(|| format!("invalid manifest TOML: {}", path.display()))?;

    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let descriptor = resolve(manifest.clone(), base_dir)
        .with_context(|| format!("failed to resolve manifest: {}", path.display()))?;

    Ok(LoadedManifest {
        path: path.to_path_buf(),
        kind: manifest.definition.kind(),
        descriptor,
    })
}

/// Build the descriptor, reading definition files relative to `base_dir`.
pub fn resolve(manifest: Manifest, base_dir: &Path) -> Result<ResourceDescriptor> {
    validate_name(&manifest.name)?;
    if manifest.acl.owner.trim().is_empty() {
        return Err(CliError::InvalidManifest("acl.owner must not be empty".to_string()).into());
    }

    let definition = match manifest.definition {
        DefinitionSource::SimpleXml {
            xml: Some(xml),
            path: None,
        } => DashboardDefinition::simple_xml(xml),
        DefinitionSource::SimpleXml {
            xml: None,
            path: Some(file),
        } => DashboardDefinition::simple_xml(read_relative(base_dir, &file)?),
        DefinitionSource::SimpleXml { .. } => {
            return Err(CliError::InvalidManifest(
                "simple_xml definition needs exactly one of `xml` or `path`".to_string(),
            )
            .into());
        }
        DefinitionSource::Studio {
            path: file,
            theme,
            title,
            description,
        } => {
            let raw = read_relative(base_dir, &file)?;
            let definition: serde_json::Value = serde_json::from_str(&raw)
                .with_context(|| format!("invalid studio JSON: {}", file.display()))?;
            DashboardDefinition::Studio {
                title,
                description,
                theme,
                definition,
            }
        }
    };

    let rendered = definition.render().context("failed to render dashboard definition")?;
    Ok(ResourceDescriptor::new(manifest.name, rendered, manifest.acl))
}

fn read_relative(base_dir: &Path, file: &Path) -> Result<String> {
    let full = if file.is_absolute() {
        file.to_path_buf()
    } else {
        base_dir.join(file)
    };
    std::fs::read_to_string(&full)
        .with_context(|| format!("failed to read definition: {}", full.display()))
}

/// View names end up as a URL path segment and a file name on the server.
fn validate_name(name: &str) -> Result<(), CliError> {
    if name.is_empty() {
        return Err(CliError::InvalidManifest("name must not be empty".to_string()));
    }
    if name.starts_with('.') {
        return Err(CliError::InvalidManifest(format!(
            "name '{name}' must not start with '.'"
        )));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
    {
        return Err(CliError::InvalidManifest(format!(
            "name '{name}' contains invalid character '{c}'"
        )));
    }
    Ok(())
}
