//! Metadata records of generated reports
//!
//! Every render appends a record to a JSON file shaped as
//! `{"reports": [...]}`, so a report can be generated again later from the
//! same answers with `formdoc render --from-record <id>`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Author recorded when none is given
pub const DEFAULT_GENERATED_BY: &str = "sistema";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// One generated report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// `meta_{YYYYmmdd_HHMMSS}_{6 uppercase alphanumerics}`
    pub id: String,
    /// Id of the report type (the manifest id)
    pub report_id: String,
    pub report_name: String,
    /// Local time, ISO-8601
    pub timestamp: String,
    pub template_version: String,
    /// The answers the report was generated from
    pub input_data: Map<String, Value>,
    pub output_path: String,
    pub output_filename: String,
    #[serde(default)]
    pub generated_by: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl ReportMetadata {
    /// Record a render that just wrote `output_path`
    pub fn new(
        report_id: impl Into<String>,
        report_name: impl Into<String>,
        template_version: impl Into<String>,
        input_data: Map<String, Value>,
        output_path: &Path,
    ) -> Self {
        Self {
            id: generate_id(),
            report_id: report_id.into(),
            report_name: report_name.into(),
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
            template_version: template_version.into(),
            input_data,
            output_path: output_path.display().to_string(),
            output_filename: output_path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            generated_by: Some(DEFAULT_GENERATED_BY.to_string()),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// One-line summary: `"{name} - dd/mm/YYYY HH:MM"`, then the
    /// description if there is one
    pub fn summary(&self) -> String {
        let when = NaiveDateTime::parse_from_str(&self.timestamp, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|t| t.format("%d/%m/%Y %H:%M").to_string())
            .unwrap_or_else(|_| self.timestamp.clone());
        let mut summary = format!("{} - {}", self.report_name, when);
        if let Some(description) = &self.description {
            summary.push_str(" - ");
            summary.push_str(description);
        }
        summary
    }
}

/// Fresh record id
pub fn generate_id() -> String {
    let suffix: String = Uuid::new_v4()
        .simple()
        .to_string()
        .to_uppercase()
        .chars()
        .take(6)
        .collect();
    format!("meta_{}_{}", Local::now().format("%Y%m%d_%H%M%S"), suffix)
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct MetadataFile {
    #[serde(default)]
    reports: Vec<ReportMetadata>,
}

/// The JSON file holding every record
#[derive(Debug, Clone)]
pub struct MetadataStore {
    path: PathBuf,
}

impl MetadataStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a record, creating the file and its directory if needed
    pub fn append(&self, record: ReportMetadata) -> Result<()> {
        let mut records = self.read()?;
        tracing::info!(id = %record.id, "metadata saved for {}", record.report_name);
        records.push(record);
        self.write(records)
    }

    /// Every record, most recent first
    pub fn load_all(&self) -> Result<Vec<ReportMetadata>> {
        let mut records = self.read()?;
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(records)
    }

    /// Records of one report type, most recent first
    pub fn by_report_id(&self, report_id: &str) -> Result<Vec<ReportMetadata>> {
        Ok(self
            .load_all()?
            .into_iter()
            .filter(|r| r.report_id == report_id)
            .collect())
    }

    pub fn by_id(&self, id: &str) -> Result<Option<ReportMetadata>> {
        Ok(self.read()?.into_iter().find(|r| r.id == id))
    }

    /// Delete a record; `false` if there was none with this id
    pub fn delete(&self, id: &str) -> Result<bool> {
        let mut records = self.read()?;
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            tracing::warn!(id, "no metadata record to delete");
            return Ok(false);
        }
        self.write(records)?;
        Ok(true)
    }

    fn read(&self) -> Result<Vec<ReportMetadata>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read metadata file: {}", self.path.display()))?;
        let file: MetadataFile = serde_json::from_str(&content)
            .with_context(|| format!("Invalid metadata file: {}", self.path.display()))?;
        Ok(file.reports)
    }

    fn write(&self, reports: Vec<ReportMetadata>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create metadata directory: {}", parent.display())
            })?;
        }
        let json = serde_json::to_string_pretty(&MetadataFile { reports })
            .context("Failed to serialize metadata")?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write metadata file: {}", self.path.display()))
    }
}
