//! Engine settings (`formdoc.toml`)
//!
//! Every field has a default, so an empty file (or no file) gives the
//! standard behaviour.

use serde::{Deserialize, Serialize};

/// Top-level engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineSettings {
    pub tables: TableSettings,
    pub discrepancies: DiscrepancySettings,
    pub toc: TocSettings,
    pub markers: MarkerSettings,
}

impl EngineSettings {
    /// Parse settings from a TOML string
    pub fn from_toml_str(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Special behaviour registered for a table marker
    pub fn special_table(&self, marker: &str) -> Option<&SpecialTable> {
        self.tables.special.iter().find(|s| s.marker == marker)
    }
}

/// Table insertion settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableSettings {
    /// Markers whose tables need extra layout around them
    pub special: Vec<SpecialTable>,
}

impl Default for TableSettings {
    fn default() -> Self {
        Self {
            special: vec![SpecialTable {
                marker: "<<Tabla de cumplimiento formal MF>>".to_string(),
                column_break_before: true,
            }],
        }
    }
}

/// Extra layout for one table marker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialTable {
    pub marker: String,
    /// Insert a column-break paragraph before the marker paragraph
    #[serde(default)]
    pub column_break_before: bool,
}

/// Conditional removal of the discrepancies annex
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscrepancySettings {
    /// Key looked up in `_condition_inputs`
    pub condition_key: String,
    /// Value that keeps the annex
    pub affirmative: String,
    /// Paragraphs containing any of these are removed otherwise
    pub texts: Vec<String>,
}

impl Default for DiscrepancySettings {
    fn default() -> Self {
        Self {
            condition_key: "desarrollo_discrepancias_formales".to_string(),
            affirmative: "Sí".to_string(),
            texts: vec![
                "Anexo IV – Discrepancias formales".to_string(),
                "Anexo IV - Discrepancias formales".to_string(),
            ],
        }
    }
}

/// Table of contents markers and layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TocSettings {
    pub start_marker: String,
    pub end_marker: String,
    /// Line width, in characters, used for dot leaders
    pub width: usize,
}

impl Default for TocSettings {
    fn default() -> Self {
        Self {
            start_marker: "<<Indice>>".to_string(),
            end_marker: "<<fin Indice>>".to_string(),
            width: 80,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerSettings {
    /// Token expanded into a page break
    pub page_break: String,
}

impl Default for MarkerSettings {
    fn default() -> Self {
        Self {
            page_break: "{salto}".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_file_gives_defaults() {
        let settings = EngineSettings::from_toml_str("").unwrap();
        assert_eq!(settings, EngineSettings::default());
        assert!(settings
            .special_table("<<Tabla de cumplimiento formal MF>>")
            .is_some_and(|s| s.column_break_before));
        assert_eq!(settings.toc.width, 80);
    }

    #[test]
    fn test_partial_override() {
        let settings = EngineSettings::from_toml_str(
            r#"
[toc]
width = 60

[[tables.special]]
marker = "<<Tabla anexo>>"
column_break_before = true

[discrepancies]
texts = ["Anexo V"]
"#,
        )
        .unwrap();
        assert_eq!(settings.toc.width, 60);
        assert_eq!(settings.toc.start_marker, "<<Indice>>");
        assert_eq!(settings.tables.special.len(), 1);
        assert!(settings.special_table("<<Tabla de cumplimiento formal MF>>").is_none());
        assert_eq!(settings.discrepancies.texts, vec!["Anexo V"]);
        assert_eq!(settings.discrepancies.affirmative, "Sí");
        assert_eq!(settings.markers.page_break, "{salto}");
    }

    #[test]
    fn test_unknown_type_is_an_error() {
        assert!(EngineSettings::from_toml_str("[toc]\nwidth = \"ancho\"").is_err());
    }
}
