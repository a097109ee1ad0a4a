//! Settings document: the declarative rule configuration driving a conversion.
//!
//! The document is a keyed JSON file. `mappings` is an ordered object whose
//! key order determines rule execution order, so it is kept as a vector of
//! `(target column, rule)` pairs rather than a hash map.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

use crate::error::ConfigError;

fn default_mapping_folder() -> PathBuf {
    PathBuf::from("data/mappings")
}

fn default_template_file() -> PathBuf {
    PathBuf::from("data/templates/Opdracht_template_MATMAS.xlsx")
}

fn default_max_length() -> usize {
    40
}

/// Top-level converter configuration, loaded once per converter instance.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Folder containing the mapping workbooks referenced by lookup rules.
    #[serde(default = "default_mapping_folder")]
    pub mapping_folder: PathBuf,

    /// Workbook whose 5th row is the canonical output header.
    #[serde(default = "default_template_file")]
    pub template_file: PathBuf,

    /// Target column -> derivation rule, in document order.
    #[serde(default, deserialize_with = "ordered_rules")]
    pub mappings: Vec<(String, FieldRule)>,

    /// Row-level formulas evaluated after the field rules.
    #[serde(default)]
    pub custom_calculations: Vec<Calculation>,
}

impl Settings {
    /// Load and eagerly validate the settings document.
    ///
    /// Absence of the file is fatal; so is a lookup rule that names a
    /// `map_file` without the key/value column names needed to read it.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Settings =
            serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (target, rule) in &self.mappings {
            if let Some(key) = rule.missing_lookup_key() {
                return Err(ConfigError::IncompleteRule {
                    rule: target.clone(),
                    key,
                });
            }
        }
        Ok(())
    }
}

/// Deserialize a JSON object into pairs, preserving document order.
fn ordered_rules<'de, D>(deserializer: D) -> Result<Vec<(String, FieldRule)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct RulesVisitor;

    impl<'de> Visitor<'de> for RulesVisitor {
        type Value = Vec<(String, FieldRule)>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a map of target column to rule")
        }

        fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut rules = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some(entry) = access.next_entry::<String, FieldRule>()? {
                rules.push(entry);
            }
            Ok(rules)
        }
    }

    deserializer.deserialize_map(RulesVisitor)
}

/// How one output column is derived.
///
/// A closed set: adding a rule kind means adding a variant here and a match
/// arm in the engine, checked at compile time.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldRule {
    /// Broadcast the filename-derived site code into every row.
    FilenameExtraction,

    /// Verbatim copy of a source column.
    Direct { source: String },

    /// Dictionary lookup with a configurable fallback for misses.
    Map(MapRule),

    /// Length-constrained pass-through with lookup/truncation for long values.
    LogicLength(LengthRule),
}

impl FieldRule {
    /// Returns the name of a required-but-absent lookup field, if any.
    pub fn missing_lookup_key(&self) -> Option<&'static str> {
        match self {
            Self::Map(rule) => rule.lookup.missing_key(),
            Self::LogicLength(rule) => rule.lookup.missing_key(),
            Self::FilenameExtraction | Self::Direct { .. } => None,
        }
    }
}

/// `map` rule: normalized lookup against an external worksheet.
#[derive(Debug, Clone, Deserialize)]
pub struct MapRule {
    pub source: String,

    #[serde(flatten)]
    pub lookup: LookupFields,

    #[serde(default)]
    pub fallback_strategy: MapFallback,

    /// Substitute for misses under the `default_value` strategy.
    #[serde(default)]
    pub default_value: String,
}

/// `logic_length` rule: values over `max_length` try the lookup first, then
/// the fallback strategy.
#[derive(Debug, Clone, Deserialize)]
pub struct LengthRule {
    pub source: String,

    #[serde(flatten)]
    pub lookup: LookupFields,

    #[serde(default = "default_max_length")]
    pub max_length: usize,

    #[serde(default)]
    pub fallback_strategy: LengthFallback,
}

/// Worksheet lookup coordinates shared by `map` and `logic_length` rules.
///
/// All fields are optional in the document: a rule without `map_file` simply
/// has no lookup table and every value takes the fallback path.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LookupFields {
    pub map_file: Option<String>,
    pub sheet_name: Option<String>,
    pub map_key: Option<String>,
    pub map_value: Option<String>,
}

impl LookupFields {
    /// Resolve into a full lookup spec, or `None` when no `map_file` is set.
    ///
    /// Assumes `Settings::validate` has run: `map_key`/`map_value` are
    /// present whenever `map_file` is.
    pub fn spec(&self) -> Option<LookupSpec> {
        let file = self.map_file.clone()?;
        let key_column = self.map_key.clone()?;
        let value_column = self.map_value.clone()?;
        Some(LookupSpec {
            file,
            sheet: self.sheet_name.clone(),
            key_column,
            value_column,
        })
    }

    fn missing_key(&self) -> Option<&'static str> {
        if self.map_file.is_none() {
            return None;
        }
        if self.map_key.is_none() {
            return Some("map_key");
        }
        if self.map_value.is_none() {
            return Some("map_value");
        }
        None
    }
}

/// Fully resolved coordinates of one mapping table.
///
/// Doubles as the cache key in the mapping service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LookupSpec {
    /// Workbook filename, relative to the configured mapping folder.
    pub file: String,
    /// Worksheet name; `None` means the workbook's first sheet.
    pub sheet: Option<String>,
    pub key_column: String,
    pub value_column: String,
}

/// Fallback for `map` rule lookup misses.
///
/// Any unrecognized strategy string behaves as `Error`, so configuration
/// typos degrade to the `ERR` sentinel instead of failing the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MapFallback {
    /// Substitute the original (non-normalized) source value.
    SourceValue,
    /// Substitute the configured `default_value`.
    DefaultValue,
    /// Substitute the `ERR` sentinel.
    #[default]
    Error,
}

impl<'de> Deserialize<'de> for MapFallback {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "source_value" => Self::SourceValue,
            "default_value" => Self::DefaultValue,
            _ => Self::Error,
        })
    }
}

/// Fallback for `logic_length` values that exceed the limit and miss the lookup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LengthFallback {
    /// Truncate to `max_length` characters.
    #[default]
    Truncate,
    /// Leave the value untouched despite exceeding the limit.
    Keep,
}

impl<'de> Deserialize<'de> for LengthFallback {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "truncate" => Self::Truncate,
            _ => Self::Keep,
        })
    }
}

/// One row-level formula writing into `target_column`.
#[derive(Debug, Clone, Deserialize)]
pub struct Calculation {
    pub target_column: String,
    pub formula: String,
}
