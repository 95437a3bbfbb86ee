//! BETYdb trait schema
//!
//! The output row layout is fixed for a run: eight database-key and citation
//! columns followed by the configured variable columns. Header and rows are
//! both generated from [`TraitSchema::fields`], so they cannot disagree on order.

use plotex_common::config::ExtractorConfig;
use std::collections::HashMap;
use std::fmt;

/// Columns every row carries, in output order
pub const FIXED_FIELDS: [&str; 8] = [
    "local_datetime",
    "access_level",
    "species",
    "site",
    "citation_author",
    "citation_year",
    "citation_title",
    "method",
];

/// The one field whose unset value is an empty list
pub const ARRAY_VALUED_FIELD: &str = "site";

/// A field value before CSV encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraitValue {
    Text(String),
    List(Vec<String>),
}

impl TraitValue {
    pub fn text(value: impl Into<String>) -> Self {
        TraitValue::Text(value.into())
    }
}

impl fmt::Display for TraitValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraitValue::Text(text) => f.write_str(text),
            TraitValue::List(items) => write!(f, "[{}]", items.join(", ")),
        }
    }
}

/// Configured literal defaults
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraitLiterals {
    pub access_level: String,
    pub species: String,
    pub citation_author: String,
    pub citation_year: String,
    pub citation_title: String,
    pub method: String,
}

impl Default for TraitLiterals {
    fn default() -> Self {
        Self {
            access_level: "2".to_string(),
            species: "Unknown".to_string(),
            citation_author: "Unknown".to_string(),
            citation_year: "Unknown".to_string(),
            citation_title: "Unknown".to_string(),
            method: String::new(),
        }
    }
}

impl TraitLiterals {
    pub fn from_config(config: &ExtractorConfig) -> Self {
        Self {
            citation_author: config.citation_author.clone(),
            citation_year: config.citation_year.clone(),
            citation_title: config.citation_title.clone(),
            method: config.method_name.clone().unwrap_or_default(),
            ..Self::default()
        }
    }
}

/// Ordered field list plus per-field defaults
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraitSchema {
    fields: Vec<String>,
    defaults: HashMap<String, TraitValue>,
}

impl TraitSchema {
    pub fn new(variable_names: &[String], literals: &TraitLiterals) -> Self {
        let fields: Vec<String> = FIXED_FIELDS
            .iter()
            .map(|name| name.to_string())
            .chain(variable_names.iter().cloned())
            .collect();

        let defaults = fields
            .iter()
            .map(|name| (name.clone(), default_value(name, literals)))
            .collect();

        Self { fields, defaults }
    }

    /// Field names in output order
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Default value for every schema field
    pub fn defaults_table(&self) -> &HashMap<String, TraitValue> {
        &self.defaults
    }

    /// Default for any field name; names outside the schema default to ""
    pub fn default_for(&self, name: &str) -> TraitValue {
        self.defaults
            .get(name)
            .cloned()
            .unwrap_or_else(|| TraitValue::text(""))
    }

    /// Comma separated header line (no trailing newline)
    pub fn csv_header(&self) -> String {
        self.fields
            .iter()
            .map(|name| csv_field(name))
            .collect::<Vec<_>>()
            .join(",")
    }
}

fn default_value(name: &str, literals: &TraitLiterals) -> TraitValue {
    if name == ARRAY_VALUED_FIELD {
        return TraitValue::List(Vec::new());
    }
    let literal = match name {
        "access_level" => &literals.access_level,
        "species" => &literals.species,
        "citation_author" => &literals.citation_author,
        "citation_year" => &literals.citation_year,
        "citation_title" => &literals.citation_title,
        "method" => &literals.method,
        _ => return TraitValue::text(""),
    };
    TraitValue::text(literal.as_str())
}

/// One output row, keyed by field name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraitRow {
    values: HashMap<String, TraitValue>,
}

impl TraitRow {
    /// Row holding every schema default
    pub fn seeded(schema: &TraitSchema) -> Self {
        Self {
            values: schema.defaults_table().clone(),
        }
    }

    pub fn set(&mut self, name: impl Into<String>, value: TraitValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&TraitValue> {
        self.values.get(name)
    }

    /// Values in schema order; fields missing from the row get the schema default
    pub fn ordered_values(&self, schema: &TraitSchema) -> Vec<TraitValue> {
        schema
            .fields()
            .iter()
            .map(|name| {
                self.values
                    .get(name)
                    .cloned()
                    .unwrap_or_else(|| schema.default_for(name))
            })
            .collect()
    }

    /// Comma separated data line in schema order (no trailing newline)
    pub fn to_csv_line(&self, schema: &TraitSchema) -> String {
        self.ordered_values(schema)
            .iter()
            .map(|value| csv_field(&value.to_string()))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Quote a field when it contains a separator, quote or line break
pub fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
