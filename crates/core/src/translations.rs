//! Normalization of per-language JSON blobs into relational rows.
//!
//! Older rows keep translations in a JSON column shaped like
//! `{ "en": { "name": "..." }, "fr": { "name": "..." } }`. Each
//! [`NormalizationTarget`] describes one such column and the table that
//! replaces it; the same extraction and insert logic serves all of them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::LanguageCode;

/// Errors from reading a translation blob.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TranslationError {
    #[error("unknown normalization target: {0}")]
    UnknownTarget(String),
    #[error("entity {entity_id}: translation blob is not an object")]
    NotAnObject { entity_id: i32 },
    #[error("entity {entity_id}: entry for '{language}' is not an object")]
    LanguageNotObject { entity_id: i32, language: String },
}

/// One blob column and the normalized table it feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NormalizationTarget {
    pub name: &'static str,
    pub source_table: &'static str,
    pub source_column: &'static str,
    pub target_table: &'static str,
    pub entity_column: &'static str,
    pub fields: &'static [&'static str],
}

const TEXT_FIELDS: &[&str] = &["name", "description"];
const SEO_FIELDS: &[&str] = &["meta_title", "meta_description", "meta_keywords", "url_key"];

/// Every blob column that has a normalized table.
pub const TARGETS: &[NormalizationTarget] = &[
    NormalizationTarget {
        name: "store_translations",
        source_table: "stores",
        source_column: "translations",
        target_table: "store_translations",
        entity_column: "store_id",
        fields: TEXT_FIELDS,
    },
    NormalizationTarget {
        name: "product_translations",
        source_table: "products",
        source_column: "translations",
        target_table: "product_translations",
        entity_column: "product_id",
        fields: &["name", "description", "short_description"],
    },
    NormalizationTarget {
        name: "category_translations",
        source_table: "categories",
        source_column: "translations",
        target_table: "category_translations",
        entity_column: "category_id",
        fields: TEXT_FIELDS,
    },
    NormalizationTarget {
        name: "attribute_set_translations",
        source_table: "attribute_sets",
        source_column: "translations",
        target_table: "attribute_set_translations",
        entity_column: "attribute_set_id",
        fields: TEXT_FIELDS,
    },
    NormalizationTarget {
        name: "shipping_method_translations",
        source_table: "shipping_methods",
        source_column: "translations",
        target_table: "shipping_method_translations",
        entity_column: "shipping_method_id",
        fields: TEXT_FIELDS,
    },
    NormalizationTarget {
        name: "product_seo",
        source_table: "products",
        source_column: "seo",
        target_table: "product_seo",
        entity_column: "product_id",
        fields: SEO_FIELDS,
    },
    NormalizationTarget {
        name: "category_seo",
        source_table: "categories",
        source_column: "seo",
        target_table: "category_seo",
        entity_column: "category_id",
        fields: SEO_FIELDS,
    },
];

/// Look up a target by name.
///
/// # Errors
///
/// Returns `TranslationError::UnknownTarget` if no target has that name.
pub fn target(name: &str) -> Result<&'static NormalizationTarget, TranslationError> {
    TARGETS
        .iter()
        .find(|t| t.name == name)
        .ok_or_else(|| TranslationError::UnknownTarget(name.to_owned()))
}

impl NormalizationTarget {
    /// Query selecting one page of `(id, blob)` source rows with a non-null
    /// blob, in id order.
    ///
    /// Parameters are `$1` the last id already read (0 to start) and `$2` the
    /// page size.
    #[must_use]
    pub fn select_statement(&self) -> String {
        format!(
            "SELECT id, {col} AS blob FROM shopforge.{table} \
             WHERE {col} IS NOT NULL AND id > $1 ORDER BY id LIMIT $2",
            col = self.source_column,
            table = self.source_table,
        )
    }

    /// Parameterized insert that leaves existing `(entity, language)` rows alone.
    ///
    /// Parameters are `$1` entity id, `$2` language code, then one per field.
    #[must_use]
    pub fn insert_statement(&self) -> String {
        let columns = self.fields.join(", ");
        let placeholders = (0..self.fields.len())
            .map(|i| format!("${}", i + 3))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "INSERT INTO shopforge.{table} ({entity}, language_code, {columns}) \
             VALUES ($1, $2, {placeholders}) \
             ON CONFLICT ({entity}, language_code) DO NOTHING",
            table = self.target_table,
            entity = self.entity_column,
        )
    }
}

/// One normalized row: field values in the order of the target's `fields`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslationRow {
    pub entity_id: i32,
    pub language: LanguageCode,
    pub values: Vec<Option<String>>,
}

/// Rows extracted from one blob plus anything that was skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extracted {
    pub rows: Vec<TranslationRow>,
    pub warnings: Vec<String>,
}

/// Split a translation blob into rows for `fields`.
///
/// Invalid language keys are skipped with a warning. Unknown fields are
/// ignored. Languages whose listed fields are all empty produce no row.
///
/// # Errors
///
/// Returns `TranslationError` if the blob or a language entry is not an object.
pub fn extract_rows(
    entity_id: i32,
    blob: &Value,
    fields: &[&str],
) -> Result<Extracted, TranslationError> {
    let map = match blob {
        Value::Null => return Ok(Extracted::default()),
        Value::Object(map) => map,
        _ => return Err(TranslationError::NotAnObject { entity_id }),
    };

    let mut out = Extracted::default();
    for (key, entry) in map {
        let language = match LanguageCode::parse(key) {
            Ok(language) => language,
            Err(e) => {
                out.warnings
                    .push(format!("entity {entity_id}: skipped language '{key}': {e}"));
                continue;
            }
        };
        let entry = match entry {
            Value::Null => continue,
            Value::Object(entry) => entry,
            _ => {
                return Err(TranslationError::LanguageNotObject {
                    entity_id,
                    language: key.clone(),
                });
            }
        };

        let values: Vec<Option<String>> = fields
            .iter()
            .map(|field| entry.get(*field).and_then(field_text))
            .collect();
        if values.iter().all(Option::is_none) {
            continue;
        }
        out.rows.push(TranslationRow {
            entity_id,
            language,
            values,
        });
    }
    Ok(out)
}

fn field_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_owned(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Outcome of normalizing one target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizationReport {
    pub target: String,
    pub entities_scanned: u64,
    pub rows_inserted: u64,
    /// Rows that already existed (conflict) or were dropped as empty.
    pub rows_skipped: u64,
    pub warnings: Vec<String>,
}

impl NormalizationReport {
    #[must_use]
    pub fn new(target: &str) -> Self {
        Self {
            target: target.to_owned(),
            ..Self::default()
        }
    }

    /// Count one insert attempt by the rows it affected; `0` means the
    /// `(entity, language)` row already existed.
    pub const fn record_insert(&mut self, rows_affected: u64) {
        if rows_affected > 0 {
            self.rows_inserted += 1;
        } else {
            self.rows_skipped += 1;
        }
    }
}
