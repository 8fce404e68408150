//! Pesticide lookup fallback
//!
//! Read-only table from pest name to a reference pesticide name, loaded once
//! at startup from a two-column CSV (pest name, pesticide). Values are a
//! secondary source only and never replace a pesticide parsed from generated
//! guidance.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, info};

/// Returned by [`PesticideLookup::lookup`] when the pest is unknown
pub const NOT_AVAILABLE: &str = "N/A";

/// Lookup table loading errors
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("IO error reading pesticide data: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed pesticide CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Immutable pest → pesticide table
#[derive(Debug, Clone, Default)]
pub struct PesticideLookup {
    entries: HashMap<String, String>,
}

impl PesticideLookup {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a table from `(pest name, pesticide)` pairs
    ///
    /// Later pairs win when two names normalize to the same key.
    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let entries = entries
            .into_iter()
            .filter_map(|(pest, pesticide)| {
                let key = normalize_pest_name(pest.as_ref());
                let value: String = pesticide.into();
                let value = value.trim().to_string();
                (!key.is_empty() && !value.is_empty()).then_some((key, value))
            })
            .collect();

        Self { entries }
    }

    /// Parse CSV with a header row; only the first two columns are used
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, LookupError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut pairs = Vec::new();
        for (row, record) in csv_reader.records().enumerate() {
            let record = record?;
            match (record.get(0), record.get(1)) {
                (Some(pest), Some(pesticide)) => {
                    pairs.push((pest.to_string(), pesticide.to_string()))
                }
                _ => debug!(row = row + 2, "Skipping pesticide row with fewer than two columns"),
            }
        }

        Ok(Self::from_entries(pairs))
    }

    pub fn load_csv(path: &Path) -> Result<Self, LookupError> {
        let file = std::fs::File::open(path)?;
        let table = Self::from_csv_reader(file)?;
        info!(
            entries = table.len(),
            "Loaded pesticide reference data from {}",
            path.display()
        );
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pesticide for `pest_name`, or [`NOT_AVAILABLE`]
    pub fn lookup(&self, pest_name: &str) -> &str {
        self.entries
            .get(&normalize_pest_name(pest_name))
            .map(String::as_str)
            .unwrap_or(NOT_AVAILABLE)
    }
}

/// Lookup key: lowercase, underscores as spaces, single-spaced
pub fn normalize_pest_name(name: &str) -> String {
    name.to_lowercase()
        .replace('_', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Title-cased display form (`"yellow_rice_borer"` → `"Yellow Rice Borer"`)
///
/// A letter is upper-cased when it follows a non-letter and lower-cased
/// otherwise, so `"dacus dorsalis(hendel)"` becomes `"Dacus Dorsalis(Hendel)"`.
pub fn display_name(name: &str) -> String {
    let spaced = name.replace('_', " ");
    let collapsed = spaced.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut out = String::with_capacity(collapsed.len());
    let mut previous_is_letter = false;
    for c in collapsed.chars() {
        if c.is_alphabetic() {
            if previous_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            out.push(c);
            previous_is_letter = false;
        }
    }
    out
}
