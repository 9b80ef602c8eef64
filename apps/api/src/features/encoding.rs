//! Categorical Encoder Store and target label encoder.
//!
//! Both are fitted once per training run from sorted unique labels and are
//! frozen afterwards: inference looks codes up, it never refits.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::features::profile::{FieldValue, ProfileInput};

/// Code used for labels never seen during training.
pub const UNSEEN_CODE: u32 = 0;

/// Column name → (category label → dense code).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoricalEncoderStore {
    columns: BTreeMap<String, BTreeMap<String, u32>>,
}

impl CategoricalEncoderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fits a column's mapping from its observed labels and returns it.
    /// Codes follow sorted label order, starting at 0.
    pub fn fit_column<'a, I>(&mut self, column: &str, labels: I) -> &BTreeMap<String, u32>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let unique: BTreeSet<&str> = labels.into_iter().collect();
        let mapping = unique
            .into_iter()
            .enumerate()
            .map(|(code, label)| (label.to_string(), code as u32))
            .collect();
        self.columns.insert(column.to_string(), mapping);
        &self.columns[column]
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn code(&self, column: &str, label: &str) -> Option<u32> {
        self.columns.get(column)?.get(label).copied()
    }

    /// Replaces every categorical field of `profile` with its code. Labels
    /// outside the fitted vocabulary fall back to `UNSEEN_CODE`.
    pub fn encode_profile(&self, profile: &ProfileInput) -> ProfileInput {
        let mut encoded = profile.clone();
        for column in self.columns.keys() {
            let Some(value) = encoded.get_mut(column) else {
                continue;
            };
            let label = value.as_label();
            let code = match label.as_deref().and_then(|l| self.code(column, l)) {
                Some(code) => code,
                None => {
                    debug!("Encoding fallback: unseen label {label:?} for column '{column}'");
                    UNSEEN_CODE
                }
            };
            *value = FieldValue::Number(f64::from(code));
        }
        encoded
    }
}

/// Job role ↔ class index. Class order is sorted role order; the classifier's
/// probability vector is indexed by it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn fit<'a, I>(labels: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let unique: BTreeSet<&str> = labels.into_iter().collect();
        Self {
            classes: unique.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn transform(&self, label: &str) -> Option<usize> {
        self.classes.binary_search_by(|c| c.as_str().cmp(label)).ok()
    }

    pub fn inverse(&self, index: usize) -> Option<&str> {
        self.classes.get(index).map(String::as_str)
    }
}
