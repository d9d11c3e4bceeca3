//! Ordinal encoding of categorical columns.

use anyhow::{Result, bail};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::config::{AUX_COLUMNS, FEATURE_COLUMNS};
use crate::record::SafetyRecord;

/// Code given to unseen categories once an encoder is set up for serving.
pub const UNKNOWN_CODE: i64 = -1;

/// What `transform` does with a value outside the fitted vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnknownPolicy {
    Error,
    Encode(i64),
}

/// Maps each column's distinct values to their rank in sorted order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrdinalEncoder {
    columns: Vec<String>,
    categories: Vec<Vec<String>>,
    unknown: UnknownPolicy,
}

impl OrdinalEncoder {
    /// Fits one sorted vocabulary per column. Every row must have `columns.len()` cells.
    pub fn fit<S: AsRef<str>>(columns: &[&str], rows: &[Vec<S>]) -> Result<Self> {
        let mut categories = vec![Vec::<String>::new(); columns.len()];
        for (i, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                bail!("row {i} has {} cells, expected {}", row.len(), columns.len());
            }
            for (vocab, value) in categories.iter_mut().zip(row) {
                vocab.push(value.as_ref().to_string());
            }
        }
        for vocab in &mut categories {
            vocab.sort();
            vocab.dedup();
        }

        Ok(OrdinalEncoder {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            categories,
            unknown: UnknownPolicy::Error,
        })
    }

    /// Reconfigures unseen categories to encode as `value` instead of failing.
    pub fn with_unknown_value(mut self, value: i64) -> Self {
        self.unknown = UnknownPolicy::Encode(value);
        self
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Sorted vocabulary of column `idx`.
    pub fn categories(&self, idx: usize) -> &[String] {
        &self.categories[idx]
    }

    /// Code of `value` in column `idx`.
    pub fn encode_value(&self, idx: usize, value: &str) -> Result<i64> {
        match self.categories[idx].binary_search_by(|c| c.as_str().cmp(value)) {
            Ok(pos) => Ok(pos as i64),
            Err(_) => match self.unknown {
                UnknownPolicy::Encode(code) => Ok(code),
                UnknownPolicy::Error => {
                    bail!("unknown category {value:?} in column {:?}", self.columns[idx])
                }
            },
        }
    }

    pub fn transform<S: AsRef<str>>(&self, rows: &[Vec<S>]) -> Result<Array2<f64>> {
        let width = self.columns.len();
        let mut data = Vec::with_capacity(rows.len() * width);
        for row in rows {
            if row.len() != width {
                bail!("expected {width} cells, got {}", row.len());
            }
            for (idx, value) in row.iter().enumerate() {
                data.push(self.encode_value(idx, value.as_ref())? as f64);
            }
        }
        Ok(Array2::from_shape_vec((rows.len(), width), data)?)
    }

    /// Decodes one row of codes. Unknown or out-of-range codes give `None`.
    pub fn inverse_transform_row(&self, codes: &[f64]) -> Vec<Option<String>> {
        codes
            .iter()
            .zip(&self.categories)
            .map(|(&code, vocab)| {
                if code < 0.0 {
                    return None;
                }
                vocab.get(code as usize).cloned()
            })
            .collect()
    }
}

/// Fits the Area/Zone/Time encoder used by the classifiers.
pub fn fit_feature_encoder(records: &[SafetyRecord]) -> Result<OrdinalEncoder> {
    let rows: Vec<Vec<&str>> = records.iter().map(|r| r.features().to_vec()).collect();
    OrdinalEncoder::fit(&FEATURE_COLUMNS, &rows)
}

/// Encodes records into the classifier feature matrix.
pub fn encode_features(encoder: &OrdinalEncoder, records: &[SafetyRecord]) -> Result<Array2<f64>> {
    let rows: Vec<Vec<&str>> = records.iter().map(|r| r.features().to_vec()).collect();
    encoder.transform(&rows)
}

/// Fits an encoder over all eight categorical columns.
pub fn fit_full_encoder(records: &[SafetyRecord]) -> Result<OrdinalEncoder> {
    let columns: Vec<&str> = FEATURE_COLUMNS.iter().chain(&AUX_COLUMNS).copied().collect();
    let rows: Vec<Vec<&str>> = records
        .iter()
        .map(|r| columns.iter().map(|c| r.column(c).unwrap_or_default()).collect())
        .collect();
    OrdinalEncoder::fit(&columns, &rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> OrdinalEncoder {
        let rows = vec![
            vec!["velachery", "south", "night"],
            vec!["adyar", "south", "morning"],
            vec!["adyar", "north", "evening"],
        ];
        OrdinalEncoder::fit(&FEATURE_COLUMNS, &rows).unwrap()
    }

    #[test]
    fn codes_follow_sorted_order_per_column() {
        let enc = sample();
        assert_eq!(enc.categories(0), ["adyar", "velachery"]);
        assert_eq!(enc.encode_value(0, "velachery").unwrap(), 1);
        assert_eq!(enc.encode_value(1, "north").unwrap(), 0);
        assert_eq!(enc.encode_value(2, "night").unwrap(), 2);
    }

    #[test]
    fn known_categories_round_trip() {
        let enc = sample();
        let x = enc.transform(&[vec!["adyar", "north", "evening"]]).unwrap();
        let decoded = enc.inverse_transform_row(x.row(0).as_slice().unwrap());
        assert_eq!(
            decoded,
            vec![
                Some("adyar".to_string()),
                Some("north".to_string()),
                Some("evening".to_string())
            ]
        );
    }

    #[test]
    fn unseen_category_fails_until_reconfigured() {
        let enc = sample();
        assert!(enc.encode_value(0, "guindy").is_err());

        let enc = enc.with_unknown_value(UNKNOWN_CODE);
        let x = enc.transform(&[vec!["guindy", "south", "dusk"]]).unwrap();
        assert_eq!(x[[0, 0]], -1.0);
        assert_eq!(x[[0, 1]], 1.0);
        assert_eq!(x[[0, 2]], -1.0);
        assert_eq!(enc.inverse_transform_row(&[-1.0])[0], None);
    }

    #[test]
    fn full_encoder_covers_auxiliary_columns() {
        let cfg = crate::config::CleaningConfig::default();
        let rec = crate::record::clean_row(
            |c| match c {
                "Area" => Some("Adyar"),
                "Tier" => Some("Outer"),
                _ => None,
            },
            &cfg,
        )
        .unwrap();
        let enc = fit_full_encoder(&[rec]).unwrap();
        assert_eq!(enc.columns().len(), 8);
        assert_eq!(enc.categories(6), ["Outer"]);
    }

    #[test]
    fn serialized_policy_survives_messagepack() {
        let enc = sample().with_unknown_value(UNKNOWN_CODE);
        let bytes = rmp_serde::to_vec_named(&enc).unwrap();
        let back: OrdinalEncoder = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(back, enc);
    }
}
