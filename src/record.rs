//! Loading and cleaning of per-city safety CSVs.

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::path::Path;
use tracing::debug;

use crate::config::{
    AUX_COLUMNS, COL_AREA, COL_BAR, COL_CLASS, COL_PEOPLE_FREQUENCY, COL_POLICE_STATION,
    COL_RESIDENCE_LEVEL, COL_TIER, COL_TIME, COL_ZONE, CleaningConfig,
};

/// Target label of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Safety {
    Unsafe,
    Safe,
}

impl Safety {
    /// Integer code used as the classifier target.
    pub fn code(self) -> usize {
        match self {
            Safety::Unsafe => 0,
            Safety::Safe => 1,
        }
    }

    pub fn from_code(code: usize) -> Self {
        if code == 1 { Safety::Safe } else { Safety::Unsafe }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Safety::Safe => "Safe",
            Safety::Unsafe => "Unsafe",
        }
    }
}

impl fmt::Display for Safety {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One cleaned Area/Zone/Time row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyRecord {
    pub area: String,
    pub zone: String,
    pub time: String,
    pub people_frequency: String,
    pub is_police_station: String,
    pub is_bar: String,
    pub tier: String,
    pub residence_level: String,
    pub class: Safety,
}

impl SafetyRecord {
    /// The three encoder inputs, in `FEATURE_COLUMNS` order.
    pub fn features(&self) -> [&str; 3] {
        [&self.area, &self.zone, &self.time]
    }

    /// Value of a categorical column by its CSV header name.
    pub fn column(&self, name: &str) -> Option<&str> {
        let value = match name {
            COL_AREA => &self.area,
            COL_ZONE => &self.zone,
            COL_TIME => &self.time,
            COL_PEOPLE_FREQUENCY => &self.people_frequency,
            COL_POLICE_STATION => &self.is_police_station,
            COL_BAR => &self.is_bar,
            COL_TIER => &self.tier,
            COL_RESIDENCE_LEVEL => &self.residence_level,
            COL_CLASS => return Some(self.class.as_str()),
            _ => return None,
        };
        Some(value)
    }

    /// True when the record sits at exactly this (already normalized) key.
    pub fn matches(&self, area: &str, zone: &str, time: &str) -> bool {
        self.area == area && self.zone == zone && self.time == time
    }
}

/// Trim and lowercase a feature value.
pub fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Builds a record from raw cells keyed by column name.
///
/// `cell` returns `None` for an absent column; empty strings count as missing.
pub fn clean_row<'a>(
    cell: impl Fn(&str) -> Option<&'a str>,
    cfg: &CleaningConfig,
) -> Result<SafetyRecord> {
    let fill = |column: &str| -> String {
        match cell(column).map(str::trim) {
            Some(v) if !v.is_empty() => v.to_string(),
            _ => cfg.default_for(column).unwrap_or_default().to_string(),
        }
    };

    let class_label = fill(COL_CLASS);
    let code = cfg
        .class_codes
        .iter()
        .find(|(label, _)| label.eq_ignore_ascii_case(&class_label))
        .map(|(_, &code)| code)
        .ok_or_else(|| anyhow!("unrecognized class label {class_label:?}"))?;

    Ok(SafetyRecord {
        area: normalize(&fill(COL_AREA)),
        zone: normalize(&fill(COL_ZONE)),
        time: normalize(&fill(COL_TIME)),
        people_frequency: fill(COL_PEOPLE_FREQUENCY),
        is_police_station: fill(COL_POLICE_STATION),
        is_bar: fill(COL_BAR),
        tier: fill(COL_TIER),
        residence_level: fill(COL_RESIDENCE_LEVEL),
        class: Safety::from_code(code as usize),
    })
}

/// Reads and cleans records from any CSV reader.
pub fn read_records<R: std::io::Read>(
    mut rdr: csv::Reader<R>,
    cfg: &CleaningConfig,
) -> Result<Vec<SafetyRecord>> {
    let headers = rdr.headers()?.clone();
    let index_of = |name: &str| headers.iter().position(|h| h.trim() == name);

    for required in [COL_AREA, COL_ZONE, COL_TIME, COL_CLASS] {
        if index_of(required).is_none() {
            bail!("missing required column {required:?}");
        }
    }
    let missing_aux: Vec<_> = AUX_COLUMNS
        .iter()
        .filter(|c| index_of(c).is_none())
        .collect();
    if !missing_aux.is_empty() {
        debug!(columns = ?missing_aux, "auxiliary columns absent, filling defaults");
    }

    let mut records = Vec::new();
    for (row, result) in rdr.records().enumerate() {
        let raw = result.with_context(|| format!("invalid CSV row {}", row + 1))?;
        let record = clean_row(|col| index_of(col).and_then(|i| raw.get(i)), cfg)
            .with_context(|| format!("row {}", row + 1))?;
        records.push(record);
    }
    Ok(records)
}

/// Loads a city CSV and cleans every row.
pub fn load_records(path: &Path, cfg: &CleaningConfig) -> Result<Vec<SafetyRecord>> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    read_records(csv::Reader::from_reader(file), cfg)
        .with_context(|| format!("failed to load {}", path.display()))
}
