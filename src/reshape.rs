//! Reshaping a raw crime log (`Place`, `Police Station`, `Time`, `Type`) into
//! the common Area/Zone/Time schema.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;

use crate::config::ReshapeConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct RawCrime {
    #[serde(rename = "Place", default)]
    pub place: Option<String>,
    #[serde(rename = "Police Station", default)]
    pub police_station: Option<String>,
    #[serde(rename = "Time", default)]
    pub time: Option<String>,
    #[serde(rename = "Type", default)]
    pub crime_type: Option<String>,
}

/// A row in the common schema, written with the shared column names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyRow {
    #[serde(rename = "Area")]
    pub area: String,
    #[serde(rename = "Zone")]
    pub zone: String,
    #[serde(rename = "Time")]
    pub time: String,
    #[serde(rename = "People.Frequency")]
    pub people_frequency: String,
    #[serde(rename = "Is.Police_Station")]
    pub is_police_station: String,
    #[serde(rename = "Is.Bar")]
    pub is_bar: String,
    #[serde(rename = "Tier")]
    pub tier: String,
    #[serde(rename = "Residence.Level")]
    pub residence_level: String,
    #[serde(rename = "Class")]
    pub class: String,
}

/// `SafetyRow` with every categorical cell replaced by its numeric code.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericRow {
    #[serde(rename = "Area")]
    pub area: String,
    #[serde(rename = "Zone")]
    pub zone: String,
    #[serde(rename = "Time")]
    pub time: Option<i64>,
    #[serde(rename = "People.Frequency")]
    pub people_frequency: Option<i64>,
    #[serde(rename = "Is.Police_Station")]
    pub is_police_station: Option<i64>,
    #[serde(rename = "Is.Bar")]
    pub is_bar: Option<i64>,
    #[serde(rename = "Tier")]
    pub tier: Option<i64>,
    #[serde(rename = "Residence.Level")]
    pub residence_level: Option<i64>,
    #[serde(rename = "Class")]
    pub class: Option<i64>,
}

/// Buckets an `HH:MM` clock time; anything unparseable is "Afternoon".
pub fn time_bucket(raw: Option<&str>) -> &'static str {
    let hour = raw
        .and_then(|t| {
            let mut parts = t.split(':');
            let h = parts.next()?;
            parts.next()?;
            if h.is_empty() || !h.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            h.parse::<u32>().ok()
        });
    match hour {
        Some(5..=11) => "Morning",
        Some(12..=16) => "Afternoon",
        Some(17..=20) => "Evening",
        Some(_) => "Night",
        None => "Afternoon",
    }
}

/// Last comma-separated component of a place, or "Unknown".
fn area_of(place: Option<&str>) -> String {
    place
        .and_then(|p| p.rsplit(',').next())
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .unwrap_or("Unknown")
        .to_string()
}

pub fn reshape_row(raw: &RawCrime, cfg: &ReshapeConfig) -> SafetyRow {
    let time = raw.time.as_deref();
    let class = raw
        .crime_type
        .as_deref()
        .and_then(|t| cfg.crime_risk.get(t))
        .map(String::as_str)
        .unwrap_or("Safe");

    SafetyRow {
        area: area_of(raw.place.as_deref()),
        zone: raw.police_station.clone().unwrap_or_default(),
        time: time_bucket(time).to_string(),
        people_frequency: "Medium".to_string(),
        is_police_station: "Yes".to_string(),
        // compares the raw clock string, so only a literal "Night" marks a bar
        is_bar: if time == Some("Night") { "Yes" } else { "No" }.to_string(),
        tier: "Middle".to_string(),
        residence_level: "Medium".to_string(),
        class: class.to_string(),
    }
}

pub fn reshape_raw(path: &Path, cfg: &ReshapeConfig) -> Result<Vec<SafetyRow>> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut rdr = csv::Reader::from_reader(file);
    let headers = rdr.headers()?.clone();
    for required in ["Place", "Police Station", "Time", "Type"] {
        if !headers.iter().any(|h| h == required) {
            bail!("{}: missing column {required:?}", path.display());
        }
    }

    let mut rows = Vec::new();
    for (i, result) in rdr.deserialize::<RawCrime>().enumerate() {
        let raw = result.with_context(|| format!("invalid row {}", i + 1))?;
        rows.push(reshape_row(&raw, cfg));
    }
    Ok(rows)
}

pub fn numeric_rows(rows: &[SafetyRow], cfg: &ReshapeConfig) -> Vec<NumericRow> {
    let code = |v: &str| cfg.numeric_codes.get(v).copied();
    rows.iter()
        .map(|r| NumericRow {
            area: r.area.clone(),
            zone: r.zone.clone(),
            time: code(&r.time),
            people_frequency: code(&r.people_frequency),
            is_police_station: code(&r.is_police_station),
            is_bar: code(&r.is_bar),
            tier: code(&r.tier),
            residence_level: code(&r.residence_level),
            class: code(&r.class),
        })
        .collect()
}

/// Writes serializable rows as a headed CSV.
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}
