//! Serving predictions for a city from persisted artifacts.
//!
//! An exact (area, zone, time) row in the city's data wins over the model;
//! only unmatched queries reach the classifier.

use anyhow::Result;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::classifier::{Classify, TrainedModel};
use crate::config::{CleaningConfig, DatasetSource};
use crate::encoder::{OrdinalEncoder, UNKNOWN_CODE};
use crate::record::{Safety, SafetyRecord, load_records, normalize};
use crate::store::{ArtifactKind, ArtifactStore, load_artifact};

const UNKNOWN_DETAIL: &str = "Unknown";

/// Where a prediction came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Lookup,
    Model,
}

/// Display attributes shown next to a prediction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Details {
    pub people_frequency: String,
    pub is_police_station: String,
    pub is_bar: String,
    pub tier: String,
    pub residence_level: String,
}

impl Details {
    fn from_record(r: &SafetyRecord) -> Self {
        Details {
            people_frequency: r.people_frequency.clone(),
            is_police_station: r.is_police_station.clone(),
            is_bar: r.is_bar.clone(),
            tier: r.tier.clone(),
            residence_level: r.residence_level.clone(),
        }
    }

    fn unknown() -> Self {
        let u = || UNKNOWN_DETAIL.to_string();
        Details {
            people_frequency: u(),
            is_police_station: u(),
            is_bar: u(),
            tier: u(),
            residence_level: u(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prediction {
    pub label: Safety,
    pub origin: Origin,
    pub details: Details,
}

/// A city's encoder, model and historical rows.
pub struct Predictor<M = TrainedModel> {
    encoder: OrdinalEncoder,
    model: M,
    records: Vec<SafetyRecord>,
}

impl Predictor<TrainedModel> {
    /// Loads the artifacts of `source` and its cleaned CSV.
    pub fn load(
        source: &DatasetSource,
        data_dir: &Path,
        store: &dyn ArtifactStore,
        cleaning: &CleaningConfig,
    ) -> Result<Self> {
        let key = source.key();
        let model: TrainedModel = load_artifact(store, ArtifactKind::Model, &key)?;
        let encoder: OrdinalEncoder = load_artifact(store, ArtifactKind::Encoder, &key)?;
        let records = load_records(&source.resolved(data_dir), cleaning)?;
        info!(city = %source.city, model = model.kind().name(), rows = records.len(), "predictor loaded");
        Ok(Predictor::new(encoder, model, records))
    }
}

impl<M: Classify> Predictor<M> {
    /// Unseen categories in `encoder` are switched to encode as `UNKNOWN_CODE`.
    pub fn new(encoder: OrdinalEncoder, model: M, records: Vec<SafetyRecord>) -> Self {
        Predictor {
            encoder: encoder.with_unknown_value(UNKNOWN_CODE),
            model,
            records,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Distinct areas, sorted.
    pub fn areas(&self) -> Vec<String> {
        let set: BTreeSet<&str> = self.records.iter().map(|r| r.area.as_str()).collect();
        set.into_iter().map(str::to_string).collect()
    }

    /// Distinct zones seen in `area`, sorted.
    pub fn zones(&self, area: &str) -> Vec<String> {
        let area = normalize(area);
        let set: BTreeSet<&str> = self
            .records
            .iter()
            .filter(|r| r.area == area)
            .map(|r| r.zone.as_str())
            .collect();
        set.into_iter().map(str::to_string).collect()
    }

    /// Distinct times seen at (`area`, `zone`), sorted.
    pub fn times(&self, area: &str, zone: &str) -> Vec<String> {
        let (area, zone) = (normalize(area), normalize(zone));
        let set: BTreeSet<&str> = self
            .records
            .iter()
            .filter(|r| r.area == area && r.zone == zone)
            .map(|r| r.time.as_str())
            .collect();
        set.into_iter().map(str::to_string).collect()
    }

    /// First historical row at exactly this key, if any.
    pub fn lookup(&self, area: &str, zone: &str, time: &str) -> Option<&SafetyRecord> {
        let (area, zone, time) = (normalize(area), normalize(zone), normalize(time));
        self.records.iter().find(|r| r.matches(&area, &zone, &time))
    }

    pub fn predict(&self, area: &str, zone: &str, time: &str) -> Result<Prediction> {
        if let Some(record) = self.lookup(area, zone, time) {
            return Ok(Prediction {
                label: record.class,
                origin: Origin::Lookup,
                details: Details::from_record(record),
            });
        }

        let row = vec![normalize(area), normalize(zone), normalize(time)];
        let x = self.encoder.transform(&[row])?;
        let code = self.model.predict_labels(&x)[0];
        Ok(Prediction {
            label: Safety::from_code(code),
            origin: Origin::Model,
            details: Details::unknown(),
        })
    }
}

/// Load state of one city, memoized by [`Catalog`].
pub enum CityState {
    Ready(Predictor),
    /// Artifacts could not be loaded; prediction is disabled for the city.
    Unavailable(String),
}

/// Per-process cache of predictors keyed by city.
pub struct Catalog<S> {
    sources: Vec<DatasetSource>,
    data_dir: PathBuf,
    store: S,
    cleaning: CleaningConfig,
    loaded: HashMap<String, CityState>,
}

impl<S: ArtifactStore> Catalog<S> {
    pub fn new(
        sources: Vec<DatasetSource>,
        data_dir: impl Into<PathBuf>,
        store: S,
        cleaning: CleaningConfig,
    ) -> Self {
        Catalog {
            sources,
            data_dir: data_dir.into(),
            store,
            cleaning,
            loaded: HashMap::new(),
        }
    }

    pub fn cities(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.city.as_str()).collect()
    }

    /// Loads the city on first use; later calls return the cached state,
    /// including a cached failure.
    pub fn state(&mut self, city: &str) -> &CityState {
        let key = city.to_lowercase();
        if !self.loaded.contains_key(&key) {
            let state = match self.sources.iter().find(|s| s.city.eq_ignore_ascii_case(city)) {
                None => CityState::Unavailable(format!("unknown city {city:?}")),
                Some(source) => {
                    match Predictor::load(source, &self.data_dir, &self.store, &self.cleaning) {
                        Ok(p) => CityState::Ready(p),
                        Err(e) => {
                            warn!(city, "prediction disabled: {e:#}");
                            CityState::Unavailable(format!("Error loading model for {city}: {e:#}"))
                        }
                    }
                }
            };
            self.loaded.insert(key.clone(), state);
        }
        &self.loaded[&key]
    }

    /// The ready predictor for `city`, or the reason it is unavailable.
    pub fn predictor(&mut self, city: &str) -> Result<&Predictor, String> {
        match self.state(city) {
            CityState::Ready(p) => Ok(p),
            CityState::Unavailable(msg) => Err(msg.clone()),
        }
    }
}
