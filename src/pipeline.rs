//! Per-dataset training run: clean, encode, balance, split, train, persist.

use anyhow::{Context, Result};
use ndarray::Array1;
use std::path::Path;
use tracing::{error, info, warn};

use crate::balance::{ClassCounts, balance, stratified_split};
use crate::classifier::ModelKind;
use crate::config::{DatasetSource, PipelineConfig};
use crate::encoder::{encode_features, fit_feature_encoder, fit_full_encoder};
use crate::record::{SafetyRecord, load_records};
use crate::store::{ArtifactKind, ArtifactStore, save_artifact};
use crate::trainer::{ModelReport, print_report, train_and_select};

/// What one dataset's training run produced.
#[derive(Debug, Clone)]
pub struct TrainingSummary {
    pub dataset: String,
    pub rows: usize,
    pub before: ClassCounts,
    pub after: ClassCounts,
    pub best: ModelKind,
    pub best_accuracy: f64,
    pub reports: Vec<ModelReport>,
}

#[derive(Debug)]
pub enum Outcome {
    Trained(TrainingSummary),
    /// The persisted model is newer than the CSV.
    Skipped,
}

/// Trains on already-cleaned records and persists encoder and best model under `dataset`.
pub fn train_records(
    dataset: &str,
    records: &[SafetyRecord],
    cfg: &PipelineConfig,
    store: &mut dyn ArtifactStore,
) -> Result<TrainingSummary> {
    let encoder = fit_feature_encoder(records)?;
    let x = encode_features(&encoder, records)?;
    let y: Array1<usize> = records.iter().map(|r| r.class.code()).collect();

    let balanced = balance(&x, &y, &cfg.training)?;
    let split = stratified_split(&balanced.x, &balanced.y, cfg.training.test_ratio, cfg.training.seed);
    info!(
        dataset,
        train = split.y_train.len(),
        test = split.y_test.len(),
        "split prepared"
    );
    if split.y_test.is_empty() {
        warn!(dataset, "no class has enough rows for a test split, every accuracy will be 0");
    }

    let selection = train_and_select(&split, &ModelKind::ALL, &cfg.training)?;
    print_report(dataset, &selection);

    // Encoder and model are written together, after selection; a failed run leaves the stored pair as it was.
    save_artifact(store, ArtifactKind::Encoder, dataset, &encoder)?;
    println!("Encoder saved: {}", ArtifactKind::Encoder.file_name(dataset));
    save_artifact(store, ArtifactKind::Model, dataset, &selection.best)?;
    println!("Model saved as: {}", ArtifactKind::Model.file_name(dataset));

    Ok(TrainingSummary {
        dataset: dataset.to_string(),
        rows: records.len(),
        before: balanced.before,
        after: balanced.after,
        best: selection.best_kind(),
        best_accuracy: selection.best_accuracy,
        reports: selection.reports,
    })
}

/// Loads `source` from `data_dir` and trains it.
pub fn train_dataset(
    source: &DatasetSource,
    data_dir: &Path,
    cfg: &PipelineConfig,
    store: &mut dyn ArtifactStore,
) -> Result<TrainingSummary> {
    let path = source.resolved(data_dir);
    println!("\nProcessing dataset: {}", path.display());
    let records = load_records(&path, &cfg.cleaning)?;
    train_records(&source.key(), &records, cfg, store)
        .with_context(|| format!("training failed for {}", source.city))
}

/// True when the stored model is at least as new as the CSV it came from.
pub fn is_fresh(source: &DatasetSource, data_dir: &Path, store: &dyn ArtifactStore) -> bool {
    let Some(model_mtime) = store.modified(ArtifactKind::Model, &source.key()) else {
        return false;
    };
    source
        .resolved(data_dir)
        .metadata()
        .and_then(|m| m.modified())
        .map(|csv_mtime| csv_mtime <= model_mtime)
        .unwrap_or(false)
}

/// Trains each dataset in turn. A failure is logged and the next dataset still runs.
pub fn train_all<'a>(
    sources: impl IntoIterator<Item = &'a DatasetSource>,
    data_dir: &Path,
    cfg: &PipelineConfig,
    store: &mut dyn ArtifactStore,
    skip_fresh: bool,
) -> Vec<(String, Result<Outcome>)> {
    let mut results = Vec::new();
    for source in sources {
        if skip_fresh && is_fresh(source, data_dir, store) {
            info!(city = %source.city, "model up to date, skipping");
            results.push((source.city.clone(), Ok(Outcome::Skipped)));
            continue;
        }
        let result = train_dataset(source, data_dir, cfg, store).map(Outcome::Trained);
        if let Err(e) = &result {
            error!(city = %source.city, "{e:#}");
        }
        results.push((source.city.clone(), result));
    }
    results
}

/// Fits and persists the all-column encoder for one dataset.
pub fn regenerate_full_encoder(
    source: &DatasetSource,
    data_dir: &Path,
    cfg: &PipelineConfig,
    store: &mut dyn ArtifactStore,
) -> Result<()> {
    let records = load_records(&source.resolved(data_dir), &cfg.cleaning)?;
    if records.is_empty() {
        warn!(city = %source.city, "dataset is empty, encoder has no categories");
    }
    let encoder = fit_full_encoder(&records)?;
    save_artifact(store, ArtifactKind::FullEncoder, &source.key(), &encoder)?;
    println!(
        "✅ Encoder successfully saved as '{}'.",
        ArtifactKind::FullEncoder.file_name(&source.key())
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balance::SingleClassError;
    use crate::classifier::{Classify, TrainedModel};
    use crate::encoder::OrdinalEncoder;
    use crate::record::Safety;
    use crate::serve::{Origin, Predictor};
    use crate::store::{MemoryStore, load_artifact};
    use std::io::Write;

    fn small_config() -> PipelineConfig {
        let mut cfg = PipelineConfig::default();
        cfg.training.forest_trees = 10;
        cfg
    }

    fn write_csv(dir: &Path, name: &str, rows: &[(&str, &str, &str, &str)]) {
        let mut file = std::fs::File::create(dir.join(name)).unwrap();
        writeln!(file, "Area,Zone,Time,Class,People.Frequency,Is.Police_Station,Is.Bar,Tier,Residence.Level").unwrap();
        for (area, zone, time, class) in rows {
            writeln!(file, "{area},{zone},{time},{class},High,No,No,Middle,Medium").unwrap();
        }
    }

    fn city_rows() -> Vec<(&'static str, &'static str, &'static str, &'static str)> {
        let mut rows = Vec::new();
        for area in ["Adyar", "Guindy", "Tambaram", "Velachery"] {
            for zone in ["North", "South"] {
                for time in ["Morning", "Afternoon", "Evening", "Night"] {
                    let class = if time == "Night" { "Unsafe" } else { "Safe" };
                    rows.push((area, zone, time, class));
                }
            }
        }
        rows
    }

    #[test]
    fn trains_and_persists_both_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path(), "chennai.csv", &city_rows());
        let source = DatasetSource::new("Chennai", "chennai.csv");
        let mut store = MemoryStore::new();

        let summary = train_dataset(&source, dir.path(), &small_config(), &mut store).unwrap();
        assert_eq!(summary.dataset, "chennai");
        assert_eq!(summary.rows, 32);
        // 8 unsafe vs 24 safe is under the threshold
        assert_eq!(summary.after.negative, summary.after.positive);
        assert_eq!(summary.reports.len(), 3);

        let encoder: OrdinalEncoder = load_artifact(&store, ArtifactKind::Encoder, "chennai").unwrap();
        assert_eq!(encoder.categories(2), ["afternoon", "evening", "morning", "night"]);
        let model: TrainedModel = load_artifact(&store, ArtifactKind::Model, "chennai").unwrap();
        assert_eq!(model.kind(), summary.best);
        let x = encoder.transform(&[vec!["adyar", "north", "morning"]]).unwrap();
        assert_eq!(model.predict_labels(&x).len(), 1);
    }

    #[test]
    fn single_class_dataset_fails_without_stopping_others() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path(), "good.csv", &city_rows());
        write_csv(
            dir.path(),
            "flat.csv",
            &[("a", "b", "night", "Safe"), ("c", "d", "morning", "Safe")],
        );
        let sources = [
            DatasetSource::new("Flat", "flat.csv"),
            DatasetSource::new("Good", "good.csv"),
        ];
        let mut store = MemoryStore::new();

        let results = train_all(&sources, dir.path(), &small_config(), &mut store, false);
        assert_eq!(results.len(), 2);
        let err = results[0].1.as_ref().unwrap_err();
        assert!(err.chain().any(|c| c.downcast_ref::<SingleClassError>().is_some()));
        assert!(matches!(results[1].1, Ok(Outcome::Trained(_))));
        assert!(store.get(ArtifactKind::Model, "flat").unwrap().is_none());
        assert!(store.get(ArtifactKind::Model, "good").unwrap().is_some());
    }

    #[test]
    fn failed_retrain_keeps_previous_encoder_and_model() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path(), "city.csv", &city_rows());
        let source = DatasetSource::new("City", "city.csv");
        let mut store = MemoryStore::new();
        train_dataset(&source, dir.path(), &small_config(), &mut store).unwrap();
        let encoder_before = store.get(ArtifactKind::Encoder, "city").unwrap().unwrap();
        let model_before = store.get(ArtifactKind::Model, "city").unwrap().unwrap();

        write_csv(
            dir.path(),
            "city.csv",
            &[("aaa", "north", "night", "Safe"), ("zzz", "south", "morning", "Safe")],
        );
        let err = train_dataset(&source, dir.path(), &small_config(), &mut store).unwrap_err();
        assert!(err.chain().any(|c| c.downcast_ref::<SingleClassError>().is_some()));

        assert_eq!(store.get(ArtifactKind::Encoder, "city").unwrap().unwrap(), encoder_before);
        assert_eq!(store.get(ArtifactKind::Model, "city").unwrap().unwrap(), model_before);
        let encoder: OrdinalEncoder = load_artifact(&store, ArtifactKind::Encoder, "city").unwrap();
        assert_eq!(encoder.categories(0), ["adyar", "guindy", "tambaram", "velachery"]);
    }

    #[test]
    fn two_row_dataset_trains_and_serves_from_lookup() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(
            dir.path(),
            "tiny.csv",
            &[("a", "b", "night", "Unsafe"), ("c", "d", "morning", "Safe")],
        );
        let source = DatasetSource::new("Tiny", "tiny.csv");
        let cfg = small_config();
        let mut store = MemoryStore::new();

        let summary = train_dataset(&source, dir.path(), &cfg, &mut store).unwrap();
        // one row per class, nothing left for the test side
        for report in &summary.reports {
            let e = report.evaluation;
            assert_eq!(e.tp + e.fp + e.tn + e.fn_count, 0);
        }
        assert_eq!(summary.best, ModelKind::Logistic);
        assert_eq!(summary.best_accuracy, 0.0);

        let predictor = Predictor::load(&source, dir.path(), &store, &cfg.cleaning).unwrap();
        let unsafe_hit = predictor.predict("a", "b", "night").unwrap();
        assert_eq!((unsafe_hit.origin, unsafe_hit.label), (Origin::Lookup, Safety::Unsafe));
        let safe_hit = predictor.predict("c", "d", "morning").unwrap();
        assert_eq!((safe_hit.origin, safe_hit.label), (Origin::Lookup, Safety::Safe));
    }

    #[test]
    fn fresh_models_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path(), "good.csv", &city_rows());
        let sources = [DatasetSource::new("Good", "good.csv")];
        let mut store = crate::store::FsStore::new(dir.path().join("artifacts"));

        let first = train_all(&sources, dir.path(), &small_config(), &mut store, true);
        assert!(matches!(first[0].1, Ok(Outcome::Trained(_))));
        let second = train_all(&sources, dir.path(), &small_config(), &mut store, true);
        assert!(matches!(second[0].1, Ok(Outcome::Skipped)));
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let source = DatasetSource::new("Nowhere", "absent.csv");
        let mut store = MemoryStore::new();
        let err = train_dataset(&source, dir.path(), &small_config(), &mut store).unwrap_err();
        assert!(format!("{err:#}").contains("absent.csv"));
    }

    #[test]
    fn full_encoder_is_stored_under_its_own_name() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path(), "good.csv", &city_rows());
        let source = DatasetSource::new("Good", "good.csv");
        let mut store = MemoryStore::new();
        regenerate_full_encoder(&source, dir.path(), &small_config(), &mut store).unwrap();
        let enc: OrdinalEncoder = load_artifact(&store, ArtifactKind::FullEncoder, "good").unwrap();
        assert_eq!(enc.columns().len(), 8);
    }
}
