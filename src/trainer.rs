//! Train every candidate kind on one split and keep the most accurate.

use anyhow::Result;
use tracing::info;

use crate::balance::Split;
use crate::classifier::{Classify, ModelKind, TrainedModel};
use crate::config::TrainingConfig;
use crate::metrics::Evaluation;

/// Metrics of one candidate on the held-out split.
#[derive(Debug, Clone)]
pub struct ModelReport {
    pub kind: ModelKind,
    pub evaluation: Evaluation,
}

/// The kept model plus the scores of every candidate.
pub struct Selection {
    pub best: TrainedModel,
    pub best_accuracy: f64,
    pub reports: Vec<ModelReport>,
}

impl Selection {
    pub fn best_kind(&self) -> ModelKind {
        self.best.kind()
    }
}

/// Keeps the first candidate and replaces it only on strictly higher accuracy,
/// so equal scores resolve to the earlier entry.
pub fn select_best<M>(candidates: impl IntoIterator<Item = (M, f64)>) -> Option<(M, f64)> {
    let mut best: Option<(M, f64)> = None;
    for (model, accuracy) in candidates {
        let replace = match &best {
            Some((_, best_acc)) => accuracy > *best_acc,
            None => true,
        };
        if replace {
            best = Some((model, accuracy));
        }
    }
    best
}

/// Fits `kinds` in order on the train side, scores each on the test side.
pub fn train_and_select(split: &Split, kinds: &[ModelKind], cfg: &TrainingConfig) -> Result<Selection> {
    let mut reports = Vec::with_capacity(kinds.len());
    let mut candidates = Vec::with_capacity(kinds.len());

    for &kind in kinds {
        let model = kind.fit(&split.x_train, &split.y_train, cfg)?;
        let predictions = model.predict_labels(&split.x_test);
        let evaluation = Evaluation::compute(&predictions, &split.y_test);
        info!(model = kind.name(), accuracy = evaluation.accuracy, "evaluated");

        reports.push(ModelReport { kind, evaluation });
        candidates.push((model, evaluation.accuracy));
    }

    let (best, best_accuracy) =
        select_best(candidates).ok_or_else(|| anyhow::anyhow!("no model kinds to train"))?;
    Ok(Selection {
        best,
        best_accuracy,
        reports,
    })
}

/// Prints every candidate's metrics and the winner, as the training run's console report.
pub fn print_report(dataset: &str, selection: &Selection) {
    println!("\nDataset: {dataset}");
    for report in &selection.reports {
        println!("\n{}", report.kind);
        println!("{}", report.evaluation);
    }
    println!(
        "\nBest Model for {dataset}: {} ({:.4})",
        selection.best_kind(),
        selection.best_accuracy
    );
}
