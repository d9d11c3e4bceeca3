//! The three candidate classifiers and their persisted form.

use anyhow::Result;
use linfa::prelude::*;
use linfa_logistic::{FittedLogisticRegression, LogisticRegression};
use linfa_svm::Svm;
use linfa_trees::DecisionTree;
use ndarray::{Array1, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::TrainingConfig;

/// Something that maps an encoded feature matrix to 0/1 labels.
pub trait Classify {
    fn predict_labels(&self, x: &Array2<f64>) -> Array1<usize>;
}

/// Candidate classifier families, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelKind {
    Logistic,
    Svm,
    RandomForest,
}

impl ModelKind {
    /// Evaluation order; earlier kinds win accuracy ties.
    pub const ALL: [ModelKind; 3] = [ModelKind::Logistic, ModelKind::Svm, ModelKind::RandomForest];

    pub fn name(self) -> &'static str {
        match self {
            ModelKind::Logistic => "Logistic Regression",
            ModelKind::Svm => "SVM",
            ModelKind::RandomForest => "Random Forest",
        }
    }

    /// Fits this kind on `x`/`y` (labels 0 = Unsafe, 1 = Safe).
    pub fn fit(self, x: &Array2<f64>, y: &Array1<usize>, cfg: &TrainingConfig) -> Result<TrainedModel> {
        let model = match self {
            ModelKind::Logistic => {
                let dataset = Dataset::new(x.clone(), y.clone());
                let fitted = LogisticRegression::default()
                    .max_iterations(cfg.logistic_max_iterations)
                    .fit(&dataset)?;
                TrainedModel::Logistic(fitted)
            }
            ModelKind::Svm => {
                let targets = y.mapv(|l| l == 1);
                let dataset = Dataset::new(x.clone(), targets);
                let fitted = Svm::<_, bool>::params()
                    .pos_neg_weights(1.0, 1.0)
                    .gaussian_kernel(rbf_scale(x))
                    .fit(&dataset)?;
                TrainedModel::Svm(fitted)
            }
            ModelKind::RandomForest => {
                TrainedModel::RandomForest(Forest::fit(x, y, cfg.forest_trees, cfg.seed)?)
            }
        };
        Ok(model)
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Width of the gaussian kernel: `n_features * var(x)`, the usual "scale"
/// heuristic for an RBF kernel `exp(-|a - b|^2 / eps)`.
fn rbf_scale(x: &Array2<f64>) -> f64 {
    let n = x.len() as f64;
    let mean = x.sum() / n;
    let var = x.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let eps = x.ncols() as f64 * var;
    if eps.is_finite() && eps > 0.0 { eps } else { 1.0 }
}

/// Bagged ensemble of fully grown decision trees, majority vote.
///
/// Only rows are resampled per tree. Every split still considers all features, since
/// `linfa_trees::DecisionTree` has no per-split feature subsampling.
#[derive(Serialize, Deserialize)]
pub struct Forest {
    trees: Vec<DecisionTree<f64, usize>>,
}

impl Forest {
    /// Fits `n_trees` trees, each on a bootstrap sample drawn with a seeded RNG.
    pub fn fit(x: &Array2<f64>, y: &Array1<usize>, n_trees: usize, seed: u64) -> Result<Self> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let n = x.nrows();
        let mut trees = Vec::with_capacity(n_trees);

        for _ in 0..n_trees {
            let idx: Vec<usize> = (0..n).map(|_| rng.random_range(0..n)).collect();
            let sample = Dataset::new(x.select(Axis(0), &idx), y.select(Axis(0), &idx));
            trees.push(DecisionTree::params().max_depth(None).fit(&sample)?);
        }
        Ok(Forest { trees })
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }
}

impl Classify for Forest {
    fn predict_labels(&self, x: &Array2<f64>) -> Array1<usize> {
        let mut votes = Array1::<usize>::zeros(x.nrows());
        for tree in &self.trees {
            let pred: Array1<usize> = tree.predict(x);
            votes += &pred;
        }
        let n = self.trees.len();
        votes.mapv(|v| usize::from(v * 2 > n))
    }
}

/// A fitted classifier of any kind; the form persisted as `best_model_<dataset>`.
#[derive(Serialize, Deserialize)]
pub enum TrainedModel {
    Logistic(FittedLogisticRegression<f64, usize>),
    Svm(Svm<f64, bool>),
    RandomForest(Forest),
}

impl TrainedModel {
    pub fn kind(&self) -> ModelKind {
        match self {
            TrainedModel::Logistic(_) => ModelKind::Logistic,
            TrainedModel::Svm(_) => ModelKind::Svm,
            TrainedModel::RandomForest(_) => ModelKind::RandomForest,
        }
    }
}

impl Classify for TrainedModel {
    fn predict_labels(&self, x: &Array2<f64>) -> Array1<usize> {
        match self {
            TrainedModel::Logistic(m) => m.predict(x),
            TrainedModel::Svm(m) => {
                let pred: Array1<bool> = m.predict(x);
                pred.mapv(usize::from)
            }
            TrainedModel::RandomForest(f) => f.predict_labels(x),
        }
    }
}
