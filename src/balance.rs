//! Class balancing (SMOTE) and stratified train/test splitting.

use anyhow::Result;
use ndarray::{Array1, Array2, Axis};
use rand::Rng;
use rand::SeedableRng;
use rand::seq::{IndexedRandom, SliceRandom};
use rand_chacha::ChaCha8Rng;
use std::fmt;
use tracing::info;

use crate::config::TrainingConfig;

/// Raised when every row carries the same label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleClassError {
    pub label: usize,
    pub rows: usize,
}

impl fmt::Display for SingleClassError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "all {} rows are labelled {}; cannot stratify or train a binary classifier",
            self.rows, self.label
        )
    }
}

impl std::error::Error for SingleClassError {}

/// Per-class row counts for binary labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassCounts {
    pub negative: usize,
    pub positive: usize,
}

impl ClassCounts {
    pub fn of(y: &Array1<usize>) -> Self {
        let positive = y.iter().filter(|&&l| l == 1).count();
        ClassCounts {
            negative: y.len() - positive,
            positive,
        }
    }

    /// `minority / majority` over the classes that are present.
    pub fn ratio(&self) -> f64 {
        let (lo, hi) = self.min_max();
        if hi == 0 { 1.0 } else { lo as f64 / hi as f64 }
    }

    fn min_max(&self) -> (usize, usize) {
        let present: Vec<usize> = [self.negative, self.positive]
            .into_iter()
            .filter(|&c| c > 0)
            .collect();
        let lo = present.iter().copied().min().unwrap_or(0);
        let hi = present.iter().copied().max().unwrap_or(0);
        (lo, hi)
    }

    /// The label with fewer rows (ties go to 0).
    pub fn minority_label(&self) -> usize {
        if self.positive < self.negative { 1 } else { 0 }
    }
}

/// Output of [`balance`].
#[derive(Debug, Clone)]
pub struct Balanced {
    pub x: Array2<f64>,
    pub y: Array1<usize>,
    pub before: ClassCounts,
    pub after: ClassCounts,
    pub synthetic: usize,
}

/// Oversamples the minority class to parity when its ratio to the majority
/// is under `cfg.imbalance_threshold`; otherwise returns the data as is.
pub fn balance(x: &Array2<f64>, y: &Array1<usize>, cfg: &TrainingConfig) -> Result<Balanced> {
    let before = ClassCounts::of(y);
    if before.negative == 0 || before.positive == 0 {
        let label = if before.positive > 0 { 1 } else { 0 };
        return Err(SingleClassError {
            label,
            rows: y.len(),
        }
        .into());
    }

    if before.ratio() >= cfg.imbalance_threshold {
        return Ok(Balanced {
            x: x.clone(),
            y: y.clone(),
            before,
            after: before,
            synthetic: 0,
        });
    }

    let minority = before.minority_label();
    let (lo, hi) = before.min_max();
    let samples: Vec<usize> = (0..y.len()).filter(|&i| y[i] == minority).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(cfg.seed);
    let synthetic = smote(x, &samples, hi - lo, cfg.smote_neighbors, &mut rng);

    let n_new = synthetic.nrows();
    let bx = ndarray::concatenate(Axis(0), &[x.view(), synthetic.view()])?;
    let mut labels = y.to_vec();
    labels.extend(std::iter::repeat_n(minority, n_new));
    let by = Array1::from_vec(labels);
    let after = ClassCounts::of(&by);

    info!(
        minority,
        before_ratio = before.ratio(),
        synthetic = n_new,
        "oversampled minority class"
    );

    Ok(Balanced {
        x: bx,
        y: by,
        before,
        after,
        synthetic: n_new,
    })
}

/// Generates `n` synthetic rows by interpolating each picked minority sample
/// towards one of its `k` nearest minority neighbours.
pub fn smote(
    x: &Array2<f64>,
    minority: &[usize],
    n: usize,
    k: usize,
    rng: &mut impl Rng,
) -> Array2<f64> {
    let width = x.ncols();
    if minority.is_empty() {
        return Array2::zeros((0, width));
    }
    let mut out = Array2::zeros((n, width));

    let neighbours: Vec<Vec<usize>> = minority
        .iter()
        .map(|&i| nearest(x, i, minority, k))
        .collect();

    for mut row in out.axis_iter_mut(Axis(0)) {
        let pick = rng.random_range(0..minority.len());
        let base = x.row(minority[pick]);
        match neighbours[pick].choose(rng) {
            Some(&nb) => {
                let gap: f64 = rng.random();
                let other = x.row(nb);
                for j in 0..width {
                    row[j] = base[j] + gap * (other[j] - base[j]);
                }
            }
            // A lone minority sample can only be duplicated.
            None => row.assign(&base),
        }
    }
    out
}

fn nearest(x: &Array2<f64>, of: usize, pool: &[usize], k: usize) -> Vec<usize> {
    let origin = x.row(of);
    let mut dists: Vec<(usize, f64)> = pool
        .iter()
        .filter(|&&j| j != of)
        .map(|&j| {
            let d = x
                .row(j)
                .iter()
                .zip(origin.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>();
            (j, d)
        })
        .collect();
    dists.sort_by(|a, b| a.1.total_cmp(&b.1));
    dists.into_iter().take(k).map(|(j, _)| j).collect()
}

/// Train/test partition.
#[derive(Debug, Clone)]
pub struct Split {
    pub x_train: Array2<f64>,
    pub y_train: Array1<usize>,
    pub x_test: Array2<f64>,
    pub y_test: Array1<usize>,
}

/// Stratified split: each class contributes `round(n_c * test_ratio)` rows
/// (at least one when it has two or more) to the test side.
pub fn stratified_split(
    x: &Array2<f64>,
    y: &Array1<usize>,
    test_ratio: f64,
    seed: u64,
) -> Split {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train_idx = Vec::new();
    let mut test_idx = Vec::new();

    for label in [0usize, 1] {
        let mut class: Vec<usize> = (0..y.len()).filter(|&i| y[i] == label).collect();
        class.shuffle(&mut rng);
        let mut n_test = (class.len() as f64 * test_ratio).round() as usize;
        if n_test == 0 && class.len() >= 2 && test_ratio > 0.0 {
            n_test = 1;
        }
        test_idx.extend_from_slice(&class[..n_test]);
        train_idx.extend_from_slice(&class[n_test..]);
    }
    train_idx.shuffle(&mut rng);
    test_idx.shuffle(&mut rng);

    Split {
        x_train: x.select(Axis(0), &train_idx),
        y_train: y.select(Axis(0), &train_idx),
        x_test: x.select(Axis(0), &test_idx),
        y_test: y.select(Axis(0), &test_idx),
    }
}
