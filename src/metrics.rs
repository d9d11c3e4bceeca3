//! Binary classification metrics with Safe (1) as the positive class.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub tp: usize,
    pub fp: usize,
    pub tn: usize,
    pub fn_count: usize,
}

impl Evaluation {
    /// Scores `predictions` against `truth`. Undefined ratios are reported as 0.
    pub fn compute<'a>(
        predictions: impl IntoIterator<Item = &'a usize>,
        truth: impl IntoIterator<Item = &'a usize>,
    ) -> Self {
        let (mut tp, mut fp, mut tn, mut fn_count) = (0, 0, 0, 0);
        for (&pred, &label) in predictions.into_iter().zip(truth) {
            match (pred, label) {
                (1, 1) => tp += 1,
                (1, _) => fp += 1,
                (_, 1) => fn_count += 1,
                _ => tn += 1,
            }
        }

        let total = tp + fp + tn + fn_count;
        let ratio = |num: usize, den: usize| if den > 0 { num as f64 / den as f64 } else { 0.0 };
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_count);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Evaluation {
            accuracy: ratio(tp + tn, total),
            precision,
            recall,
            f1,
            tp,
            fp,
            tn,
            fn_count,
        }
    }

    /// Rows are the true class, columns the predicted class, Unsafe first.
    pub fn confusion_matrix(&self) -> [[usize; 2]; 2] {
        [[self.tn, self.fp], [self.fn_count, self.tp]]
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [[tn, fp], [fn_, tp]] = self.confusion_matrix();
        writeln!(f, "Accuracy: {:.4}", self.accuracy)?;
        writeln!(f, "Confusion Matrix:")?;
        writeln!(f, "[[{tn:>4} {fp:>4}]")?;
        writeln!(f, " [{fn_:>4} {tp:>4}]]")?;
        writeln!(f, "Precision: {:.4}", self.precision)?;
        writeln!(f, "Recall: {:.4}", self.recall)?;
        write!(f, "F1-Score: {:.4}", self.f1)
    }
}
