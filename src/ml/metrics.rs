//! Evaluation metrics for gesture classifiers.

use super::mlp::MlpModel;

/// Confusion matrix for a `K`-class classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfusionMatrix {
    pub n_classes: usize,
    /// Row-major `KxK` counts (`truth * K + predicted`).
    pub counts: Vec<u32>,
}

impl ConfusionMatrix {
    pub fn new(n_classes: usize) -> Self {
        Self {
            n_classes,
            counts: vec![0; n_classes * n_classes],
        }
    }

    /// Tally every row of `x` against its expected class in `y`.
    ///
    /// Rows the model cannot score are skipped.
    pub fn from_predictions(model: &MlpModel, x: &[Vec<f32>], y: &[usize]) -> Self {
        let mut cm = Self::new(model.classes.len());
        for (row, &truth) in x.iter().zip(y) {
            if let Some(predicted) = model.predict_class_index(row) {
                cm.add(truth, predicted);
            }
        }
        cm
    }

    pub fn add(&mut self, truth: usize, predicted: usize) {
        if truth >= self.n_classes || predicted >= self.n_classes {
            return;
        }
        let idx = truth * self.n_classes + predicted;
        self.counts[idx] = self.counts[idx].saturating_add(1);
    }

    pub fn get(&self, truth: usize, predicted: usize) -> u32 {
        self.counts[truth * self.n_classes + predicted]
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().map(|&v| u64::from(v)).sum()
    }
}

/// Precision/recall statistics for a single class.
#[derive(Debug, Clone, PartialEq)]
pub struct PerClassStats {
    /// `TP / (TP + FP)`.
    pub precision: f32,
    /// `TP / (TP + FN)`.
    pub recall: f32,
    /// Number of rows whose true class is this one.
    pub support: u32,
}

pub fn precision_recall_by_class(cm: &ConfusionMatrix) -> Vec<PerClassStats> {
    let k = cm.n_classes;
    (0..k)
        .map(|class_idx| {
            let tp = cm.get(class_idx, class_idx) as f32;
            let support: u32 = (0..k).map(|j| cm.get(class_idx, j)).sum();
            let fn_ = support as f32 - tp;
            let fp: f32 = (0..k)
                .filter(|&i| i != class_idx)
                .map(|i| cm.get(i, class_idx) as f32)
                .sum();
            PerClassStats {
                precision: if tp + fp == 0.0 { 0.0 } else { tp / (tp + fp) },
                recall: if tp + fn_ == 0.0 { 0.0 } else { tp / (tp + fn_) },
                support,
            }
        })
        .collect()
}

pub fn accuracy(cm: &ConfusionMatrix) -> f32 {
    let total = cm.total();
    if total == 0 {
        return 0.0;
    }
    let correct: u64 = (0..cm.n_classes)
        .map(|idx| u64::from(cm.get(idx, idx)))
        .sum();
    correct as f32 / total as f32
}
