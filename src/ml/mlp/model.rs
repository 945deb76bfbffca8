use serde::{Deserialize, Serialize};

pub const MODEL_VERSION: i64 = 2;

/// Fully connected layer; `weights` is row-major `outputs x inputs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    pub inputs: usize,
    pub outputs: usize,
    pub weights: Vec<f32>,
    pub bias: Vec<f32>,
}

impl DenseLayer {
    pub fn zeros(inputs: usize, outputs: usize) -> Self {
        Self {
            inputs,
            outputs,
            weights: vec![0.0; inputs * outputs],
            bias: vec![0.0; outputs],
        }
    }

    pub fn forward(&self, input: &[f32], out: &mut [f32]) {
        for (o, slot) in out.iter_mut().enumerate().take(self.outputs) {
            let row = &self.weights[o * self.inputs..(o + 1) * self.inputs];
            let mut sum = self.bias[o];
            for (w, x) in row.iter().zip(input) {
                sum += w * x;
            }
            *slot = sum;
        }
    }

    fn check(&self, name: &str) -> Result<(), String> {
        if self.weights.len() != self.inputs * self.outputs {
            return Err(format!("{name} weights length mismatch"));
        }
        if self.bias.len() != self.outputs {
            return Err(format!("{name} bias length mismatch"));
        }
        Ok(())
    }
}

/// Batch normalization parameters plus the running statistics used at inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchNorm {
    pub gamma: Vec<f32>,
    pub beta: Vec<f32>,
    pub running_mean: Vec<f32>,
    pub running_var: Vec<f32>,
    pub epsilon: f32,
}

impl BatchNorm {
    pub fn identity(units: usize) -> Self {
        Self {
            gamma: vec![1.0; units],
            beta: vec![0.0; units],
            running_mean: vec![0.0; units],
            running_var: vec![1.0; units],
            epsilon: 1e-3,
        }
    }

    pub fn units(&self) -> usize {
        self.gamma.len()
    }

    fn apply_running(&self, values: &mut [f32]) {
        for (j, value) in values.iter_mut().enumerate() {
            let inv_std = 1.0 / (self.running_var[j] + self.epsilon).sqrt();
            *value = self.gamma[j] * (*value - self.running_mean[j]) * inv_std + self.beta[j];
        }
    }
}

/// Dense -> ReLU -> batch norm. Dropout only exists at training time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HiddenBlock {
    pub dense: DenseLayer,
    pub norm: BatchNorm,
}

/// Feed-forward classifier with normalized hidden blocks and a softmax head.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlpModel {
    pub model_version: i64,
    pub feature_len_f32: usize,
    pub classes: Vec<String>,
    pub hidden: Vec<HiddenBlock>,
    pub output: DenseLayer,
    pub feature_mean: Vec<f32>,
    pub feature_std: Vec<f32>,
}

impl MlpModel {
    pub fn validate(&self) -> Result<(), String> {
        if self.model_version != MODEL_VERSION {
            return Err(format!(
                "Unsupported model_version {} (expected {MODEL_VERSION})",
                self.model_version
            ));
        }
        if self.classes.is_empty() {
            return Err("Model has no classes".to_string());
        }
        if self.feature_mean.len() != self.feature_len_f32 {
            return Err("feature_mean length mismatch".to_string());
        }
        if self.feature_std.len() != self.feature_len_f32 {
            return Err("feature_std length mismatch".to_string());
        }
        let mut width = self.feature_len_f32;
        for (idx, block) in self.hidden.iter().enumerate() {
            let name = format!("hidden[{idx}]");
            block.dense.check(&name)?;
            if block.dense.inputs != width {
                return Err(format!("{name} expects {} inputs, got {width}", block.dense.inputs));
            }
            let units = block.dense.outputs;
            let norm = &block.norm;
            if norm.units() != units
                || norm.beta.len() != units
                || norm.running_mean.len() != units
                || norm.running_var.len() != units
            {
                return Err(format!("{name} batch norm length mismatch"));
            }
            width = units;
        }
        self.output.check("output")?;
        if self.output.inputs != width {
            return Err(format!(
                "output expects {} inputs, got {width}",
                self.output.inputs
            ));
        }
        if self.output.outputs != self.classes.len() {
            return Err("output width does not match class count".to_string());
        }
        Ok(())
    }

    /// Class probabilities, or an empty vector when `features` has the wrong length.
    pub fn predict_proba(&self, features: &[f32]) -> Vec<f32> {
        if features.len() != self.feature_len_f32 {
            return Vec::new();
        }
        self.forward_normalized(&self.normalize(features))
    }

    pub fn predict_class_index(&self, features: &[f32]) -> Option<usize> {
        argmax(&self.predict_proba(features))
    }

    pub(crate) fn normalize(&self, features: &[f32]) -> Vec<f32> {
        features
            .iter()
            .zip(self.feature_mean.iter().zip(&self.feature_std))
            .map(|(value, (mean, std))| (value - mean) / std.max(1e-6))
            .collect()
    }

    /// Inference-mode forward pass on an already standardized row.
    pub(crate) fn forward_normalized(&self, normalized: &[f32]) -> Vec<f32> {
        let mut activations = normalized.to_vec();
        for block in &self.hidden {
            let mut next = vec![0.0f32; block.dense.outputs];
            block.dense.forward(&activations, &mut next);
            for value in next.iter_mut() {
                *value = value.max(0.0);
            }
            block.norm.apply_running(&mut next);
            activations = next;
        }
        let mut logits = vec![0.0f32; self.output.outputs];
        self.output.forward(&activations, &mut logits);
        softmax(&logits)
    }
}

/// Index of the highest score; ties resolve to the lowest index.
pub fn argmax(scores: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (idx, &score) in scores.iter().enumerate() {
        if best.is_none_or(|(_, best_score)| score > best_score) {
            best = Some((idx, score));
        }
    }
    best.map(|(idx, _)| idx)
}

pub fn softmax(raw: &[f32]) -> Vec<f32> {
    let mut out = vec![0.0f32; raw.len()];
    softmax_into(raw, &mut out);
    out
}

pub(crate) fn softmax_into(raw: &[f32], out: &mut [f32]) {
    if raw.is_empty() {
        return;
    }
    let max = raw.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut sum = 0.0f32;
    for (slot, &value) in out.iter_mut().zip(raw) {
        let e = (value - max).exp();
        *slot = e;
        sum += e;
    }
    if sum == 0.0 || !sum.is_finite() {
        let uniform = 1.0 / raw.len() as f32;
        out.iter_mut().for_each(|slot| *slot = uniform);
        return;
    }
    out.iter_mut().for_each(|slot| *slot /= sum);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_model() -> MlpModel {
        let mut hidden = DenseLayer::zeros(2, 2);
        hidden.weights = vec![1.0, 0.0, 0.0, 1.0];
        let mut output = DenseLayer::zeros(2, 2);
        output.weights = vec![1.0, 0.0, 0.0, 1.0];
        MlpModel {
            model_version: MODEL_VERSION,
            feature_len_f32: 2,
            classes: vec!["open".into(), "fist".into()],
            hidden: vec![HiddenBlock {
                dense: hidden,
                norm: BatchNorm::identity(2),
            }],
            output,
            feature_mean: vec![0.0; 2],
            feature_std: vec![1.0; 2],
        }
    }

    #[test]
    fn softmax_output_sums_to_one() {
        let out = softmax(&[1.0, 2.0, 3.0]);
        let sum: f32 = out.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(out[2] > out[1] && out[1] > out[0]);
    }

    #[test]
    fn predicts_dominant_input() {
        let model = tiny_model();
        model.validate().unwrap();
        assert_eq!(model.predict_class_index(&[5.0, 0.0]), Some(0));
        assert_eq!(model.predict_class_index(&[0.0, 5.0]), Some(1));
    }

    #[test]
    fn wrong_length_predicts_nothing() {
        let model = tiny_model();
        assert!(model.predict_proba(&[1.0]).is_empty());
        assert_eq!(model.predict_class_index(&[1.0, 2.0, 3.0]), None);
    }

    #[test]
    fn validate_catches_shape_drift() {
        let mut model = tiny_model();
        model.classes.push("extra".into());
        assert!(model.validate().is_err());
    }

    #[test]
    fn argmax_prefers_first_of_ties() {
        assert_eq!(argmax(&[0.5, 0.5]), Some(0));
        assert_eq!(argmax(&[]), None);
    }
}
