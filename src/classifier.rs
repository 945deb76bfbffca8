//! Trained gesture model bundled with the context it was trained in.

use serde::{Deserialize, Serialize};

use crate::ml::mlp::{MlpModel, argmax};
use crate::pose::Topology;

/// Topology, vector length and label order a classifier was trained against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub topology: Topology,
    pub feature_len: usize,
    /// Label names by class index.
    pub labels: Vec<String>,
}

impl ModelDescriptor {
    /// Reason the descriptor cannot score vectors from `topology`, if any.
    pub fn check_compatible(&self, topology: &Topology) -> Result<(), String> {
        if &self.topology != topology {
            return Err(format!(
                "model trained on a different topology ({} connections, pivot {:?}; current {} connections, pivot {:?})",
                self.topology.len(),
                self.topology.pivot,
                topology.len(),
                topology.pivot
            ));
        }
        Ok(())
    }
}

/// Best label for one feature vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub index: usize,
    pub label: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GestureModel {
    pub descriptor: ModelDescriptor,
    pub classifier: MlpModel,
}

impl GestureModel {
    pub fn validate(&self) -> Result<(), String> {
        self.classifier.validate()?;
        if self.classifier.feature_len_f32 != self.descriptor.feature_len {
            return Err(format!(
                "classifier expects {} features but descriptor records {}",
                self.classifier.feature_len_f32, self.descriptor.feature_len
            ));
        }
        if self.classifier.classes != self.descriptor.labels {
            return Err("classifier classes differ from descriptor labels".to_string());
        }
        Ok(())
    }

    pub fn feature_len(&self) -> usize {
        self.descriptor.feature_len
    }

    pub fn labels(&self) -> &[String] {
        &self.descriptor.labels
    }

    /// Classify `features`, or `None` when the vector length does not match.
    pub fn classify(&self, features: &[f32]) -> Option<Prediction> {
        if features.len() != self.descriptor.feature_len {
            return None;
        }
        let probs = self.classifier.predict_proba(features);
        let index = argmax(&probs)?;
        let label = self.descriptor.labels.get(index)?.clone();
        Some(Prediction {
            index,
            label,
            confidence: probs[index],
        })
    }
}
