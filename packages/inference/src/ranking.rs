use crate::labels::LabelSet;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A class label with its probability
#[derive(Default, Serialize, Deserialize, JsonSchema, Clone, Debug, PartialEq)]
pub struct PredictionItem {
    pub label: String,
    pub probability: f64,
}

/// Ranked predictions for one image
#[derive(Default, Serialize, Deserialize, JsonSchema, Clone, Debug, PartialEq)]
pub struct PredictionResponse {
    /// Highest-probability classes, descending
    pub top: Vec<PredictionItem>,
    /// Every class in model index order
    pub all: Vec<PredictionItem>,
}

/// Class indices ordered by descending probability, ties by ascending index.
pub fn rank_indices(probs: &[f64]) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..probs.len()).collect();
    // stable: equal probabilities keep ascending index order
    indices.sort_by(|&a, &b| probs[b].total_cmp(&probs[a]));
    indices
}

/// Build the `top` (at most `k`) and `all` prediction lists.
pub fn assemble(probs: &[f64], labels: &LabelSet, k: usize) -> PredictionResponse {
    let item = |i: usize| PredictionItem {
        label: labels.label(i).into_owned(),
        probability: probs[i],
    };

    let k = k.min(probs.len());
    let top = rank_indices(probs).into_iter().take(k).map(item).collect();
    let all = (0..probs.len()).map(item).collect();
    PredictionResponse { top, all }
}
