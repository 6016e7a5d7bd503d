use std::cmp::Ordering;

use crate::shared::prediction::Prediction;

/// Picks the highest-scoring candidate.
///
/// On equal scores the candidate appearing later wins (`Iterator::max_by`
/// returns the last maximum), including `0.0` against `-0.0`. NaN scores
/// never win.
pub fn select(candidates: &[Prediction]) -> Option<&Prediction> {
    candidates
        .iter()
        .filter(|p| !p.score.is_nan())
        .max_by(|a, b| by_score(a, b))
}

/// Index of the candidate [`select`] would return.
pub fn select_index(candidates: &[Prediction]) -> Option<usize> {
    candidates
        .iter()
        .enumerate()
        .filter(|(_, p)| !p.score.is_nan())
        .max_by(|(_, a), (_, b)| by_score(a, b))
        .map(|(i, _)| i)
}

fn by_score(a: &Prediction, b: &Prediction) -> Ordering {
    a.score.partial_cmp(&b.score).unwrap_or(Ordering::Equal)
}
