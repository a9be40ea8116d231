//! # Ranking
//! Probability vector to a short, ordered list of labelled predictions.

use crate::error::RankingError;
use crate::types::{PredictionResult, RankedEntry};

pub const DEFAULT_TOP_K: usize = 5;
/// Entries weighted below this are never presented.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.0005;

/// Select at most `k` labels by descending weight.
///
/// Selection stops at the first candidate weighted below `threshold`, so the
/// result is shorter than `k` when the distribution is sharply peaked. Equal
/// weights come out in no particular order.
pub fn top_k(
    probabilities: &[f32],
    labels: &[String],
    k: usize,
    threshold: f32,
) -> Result<PredictionResult, RankingError> {
    if k == 0 {
        return Err(RankingError::InvalidArgument("k must be at least 1".to_string()));
    }
    if k > probabilities.len() {
        return Err(RankingError::InvalidArgument(format!(
            "k = {k} exceeds {} probabilities",
            probabilities.len()
        )));
    }
    if probabilities.len() != labels.len() {
        return Err(RankingError::InvalidArgument(format!(
            "{} probabilities for {} labels",
            probabilities.len(),
            labels.len()
        )));
    }

    let mut pairs: Vec<(usize, f32)> = probabilities
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, weight)| !weight.is_nan())
        .collect();

    // NaN is filtered above, so the total order matches numeric order
    let by_weight = |a: &(usize, f32), b: &(usize, f32)| b.1.total_cmp(&a.1);
    if k < pairs.len() {
        pairs.select_nth_unstable_by(k - 1, by_weight);
        pairs.truncate(k);
    }
    pairs.sort_unstable_by(by_weight);

    let entries = pairs
        .into_iter()
        .take_while(|(_, weight)| *weight >= threshold)
        .map(|(index, weight)| RankedEntry::new(labels[index].clone(), weight))
        .collect();

    Ok(PredictionResult::from_entries(entries))
}

/// Per-process ranking configuration
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ranker {
    pub k: usize,
    pub threshold: f32,
}

impl Default for Ranker {
    fn default() -> Self {
        Self {
            k: DEFAULT_TOP_K,
            threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }
}

impl Ranker {
    pub fn new(k: usize, threshold: f32) -> Self {
        Self { k, threshold }
    }

    pub fn rank(
        &self,
        probabilities: &[f32],
        labels: &[String],
    ) -> Result<PredictionResult, RankingError> {
        top_k(probabilities, labels, self.k, self.threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn pairs(result: &PredictionResult) -> Vec<(&str, f32)> {
        result
            .iter()
            .map(|entry| (entry.label.as_str(), entry.weight))
            .collect()
    }

    #[test]
    fn ranks_all_confident_entries() {
        let labels = labels(&["cat", "dog", "bird"]);
        let result = top_k(&[0.1, 0.85, 0.02], &labels, 3, DEFAULT_CONFIDENCE_THRESHOLD).unwrap();
        assert_eq!(pairs(&result), vec![("dog", 0.85), ("cat", 0.1), ("bird", 0.02)]);
    }

    #[test]
    fn drops_entries_below_threshold() {
        let labels = labels(&["cat", "dog", "bird"]);
        let result = top_k(&[0.1, 0.0001, 0.85], &labels, 3, DEFAULT_CONFIDENCE_THRESHOLD).unwrap();
        assert_eq!(pairs(&result), vec![("bird", 0.85), ("cat", 0.1)]);
    }

    #[test]
    fn threshold_is_inclusive() {
        let labels = labels(&["a", "b"]);
        let result = top_k(&[0.0005, 0.9], &labels, 2, 0.0005).unwrap();
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn truncates_to_k() {
        let labels = labels(&["a", "b", "c", "d", "e", "f"]);
        let result = top_k(&[0.1, 0.2, 0.3, 0.15, 0.05, 0.2], &labels, 2, 0.0).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result.entries()[0].label, "c");
        assert_eq!(result.entries()[1].weight, 0.2);
    }

    #[test]
    fn peaked_distribution_yields_short_result() {
        let labels = labels(&["a", "b", "c", "d", "e"]);
        let result = top_k(&[0.0, 0.9999, 0.0001, 0.0, 0.0], &labels, 5, 0.0005).unwrap();
        assert_eq!(pairs(&result), vec![("b", 0.9999)]);
    }

    #[test]
    fn nan_weights_are_skipped() {
        let labels = labels(&["a", "b", "c"]);
        let result = top_k(&[f32::NAN, 0.4, 0.6], &labels, 3, 0.0).unwrap();
        assert_eq!(pairs(&result), vec![("c", 0.6), ("b", 0.4)]);
    }

    #[test]
    fn precondition_violations_are_invalid_arguments() {
        let three = labels(&["a", "b", "c"]);
        let v = [0.2, 0.3, 0.5];
        assert!(matches!(top_k(&v, &three, 0, 0.0), Err(RankingError::InvalidArgument(_))));
        assert!(matches!(top_k(&v, &three, 4, 0.0), Err(RankingError::InvalidArgument(_))));
        assert!(matches!(
            top_k(&v, &three[..2], 2, 0.0),
            Err(RankingError::InvalidArgument(_))
        ));
    }

    #[test]
    fn tie_order_is_unspecified_but_members_are_fixed() {
        let labels = labels(&["a", "b", "c"]);
        let result = top_k(&[0.3, 0.3, 0.1], &labels, 2, 0.0).unwrap();
        let mut names: Vec<&str> = result.iter().map(|e| e.label.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn random_vectors_hold_ordering_and_cutoff() {
        let mut rng = rand::rng();
        for _ in 0..500 {
            let n = rng.random_range(1..64);
            let labels: Vec<String> = (0..n).map(|i| i.to_string()).collect();
            let v: Vec<f32> = (0..n)
                .map(|_| {
                    if rng.random_bool(0.3) {
                        rng.random_range(0.0..0.001)
                    } else {
                        rng.random::<f32>()
                    }
                })
                .collect();
            let k = rng.random_range(1..=n);

            let first = top_k(&v, &labels, k, DEFAULT_CONFIDENCE_THRESHOLD).unwrap();
            assert!(first.len() <= k);
            assert!(first.entries().windows(2).all(|w| w[0].weight >= w[1].weight));
            assert!(first.iter().all(|e| e.weight >= DEFAULT_CONFIDENCE_THRESHOLD));

            // Everything left out either ranks below the kept entries or is under the cutoff
            let floor = first.entries().last().map(|e| e.weight);
            let kept = first.len();
            let above = v.iter().filter(|w| **w >= DEFAULT_CONFIDENCE_THRESHOLD).count();
            assert_eq!(kept, above.min(k));
            if let Some(floor) = floor {
                let strictly_higher = v.iter().filter(|w| **w > floor).count();
                assert!(strictly_higher < kept);
            }

            let again = top_k(&v, &labels, k, DEFAULT_CONFIDENCE_THRESHOLD).unwrap();
            let weights = |r: &PredictionResult| r.iter().map(|e| e.weight).collect::<Vec<_>>();
            assert_eq!(weights(&first), weights(&again));
        }
    }

    #[test]
    fn ranker_uses_configured_k() {
        let labels = labels(&["a", "b", "c", "d", "e", "f"]);
        let ranker = Ranker::default();
        let result = ranker.rank(&[0.1, 0.2, 0.3, 0.1, 0.1, 0.2], &labels).unwrap();
        assert_eq!(result.len(), DEFAULT_TOP_K);
    }
}
