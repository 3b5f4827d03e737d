use serde::{Deserialize, Serialize};

/// How a database item acquired its label. Only manually confirmed (and,
/// when the database allows it, heuristic) items take part in training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassificationState {
    Unclassified,
    Automatic,
    Heuristic,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMetric {
    CityBlock,
    Euclidean,
    /// Squared Euclidean. Ranking-equivalent to Euclidean but skips the
    /// sqrt; the returned value is not a metric distance.
    FastEuclidean,
}

/// What the GA searches over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GaMode {
    /// Binary mask over feature dimensions, weights fixed at 1.0.
    Selection,
    /// Real-valued per-dimension weights in [0,1], all dimensions active.
    Weighting,
}

/// Normalization applied to a weighting chromosome before its genes are
/// used as distance weights. Fixed for a whole optimization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeightNormalization {
    None,
    UnitSum,
    UnitMax,
}

impl WeightNormalization {
    pub fn apply(&self, weights: &mut [f64]) {
        match self {
            WeightNormalization::None => {}
            WeightNormalization::UnitSum => {
                let sum: f64 = weights.iter().sum();
                if sum > 0.0 {
                    for w in weights.iter_mut() {
                        *w /= sum;
                    }
                }
            }
            WeightNormalization::UnitMax => {
                let max = weights.iter().cloned().fold(0.0_f64, f64::max);
                if max > 0.0 {
                    for w in weights.iter_mut() {
                        *w /= max;
                    }
                }
            }
        }
    }
}
