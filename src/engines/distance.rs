use crate::error::{GlyphKnnError, Result};
use crate::types::DistanceMetric;

fn check_lengths(a: &[f64], b: &[f64], weights: &[f64], mask: &[bool]) -> Result<()> {
    let n = a.len();
    if b.len() != n || weights.len() != n || mask.len() != n {
        return Err(GlyphKnnError::Data(format!(
            "mismatched vector lengths: a={}, b={}, weights={}, mask={}",
            a.len(),
            b.len(),
            weights.len(),
            mask.len()
        )));
    }
    Ok(())
}

/// Weighted distance between two feature vectors. Dimensions with
/// `mask[i] == false` contribute no term at all, which is what makes
/// selection-mode evaluation cheaper than zero-weighting.
pub fn distance(
    a: &[f64],
    b: &[f64],
    weights: &[f64],
    mask: &[bool],
    metric: DistanceMetric,
) -> Result<f64> {
    check_lengths(a, b, weights, mask)?;
    let mut sum = 0.0;
    match metric {
        DistanceMetric::CityBlock => {
            for i in 0..a.len() {
                if mask[i] {
                    sum += weights[i] * (a[i] - b[i]).abs();
                }
            }
            Ok(sum)
        }
        DistanceMetric::Euclidean | DistanceMetric::FastEuclidean => {
            for i in 0..a.len() {
                if mask[i] {
                    let d = a[i] - b[i];
                    sum += weights[i] * d * d;
                }
            }
            if metric == DistanceMetric::Euclidean {
                Ok(sum.sqrt())
            } else {
                Ok(sum)
            }
        }
    }
}

/// Like [`distance`] but aborts once the running partial sum can no longer
/// beat `max`, returning `None`. Used by bulk nearest-neighbor queries that
/// only care about candidates under a known cutoff. For the Euclidean
/// metric the comparison happens in squared space so no sqrt is paid on
/// the abandoned candidates.
pub fn distance_within(
    a: &[f64],
    b: &[f64],
    weights: &[f64],
    mask: &[bool],
    metric: DistanceMetric,
    max: f64,
) -> Result<Option<f64>> {
    check_lengths(a, b, weights, mask)?;
    let squared = metric != DistanceMetric::CityBlock;
    let cutoff = if metric == DistanceMetric::Euclidean {
        max * max
    } else {
        max
    };

    let mut sum = 0.0;
    for i in 0..a.len() {
        if !mask[i] {
            continue;
        }
        if squared {
            let d = a[i] - b[i];
            sum += weights[i] * d * d;
        } else {
            sum += weights[i] * (a[i] - b[i]).abs();
        }
        if sum > cutoff {
            return Ok(None);
        }
    }

    if metric == DistanceMetric::Euclidean {
        Ok(Some(sum.sqrt()))
    } else {
        Ok(Some(sum))
    }
}
