use crate::error::{GlyphKnnError, Result};
use serde::{Deserialize, Serialize};

/// A condition that ends an optimization run. At least one must be
/// configured; any satisfied criterion stops the run. Independently of
/// configuration, a perfect leave-one-out score (fitness 1.0) always ends
/// the run since nothing can improve on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StopCriterion {
    TargetFitness(f64),
    MaxGenerations(u64),
    MaxEvaluations(u64),
    /// No improvement of the best fitness for `stagnant_generations`
    /// consecutive generations, checked only after `min_generations`.
    SteadyState {
        min_generations: u64,
        stagnant_generations: u64,
    },
}

impl StopCriterion {
    pub fn validate(&self) -> Result<()> {
        match self {
            StopCriterion::TargetFitness(target) => {
                if !(0.0..=1.0).contains(target) {
                    return Err(GlyphKnnError::Configuration(format!(
                        "target fitness must be in [0, 1], got {}",
                        target
                    )));
                }
                Ok(())
            }
            StopCriterion::MaxGenerations(0) => Err(GlyphKnnError::Configuration(
                "max generations must be at least 1".to_string(),
            )),
            StopCriterion::MaxEvaluations(0) => Err(GlyphKnnError::Configuration(
                "max evaluations must be at least 1".to_string(),
            )),
            StopCriterion::SteadyState {
                stagnant_generations,
                ..
            } if *stagnant_generations == 0 => Err(GlyphKnnError::Configuration(
                "steady-state stagnant generation count must be at least 1".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Snapshot of run progress the criteria are checked against.
#[derive(Debug, Clone, Copy)]
pub struct RunProgress {
    pub generation: u64,
    pub evaluations: u64,
    pub best_fitness: f64,
    /// Generation at which the best fitness last improved.
    pub last_improvement: u64,
}

pub fn should_stop(criteria: &[StopCriterion], progress: &RunProgress) -> bool {
    if progress.best_fitness >= 1.0 {
        return true;
    }
    criteria.iter().any(|criterion| match criterion {
        StopCriterion::TargetFitness(target) => progress.best_fitness >= *target,
        StopCriterion::MaxGenerations(max) => progress.generation >= *max,
        StopCriterion::MaxEvaluations(max) => progress.evaluations >= *max,
        StopCriterion::SteadyState {
            min_generations,
            stagnant_generations,
        } => {
            progress.generation >= *min_generations
                && progress.generation - progress.last_improvement >= *stagnant_generations
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(generation: u64, evaluations: u64, best: f64, last: u64) -> RunProgress {
        RunProgress {
            generation,
            evaluations,
            best_fitness: best,
            last_improvement: last,
        }
    }

    #[test]
    fn test_perfect_fitness_always_stops() {
        assert!(should_stop(&[], &progress(0, 0, 1.0, 0)));
    }

    #[test]
    fn test_max_generations() {
        let criteria = vec![StopCriterion::MaxGenerations(10)];
        assert!(!should_stop(&criteria, &progress(9, 0, 0.5, 0)));
        assert!(should_stop(&criteria, &progress(10, 0, 0.5, 0)));
    }

    #[test]
    fn test_steady_state_respects_minimum() {
        let criteria = vec![StopCriterion::SteadyState {
            min_generations: 20,
            stagnant_generations: 5,
        }];
        // Stagnant early, but the floor has not been reached.
        assert!(!should_stop(&criteria, &progress(10, 0, 0.5, 0)));
        assert!(should_stop(&criteria, &progress(25, 0, 0.5, 18)));
        assert!(!should_stop(&criteria, &progress(25, 0, 0.5, 23)));
    }

    #[test]
    fn test_zero_bounds_rejected() {
        assert!(StopCriterion::MaxGenerations(0).validate().is_err());
        assert!(StopCriterion::MaxEvaluations(0).validate().is_err());
        assert!(StopCriterion::TargetFitness(1.5).validate().is_err());
    }
}
