use crate::types::{GaMode, WeightNormalization};
use rand::Rng;

/// Candidate genotype: a bit mask in selection mode, a real-valued weight
/// vector in [0,1] per gene in weighting mode.
#[derive(Debug, Clone, PartialEq)]
pub enum Genotype {
    Bits(Vec<bool>),
    Reals(Vec<f64>),
}

impl Genotype {
    pub fn len(&self) -> usize {
        match self {
            Genotype::Bits(b) => b.len(),
            Genotype::Reals(r) => r.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn random<R: Rng>(mode: GaMode, dimensions: usize, rng: &mut R) -> Self {
        match mode {
            GaMode::Selection => Genotype::Bits((0..dimensions).map(|_| rng.gen()).collect()),
            GaMode::Weighting => {
                Genotype::Reals((0..dimensions).map(|_| rng.gen::<f64>()).collect())
            }
        }
    }
}

/// One candidate solution plus its memoized leave-one-out accuracy.
/// Fitness is never recomputed once set; evaluation dominates run cost.
#[derive(Debug, Clone)]
pub struct Chromosome {
    pub genotype: Genotype,
    pub fitness: Option<f64>,
}

impl Chromosome {
    pub fn new(genotype: Genotype) -> Self {
        Self {
            genotype,
            fitness: None,
        }
    }

    pub fn random<R: Rng>(mode: GaMode, dimensions: usize, rng: &mut R) -> Self {
        Self::new(Genotype::random(mode, dimensions, rng))
    }

    pub fn is_evaluated(&self) -> bool {
        self.fitness.is_some()
    }

    /// Fitness if evaluated, else the worst possible score. Ordering
    /// helpers below use this so unevaluated chromosomes never win.
    pub fn fitness_or_worst(&self) -> f64 {
        self.fitness.unwrap_or(0.0)
    }

    /// Expand the genotype into the (weights, mask) pair the classifier
    /// evaluates with. Selection mode fixes weights at 1.0; weighting mode
    /// keeps every dimension active and normalizes per run configuration.
    pub fn to_genes(&self, normalization: WeightNormalization) -> (Vec<f64>, Vec<bool>) {
        match &self.genotype {
            Genotype::Bits(bits) => (vec![1.0; bits.len()], bits.clone()),
            Genotype::Reals(reals) => {
                let mut weights = reals.clone();
                normalization.apply(&mut weights);
                (weights, vec![true; reals.len()])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_random_genotype_matches_mode() {
        let mut rng = StdRng::seed_from_u64(7);
        match Genotype::random(GaMode::Selection, 5, &mut rng) {
            Genotype::Bits(b) => assert_eq!(b.len(), 5),
            _ => panic!("selection mode must produce bits"),
        }
        match Genotype::random(GaMode::Weighting, 5, &mut rng) {
            Genotype::Reals(r) => {
                assert_eq!(r.len(), 5);
                assert!(r.iter().all(|v| (0.0..=1.0).contains(v)));
            }
            _ => panic!("weighting mode must produce reals"),
        }
    }

    #[test]
    fn test_to_genes_selection_mode() {
        let chromosome = Chromosome::new(Genotype::Bits(vec![true, false, true]));
        let (weights, mask) = chromosome.to_genes(WeightNormalization::None);
        assert_eq!(weights, vec![1.0, 1.0, 1.0]);
        assert_eq!(mask, vec![true, false, true]);
    }

    #[test]
    fn test_to_genes_weighting_unit_sum() {
        let chromosome = Chromosome::new(Genotype::Reals(vec![0.5, 1.0, 0.5]));
        let (weights, mask) = chromosome.to_genes(WeightNormalization::UnitSum);
        assert!((weights.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert_eq!(mask, vec![true, true, true]);
    }
}
