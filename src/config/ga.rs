use crate::engines::generation::operators::{
    CrossoverOp, MutationOp, ReplacementOp, SelectionOp,
};
use crate::engines::generation::stop::StopCriterion;
use crate::error::{GlyphKnnError, Result};
use crate::types::{GaMode, WeightNormalization};
use serde::{Deserialize, Serialize};

/// Full configuration of one optimization run. Everything is validated up
/// front by [`GaConfig::validate`]; a run never starts with a missing
/// operator choice or an out-of-range parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaConfig {
    pub mode: GaMode,
    pub population_size: usize,
    /// Probability a selected parent pair recombines instead of being
    /// copied through.
    pub crossover_rate: f64,
    /// Probability an offspring is mutated at all.
    pub mutation_rate: f64,
    pub normalization: WeightNormalization,
    pub selection: SelectionOp,
    /// One or more; when several are configured one is drawn uniformly
    /// per parent pairing.
    pub crossovers: Vec<CrossoverOp>,
    /// One or more; one is drawn uniformly per mutated offspring.
    pub mutations: Vec<MutationOp>,
    pub replacement: ReplacementOp,
    pub stop_criteria: Vec<StopCriterion>,
    /// Worker threads for fitness evaluation; 0 uses the default pool.
    pub workers: usize,
    /// Fixed RNG seed for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for GaConfig {
    fn default() -> Self {
        Self {
            mode: GaMode::Weighting,
            population_size: 50,
            crossover_rate: 0.85,
            mutation_rate: 0.15,
            normalization: WeightNormalization::None,
            selection: SelectionOp::Tournament { size: 3 },
            crossovers: vec![CrossoverOp::Sbx { eta: 2.0 }],
            mutations: vec![MutationOp::Gaussian {
                sigma: 0.1,
                rate: 0.25,
            }],
            replacement: ReplacementOp::Generational,
            stop_criteria: vec![StopCriterion::MaxGenerations(100)],
            workers: 0,
            seed: None,
        }
    }
}

impl GaConfig {
    pub fn validate(&self, dimensions: usize) -> Result<()> {
        if dimensions == 0 {
            return Err(GlyphKnnError::Configuration(
                "cannot optimize over an empty feature catalog".to_string(),
            ));
        }
        if self.population_size < 2 {
            return Err(GlyphKnnError::Configuration(format!(
                "population size must be at least 2, got {}",
                self.population_size
            )));
        }
        if !(0.0..=1.0).contains(&self.crossover_rate) {
            return Err(GlyphKnnError::Configuration(format!(
                "crossover rate must be in [0, 1], got {}",
                self.crossover_rate
            )));
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(GlyphKnnError::Configuration(format!(
                "mutation rate must be in [0, 1], got {}",
                self.mutation_rate
            )));
        }
        if self.crossovers.is_empty() {
            return Err(GlyphKnnError::Configuration(
                "no crossover operator configured".to_string(),
            ));
        }
        if self.mutations.is_empty() {
            return Err(GlyphKnnError::Configuration(
                "no mutation operator configured".to_string(),
            ));
        }
        if self.stop_criteria.is_empty() {
            return Err(GlyphKnnError::Configuration(
                "no stop criterion configured".to_string(),
            ));
        }
        self.selection.validate()?;
        for crossover in &self.crossovers {
            crossover.validate(self.mode, dimensions)?;
        }
        for mutation in &self.mutations {
            mutation.validate(self.mode)?;
        }
        self.replacement.validate()?;
        for criterion in &self.stop_criteria {
            criterion.validate()?;
        }
        Ok(())
    }

    /// Selection-mode preset with the binary operator family.
    pub fn selection_mode() -> Self {
        Self {
            mode: GaMode::Selection,
            crossovers: vec![CrossoverOp::Uniform { preference: 0.5 }],
            mutations: vec![MutationOp::BitFlip { rate: 0.05 }],
            ..Self::default()
        }
    }
}
