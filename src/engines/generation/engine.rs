use crate::config::GaConfig;
use crate::engines::classifier::KnnClassifier;
use crate::engines::generation::chromosome::Chromosome;
use crate::engines::generation::progress::{GenerationReport, ProgressCallback};
use crate::engines::generation::stop::{should_stop, RunProgress};
use crate::error::{GlyphKnnError, Result};
use log::{debug, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::sync::Arc;

/// Outcome of a finished (or cancelled) run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub best: Chromosome,
    pub generations: u64,
    pub evaluations: u64,
}

/// Synchronous GA loop over one immutable classifier snapshot.
///
/// The engine owns no shared state: the snapshot is read-only, every
/// chromosome carries its own weight/mask genes, and all randomness flows
/// through one seeded generator, so two runs with the same seed and
/// configuration replay identically. Concurrency lives in the fitness
/// evaluation step only, where leave-one-out evaluations fan out across
/// rayon workers.
pub struct GenerationEngine {
    config: GaConfig,
    classifier: Arc<KnnClassifier>,
    pool: Option<rayon::ThreadPool>,
    rng: StdRng,
    population: Vec<Chromosome>,
    best: Option<Chromosome>,
    generation: u64,
    evaluations: u64,
    last_improvement: u64,
}

impl GenerationEngine {
    /// Validates the configuration against the snapshot and seeds the run.
    /// All configuration errors surface here, before any generation runs.
    pub fn new(config: GaConfig, classifier: Arc<KnnClassifier>) -> Result<Self> {
        config.validate(classifier.dimensions())?;
        if classifier.database().training_len() == 0 {
            return Err(GlyphKnnError::Data("no training data".to_string()));
        }
        let pool = if config.workers > 0 {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(config.workers)
                    .build()
                    .map_err(|e| GlyphKnnError::Evaluation(e.to_string()))?,
            )
        } else {
            None
        };
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            config,
            classifier,
            pool,
            rng,
            population: Vec::new(),
            best: None,
            generation: 0,
            evaluations: 0,
            last_improvement: 0,
        })
    }

    /// Run until a stop criterion fires or the callback requests
    /// cancellation (checked between generations, never mid-evaluation).
    pub fn run<C: ProgressCallback>(&mut self, callback: &mut C) -> Result<RunOutcome> {
        self.population = (0..self.config.population_size)
            .map(|_| {
                Chromosome::random(self.config.mode, self.classifier.dimensions(), &mut self.rng)
            })
            .collect();

        loop {
            callback.on_generation_start(self.generation);
            self.evaluate_population(callback)?;
            self.generation += 1;

            let improved = self.update_best();
            let report = self.report();
            if let Some(best) = improved {
                debug!(
                    "generation {}: best fitness improved to {:.4}",
                    report.generation, report.best_fitness
                );
                callback.on_improvement(&report, &best);
            }
            callback.on_monitor(&format!(
                "generation {}: best {:.4}, population best {:.4}, {} evaluations",
                report.generation,
                report.best_fitness,
                self.population_best(),
                report.evaluations
            ));
            callback.on_generation_complete(&report);

            if callback.cancelled() {
                debug!("run cancelled after generation {}", self.generation);
                break;
            }
            if should_stop(&self.config.stop_criteria, &self.progress()) {
                break;
            }

            self.breed_next_generation();
        }

        let best = self
            .best
            .clone()
            .ok_or_else(|| GlyphKnnError::Evaluation("run produced no evaluated chromosome".to_string()))?;
        Ok(RunOutcome {
            best,
            generations: self.generation,
            evaluations: self.evaluations,
        })
    }

    fn progress(&self) -> RunProgress {
        RunProgress {
            generation: self.generation,
            evaluations: self.evaluations,
            best_fitness: self.best.as_ref().map(|b| b.fitness_or_worst()).unwrap_or(0.0),
            last_improvement: self.last_improvement,
        }
    }

    fn report(&self) -> GenerationReport {
        GenerationReport {
            generation: self.generation,
            evaluations: self.evaluations,
            best_fitness: self.progress().best_fitness,
        }
    }

    fn population_best(&self) -> f64 {
        self.population
            .iter()
            .map(|c| c.fitness_or_worst())
            .fold(0.0, f64::max)
    }

    /// Evaluate every chromosome that has no memoized fitness yet. This is
    /// the hot path; independent leave-one-out evaluations fan out across
    /// the worker pool. A failed evaluation scores 0.0 and is logged to
    /// the monitor instead of aborting the run.
    fn evaluate_population<C: ProgressCallback>(&mut self, callback: &mut C) -> Result<()> {
        let classifier = Arc::clone(&self.classifier);
        let normalization = self.config.normalization;
        let before: usize = self.population.iter().filter(|c| c.is_evaluated()).count();
        let population = &mut self.population;

        let mut evaluate_all = || -> Vec<Option<String>> {
            population
                .par_iter_mut()
                .enumerate()
                .map(|(index, chromosome)| {
                    if chromosome.is_evaluated() {
                        return None;
                    }
                    let (weights, mask) = chromosome.to_genes(normalization);
                    match classifier.leave_one_out_with(&weights, &mask) {
                        Ok(accuracy) => {
                            chromosome.fitness = Some(accuracy);
                            None
                        }
                        Err(e) => {
                            chromosome.fitness = Some(0.0);
                            Some(format!(
                                "evaluation of chromosome {} failed, scored 0.0: {}",
                                index, e
                            ))
                        }
                    }
                })
                .collect()
        };

        let failures = match &self.pool {
            Some(pool) => pool.install(evaluate_all),
            None => evaluate_all(),
        };
        let after = self.population.iter().filter(|c| c.is_evaluated()).count();
        self.evaluations += (after - before) as u64;

        for failure in failures.into_iter().flatten() {
            warn!("{}", failure);
            callback.on_monitor(&failure);
        }
        Ok(())
    }

    /// Best fitness is monotone across the run: the stored best is only
    /// ever replaced by a strictly fitter chromosome. Returns the new best
    /// when it changed.
    fn update_best(&mut self) -> Option<Chromosome> {
        let candidate = self
            .population
            .iter()
            .max_by(|a, b| {
                a.fitness_or_worst()
                    .partial_cmp(&b.fitness_or_worst())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .cloned()?;
        let improved = match &self.best {
            Some(best) => candidate.fitness_or_worst() > best.fitness_or_worst(),
            None => true,
        };
        if improved {
            self.last_improvement = self.generation;
            self.best = Some(candidate.clone());
            Some(candidate)
        } else {
            None
        }
    }

    fn breed_next_generation(&mut self) {
        if self.config.replacement.is_generational() {
            self.breed_generational();
        } else {
            self.breed_steady_state();
        }
    }

    fn pick_crossover(&mut self) -> crate::engines::generation::operators::CrossoverOp {
        let index = self.rng.gen_range(0..self.config.crossovers.len());
        self.config.crossovers[index].clone()
    }

    fn make_offspring(&mut self, parent1: &Chromosome, parent2: &Chromosome) -> (Chromosome, Chromosome) {
        let (mut child1, mut child2) = if self.rng.gen::<f64>() < self.config.crossover_rate {
            let crossover = self.pick_crossover();
            let (g1, g2) = crossover.cross(&parent1.genotype, &parent2.genotype, &mut self.rng);
            (Chromosome::new(g1), Chromosome::new(g2))
        } else {
            // Copied parents keep their memoized fitness.
            (parent1.clone(), parent2.clone())
        };
        for child in [&mut child1, &mut child2] {
            if self.rng.gen::<f64>() < self.config.mutation_rate {
                let index = self.rng.gen_range(0..self.config.mutations.len());
                let mutation = self.config.mutations[index].clone();
                mutation.mutate(&mut child.genotype, &mut self.rng);
                child.fitness = None;
            }
        }
        (child1, child2)
    }

    fn breed_generational(&mut self) {
        let fitness: Vec<f64> = self.population.iter().map(|c| c.fitness_or_worst()).collect();
        let pair_count = (self.config.population_size + 1) / 2;
        let plan = self
            .config
            .selection
            .plan(&fitness, pair_count * 2, &mut self.rng);

        let mut next = Vec::with_capacity(self.config.population_size);
        for pair in plan.chunks(2) {
            let parent1 = self.population[pair[0]].clone();
            let parent2 = self.population[pair[1]].clone();
            let (child1, child2) = self.make_offspring(&parent1, &parent2);
            next.push(child1);
            if next.len() < self.config.population_size {
                next.push(child2);
            }
        }
        self.population = next;
    }

    /// One steady-state step: a single parent pair breeds and each
    /// offspring replaces the individual the replacement strategy picks.
    /// Both victims are chosen against the fitness the step started with;
    /// the second draw skips the first victim's slot so an unevaluated
    /// sibling is never overwritten before it gets scored. Population size
    /// never changes.
    fn breed_steady_state(&mut self) {
        let fitness: Vec<f64> = self.population.iter().map(|c| c.fitness_or_worst()).collect();
        let plan = self.config.selection.plan(&fitness, 2, &mut self.rng);
        let parent1 = self.population[plan[0]].clone();
        let parent2 = self.population[plan[1]].clone();
        let (child1, child2) = self.make_offspring(&parent1, &parent2);

        let first = self.config.replacement.victim(&fitness, None, &mut self.rng);
        self.population[first] = child1;
        let second = self
            .config
            .replacement
            .victim(&fitness, Some(first), &mut self.rng);
        self.population[second] = child2;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::generation::progress::{LogProgress, NullProgress};
    use crate::engines::generation::stop::StopCriterion;
    use crate::features::{FeatureCatalog, TrainingItem};

    fn snapshot() -> Arc<KnnClassifier> {
        let catalog = FeatureCatalog::from_pairs([("pos", 2)]).unwrap();
        let mut classifier = KnnClassifier::new(catalog);
        classifier
            .add_item(TrainingItem::manual(vec![0.0, 0.0], "x"))
            .unwrap();
        classifier
            .add_item(TrainingItem::manual(vec![0.0, 1.0], "x"))
            .unwrap();
        classifier
            .add_item(TrainingItem::manual(vec![10.0, 10.0], "y"))
            .unwrap();
        classifier
            .add_item(TrainingItem::manual(vec![10.0, 11.0], "y"))
            .unwrap();
        Arc::new(classifier)
    }

    fn small_config(seed: u64) -> GaConfig {
        GaConfig {
            population_size: 8,
            stop_criteria: vec![StopCriterion::MaxGenerations(5)],
            seed: Some(seed),
            ..GaConfig::default()
        }
    }

    #[test]
    fn test_run_respects_max_generations() {
        let mut engine = GenerationEngine::new(small_config(11), snapshot()).unwrap();
        let outcome = engine.run(&mut LogProgress).unwrap();
        // The two clusters are separable, so the run ends at perfect
        // fitness on the first generation, otherwise at the cap.
        assert!(outcome.generations <= 5);
        assert!(outcome.best.fitness == Some(1.0) || outcome.generations == 5);
    }

    #[test]
    fn test_best_fitness_is_monotone() {
        struct Track {
            history: Vec<f64>,
        }
        impl ProgressCallback for Track {
            fn on_generation_complete(&mut self, report: &GenerationReport) {
                self.history.push(report.best_fitness);
            }
        }

        let mut config = small_config(23);
        config.stop_criteria = vec![StopCriterion::MaxGenerations(10)];
        let mut engine = GenerationEngine::new(config, snapshot()).unwrap();
        let mut track = Track { history: Vec::new() };
        engine.run(&mut track).unwrap();
        for pair in track.history.windows(2) {
            assert!(pair[1] >= pair[0]);
        }
    }

    #[test]
    fn test_fixed_seed_replays_identically() {
        struct Track {
            history: Vec<f64>,
        }
        impl ProgressCallback for Track {
            fn on_generation_complete(&mut self, report: &GenerationReport) {
                self.history.push(report.best_fitness);
            }
        }

        let run = |seed: u64| {
            let mut engine = GenerationEngine::new(small_config(seed), snapshot()).unwrap();
            let mut track = Track { history: Vec::new() };
            engine.run(&mut track).unwrap();
            track.history
        };
        assert_eq!(run(42), run(42));
    }

    #[test]
    fn test_worker_pool_choice_does_not_change_results() {
        struct Track {
            history: Vec<f64>,
        }
        impl ProgressCallback for Track {
            fn on_generation_complete(&mut self, report: &GenerationReport) {
                self.history.push(report.best_fitness);
            }
        }

        // Fitness evaluation is the only parallel phase and touches no RNG,
        // so a dedicated pool and the default pool must agree.
        let run = |workers: usize| {
            let mut config = small_config(77);
            config.workers = workers;
            let mut engine = GenerationEngine::new(config, snapshot()).unwrap();
            let mut track = Track { history: Vec::new() };
            engine.run(&mut track).unwrap();
            track.history
        };
        assert_eq!(run(0), run(2));
    }

    #[test]
    fn test_steady_state_keeps_population_size() {
        use crate::engines::generation::operators::ReplacementOp;

        let mut config = small_config(5);
        config.replacement = ReplacementOp::SteadyStateWorst;
        config.stop_criteria = vec![StopCriterion::MaxGenerations(4)];
        let mut engine = GenerationEngine::new(config, snapshot()).unwrap();
        engine.run(&mut NullProgress).unwrap();
        assert_eq!(engine.population.len(), 8);
    }

    #[test]
    fn test_steady_state_step_places_both_offspring() {
        use crate::engines::generation::operators::ReplacementOp;
        use crate::types::GaMode;

        let mut config = small_config(13);
        config.replacement = ReplacementOp::SteadyStateWorst;
        config.crossover_rate = 1.0;
        config.mutation_rate = 0.0;
        let mut engine = GenerationEngine::new(config, snapshot()).unwrap();

        let mut rng = StdRng::seed_from_u64(99);
        engine.population = (0..8)
            .map(|_| {
                let mut chromosome = Chromosome::random(GaMode::Weighting, 2, &mut rng);
                chromosome.fitness = Some(0.5);
                chromosome
            })
            .collect();

        engine.breed_steady_state();

        // Crossover always fires and mutation never does, so exactly the
        // two fresh children are unevaluated; neither may overwrite the
        // other before evaluation.
        let fresh = engine
            .population
            .iter()
            .filter(|c| !c.is_evaluated())
            .count();
        assert_eq!(fresh, 2);
        assert_eq!(engine.population.len(), 8);
    }

    #[test]
    fn test_invalid_config_fails_before_running() {
        let mut config = small_config(1);
        config.crossovers.clear();
        let result = GenerationEngine::new(config, snapshot());
        assert!(matches!(result, Err(GlyphKnnError::Configuration(_))));
    }
}
