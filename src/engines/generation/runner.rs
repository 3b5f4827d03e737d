use crate::config::GaConfig;
use crate::engines::classifier::KnnClassifier;
use crate::engines::generation::chromosome::Chromosome;
use crate::engines::generation::engine::{GenerationEngine, RunOutcome};
use crate::engines::generation::progress::{GenerationReport, NullProgress, ProgressCallback};
use crate::error::{GlyphKnnError, Result};
use crate::types::WeightNormalization;
use log::info;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

/// Snapshot of a run the foreground can poll at any time.
#[derive(Debug, Clone)]
pub struct RunStatus {
    pub generation: u64,
    pub evaluations: u64,
    pub best_fitness: f64,
    /// Leave-one-out accuracy of the classifier's live state, measured
    /// once before the first generation.
    pub baseline_accuracy: f64,
    pub running: bool,
    pub monitor: Vec<String>,
}

struct Shared {
    status: Mutex<RunStatus>,
    cancel: Mutex<bool>,
    best: Mutex<Option<Chromosome>>,
}

/// Internal callback bridging the engine loop to the shared status the
/// foreground polls, and to the optional user callback.
struct RunnerProgress<C: ProgressCallback> {
    shared: Arc<Shared>,
    user: C,
}

impl<C: ProgressCallback> ProgressCallback for RunnerProgress<C> {
    fn on_generation_start(&mut self, generation: u64) {
        self.user.on_generation_start(generation);
    }

    fn on_generation_complete(&mut self, report: &GenerationReport) {
        {
            let mut status = self.shared.status.lock().unwrap();
            status.generation = report.generation;
            status.evaluations = report.evaluations;
            status.best_fitness = report.best_fitness;
        }
        self.user.on_generation_complete(report);
    }

    fn on_improvement(&mut self, report: &GenerationReport, best: &Chromosome) {
        *self.shared.best.lock().unwrap() = Some(best.clone());
        self.user.on_improvement(report, best);
    }

    fn on_monitor(&mut self, line: &str) {
        self.shared.status.lock().unwrap().monitor.push(line.to_string());
        self.user.on_monitor(line);
    }

    fn cancelled(&self) -> bool {
        *self.shared.cancel.lock().unwrap() || self.user.cancelled()
    }
}

/// Controller for one background optimization run.
///
/// Exactly one run may be active per classifier instance; `start` refuses
/// to begin a second one. The worker evaluates against an immutable
/// snapshot taken at start, so it holds no lock while computing fitness;
/// the classifier itself stays usable for classification but rejects
/// mutation until the run ends. Results reach the live classifier only
/// through [`OptimizationRunner::commit_best`].
pub struct OptimizationRunner {
    classifier: Arc<Mutex<KnnClassifier>>,
    shared: Arc<Shared>,
    handle: Option<JoinHandle<Result<RunOutcome>>>,
    normalization: WeightNormalization,
}

impl OptimizationRunner {
    /// Start a run with no external observer.
    pub fn start(classifier: Arc<Mutex<KnnClassifier>>, config: GaConfig) -> Result<Self> {
        Self::start_with(classifier, config, NullProgress)
    }

    /// Validate configuration, take the training snapshot, record the
    /// baseline accuracy, and spawn the worker thread. Any error here
    /// leaves the classifier untouched and no run active.
    pub fn start_with<C>(
        classifier: Arc<Mutex<KnnClassifier>>,
        config: GaConfig,
        user_callback: C,
    ) -> Result<Self>
    where
        C: ProgressCallback + 'static,
    {
        let normalization = config.normalization;
        let (mut engine, baseline) = {
            let mut guard = classifier.lock().unwrap();
            if guard.is_run_active() {
                return Err(GlyphKnnError::ConcurrencyMisuse(
                    "an optimization run is already active on this classifier".to_string(),
                ));
            }
            let snapshot = guard.clone();
            let engine = GenerationEngine::new(config, Arc::new(snapshot))?;
            let (correct, total) = guard.leave_one_out(None, None)?;
            guard.begin_run()?;
            (engine, correct as f64 / total as f64)
        };

        let shared = Arc::new(Shared {
            status: Mutex::new(RunStatus {
                generation: 0,
                evaluations: 0,
                best_fitness: 0.0,
                baseline_accuracy: baseline,
                running: true,
                monitor: Vec::new(),
            }),
            cancel: Mutex::new(false),
            best: Mutex::new(None),
        });
        info!("optimization run starting, baseline accuracy {:.4}", baseline);

        let thread_shared = Arc::clone(&shared);
        let thread_classifier = Arc::clone(&classifier);
        let handle = std::thread::Builder::new()
            .name("ga-optimizer".to_string())
            .spawn(move || {
                let mut callback = RunnerProgress {
                    shared: Arc::clone(&thread_shared),
                    user: user_callback,
                };
                let outcome = engine.run(&mut callback);
                // Run is over either way: release the classifier and flip
                // the status flag before the thread exits.
                thread_classifier.lock().unwrap().end_run();
                let mut status = thread_shared.status.lock().unwrap();
                status.running = false;
                match &outcome {
                    Ok(result) => status.monitor.push(format!(
                        "run finished: best {:.4} after {} generations, {} evaluations",
                        result.best.fitness_or_worst(),
                        result.generations,
                        result.evaluations
                    )),
                    Err(e) => status.monitor.push(format!("run failed: {}", e)),
                }
                outcome
            })
            .map_err(|e| GlyphKnnError::Evaluation(format!("failed to spawn worker: {}", e)))?;

        Ok(Self {
            classifier,
            shared,
            handle: Some(handle),
            normalization,
        })
    }

    /// Non-blocking consistent snapshot, safe from any thread.
    pub fn status(&self) -> RunStatus {
        self.shared.status.lock().unwrap().clone()
    }

    pub fn is_running(&self) -> bool {
        self.shared.status.lock().unwrap().running
    }

    /// Ask the worker to stop after its current generation and wait for
    /// it. The wait is unbounded in principle; a generation's cost scales
    /// with population size times leave-one-out cost. Idempotent.
    pub fn stop(&mut self) -> Result<Option<RunOutcome>> {
        *self.shared.cancel.lock().unwrap() = true;
        self.join()
    }

    /// Block until the run ends on its own stop criteria.
    pub fn wait(&mut self) -> Result<Option<RunOutcome>> {
        self.join()
    }

    /// Outcome if the worker has already finished, without blocking.
    pub fn try_outcome(&mut self) -> Option<Result<RunOutcome>> {
        match self.handle.take() {
            Some(handle) if handle.is_finished() => Some(self.finish(handle)),
            Some(handle) => {
                self.handle = Some(handle);
                None
            }
            None => None,
        }
    }

    fn join(&mut self) -> Result<Option<RunOutcome>> {
        match self.handle.take() {
            Some(handle) => self.finish(handle).map(Some),
            None => Ok(None),
        }
    }

    fn finish(&mut self, handle: JoinHandle<Result<RunOutcome>>) -> Result<RunOutcome> {
        let outcome = handle.join().unwrap_or_else(|_| {
            Err(GlyphKnnError::Evaluation(
                "optimizer worker panicked".to_string(),
            ))
        });
        // The worker normally clears the run flag itself; clearing again
        // covers the panic path.
        self.classifier.lock().unwrap().end_run();
        self.shared.status.lock().unwrap().running = false;
        outcome
    }

    /// Atomically substitute the best chromosome's weights and mask into
    /// the live classifier. This is the only path by which optimizer
    /// results become the classifier's operating parameters; completion
    /// alone never writes anything back.
    pub fn commit_best(&self) -> Result<()> {
        let best = self
            .shared
            .best
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| {
                GlyphKnnError::Evaluation("no best chromosome available to commit".to_string())
            })?;
        let (weights, mask) = best.to_genes(self.normalization);
        let mut classifier = self.classifier.lock().unwrap();
        classifier.commit_genes(weights, mask);
        info!(
            "committed best chromosome (fitness {:.4}) into classifier",
            best.fitness_or_worst()
        );
        Ok(())
    }

    /// Best chromosome seen so far, if any generation has completed.
    pub fn best_chromosome(&self) -> Option<Chromosome> {
        self.shared.best.lock().unwrap().clone()
    }
}

impl Drop for OptimizationRunner {
    fn drop(&mut self) {
        // A dropped runner must not leave the classifier locked out.
        let _ = self.stop();
    }
}
