use crate::engines::generation::chromosome::Chromosome;
use log::info;

/// Per-generation snapshot handed to progress callbacks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationReport {
    pub generation: u64,
    pub evaluations: u64,
    pub best_fitness: f64,
}

/// Observer hooks invoked synchronously from the generation loop.
/// Implementations must not block for long; they run on the hot path.
/// `cancelled` is polled between generations and is how cooperative
/// cancellation reaches the engine.
pub trait ProgressCallback: Send {
    fn on_generation_start(&mut self, _generation: u64) {}
    fn on_generation_complete(&mut self, _report: &GenerationReport) {}
    /// Fired only on generations where the best fitness improved; `best`
    /// is the new best-so-far chromosome.
    fn on_improvement(&mut self, _report: &GenerationReport, _best: &Chromosome) {}
    /// Monitor log lines: one per generation plus any evaluation failures.
    fn on_monitor(&mut self, _line: &str) {}
    fn cancelled(&self) -> bool {
        false
    }
}

/// No-op callback for fire-and-forget runs.
pub struct NullProgress;

impl ProgressCallback for NullProgress {}

/// Callback that forwards the monitor to the `log` facade.
pub struct LogProgress;

impl ProgressCallback for LogProgress {
    fn on_monitor(&mut self, line: &str) {
        info!("{}", line);
    }
}

/// Message stream for presentation layers that poll a channel instead of
/// registering a callback directly.
#[derive(Debug, Clone)]
pub enum ProgressMessage {
    GenerationStart(u64),
    GenerationComplete(GenerationReport),
    Improvement(GenerationReport),
    Monitor(String),
}

pub struct ChannelProgress {
    sender: std::sync::mpsc::Sender<ProgressMessage>,
}

impl ChannelProgress {
    pub fn new(sender: std::sync::mpsc::Sender<ProgressMessage>) -> Self {
        Self { sender }
    }
}

impl ProgressCallback for ChannelProgress {
    fn on_generation_start(&mut self, generation: u64) {
        let _ = self.sender.send(ProgressMessage::GenerationStart(generation));
    }

    fn on_generation_complete(&mut self, report: &GenerationReport) {
        let _ = self.sender.send(ProgressMessage::GenerationComplete(*report));
    }

    fn on_improvement(&mut self, report: &GenerationReport, _best: &Chromosome) {
        let _ = self.sender.send(ProgressMessage::Improvement(*report));
    }

    fn on_monitor(&mut self, line: &str) {
        let _ = self.sender.send(ProgressMessage::Monitor(line.to_string()));
    }
}
