pub mod chromosome;
pub mod engine;
pub mod operators;
pub mod progress;
pub mod runner;
pub mod stop;

pub use chromosome::{Chromosome, Genotype};
pub use engine::{GenerationEngine, RunOutcome};
pub use operators::{CrossoverOp, MutationOp, ReplacementOp, SelectionOp};
pub use progress::{ChannelProgress, GenerationReport, LogProgress, NullProgress, ProgressCallback, ProgressMessage};
pub use runner::{OptimizationRunner, RunStatus};
pub use stop::StopCriterion;
