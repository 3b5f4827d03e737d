//! Interactive weighted k-NN classifier with a genetic-algorithm optimizer
//! for per-feature weights and feature-subset selection.
//!
//! The classifier ([`KnnClassifier`]) operates over dense feature vectors
//! whose layout is described by a [`FeatureCatalog`]; distances are
//! weighted and masked per dimension. The optimizer searches weight or
//! selection vectors to maximize leave-one-out accuracy, running as a
//! cancellable background task ([`OptimizationRunner`]) that the caller
//! polls for progress while the classifier keeps serving requests.

pub mod config;
pub mod engines;
pub mod error;
pub mod features;
pub mod settings;
pub mod snapshot;
pub mod types;

pub use config::GaConfig;
pub use engines::classifier::{KnnClassifier, Neighbor};
pub use engines::generation::{
    Chromosome, GenerationEngine, Genotype, OptimizationRunner, ProgressCallback, RunOutcome,
    RunStatus, StopCriterion,
};
pub use error::{GlyphKnnError, Result};
pub use features::{FeatureCatalog, FeatureSpec, TrainingDatabase, TrainingItem};
pub use settings::ClassifierSettings;
pub use snapshot::ClassifierSnapshot;
pub use types::{ClassificationState, DistanceMetric, GaMode, WeightNormalization};
