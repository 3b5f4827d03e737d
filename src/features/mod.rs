pub mod catalog;
pub mod store;

pub use catalog::{FeatureCatalog, FeatureSpec};
pub use store::{TrainingDatabase, TrainingItem};
