pub mod classifier;
pub mod distance;
pub mod generation;

pub use classifier::{KnnClassifier, Neighbor};
pub use distance::{distance, distance_within};
