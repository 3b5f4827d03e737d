pub mod ga;

pub use ga::GaConfig;
