use crate::config::GaConfig;
use crate::engines::classifier::KnnClassifier;
use crate::error::{GlyphKnnError, Result};
use crate::types::{DistanceMetric, GaMode};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const SETTINGS_VERSION: u32 = 1;

/// Per-feature weight sub-vector; `weights.len()` equals the feature's
/// arity in the catalog it was saved under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureWeights {
    pub name: String,
    pub weights: Vec<f64>,
}

/// The GA parameters last used, kept in settings so a reloaded session
/// can resume optimization with the same knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaRunSummary {
    pub mode: GaMode,
    pub population_size: usize,
    pub mutation_rate: f64,
    pub crossover_rate: f64,
}

impl From<&GaConfig> for GaRunSummary {
    fn from(config: &GaConfig) -> Self {
        Self {
            mode: config.mode,
            population_size: config.population_size,
            mutation_rate: config.mutation_rate,
            crossover_rate: config.crossover_rate,
        }
    }
}

/// Logical settings document: k, metric, last GA parameters, and the
/// weight vector split into named per-feature sub-vectors so it can be
/// reassembled under any catalog that still carries those features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierSettings {
    pub version: u32,
    pub num_k: usize,
    pub distance_metric: DistanceMetric,
    pub ga: GaRunSummary,
    pub features: Vec<FeatureWeights>,
}

impl ClassifierSettings {
    pub fn from_classifier(classifier: &KnnClassifier, ga: &GaConfig) -> Self {
        let weights = classifier.weights();
        let features = classifier
            .catalog()
            .iter()
            .scan(0usize, |offset, spec| {
                let slice = weights[*offset..*offset + spec.arity].to_vec();
                *offset += spec.arity;
                Some(FeatureWeights {
                    name: spec.name.clone(),
                    weights: slice,
                })
            })
            .collect();
        Self {
            version: SETTINGS_VERSION,
            num_k: classifier.num_k(),
            distance_metric: classifier.metric(),
            ga: GaRunSummary::from(ga),
            features,
        }
    }

    /// Push the document into a live classifier: k, metric, and the full
    /// weight vector reassembled by concatenating per-feature sub-vectors
    /// in catalog order. A saved feature the catalog no longer carries, or
    /// one whose arity changed, is a data error; catalog features absent
    /// from the document keep the default weight 1.0.
    pub fn apply_to(&self, classifier: &mut KnnClassifier) -> Result<()> {
        if self.version > SETTINGS_VERSION {
            return Err(GlyphKnnError::Data(format!(
                "settings version {} is newer than supported version {}",
                self.version, SETTINGS_VERSION
            )));
        }
        let catalog = classifier.catalog().clone();
        let mut weights = vec![1.0; catalog.dimensions()];
        for feature in &self.features {
            let (offset, arity) = catalog.offset_of(&feature.name).ok_or_else(|| {
                GlyphKnnError::Data(format!(
                    "unknown feature '{}' in saved settings",
                    feature.name
                ))
            })?;
            if feature.weights.len() != arity {
                return Err(GlyphKnnError::Data(format!(
                    "feature '{}' has arity {} in the catalog but {} saved weights",
                    feature.name,
                    arity,
                    feature.weights.len()
                )));
            }
            weights[offset..offset + arity].copy_from_slice(&feature.weights);
        }
        classifier.set_k(self.num_k)?;
        classifier.set_metric(self.distance_metric)?;
        classifier.set_weights(weights)?;
        Ok(())
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let settings = Self::from_toml_str(&contents)?;
        debug!(
            "loaded settings version {}: k={}, {} features",
            settings.version,
            settings.num_k,
            settings.features.len()
        );
        Ok(settings)
    }
}
