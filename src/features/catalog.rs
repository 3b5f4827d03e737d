use crate::error::{GlyphKnnError, Result};
use serde::{Deserialize, Serialize};

/// One feature-producing function: a name plus the number of vector
/// dimensions it emits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub name: String,
    pub arity: usize,
}

/// Ordered list of the feature functions that produced the vectors the
/// classifier operates on. The order fixes the layout of every feature
/// vector: feature `i` occupies `offset_of(name)` .. `offset + arity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureCatalog {
    features: Vec<FeatureSpec>,
    dimensions: usize,
}

impl FeatureCatalog {
    pub fn new(features: Vec<FeatureSpec>) -> Result<Self> {
        let mut seen = std::collections::HashSet::new();
        for spec in &features {
            if spec.arity == 0 {
                return Err(GlyphKnnError::Data(format!(
                    "feature '{}' has zero arity",
                    spec.name
                )));
            }
            if !seen.insert(spec.name.as_str()) {
                return Err(GlyphKnnError::Data(format!(
                    "duplicate feature name '{}'",
                    spec.name
                )));
            }
        }
        let dimensions = features.iter().map(|f| f.arity).sum();
        Ok(Self {
            features,
            dimensions,
        })
    }

    /// Convenience constructor from `(name, arity)` pairs.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, usize)>,
        S: Into<String>,
    {
        Self::new(
            pairs
                .into_iter()
                .map(|(name, arity)| FeatureSpec {
                    name: name.into(),
                    arity,
                })
                .collect(),
        )
    }

    /// Total feature-vector length implied by this catalog.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeatureSpec> {
        self.features.iter()
    }

    /// Starting offset and arity of the named feature within a vector.
    pub fn offset_of(&self, name: &str) -> Option<(usize, usize)> {
        let mut offset = 0;
        for spec in &self.features {
            if spec.name == name {
                return Some((offset, spec.arity));
            }
            offset += spec.arity;
        }
        None
    }
}
