use crate::engines::classifier::KnnClassifier;
use crate::error::Result;
use crate::features::{FeatureCatalog, TrainingDatabase};
use crate::types::DistanceMetric;
use serde::{Deserialize, Serialize};

/// Opaque, implementation-specific serialization of a whole classifier:
/// training database, feature catalog, weights, mask, k, and metric. Used
/// for fast session reload without re-extracting features. The encoding is
/// not a portability contract; the only guarantee is that restore
/// reproduces identical classification behavior.
#[derive(Debug, Serialize, Deserialize)]
pub struct ClassifierSnapshot {
    catalog: FeatureCatalog,
    database: TrainingDatabase,
    weights: Vec<f64>,
    mask: Vec<bool>,
    num_k: usize,
    metric: DistanceMetric,
}

impl ClassifierSnapshot {
    pub fn capture(classifier: &KnnClassifier) -> Self {
        Self {
            catalog: classifier.catalog().clone(),
            database: classifier.database().clone(),
            weights: classifier.weights().to_vec(),
            mask: classifier.selection().to_vec(),
            num_k: classifier.num_k(),
            metric: classifier.metric(),
        }
    }

    pub fn restore(self) -> KnnClassifier {
        KnnClassifier::restore_parts(
            self.catalog,
            self.database,
            self.weights,
            self.mask,
            self.num_k,
            self.metric,
        )
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{FeatureCatalog, TrainingItem};

    #[test]
    fn test_roundtrip_preserves_classification() {
        let catalog = FeatureCatalog::from_pairs([("pos", 2)]).unwrap();
        let mut classifier = KnnClassifier::new(catalog);
        classifier
            .add_item(TrainingItem::manual(vec![0.0, 0.0], "x"))
            .unwrap();
        classifier
            .add_item(TrainingItem::manual(vec![10.0, 10.0], "y"))
            .unwrap();
        classifier.set_weights(vec![2.0, 0.5]).unwrap();
        classifier.set_metric(DistanceMetric::CityBlock).unwrap();

        let bytes = ClassifierSnapshot::capture(&classifier).to_bytes().unwrap();
        let restored = ClassifierSnapshot::from_bytes(&bytes).unwrap().restore();

        for query in [[1.0, 2.0], [9.0, 9.0], [4.0, 6.0]] {
            assert_eq!(
                classifier.classify(&query).unwrap(),
                restored.classify(&query).unwrap()
            );
        }
        assert_eq!(
            classifier.leave_one_out(None, None).unwrap(),
            restored.leave_one_out(None, None).unwrap()
        );
    }
}
