use crate::error::{GlyphKnnError, Result};
use crate::types::ClassificationState;
use serde::{Deserialize, Serialize};

/// One training/classification item: a pre-computed feature vector, its
/// ground-truth label, and how that label was assigned. Vectors are
/// immutable once stored; a feature-set change regenerates them wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingItem {
    pub vector: Vec<f64>,
    pub label: String,
    pub state: ClassificationState,
}

impl TrainingItem {
    pub fn manual(vector: Vec<f64>, label: impl Into<String>) -> Self {
        Self {
            vector,
            label: label.into(),
            state: ClassificationState::Manual,
        }
    }
}

/// Dense store of items keyed by insertion order. Insertion order is
/// load-bearing: classification ties are broken by it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingDatabase {
    items: Vec<TrainingItem>,
    dimensions: usize,
    include_heuristic: bool,
}

impl TrainingDatabase {
    pub fn new(dimensions: usize) -> Self {
        Self {
            items: Vec::new(),
            dimensions,
            include_heuristic: false,
        }
    }

    /// Whether heuristically labeled items count as training data alongside
    /// manual ones.
    pub fn set_include_heuristic(&mut self, include: bool) {
        self.include_heuristic = include;
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn add(&mut self, item: TrainingItem) -> Result<()> {
        if item.vector.len() != self.dimensions {
            return Err(GlyphKnnError::Data(format!(
                "incompatible feature vector: expected length {}, got {}",
                self.dimensions,
                item.vector.len()
            )));
        }
        self.items.push(item);
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Result<TrainingItem> {
        if index >= self.items.len() {
            return Err(GlyphKnnError::Data(format!(
                "item index {} out of range ({} items)",
                index,
                self.items.len()
            )));
        }
        Ok(self.items.remove(index))
    }

    pub fn get(&self, index: usize) -> Option<&TrainingItem> {
        self.items.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrainingItem> {
        self.items.iter()
    }

    fn is_training(&self, item: &TrainingItem) -> bool {
        match item.state {
            ClassificationState::Manual => true,
            ClassificationState::Heuristic => self.include_heuristic,
            _ => false,
        }
    }

    /// Indices of items eligible as training data, in insertion order.
    pub fn training_indices(&self) -> Vec<usize> {
        self.training_iter().map(|(i, _)| i).collect()
    }

    /// Training-eligible items with their database indices, in insertion
    /// order.
    pub fn training_iter(&self) -> impl Iterator<Item = (usize, &TrainingItem)> {
        self.items
            .iter()
            .enumerate()
            .filter(|(_, item)| self.is_training(item))
    }

    pub fn training_len(&self) -> usize {
        self.items.iter().filter(|i| self.is_training(i)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_rejects_wrong_length() {
        let mut db = TrainingDatabase::new(3);
        let result = db.add(TrainingItem::manual(vec![1.0, 2.0], "a"));
        assert!(result.is_err());
        assert!(db.is_empty());
    }

    #[test]
    fn test_training_indices_filter_by_state() {
        let mut db = TrainingDatabase::new(1);
        db.add(TrainingItem::manual(vec![0.0], "a")).unwrap();
        db.add(TrainingItem {
            vector: vec![1.0],
            label: "b".to_string(),
            state: ClassificationState::Automatic,
        })
        .unwrap();
        db.add(TrainingItem {
            vector: vec![2.0],
            label: "c".to_string(),
            state: ClassificationState::Heuristic,
        })
        .unwrap();

        assert_eq!(db.training_indices(), vec![0]);
        db.set_include_heuristic(true);
        assert_eq!(db.training_indices(), vec![0, 2]);
    }
}
