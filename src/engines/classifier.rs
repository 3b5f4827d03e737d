use crate::engines::distance::{distance, distance_within};
use crate::error::{GlyphKnnError, Result};
use crate::features::{FeatureCatalog, TrainingDatabase, TrainingItem};
use crate::types::DistanceMetric;
use std::ops::Range;

/// One entry in a ranked classification result.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub distance: f64,
    pub label: String,
}

/// Interactive k-NN classifier over weighted feature vectors.
///
/// Owns the training database, the live weight vector and selection mask,
/// and the feature catalog describing vector layout. All mutators refuse to
/// run while a GA optimization run is active on this instance; the
/// optimizer reads through an immutable snapshot and writes back only via
/// an explicit commit.
#[derive(Debug, Clone)]
pub struct KnnClassifier {
    catalog: FeatureCatalog,
    database: TrainingDatabase,
    weights: Vec<f64>,
    mask: Vec<bool>,
    num_k: usize,
    metric: DistanceMetric,
    run_active: bool,
}

impl KnnClassifier {
    pub fn new(catalog: FeatureCatalog) -> Self {
        let n = catalog.dimensions();
        Self {
            catalog,
            database: TrainingDatabase::new(n),
            weights: vec![1.0; n],
            mask: vec![true; n],
            num_k: 1,
            metric: DistanceMetric::Euclidean,
            run_active: false,
        }
    }

    pub fn catalog(&self) -> &FeatureCatalog {
        &self.catalog
    }

    pub fn database(&self) -> &TrainingDatabase {
        &self.database
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn selection(&self) -> &[bool] {
        &self.mask
    }

    pub fn num_k(&self) -> usize {
        self.num_k
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub fn dimensions(&self) -> usize {
        self.catalog.dimensions()
    }

    pub fn is_run_active(&self) -> bool {
        self.run_active
    }

    pub(crate) fn begin_run(&mut self) -> Result<()> {
        if self.run_active {
            return Err(GlyphKnnError::ConcurrencyMisuse(
                "an optimization run is already active on this classifier".to_string(),
            ));
        }
        self.run_active = true;
        Ok(())
    }

    pub(crate) fn end_run(&mut self) {
        self.run_active = false;
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.run_active {
            return Err(GlyphKnnError::ConcurrencyMisuse(
                "classifier state cannot change while an optimization run is active".to_string(),
            ));
        }
        Ok(())
    }

    pub fn add_item(&mut self, item: TrainingItem) -> Result<()> {
        self.ensure_idle()?;
        self.database.add(item)
    }

    pub fn remove_item(&mut self, index: usize) -> Result<TrainingItem> {
        self.ensure_idle()?;
        self.database.remove(index)
    }

    pub fn set_include_heuristic(&mut self, include: bool) -> Result<()> {
        self.ensure_idle()?;
        self.database.set_include_heuristic(include);
        Ok(())
    }

    pub fn set_weights(&mut self, weights: Vec<f64>) -> Result<()> {
        self.ensure_idle()?;
        if weights.len() != self.dimensions() {
            return Err(GlyphKnnError::Data(format!(
                "weight vector length {} does not match {} dimensions",
                weights.len(),
                self.dimensions()
            )));
        }
        if weights.iter().any(|w| *w < 0.0 || !w.is_finite()) {
            return Err(GlyphKnnError::Data(
                "weights must be finite and non-negative".to_string(),
            ));
        }
        self.weights = weights;
        Ok(())
    }

    pub fn set_selection(&mut self, mask: Vec<bool>) -> Result<()> {
        self.ensure_idle()?;
        if mask.len() != self.dimensions() {
            return Err(GlyphKnnError::Data(format!(
                "selection mask length {} does not match {} dimensions",
                mask.len(),
                self.dimensions()
            )));
        }
        self.mask = mask;
        Ok(())
    }

    pub fn set_k(&mut self, k: usize) -> Result<()> {
        self.ensure_idle()?;
        if k == 0 {
            return Err(GlyphKnnError::Configuration(
                "k must be at least 1".to_string(),
            ));
        }
        self.num_k = k;
        Ok(())
    }

    pub fn set_metric(&mut self, metric: DistanceMetric) -> Result<()> {
        self.ensure_idle()?;
        self.metric = metric;
        Ok(())
    }

    /// Replace the feature catalog. All stored vectors were produced under
    /// the old layout, so the database is cleared and weights/mask reset;
    /// the caller regenerates and re-adds its items.
    pub fn change_feature_set(&mut self, catalog: FeatureCatalog) -> Result<()> {
        self.ensure_idle()?;
        let n = catalog.dimensions();
        self.catalog = catalog;
        self.database = TrainingDatabase::new(n);
        self.weights = vec![1.0; n];
        self.mask = vec![true; n];
        Ok(())
    }

    /// Used by the optimizer's commit step; bypasses the run-active guard
    /// because the runner holds the classifier lock while calling it.
    pub(crate) fn commit_genes(&mut self, weights: Vec<f64>, mask: Vec<bool>) {
        debug_assert_eq!(weights.len(), self.dimensions());
        debug_assert_eq!(mask.len(), self.dimensions());
        self.weights = weights;
        self.mask = mask;
    }

    pub(crate) fn restore_parts(
        catalog: FeatureCatalog,
        database: TrainingDatabase,
        weights: Vec<f64>,
        mask: Vec<bool>,
        num_k: usize,
        metric: DistanceMetric,
    ) -> Self {
        Self {
            catalog,
            database,
            weights,
            mask,
            num_k,
            metric,
            run_active: false,
        }
    }

    /// Rank the k training items nearest to `query` under the given genes.
    /// Ties sort stably in database insertion order. `exclude` drops one
    /// database index from consideration, which is how leave-one-out avoids
    /// mutating the database.
    fn rank(
        &self,
        query: &[f64],
        weights: &[f64],
        mask: &[bool],
        k: usize,
        exclude: Option<usize>,
    ) -> Result<Vec<(f64, usize)>> {
        let mut ranked: Vec<(f64, usize)> = Vec::new();
        // Once k candidates are in hand, the current k-th distance is a
        // valid cutoff for every remaining candidate.
        let mut cutoff: Option<f64> = None;
        for (index, item) in self.database.training_iter() {
            if Some(index) == exclude {
                continue;
            }
            let d = match cutoff {
                Some(max) => {
                    match distance_within(query, &item.vector, weights, mask, self.metric, max)? {
                        Some(d) => d,
                        None => continue,
                    }
                }
                None => distance(query, &item.vector, weights, mask, self.metric)?,
            };
            ranked.push((d, index));
            ranked.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
            if ranked.len() > k {
                ranked.truncate(k);
            }
            if ranked.len() == k {
                cutoff = Some(ranked[k - 1].0);
            }
        }
        Ok(ranked)
    }

    fn to_neighbors(&self, ranked: Vec<(f64, usize)>) -> Vec<Neighbor> {
        ranked
            .into_iter()
            .filter_map(|(d, i)| {
                self.database.get(i).map(|item| Neighbor {
                    distance: d,
                    label: item.label.clone(),
                })
            })
            .collect()
    }

    /// Classify a query vector against the training data, returning the k
    /// nearest (distance, label) pairs in ascending distance order.
    pub fn classify(&self, query: &[f64]) -> Result<Vec<Neighbor>> {
        if query.len() != self.dimensions() {
            return Err(GlyphKnnError::Data(format!(
                "query vector length {} does not match {} dimensions",
                query.len(),
                self.dimensions()
            )));
        }
        if self.database.training_len() == 0 {
            return Err(GlyphKnnError::Data("no training data".to_string()));
        }
        let ranked = self.rank(query, &self.weights, &self.mask, self.num_k, None)?;
        Ok(self.to_neighbors(ranked))
    }

    /// Classify and collapse to a single label by majority vote.
    pub fn guess(&self, query: &[f64]) -> Result<String> {
        let ranked = self.classify(query)?;
        Self::majority_label(&ranked).ok_or_else(|| {
            GlyphKnnError::Data("no training data".to_string())
        })
    }

    /// Equal-weight majority vote over a ranked neighbor list. A vote tie
    /// goes to whichever tied label owns the nearest neighbor; since the
    /// list is sorted ascending, that is the tied label seen first.
    pub fn majority_label(ranked: &[Neighbor]) -> Option<String> {
        let mut counts: Vec<(&str, usize)> = Vec::new();
        for neighbor in ranked {
            match counts.iter_mut().find(|(l, _)| *l == neighbor.label) {
                Some((_, c)) => *c += 1,
                None => counts.push((&neighbor.label, 1)),
            }
        }
        // First-seen order means nearest-first, so a strict comparison
        // keeps the tie with the label owning the nearest neighbor.
        let mut best: Option<(&str, usize)> = None;
        for (label, count) in counts {
            match best {
                Some((_, best_count)) if count <= best_count => {}
                _ => best = Some((label, count)),
            }
        }
        best.map(|(label, _)| label.to_string())
    }

    fn loo_mask(&self, subset: Option<&Range<usize>>) -> Result<Vec<bool>> {
        match subset {
            None => Ok(self.mask.clone()),
            Some(range) => {
                if range.end > self.dimensions() {
                    return Err(GlyphKnnError::Data(format!(
                        "dimension range {}..{} exceeds {} dimensions",
                        range.start,
                        range.end,
                        self.dimensions()
                    )));
                }
                Ok(self
                    .mask
                    .iter()
                    .enumerate()
                    .map(|(i, &m)| m && range.contains(&i))
                    .collect())
            }
        }
    }

    /// Leave-one-out evaluation over the training data with the live
    /// weights and mask: every eligible item is classified against all the
    /// others and compared to its own label. Returns `(correct, total)`.
    ///
    /// `subset` restricts evaluation to a dimension range without copying
    /// reduced vectors, for exhaustive feature-search callers.
    /// `stop_threshold` allows bailing out once that many items have
    /// already missed; an early exit reports the correct count accumulated
    /// so far, never a better score than the truth.
    pub fn leave_one_out(
        &self,
        subset: Option<Range<usize>>,
        stop_threshold: Option<usize>,
    ) -> Result<(usize, usize)> {
        let mask = self.loo_mask(subset.as_ref())?;
        self.loo_counts(&self.weights, &mask, stop_threshold)
    }

    /// Leave-one-out accuracy under substituted genes, without touching the
    /// classifier's live state. This is the GA fitness path: read-only, so
    /// any number of evaluations may run in parallel against one snapshot.
    pub fn leave_one_out_with(&self, weights: &[f64], mask: &[bool]) -> Result<f64> {
        if weights.len() != self.dimensions() || mask.len() != self.dimensions() {
            return Err(GlyphKnnError::Data(format!(
                "gene length {}/{} does not match {} dimensions",
                weights.len(),
                mask.len(),
                self.dimensions()
            )));
        }
        let (correct, total) = self.loo_counts(weights, mask, None)?;
        Ok(correct as f64 / total as f64)
    }

    fn loo_counts(
        &self,
        weights: &[f64],
        mask: &[bool],
        stop_threshold: Option<usize>,
    ) -> Result<(usize, usize)> {
        let items: Vec<(usize, &TrainingItem)> = self.database.training_iter().collect();
        let total = items.len();
        if total == 0 {
            return Err(GlyphKnnError::Data("no training data".to_string()));
        }
        let mut correct = 0;
        let mut misses = 0;
        for &(index, item) in &items {
            let ranked = self.rank(&item.vector, weights, mask, self.num_k, Some(index))?;
            let neighbors = self.to_neighbors(ranked);
            let predicted = Self::majority_label(&neighbors);
            if predicted.as_deref() == Some(item.label.as_str()) {
                correct += 1;
            } else {
                misses += 1;
                if let Some(threshold) = stop_threshold {
                    if misses >= threshold {
                        return Ok((correct, total));
                    }
                }
            }
        }
        Ok((correct, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureCatalog;

    fn two_cluster_classifier() -> KnnClassifier {
        let catalog = FeatureCatalog::from_pairs([("pos", 2)]).unwrap();
        let mut classifier = KnnClassifier::new(catalog);
        classifier
            .add_item(TrainingItem::manual(vec![0.0, 0.0], "x"))
            .unwrap();
        classifier
            .add_item(TrainingItem::manual(vec![0.0, 1.0], "x"))
            .unwrap();
        classifier
            .add_item(TrainingItem::manual(vec![10.0, 10.0], "y"))
            .unwrap();
        classifier
            .add_item(TrainingItem::manual(vec![10.0, 11.0], "y"))
            .unwrap();
        classifier
    }

    #[test]
    fn test_classify_ranks_ascending() {
        let mut classifier = two_cluster_classifier();
        classifier.set_k(4).unwrap();

        let ranked = classifier.classify(&[0.0, 0.0]).unwrap();
        assert_eq!(ranked.len(), 4);
        for pair in ranked.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
        assert_eq!(ranked[0].label, "x");
        assert_eq!(ranked[0].distance, 0.0);
    }

    #[test]
    fn test_classify_empty_database_errors() {
        let catalog = FeatureCatalog::from_pairs([("pos", 2)]).unwrap();
        let classifier = KnnClassifier::new(catalog);
        assert!(classifier.classify(&[0.0, 0.0]).is_err());
    }

    #[test]
    fn test_leave_one_out_k1_two_clusters() {
        let classifier = two_cluster_classifier();
        assert_eq!(classifier.leave_one_out(None, None).unwrap(), (4, 4));
    }

    #[test]
    fn test_leave_one_out_k3_two_clusters() {
        // With k=3 every held-out point's neighbor set is dominated by the
        // opposite cluster, so all four misclassify.
        let mut classifier = two_cluster_classifier();
        classifier.set_k(3).unwrap();
        assert_eq!(classifier.leave_one_out(None, None).unwrap(), (0, 4));
    }

    #[test]
    fn test_leave_one_out_total_equals_database_size() {
        let classifier = two_cluster_classifier();
        let (correct, total) = classifier.leave_one_out(None, None).unwrap();
        assert_eq!(total, classifier.database().training_len());
        assert!(correct <= total);
    }

    #[test]
    fn test_leave_one_out_subset_range() {
        // Restricting to dimension 1 only: labels still separate on it.
        let classifier = two_cluster_classifier();
        assert_eq!(
            classifier.leave_one_out(Some(1..2), None).unwrap(),
            (4, 4)
        );
        assert!(classifier.leave_one_out(Some(0..5), None).is_err());
    }

    #[test]
    fn test_leave_one_out_stop_threshold_never_overreports() {
        let mut classifier = two_cluster_classifier();
        classifier.set_k(3).unwrap();
        let (correct, total) = classifier.leave_one_out(None, Some(2)).unwrap();
        assert_eq!(total, 4);
        // True score is (0, 4); an early exit may only underreport.
        assert_eq!(correct, 0);
    }

    #[test]
    fn test_majority_vote_tie_goes_to_nearest() {
        let ranked = vec![
            Neighbor {
                distance: 1.0,
                label: "a".to_string(),
            },
            Neighbor {
                distance: 2.0,
                label: "b".to_string(),
            },
            Neighbor {
                distance: 3.0,
                label: "b".to_string(),
            },
            Neighbor {
                distance: 4.0,
                label: "a".to_string(),
            },
        ];
        assert_eq!(KnnClassifier::majority_label(&ranked).as_deref(), Some("a"));
    }

    #[test]
    fn test_weights_reshape_neighborhoods() {
        let catalog = FeatureCatalog::from_pairs([("pos", 2)]).unwrap();
        let mut classifier = KnnClassifier::new(catalog);
        classifier
            .add_item(TrainingItem::manual(vec![0.0, 0.0], "x"))
            .unwrap();
        classifier
            .add_item(TrainingItem::manual(vec![5.0, 0.0], "x"))
            .unwrap();
        classifier
            .add_item(TrainingItem::manual(vec![0.0, 4.0], "y"))
            .unwrap();

        // Uniform weights: (5,0) is farther from origin than (0,4).
        let nearest = classifier.classify(&[0.1, 0.1]).unwrap();
        assert_eq!(nearest[0].label, "x");

        // Crushing dimension 1 makes the "y" item the runner-up no more.
        classifier.set_weights(vec![1.0, 100.0]).unwrap();
        let ranked = classifier.classify(&[4.0, 0.0]).unwrap();
        assert_eq!(ranked[0].label, "x");
    }

    #[test]
    fn test_mutators_refuse_wrong_lengths() {
        let mut classifier = two_cluster_classifier();
        assert!(classifier.set_weights(vec![1.0]).is_err());
        assert!(classifier.set_selection(vec![true]).is_err());
        assert!(classifier.set_weights(vec![-1.0, 1.0]).is_err());
        assert!(classifier.set_k(0).is_err());
    }

    #[test]
    fn test_change_feature_set_resets_state() {
        let mut classifier = two_cluster_classifier();
        classifier.set_weights(vec![2.0, 3.0]).unwrap();
        let catalog = FeatureCatalog::from_pairs([("a", 1), ("b", 2)]).unwrap();
        classifier.change_feature_set(catalog).unwrap();
        assert_eq!(classifier.dimensions(), 3);
        assert_eq!(classifier.weights(), &[1.0, 1.0, 1.0]);
        assert!(classifier.database().is_empty());
    }
}
