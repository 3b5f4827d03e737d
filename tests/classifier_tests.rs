use glyphknn::{
    ClassificationState, DistanceMetric, FeatureCatalog, KnnClassifier, TrainingItem,
};

fn two_cluster_classifier() -> KnnClassifier {
    let catalog = FeatureCatalog::from_pairs([("position", 2)]).unwrap();
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
fn leave_one_out_matches_reference_scenarios() {
    // k=1: each point's nearest other point shares its label.
    let mut classifier = two_cluster_classifier();
    assert_eq!(classifier.leave_one_out(None, None).unwrap(), (4, 4));

    // k=3: every neighbor set is dominated by the opposite cluster.
    classifier.set_k(3).unwrap();
    assert_eq!(classifier.leave_one_out(None, None).unwrap(), (0, 4));
}

#[test]
fn guess_votes_over_k_neighbors() {
    let mut classifier = two_cluster_classifier();
    classifier.set_k(2).unwrap();
    assert_eq!(classifier.guess(&[0.5, 0.5]).unwrap(), "x");
    assert_eq!(classifier.guess(&[9.5, 10.5]).unwrap(), "y");
}

#[test]
fn metric_choice_changes_distances_not_ranking_here() {
    let classifier = two_cluster_classifier();
    let euclidean = classifier.classify(&[1.0, 1.0]).unwrap();

    let mut cityblock_classifier = two_cluster_classifier();
    cityblock_classifier
        .set_metric(DistanceMetric::CityBlock)
        .unwrap();
    let cityblock = cityblock_classifier.classify(&[1.0, 1.0]).unwrap();

    assert_eq!(euclidean[0].label, cityblock[0].label);
    assert!(cityblock[0].distance >= euclidean[0].distance);
}

#[test]
fn fast_euclidean_ranks_like_euclidean() {
    let mut a = two_cluster_classifier();
    a.set_k(4).unwrap();
    let mut b = two_cluster_classifier();
    b.set_k(4).unwrap();
    b.set_metric(DistanceMetric::FastEuclidean).unwrap();

    let ranked_a: Vec<String> = a
        .classify(&[3.0, 3.0])
        .unwrap()
        .into_iter()
        .map(|n| n.label)
        .collect();
    let ranked_b: Vec<String> = b
        .classify(&[3.0, 3.0])
        .unwrap()
        .into_iter()
        .map(|n| n.label)
        .collect();
    assert_eq!(ranked_a, ranked_b);
}

#[test]
fn selection_mask_can_blind_the_classifier() {
    let catalog = FeatureCatalog::from_pairs([("signal", 1), ("noise", 1)]).unwrap();
    let mut classifier = KnnClassifier::new(catalog);
    // Labels separate on dimension 0; dimension 1 is adversarial.
    classifier
        .add_item(TrainingItem::manual(vec![0.0, 9.0], "a"))
        .unwrap();
    classifier
        .add_item(TrainingItem::manual(vec![0.1, 0.0], "a"))
        .unwrap();
    classifier
        .add_item(TrainingItem::manual(vec![5.0, 0.1], "b"))
        .unwrap();
    classifier
        .add_item(TrainingItem::manual(vec![5.1, 8.9], "b"))
        .unwrap();

    let (with_noise, _) = classifier.leave_one_out(None, None).unwrap();
    classifier.set_selection(vec![true, false]).unwrap();
    let (clean, total) = classifier.leave_one_out(None, None).unwrap();
    assert_eq!((clean, total), (4, 4));
    assert!(clean >= with_noise);
}

#[test]
fn automatic_items_do_not_train() {
    let mut classifier = two_cluster_classifier();
    classifier
        .add_item(TrainingItem {
            vector: vec![0.0, 0.5],
            label: "y".to_string(),
            state: ClassificationState::Automatic,
        })
        .unwrap();
    // The automatic item is ignored, so LOO is still over the 4 manual ones.
    assert_eq!(classifier.leave_one_out(None, None).unwrap(), (4, 4));
}

#[test]
fn add_rejects_incompatible_vector() {
    let mut classifier = two_cluster_classifier();
    let result = classifier.add_item(TrainingItem::manual(vec![1.0], "x"));
    assert!(result.is_err());
    assert_eq!(classifier.database().len(), 4);
}
