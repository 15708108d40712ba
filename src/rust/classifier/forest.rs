use log::debug;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::error::ClassifierError;
use super::vectorizer::SparseVector;
use crate::config::ForestConfig;
use crate::dataset::Label;

type ClassCounts = [usize; 2];

/// Column-oriented view of the training features.
///
/// Each column keeps `(sample, value)` pairs for its non-zero entries, sorted by
/// sample, so a tree can read one feature across a node's samples cheaply.
pub(crate) struct FeatureColumns {
    columns: Vec<Vec<(usize, f32)>>,
}

impl FeatureColumns {
    pub(crate) fn from_rows(rows: &[SparseVector], n_features: usize) -> Self {
        let mut columns = vec![Vec::new(); n_features];
        for (sample, row) in rows.iter().enumerate() {
            for &(feature, value) in row.entries() {
                if feature < n_features && value != 0.0 {
                    columns[feature].push((sample, value));
                }
            }
        }
        Self { columns }
    }

    fn n_features(&self) -> usize {
        self.columns.len()
    }

    fn value(&self, feature: usize, sample: usize) -> f32 {
        let column = &self.columns[feature];
        match column.binary_search_by_key(&sample, |&(s, _)| s) {
            Ok(pos) => column[pos].1,
            Err(_) => 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        label: Label,
    },
    Split {
        feature: usize,
        threshold: f32,
        left: usize,
        right: usize,
    },
}

struct SplitCandidate {
    feature: usize,
    threshold: f32,
    impurity: f64,
}

/// A binary decision tree grown on Gini impurity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    fn fit(
        features: &FeatureColumns,
        labels: &[Label],
        samples: Vec<usize>,
        config: &ForestConfig,
        tie_break: Label,
        rng: &mut StdRng,
    ) -> Self {
        let max_features = config.max_features.resolve(features.n_features());
        let mut nodes = vec![Node::Leaf { label: tie_break }];
        let mut pending = vec![(0usize, samples, 0usize)];

        while let Some((node_idx, samples, depth)) = pending.pop() {
            let counts = class_counts(labels, &samples);
            let leaf = Node::Leaf {
                label: majority(counts, tie_break),
            };

            let is_pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
            let depth_reached = config.max_depth.map_or(false, |max| depth >= max);
            if is_pure || depth_reached || samples.len() < 2 {
                nodes[node_idx] = leaf;
                continue;
            }

            let Some(split) = best_split(features, labels, &samples, max_features, rng) else {
                nodes[node_idx] = leaf;
                continue;
            };

            let (left_samples, right_samples): (Vec<usize>, Vec<usize>) = samples
                .into_iter()
                .partition(|&s| features.value(split.feature, s) <= split.threshold);

            let left = nodes.len();
            let right = left + 1;
            nodes.push(Node::Leaf { label: tie_break });
            nodes.push(Node::Leaf { label: tie_break });
            nodes[node_idx] = Node::Split {
                feature: split.feature,
                threshold: split.threshold,
                left,
                right,
            };
            pending.push((right, right_samples, depth + 1));
            pending.push((left, left_samples, depth + 1));
        }

        Self { nodes }
    }

    pub fn predict(&self, features: &SparseVector) -> Label {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { label } => return *label,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if features.get(*feature) <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((idx, depth)) = stack.pop() {
            max_depth = max_depth.max(depth);
            if let Node::Split { left, right, .. } = &self.nodes[idx] {
                stack.push((*left, depth + 1));
                stack.push((*right, depth + 1));
            }
        }
        max_depth
    }

    /// Children must come after their parent so traversal always terminates.
    fn validate(&self, n_features: usize) -> Result<(), ClassifierError> {
        if self.nodes.is_empty() {
            return Err(ClassifierError::ValidationError("Tree has no nodes".into()));
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            if let Node::Split {
                feature, left, right, ..
            } = node
            {
                let in_range = |child: usize| child > idx && child < self.nodes.len();
                if *feature >= n_features || !in_range(*left) || !in_range(*right) {
                    return Err(ClassifierError::ValidationError(format!(
                        "Malformed split at node {}",
                        idx
                    )));
                }
            }
        }
        Ok(())
    }
}

fn class_counts(labels: &[Label], samples: &[usize]) -> ClassCounts {
    let mut counts = [0; 2];
    for &s in samples {
        counts[labels[s].index()] += 1;
    }
    counts
}

fn majority(counts: ClassCounts, tie_break: Label) -> Label {
    match counts[0].cmp(&counts[1]) {
        std::cmp::Ordering::Greater => Label::from_index(0),
        std::cmp::Ordering::Less => Label::from_index(1),
        std::cmp::Ordering::Equal => tie_break,
    }
}

fn gini(counts: ClassCounts, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    1.0 - counts.iter().map(|&c| (c as f64 / total).powi(2)).sum::<f64>()
}

/// Tries features in random order. At least `max_features` are examined, and
/// the search keeps going past that while no valid split has been found.
fn best_split(
    features: &FeatureColumns,
    labels: &[Label],
    samples: &[usize],
    max_features: usize,
    rng: &mut StdRng,
) -> Option<SplitCandidate> {
    let mut order: Vec<usize> = (0..features.n_features()).collect();
    order.shuffle(rng);

    let mut best: Option<SplitCandidate> = None;
    for (examined, &feature) in order.iter().enumerate() {
        if examined >= max_features && best.is_some() {
            break;
        }
        if let Some(candidate) = best_threshold(features, labels, samples, feature) {
            if best.as_ref().map_or(true, |b| candidate.impurity < b.impurity) {
                best = Some(candidate);
            }
        }
    }
    best
}

fn best_threshold(
    features: &FeatureColumns,
    labels: &[Label],
    samples: &[usize],
    feature: usize,
) -> Option<SplitCandidate> {
    let mut values: Vec<(f32, Label)> = samples
        .iter()
        .map(|&s| (features.value(feature, s), labels[s]))
        .collect();
    values.sort_by(|a, b| a.0.total_cmp(&b.0));

    let total = values.len();
    let (first, last) = (values.first()?.0, values.last()?.0);
    if first == last {
        return None;
    }

    let mut total_counts = [0; 2];
    for (_, label) in &values {
        total_counts[label.index()] += 1;
    }

    let mut left_counts = [0; 2];
    let mut best: Option<SplitCandidate> = None;
    for i in 0..total - 1 {
        left_counts[values[i].1.index()] += 1;
        let (current, next) = (values[i].0, values[i + 1].0);
        if current == next {
            continue;
        }

        let n_left = i + 1;
        let n_right = total - n_left;
        let right_counts = [total_counts[0] - left_counts[0], total_counts[1] - left_counts[1]];
        let impurity = (n_left as f64 * gini(left_counts, n_left)
            + n_right as f64 * gini(right_counts, n_right))
            / total as f64;

        if best.as_ref().map_or(true, |b| impurity < b.impurity) {
            let mut threshold = current + (next - current) / 2.0;
            if threshold >= next {
                threshold = current;
            }
            best = Some(SplitCandidate {
                feature,
                threshold,
                impurity,
            });
        }
    }
    best
}

/// Bagged decision trees with majority-vote prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_features: usize,
    /// Label returned when the vote is split evenly.
    tie_break: Label,
}

impl RandomForest {
    pub(crate) fn fit(
        features: &FeatureColumns,
        labels: &[Label],
        config: &ForestConfig,
        seed: u64,
    ) -> Result<Self, ClassifierError> {
        if config.n_trees == 0 {
            return Err(ClassifierError::ValidationError("Forest needs at least one tree".into()));
        }
        if labels.is_empty() {
            return Err(ClassifierError::ValidationError("Cannot fit a forest on zero samples".into()));
        }

        let all: Vec<usize> = (0..labels.len()).collect();
        let tie_break = majority(class_counts(labels, &all), Label::NotEligible);

        let mut master = StdRng::seed_from_u64(seed);
        let mut trees = Vec::with_capacity(config.n_trees);
        for _ in 0..config.n_trees {
            let mut rng = StdRng::seed_from_u64(master.random::<u64>());
            let samples = if config.bootstrap {
                (0..labels.len()).map(|_| rng.random_range(0..labels.len())).collect()
            } else {
                all.clone()
            };
            trees.push(DecisionTree::fit(features, labels, samples, config, tie_break, &mut rng));
        }

        debug!(
            "Fitted {} trees (max depth {})",
            trees.len(),
            trees.iter().map(DecisionTree::depth).max().unwrap_or(0)
        );
        Ok(Self {
            trees,
            n_features: features.n_features(),
            tie_break,
        })
    }

    /// Per-label vote counts, indexed like [`Label::ALL`].
    pub fn votes(&self, features: &SparseVector) -> [usize; 2] {
        let mut votes = [0; 2];
        for tree in &self.trees {
            votes[tree.predict(features).index()] += 1;
        }
        votes
    }

    pub fn predict(&self, features: &SparseVector) -> Label {
        majority(self.votes(features), self.tie_break)
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub(crate) fn validate(&self) -> Result<(), ClassifierError> {
        if self.trees.is_empty() {
            return Err(ClassifierError::ValidationError("Forest has no trees".into()));
        }
        self.trees.iter().try_for_each(|t| t.validate(self.n_features))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MaxFeatures;

    fn rows() -> (Vec<SparseVector>, Vec<Label>) {
        let rows = vec![
            SparseVector::from_sorted(vec![(0, 1.0)]),
            SparseVector::from_sorted(vec![(0, 0.9), (2, 0.1)]),
            SparseVector::from_sorted(vec![(1, 1.0)]),
            SparseVector::from_sorted(vec![(1, 0.8), (2, 0.6)]),
        ];
        let labels = vec![Label::Eligible, Label::Eligible, Label::NotEligible, Label::NotEligible];
        (rows, labels)
    }

    #[test]
    fn test_single_tree_separates_training_data() {
        let (rows, labels) = rows();
        let columns = FeatureColumns::from_rows(&rows, 3);
        let config = ForestConfig {
            n_trees: 1,
            max_features: MaxFeatures::All,
            max_depth: None,
            bootstrap: false,
        };
        let forest = RandomForest::fit(&columns, &labels, &config, 7).unwrap();
        for (row, label) in rows.iter().zip(&labels) {
            assert_eq!(forest.predict(row), *label);
        }
        assert_eq!(forest.trees[0].depth(), 1);
    }

    #[test]
    fn test_forest_is_deterministic_for_seed() {
        let (rows, labels) = rows();
        let columns = FeatureColumns::from_rows(&rows, 3);
        let config = ForestConfig::default();
        let a = RandomForest::fit(&columns, &labels, &config, 42).unwrap();
        let b = RandomForest::fit(&columns, &labels, &config, 42).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.n_trees(), 100);
    }

    #[test]
    fn test_depth_limit_produces_stumps() {
        let (rows, labels) = rows();
        let columns = FeatureColumns::from_rows(&rows, 3);
        let config = ForestConfig {
            n_trees: 5,
            max_depth: Some(0),
            ..ForestConfig::default()
        };
        let forest = RandomForest::fit(&columns, &labels, &config, 1).unwrap();
        assert!(forest.trees.iter().all(|t| t.node_count() == 1));
    }

    #[test]
    fn test_even_vote_uses_tie_break() {
        assert_eq!(majority([3, 3], Label::Eligible), Label::Eligible);
        assert_eq!(majority([3, 3], Label::NotEligible), Label::NotEligible);
        assert_eq!(majority([1, 3], Label::Eligible), Label::NotEligible);
    }

    #[test]
    fn test_gini() {
        assert_eq!(gini([2, 0], 2), 0.0);
        assert!((gini([1, 1], 2) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_validate_rejects_backward_links() {
        let tree = DecisionTree {
            nodes: vec![Node::Split {
                feature: 0,
                threshold: 0.5,
                left: 0,
                right: 0,
            }],
        };
        assert!(tree.validate(1).is_err());
    }
}
