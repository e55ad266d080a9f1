use crate::model::tree::{DecisionTree, TreeParams};
use crate::model::{check_training_data, Classifier};
use anyhow::Result;
use ndarray::{Array1, ArrayView2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Random forest hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RandomForestParams {
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth of each tree (None = fully grown)
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Draw each tree's rows with replacement
    pub bootstrap: bool,
    pub seed: u64,
}

impl Default for RandomForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            bootstrap: true,
            seed: 42,
        }
    }
}

/// Bagged decision trees with sqrt(n_features) sampling per split
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    pub fn fit(x: ArrayView2<f64>, y: &[u8], params: &RandomForestParams) -> Result<Self> {
        check_training_data(x, y)?;

        let (n_samples, n_features) = x.dim();
        let targets: Vec<f64> = y.iter().map(|&l| f64::from(l)).collect();
        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split,
            min_samples_leaf: params.min_samples_leaf,
            max_features: Some(((n_features as f64).sqrt() as usize).max(1)),
        };

        let class_fraction = |rows: &[usize]| {
            rows.iter().map(|&r| targets[r]).sum::<f64>() / rows.len() as f64
        };

        let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
        let mut trees = Vec::with_capacity(params.n_estimators);

        for _ in 0..params.n_estimators {
            let rows: Vec<usize> = if params.bootstrap {
                (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
            } else {
                (0..n_samples).collect()
            };

            let tree = DecisionTree::fit(x, &targets, &rows, &tree_params, &mut rng, class_fraction)?;
            trees.push(tree);
        }

        debug!(
            "Random forest fitted: {} trees, mean depth {:.1}",
            trees.len(),
            trees.iter().map(|t| t.depth()).sum::<usize>() as f64 / trees.len().max(1) as f64
        );

        Ok(Self { trees })
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Mean class-1 fraction of the leaves each row reaches
    pub fn class_probabilities(&self, x: ArrayView2<f64>) -> Array1<f64> {
        let n_trees = self.trees.len().max(1) as f64;
        x.rows()
            .into_iter()
            .map(|row| self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>() / n_trees)
            .collect()
    }
}

impl Classifier for RandomForest {
    fn name(&self) -> &'static str {
        "random_forest"
    }

    fn predict_proba(&self, x: ArrayView2<f64>) -> Option<Array1<f64>> {
        Some(self.class_probabilities(x))
    }

    fn predict(&self, x: ArrayView2<f64>) -> Array1<u8> {
        self.class_probabilities(x).mapv(|p| u8::from(p > 0.5))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::blobs;

    fn small_params() -> RandomForestParams {
        RandomForestParams {
            n_estimators: 15,
            ..RandomForestParams::default()
        }
    }

    #[test]
    fn test_forest_learns_separable_data() {
        let (x, y) = blobs(80, 4, 3.0, 11);
        let forest = RandomForest::fit(x.view(), &y, &small_params()).unwrap();

        assert_eq!(forest.n_trees(), 15);
        let predictions = forest.predict(x.view());
        let correct = predictions.iter().zip(&y).filter(|(p, t)| p == t).count();
        assert!(correct as f64 / y.len() as f64 > 0.9);
    }

    #[test]
    fn test_probabilities_in_unit_interval() {
        let (x, y) = blobs(40, 3, 1.0, 5);
        let forest = RandomForest::fit(x.view(), &y, &small_params()).unwrap();

        let probs = forest.predict_proba(x.view()).unwrap();
        assert_eq!(probs.len(), 40);
        assert!(probs.iter().all(|&p| (0.0..=1.0).contains(&p)));
    }

    #[test]
    fn test_same_seed_same_forest() {
        let (x, y) = blobs(40, 3, 1.0, 5);
        let a = RandomForest::fit(x.view(), &y, &small_params()).unwrap();
        let b = RandomForest::fit(x.view(), &y, &small_params()).unwrap();

        assert_eq!(a.class_probabilities(x.view()), b.class_probabilities(x.view()));
    }

    #[test]
    fn test_single_class_is_rejected() {
        let (x, _) = blobs(10, 2, 1.0, 1);
        assert!(RandomForest::fit(x.view(), &[0; 10], &small_params()).is_err());
    }
}
