//! CART regression tree
//!
//! Splits minimize the squared error of the targets. On 0/1 targets this
//! orders splits exactly like Gini impurity, so the same tree serves the
//! random forest (leaf value = class-1 fraction) and gradient boosting
//! (leaf value = Newton step on the residuals).

use anyhow::{bail, Result};
use ndarray::{ArrayView1, ArrayView2};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Minimum score improvement for a split to be kept
const MIN_GAIN: f64 = 1e-12;

/// Growth limits of a single tree
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    /// Maximum depth (None = grow until leaves are pure)
    pub max_depth: Option<usize>,
    /// Minimum samples required to split a node
    pub min_samples_split: usize,
    /// Minimum samples in each child
    pub min_samples_leaf: usize,
    /// Features considered per split (None = all)
    pub max_features: Option<usize>,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Node {
    Leaf {
        value: f64,
        samples: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn depth(&self) -> usize {
        match self {
            Node::Leaf { .. } => 0,
            Node::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    fn n_leaves(&self) -> usize {
        match self {
            Node::Leaf { .. } => 1,
            Node::Split { left, right, .. } => left.n_leaves() + right.n_leaves(),
        }
    }
}

/// Fitted decision tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Node,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

struct Builder<'a, F> {
    x: ArrayView2<'a, f64>,
    targets: &'a [f64],
    params: &'a TreeParams,
    leaf_value: F,
}

impl DecisionTree {
    /// Grow a tree on the given rows (duplicates act as sample weights)
    ///
    /// `leaf_value` maps the rows that reach a leaf to the value it predicts.
    pub fn fit<F>(
        x: ArrayView2<f64>,
        targets: &[f64],
        rows: &[usize],
        params: &TreeParams,
        rng: &mut ChaCha8Rng,
        leaf_value: F,
    ) -> Result<Self>
    where
        F: Fn(&[usize]) -> f64,
    {
        if x.nrows() != targets.len() {
            bail!(
                "x has {} rows but {} targets were given",
                x.nrows(),
                targets.len()
            );
        }
        if rows.is_empty() {
            bail!("Cannot grow a tree on 0 samples");
        }
        if params.min_samples_leaf == 0 {
            bail!("min_samples_leaf must be at least 1");
        }

        let builder = Builder {
            x: x.reborrow(),
            targets,
            params,
            leaf_value,
        };
        let root = builder.build(rows.to_vec(), 0, rng);

        Ok(Self { root })
    }

    /// Value of the leaf a row falls into
    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                Node::Leaf { value, .. } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        self.root.depth()
    }

    pub fn n_leaves(&self) -> usize {
        self.root.n_leaves()
    }
}

impl<'a, F> Builder<'a, F>
where
    F: Fn(&[usize]) -> f64,
{
    fn build(&self, rows: Vec<usize>, depth: usize, rng: &mut ChaCha8Rng) -> Node {
        let n = rows.len();
        let depth_reached = self.params.max_depth.map_or(false, |d| depth >= d);

        if depth_reached
            || n < self.params.min_samples_split
            || n < 2 * self.params.min_samples_leaf
            || self.is_pure(&rows)
        {
            return self.leaf(&rows);
        }

        let Some(split) = self.best_split(&rows, rng) else {
            return self.leaf(&rows);
        };

        let (left, right): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .partition(|&&r| self.x[[r, split.feature]] <= split.threshold);

        Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: Box::new(self.build(left, depth + 1, rng)),
            right: Box::new(self.build(right, depth + 1, rng)),
        }
    }

    fn leaf(&self, rows: &[usize]) -> Node {
        Node::Leaf {
            value: (self.leaf_value)(rows),
            samples: rows.len(),
        }
    }

    fn is_pure(&self, rows: &[usize]) -> bool {
        let first = self.targets[rows[0]];
        rows.iter().all(|&r| self.targets[r] == first)
    }

    fn candidate_features(&self, rng: &mut ChaCha8Rng) -> Vec<usize> {
        let n_features = self.x.ncols();
        match self.params.max_features {
            Some(m) if m > 0 && m < n_features => {
                rand::seq::index::sample(rng, n_features, m).into_vec()
            }
            _ => (0..n_features).collect(),
        }
    }

    /// Best threshold over the candidate features
    ///
    /// Minimizing SSE is the same as maximizing sum_L^2/n_L + sum_R^2/n_R.
    fn best_split(&self, rows: &[usize], rng: &mut ChaCha8Rng) -> Option<SplitCandidate> {
        let n = rows.len();
        let min_leaf = self.params.min_samples_leaf;
        let total: f64 = rows.iter().map(|&r| self.targets[r]).sum();
        let parent_score = total * total / n as f64;

        let mut best: Option<SplitCandidate> = None;
        let mut pairs: Vec<(f64, f64)> = Vec::with_capacity(n);

        for feature in self.candidate_features(rng) {
            pairs.clear();
            pairs.extend(rows.iter().map(|&r| (self.x[[r, feature]], self.targets[r])));
            pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left_sum = 0.0;
            for i in 0..n - 1 {
                left_sum += pairs[i].1;
                let (value, next) = (pairs[i].0, pairs[i + 1].0);
                if value == next {
                    continue;
                }

                let left_n = i + 1;
                let right_n = n - left_n;
                if left_n < min_leaf || right_n < min_leaf {
                    continue;
                }

                let right_sum = total - left_sum;
                let score = left_sum * left_sum / left_n as f64 + right_sum * right_sum / right_n as f64;
                let gain = score - parent_score;

                if gain > MIN_GAIN && best.as_ref().map_or(true, |b| gain > b.gain) {
                    let mut threshold = value / 2.0 + next / 2.0;
                    if threshold >= next {
                        threshold = value;
                    }
                    best = Some(SplitCandidate {
                        feature,
                        threshold,
                        gain,
                    });
                }
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;

    fn mean_of(targets: &[f64]) -> impl Fn(&[usize]) -> f64 + '_ {
        move |rows: &[usize]| rows.iter().map(|&r| targets[r]).sum::<f64>() / rows.len() as f64
    }

    #[test]
    fn test_single_split() {
        let x = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
        let y = [0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let rows: Vec<usize> = (0..6).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let tree = DecisionTree::fit(x.view(), &y, &rows, &TreeParams::default(), &mut rng, mean_of(&y)).unwrap();

        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.n_leaves(), 2);
        assert_eq!(tree.predict_row(array![2.5].view()), 0.0);
        assert_eq!(tree.predict_row(array![6.5].view()), 0.0);
        assert_eq!(tree.predict_row(array![6.6].view()), 1.0);
    }

    #[test]
    fn test_max_depth_limits_growth() {
        let x = array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
        let y = [0.0, 1.0, 1.0, 0.0];
        let rows: Vec<usize> = (0..4).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let params = TreeParams {
            max_depth: Some(1),
            ..TreeParams::default()
        };
        let tree = DecisionTree::fit(x.view(), &y, &rows, &params, &mut rng, mean_of(&y)).unwrap();

        // XOR has no informative single split
        assert_eq!(tree.depth(), 0);
        assert_eq!(tree.predict_row(array![0.0, 0.0].view()), 0.5);
    }

    #[test]
    fn test_constant_features_make_a_leaf() {
        let x = array![[1.0], [1.0], [1.0]];
        let y = [0.0, 1.0, 1.0];
        let rows: Vec<usize> = (0..3).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let tree = DecisionTree::fit(x.view(), &y, &rows, &TreeParams::default(), &mut rng, mean_of(&y)).unwrap();
        assert_eq!(tree.n_leaves(), 1);
        assert!((tree.predict_row(array![1.0].view()) - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_min_samples_leaf() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = [1.0, 0.0, 0.0, 0.0];
        let rows: Vec<usize> = (0..4).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let params = TreeParams {
            min_samples_leaf: 2,
            ..TreeParams::default()
        };
        let tree = DecisionTree::fit(x.view(), &y, &rows, &params, &mut rng, mean_of(&y)).unwrap();

        // The only allowed split is 2 | 2
        assert_eq!(tree.predict_row(array![1.0].view()), 0.5);
        assert_eq!(tree.predict_row(array![4.0].view()), 0.0);
    }

    #[test]
    fn test_rejects_mismatched_targets() {
        let x = array![[1.0], [2.0]];
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let y = [1.0];
        assert!(DecisionTree::fit(x.view(), &y, &[0], &TreeParams::default(), &mut rng, mean_of(&y)).is_err());
    }
}
