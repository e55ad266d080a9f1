use crate::data::{LabeledSample, SplitConfig, RAW_FEATURE_NAMES};
use anyhow::{bail, Context, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Median of a slice (NaN values are ignored)
pub fn median(values: &[f64]) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return None;
    }

    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}

/// Replaces zero measurements with the column median
///
/// Medians are taken over every row of the column, zeros included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZeroImputer {
    /// (feature index, median) for each imputed column
    medians: Vec<(usize, f64)>,
}

impl ZeroImputer {
    /// Compute column medians for the given feature indices
    pub fn fit(samples: &[LabeledSample], columns: &[usize]) -> Result<Self> {
        if samples.is_empty() {
            bail!("Cannot fit imputer on an empty dataset");
        }

        let mut medians = Vec::with_capacity(columns.len());
        for &col in columns {
            let values: Vec<f64> = samples
                .iter()
                .map(|s| s.sample.get(col))
                .collect::<Option<Vec<_>>>()
                .with_context(|| format!("Invalid feature index {}", col))?;
            let m = median(&values).with_context(|| format!("No values for column {}", col))?;
            debug!("Median of {}: {}", RAW_FEATURE_NAMES[col], m);
            medians.push((col, m));
        }

        Ok(Self { medians })
    }

    /// Median used for a feature index, if that column is imputed
    pub fn median_for(&self, column: usize) -> Option<f64> {
        self.medians.iter().find(|(c, _)| *c == column).map(|(_, m)| *m)
    }

    /// Replace zeros in place, returning the number of replaced values
    pub fn transform(&self, samples: &mut [LabeledSample]) -> usize {
        let mut replaced = 0;
        for labeled in samples.iter_mut() {
            for &(col, m) in &self.medians {
                if labeled.sample.get(col) == Some(0.0) {
                    labeled.sample.set(col, m);
                    replaced += 1;
                }
            }
        }
        replaced
    }
}

/// Per-feature standardization to zero mean and unit variance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    /// Mean value for each feature
    pub means: Vec<f64>,
    /// Population standard deviation for each feature (1.0 when constant)
    pub stds: Vec<f64>,
}

impl StandardScaler {
    /// Learn means and deviations from a feature matrix
    pub fn fit(data: &Array2<f64>) -> Result<Self> {
        if data.nrows() == 0 {
            bail!("Cannot fit scaler on an empty matrix");
        }

        let means = data
            .mean_axis(Axis(0))
            .context("Failed to compute feature means")?;
        let stds = data.std_axis(Axis(0), 0.0).mapv(|s| if s < 1e-12 { 1.0 } else { s });

        Ok(Self {
            means: means.to_vec(),
            stds: stds.to_vec(),
        })
    }

    /// Number of features the scaler was fitted on
    pub fn n_features(&self) -> usize {
        self.means.len()
    }

    /// Standardize every row of a matrix
    pub fn transform(&self, data: &Array2<f64>) -> Result<Array2<f64>> {
        if data.ncols() != self.n_features() {
            bail!(
                "Scaler expects {} features, got {}",
                self.n_features(),
                data.ncols()
            );
        }

        let means = Array1::from(self.means.clone());
        let stds = Array1::from(self.stds.clone());
        Ok((data - &means) / &stds)
    }

    /// Standardize a single row
    pub fn transform_row(&self, row: ArrayView1<f64>) -> Result<Array1<f64>> {
        if row.len() != self.n_features() {
            bail!(
                "Scaler expects {} features, got {}",
                self.n_features(),
                row.len()
            );
        }

        Ok(row
            .iter()
            .zip(self.means.iter().zip(&self.stds))
            .map(|(&v, (&m, &s))| (v - m) / s)
            .collect())
    }
}

/// Indices of the test partition for a (stratified) shuffle split
pub fn split_indices(targets: &[u8], config: &SplitConfig) -> Result<(Vec<usize>, Vec<usize>)> {
    crate::utils::validation::open_unit_interval(config.test_ratio, "test_ratio")?;
    if targets.len() < 2 {
        bail!("Need at least 2 samples to split, got {}", targets.len());
    }

    info!(
        "Splitting {} samples with seed {} (test_ratio={}, stratify={})",
        targets.len(),
        config.seed,
        config.test_ratio,
        config.stratify
    );

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let groups: Vec<Vec<usize>> = if config.stratify {
        class_groups(targets).into_values().collect()
    } else {
        vec![(0..targets.len()).collect()]
    };

    let mut train = Vec::new();
    let mut test = Vec::new();

    for mut group in groups {
        group.shuffle(&mut rng);
        let n_test = ((group.len() as f64) * config.test_ratio).round() as usize;
        let n_test = n_test.min(group.len());
        test.extend_from_slice(&group[..n_test]);
        train.extend_from_slice(&group[n_test..]);
    }

    if train.is_empty() || test.is_empty() {
        bail!(
            "Split produced an empty partition (train={}, test={})",
            train.len(),
            test.len()
        );
    }

    train.shuffle(&mut rng);
    test.shuffle(&mut rng);
    Ok((train, test))
}

/// Stratified k-fold assignment: returns (train, validation) indices per fold
pub fn stratified_kfold(targets: &[u8], k: usize, seed: u64) -> Result<Vec<(Vec<usize>, Vec<usize>)>> {
    if k < 2 {
        bail!("Cross-validation needs at least 2 folds, got {}", k);
    }
    if targets.len() < k {
        bail!("Cannot make {} folds from {} samples", k, targets.len());
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut fold_of = vec![0usize; targets.len()];
    let mut next_fold = 0;

    for mut group in class_groups(targets).into_values() {
        group.shuffle(&mut rng);
        // Continue the round robin across classes so fold sizes stay even
        for idx in group {
            fold_of[idx] = next_fold;
            next_fold = (next_fold + 1) % k;
        }
    }

    Ok((0..k)
        .map(|fold| {
            let (val, train): (Vec<usize>, Vec<usize>) =
                (0..targets.len()).partition(|&i| fold_of[i] == fold);
            (train, val)
        })
        .collect())
}

/// Sample indices grouped by class label, in label order
fn class_groups(targets: &[u8]) -> BTreeMap<u8, Vec<usize>> {
    let mut groups: BTreeMap<u8, Vec<usize>> = BTreeMap::new();
    for (i, &t) in targets.iter().enumerate() {
        groups.entry(t).or_default().push(i);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{RawSample, GLUCOSE, INSULIN, SKIN_THICKNESS};
    use ndarray::array;

    fn labeled(values: [f64; 8], outcome: u8) -> LabeledSample {
        LabeledSample {
            sample: RawSample::from_slice(&values).unwrap(),
            outcome,
        }
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_zero_imputer() {
        let mut samples = vec![
            labeled([1.0, 0.0, 70.0, 0.0, 0.0, 30.0, 0.5, 40.0], 1),
            labeled([2.0, 100.0, 70.0, 20.0, 80.0, 30.0, 0.5, 40.0], 0),
            labeled([3.0, 120.0, 70.0, 30.0, 0.0, 30.0, 0.5, 40.0], 0),
        ];

        let imputer = ZeroImputer::fit(&samples, &[GLUCOSE, SKIN_THICKNESS, INSULIN]).unwrap();
        // Medians include the zeros
        assert_eq!(imputer.median_for(GLUCOSE), Some(100.0));
        assert_eq!(imputer.median_for(SKIN_THICKNESS), Some(20.0));
        assert_eq!(imputer.median_for(INSULIN), Some(0.0));

        let replaced = imputer.transform(&mut samples);
        assert_eq!(replaced, 4);
        assert_eq!(samples[0].sample.glucose, 100.0);
        assert_eq!(samples[0].sample.skin_thickness, 20.0);
        // Pregnancies are never imputed
        assert_eq!(samples[0].sample.pregnancies, 1.0);
    }

    #[test]
    fn test_scaler_fit_transform() {
        let data = array![[1.0, 10.0, 5.0], [3.0, 20.0, 5.0]];
        let scaler = StandardScaler::fit(&data).unwrap();

        assert_eq!(scaler.means, vec![2.0, 15.0, 5.0]);
        assert_eq!(scaler.stds, vec![1.0, 5.0, 1.0]);

        let scaled = scaler.transform(&data).unwrap();
        assert_eq!(scaled, array![[-1.0, -1.0, 0.0], [1.0, 1.0, 0.0]]);

        let row = scaler.transform_row(array![2.0, 25.0, 6.0].view()).unwrap();
        assert_eq!(row, array![0.0, 2.0, 1.0]);
    }

    #[test]
    fn test_scaler_rejects_wrong_width() {
        let scaler = StandardScaler::fit(&array![[1.0, 2.0], [3.0, 4.0]]).unwrap();
        assert!(scaler.transform(&array![[1.0, 2.0, 3.0]]).is_err());
        assert!(scaler.transform_row(array![1.0].view()).is_err());
    }

    #[test]
    fn test_stratified_split_keeps_balance() {
        let targets: Vec<u8> = (0..100).map(|i| (i % 4 == 0) as u8).collect();
        let config = SplitConfig::default();
        let (train, test) = split_indices(&targets, &config).unwrap();

        assert_eq!(train.len() + test.len(), 100);
        assert_eq!(test.len(), 20);
        let test_pos = test.iter().filter(|&&i| targets[i] == 1).count();
        assert_eq!(test_pos, 5);

        // Partitions are disjoint
        let mut all: Vec<usize> = train.iter().chain(&test).copied().collect();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 100);
    }

    #[test]
    fn test_split_is_deterministic() {
        let targets: Vec<u8> = (0..50).map(|i| (i % 3 == 0) as u8).collect();
        let config = SplitConfig::default();
        assert_eq!(
            split_indices(&targets, &config).unwrap(),
            split_indices(&targets, &config).unwrap()
        );
    }

    #[test]
    fn test_split_rejects_bad_ratio() {
        let config = SplitConfig {
            test_ratio: 1.5,
            ..SplitConfig::default()
        };
        assert!(split_indices(&[0, 1, 0, 1], &config).is_err());
    }

    #[test]
    fn test_stratified_kfold() {
        let targets: Vec<u8> = (0..30).map(|i| (i % 3 == 0) as u8).collect();
        let folds = stratified_kfold(&targets, 5, 7).unwrap();

        assert_eq!(folds.len(), 5);
        let mut seen = vec![0usize; targets.len()];
        for (train, val) in &folds {
            assert_eq!(train.len() + val.len(), 30);
            assert_eq!(val.len(), 6);
            let pos = val.iter().filter(|&&i| targets[i] == 1).count();
            assert_eq!(pos, 2);
            for &i in val {
                seen[i] += 1;
            }
        }
        // Every sample is validated exactly once
        assert!(seen.iter().all(|&c| c == 1));
    }
}
