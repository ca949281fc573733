//! Classifier contract and the random forest used for churn prediction

use crate::error::{ChurnError, Result};
use linfa::prelude::*;
use linfa_trees::{DecisionTree, SplitQuality};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Label of the positive ("will churn") class
pub const CHURN: usize = 1;

/// What the scorer needs from a trained classifier
pub trait ChurnModel: Send + Sync {
    /// Number of input columns the model was fitted on
    fn n_features(&self) -> usize;

    /// Probability mass of the positive class for every row
    fn predict_probabilities(&self, features: &Array2<f64>) -> Array1<f64>;

    /// Probability of the positive class for a single row
    fn predict_probability(&self, features: ArrayView1<f64>) -> f64 {
        let row = features.to_owned().insert_axis(Axis(0));
        self.predict_probabilities(&row)[0]
    }

    /// Per-column importances aligned with the schema, when the model has them
    fn feature_importance(&self) -> Option<Vec<f64>> {
        None
    }
}

/// Columns each tree may look at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    /// Every column
    All,
    /// A random subset of ceil(sqrt(n)) columns per tree
    Sqrt,
}

/// Per-sample weighting of the two classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassWeight {
    /// Unit weights
    Uniform,
    /// `n_samples / (n_classes * n_class_samples)`
    Balanced,
}

/// Hyperparameters of the forest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: Option<usize>,
    pub max_features: MaxFeatures,
    pub class_weight: ClassWeight,
    pub min_weight_split: f32,
    pub min_weight_leaf: f32,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 200,
            max_depth: None,
            max_features: MaxFeatures::Sqrt,
            class_weight: ClassWeight::Balanced,
            min_weight_split: 2.0,
            min_weight_leaf: 1.0,
            seed: 42,
        }
    }
}

/// One bagged tree and the columns it was trained on
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ForestMember {
    features: Vec<usize>,
    tree: DecisionTree<f64, usize>,
}

/// Bagged ensemble of linfa decision trees
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    n_features: usize,
    members: Vec<ForestMember>,
}

impl RandomForest {
    /// Fit the forest on encoded rows and 0/1 labels.
    ///
    /// Every tree sees a bootstrap sample of the rows drawn from a single
    /// seeded generator, so the same inputs and params give the same forest.
    pub fn fit(records: &Array2<f64>, labels: &Array1<usize>, params: &ForestParams) -> Result<Self> {
        let (n_samples, n_features) = records.dim();
        if n_samples == 0 {
            return Err(ChurnError::EmptyDataset("no training rows".to_string()));
        }
        if n_features == 0 {
            return Err(ChurnError::Training("no feature columns".to_string()));
        }
        if labels.len() != n_samples {
            return Err(ChurnError::Training(format!(
                "{} labels for {} rows",
                labels.len(),
                n_samples
            )));
        }
        if let Some(bad) = labels.iter().find(|&&l| l > CHURN) {
            return Err(ChurnError::Training(format!("label {} is not binary", bad)));
        }
        if params.n_trees == 0 {
            return Err(ChurnError::Config("n_trees must be positive".to_string()));
        }

        let class_weights = class_weights(labels, params.class_weight);
        let subset_size = match params.max_features {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => ((n_features as f64).sqrt().ceil() as usize).clamp(1, n_features),
        };

        let tree_params = DecisionTree::params()
            .split_quality(SplitQuality::Gini)
            .max_depth(params.max_depth)
            .min_weight_split(params.min_weight_split)
            .min_weight_leaf(params.min_weight_leaf);

        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut members = Vec::with_capacity(params.n_trees);

        for tree_idx in 0..params.n_trees {
            let rows: Vec<usize> = (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();
            let mut features = if subset_size == n_features {
                (0..n_features).collect::<Vec<_>>()
            } else {
                index::sample(&mut rng, n_features, subset_size).into_vec()
            };
            features.sort_unstable();

            let x = records.select(Axis(0), &rows).select(Axis(1), &features);
            let y = labels.select(Axis(0), &rows);
            let weights = y.mapv(|label| class_weights[label]);
            let dataset = Dataset::new(x, y).with_weights(weights);

            let tree = tree_params
                .fit(&dataset)
                .map_err(|e| ChurnError::Training(e.to_string()))?;
            debug!(tree = tree_idx, columns = features.len(), "fitted tree");

            members.push(ForestMember { features, tree });
        }

        Ok(Self {
            n_features,
            members,
        })
    }

    pub fn n_trees(&self) -> usize {
        self.members.len()
    }

    /// Hard 0/1 predictions at the 0.5 probability threshold
    pub fn predict(&self, features: &Array2<f64>) -> Array1<usize> {
        self.predict_probabilities(features)
            .mapv(|p| if p >= 0.5 { CHURN } else { 0 })
    }
}

impl ChurnModel for RandomForest {
    fn n_features(&self) -> usize {
        self.n_features
    }

    /// Fraction of trees voting for churn
    fn predict_probabilities(&self, features: &Array2<f64>) -> Array1<f64> {
        let mut votes = Array1::<f64>::zeros(features.nrows());
        if self.members.is_empty() {
            return votes;
        }
        for member in &self.members {
            let subset = features.select(Axis(1), &member.features);
            let predicted: Array1<usize> = member.tree.predict(&subset);
            votes.zip_mut_with(&predicted, |v, &label| {
                if label == CHURN {
                    *v += 1.0;
                }
            });
        }
        votes / self.members.len() as f64
    }

    /// Mean impurity decrease over all trees, normalized to sum to one
    fn feature_importance(&self) -> Option<Vec<f64>> {
        let mut importance = vec![0.0; self.n_features];
        for member in &self.members {
            for (&column, weight) in member
                .features
                .iter()
                .zip(member.tree.feature_importance())
            {
                if weight.is_finite() {
                    importance[column] += weight;
                }
            }
        }
        let total: f64 = importance.iter().sum();
        if total > 0.0 {
            importance.iter_mut().for_each(|w| *w /= total);
        }
        Some(importance)
    }
}

fn class_weights(labels: &Array1<usize>, mode: ClassWeight) -> [f32; 2] {
    match mode {
        ClassWeight::Uniform => [1.0, 1.0],
        ClassWeight::Balanced => {
            let n = labels.len() as f32;
            let positives = labels.iter().filter(|&&l| l == CHURN).count() as f32;
            let negatives = n - positives;
            let weight = |count: f32| if count > 0.0 { n / (2.0 * count) } else { 0.0 };
            [weight(negatives), weight(positives)]
        }
    }
}
