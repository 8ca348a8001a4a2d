//! Fitted pipeline stages
//!
//! Each stage is an immutable export of an estimator fitted elsewhere. The
//! on-disk form is a JSON document tagged by `type`:
//!
//! ```json
//! {"type": "kmeans", "centroids": [[0.1, -0.3], [1.2, 0.8]]}
//! ```
//!
//! Stages declare how many input features they expect and reject inputs of
//! any other width.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use super::{Frame, Matrix};

/// Stage execution and validation errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StageError {
    #[error("expected {expected} input features, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("input is missing column '{0}'")]
    MissingColumn(String),

    #[error("column '{column}' holds a non-numeric value")]
    NonNumeric { column: String },

    #[error("stage is a {found}, expected a {expected}")]
    WrongStage {
        expected: &'static str,
        found: &'static str,
    },

    #[error("invalid artifact: {0}")]
    Invalid(String),
}

/// Standardized numeric input column: `(x - mean) / scale`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaledColumn {
    pub column: String,
    pub mean: f64,
    pub scale: f64,
}

/// One-hot encoded categorical column; unseen categories encode as all zeros
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotColumn {
    pub column: String,
    pub categories: Vec<String>,
}

/// Column-wise preprocessor: scaled numerics, then one-hot categoricals,
/// then passthrough columns, in that output order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnTransformer {
    #[serde(default)]
    pub numeric: Vec<ScaledColumn>,
    #[serde(default)]
    pub categorical: Vec<OneHotColumn>,
    #[serde(default)]
    pub passthrough: Vec<String>,
}

impl ColumnTransformer {
    /// Input columns in output order
    pub fn input_columns(&self) -> Vec<&str> {
        self.numeric
            .iter()
            .map(|c| c.column.as_str())
            .chain(self.categorical.iter().map(|c| c.column.as_str()))
            .chain(self.passthrough.iter().map(String::as_str))
            .collect()
    }

    pub fn n_features_in(&self) -> usize {
        self.numeric.len() + self.categorical.len() + self.passthrough.len()
    }

    pub fn n_features_out(&self) -> usize {
        self.numeric.len()
            + self.categorical.iter().map(|c| c.categories.len()).sum::<usize>()
            + self.passthrough.len()
    }

    fn validate(&self) -> Result<(), StageError> {
        if self.n_features_in() == 0 {
            return Err(StageError::Invalid("column transformer has no columns".into()));
        }
        let mut seen = HashSet::new();
        for column in self.input_columns() {
            if !seen.insert(column) {
                return Err(StageError::Invalid(format!("column '{}' listed twice", column)));
            }
        }
        if let Some(bad) = self
            .numeric
            .iter()
            .find(|c| !c.mean.is_finite() || !c.scale.is_finite())
        {
            return Err(StageError::Invalid(format!(
                "non-finite scaling for column '{}'",
                bad.column
            )));
        }
        if let Some(bad) = self.categorical.iter().find(|c| c.categories.is_empty()) {
            return Err(StageError::Invalid(format!(
                "no categories for column '{}'",
                bad.column
            )));
        }
        Ok(())
    }

    /// Select columns by name and encode them
    ///
    /// Columns the frame has beyond the fitted ones are ignored. A fitted
    /// column absent from the frame is an error.
    pub fn transform(&self, frame: &Frame) -> Result<Matrix, StageError> {
        let lookup = |name: &str| {
            frame
                .column_index(name)
                .ok_or_else(|| StageError::MissingColumn(name.to_string()))
        };
        let numeric: Vec<(usize, &ScaledColumn)> = self
            .numeric
            .iter()
            .map(|c| lookup(&c.column).map(|i| (i, c)))
            .collect::<Result<_, _>>()?;
        let categorical: Vec<(usize, &OneHotColumn)> = self
            .categorical
            .iter()
            .map(|c| lookup(&c.column).map(|i| (i, c)))
            .collect::<Result<_, _>>()?;
        let passthrough: Vec<(usize, &str)> = self
            .passthrough
            .iter()
            .map(|c| lookup(c).map(|i| (i, c.as_str())))
            .collect::<Result<_, _>>()?;

        let width = self.n_features_out();
        let mut data = Vec::with_capacity(frame.n_rows() * width);
        for row in frame.rows() {
            for (i, spec) in &numeric {
                let x = numeric_value(&row[*i], &spec.column)?;
                // zero variance at fit time: sklearn leaves the column unscaled
                let scale = if spec.scale == 0.0 { 1.0 } else { spec.scale };
                data.push((x - spec.mean) / scale);
            }
            for (i, spec) in &categorical {
                let value = row[*i].to_text();
                data.extend(
                    spec.categories
                        .iter()
                        .map(|c| if *c == value { 1.0 } else { 0.0 }),
                );
            }
            for (i, column) in &passthrough {
                data.push(numeric_value(&row[*i], column)?);
            }
        }
        Matrix::from_vec(frame.n_rows(), width, data)
    }
}

fn numeric_value(value: &super::FeatureValue, column: &str) -> Result<f64, StageError> {
    value.as_f64().ok_or_else(|| StageError::NonNumeric {
        column: column.to_string(),
    })
}

/// Principal component projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pca {
    /// Per-feature mean removed before projecting
    pub mean: Vec<f64>,
    /// `n_components × n_features` component rows
    pub components: Vec<Vec<f64>>,
}

impl Pca {
    pub fn n_features_in(&self) -> usize {
        self.mean.len()
    }

    fn validate(&self) -> Result<(), StageError> {
        if self.mean.is_empty() || self.components.is_empty() {
            return Err(StageError::Invalid("PCA has no components".into()));
        }
        if self.components.iter().any(|c| c.len() != self.mean.len()) {
            return Err(StageError::Invalid(
                "PCA component width differs from mean width".into(),
            ));
        }
        Ok(())
    }

    pub fn transform(&self, x: &Matrix) -> Result<Matrix, StageError> {
        check_width(x, self.n_features_in())?;
        let mut data = Vec::with_capacity(x.n_rows() * self.components.len());
        for row in x.row_iter() {
            for component in &self.components {
                let projected: f64 = row
                    .iter()
                    .zip(&self.mean)
                    .zip(component)
                    .map(|((v, m), c)| (v - m) * c)
                    .sum();
                data.push(projected);
            }
        }
        Matrix::from_vec(x.n_rows(), self.components.len(), data)
    }
}

/// Nearest-centroid cluster assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KMeans {
    pub centroids: Vec<Vec<f64>>,
}

impl KMeans {
    pub fn n_features_in(&self) -> usize {
        self.centroids.first().map(Vec::len).unwrap_or(0)
    }

    pub fn n_clusters(&self) -> usize {
        self.centroids.len()
    }

    fn validate(&self) -> Result<(), StageError> {
        let width = self.n_features_in();
        if width == 0 {
            return Err(StageError::Invalid("k-means has no centroids".into()));
        }
        if self.centroids.iter().any(|c| c.len() != width) {
            return Err(StageError::Invalid("centroids differ in width".into()));
        }
        Ok(())
    }

    /// Cluster id per row; ties go to the lowest id
    pub fn predict(&self, x: &Matrix) -> Result<Vec<i64>, StageError> {
        check_width(x, self.n_features_in())?;
        Ok(x.row_iter()
            .map(|row| {
                let mut best = (0usize, f64::INFINITY);
                for (k, centroid) in self.centroids.iter().enumerate() {
                    let dist: f64 = row
                        .iter()
                        .zip(centroid)
                        .map(|(a, b)| (a - b) * (a - b))
                        .sum();
                    if dist < best.1 {
                        best = (k, dist);
                    }
                }
                best.0 as i64
            })
            .collect())
    }
}

/// `y = coef · x + intercept`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRegressor {
    pub coef: Vec<f64>,
    pub intercept: f64,
}

impl LinearRegressor {
    pub fn n_features_in(&self) -> usize {
        self.coef.len()
    }

    fn validate(&self) -> Result<(), StageError> {
        if self.coef.is_empty() {
            return Err(StageError::Invalid("linear model has no coefficients".into()));
        }
        Ok(())
    }

    pub fn predict(&self, x: &Matrix) -> Result<Vec<f64>, StageError> {
        check_width(x, self.n_features_in())?;
        Ok(x.row_iter()
            .map(|row| row.iter().zip(&self.coef).map(|(v, c)| v * c).sum::<f64>() + self.intercept)
            .collect())
    }
}

/// Node of a regression tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum TreeNode {
    /// `x[feature] < threshold` goes left; NaN follows `missing_left`
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        #[serde(default)]
        missing_left: bool,
    },
    Leaf {
        value: f64,
    },
}

/// Nodes stored flat; node 0 is the root and children come after parents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<TreeNode>,
}

impl RegressionTree {
    fn validate(&self, n_features: usize) -> Result<(), StageError> {
        if self.nodes.is_empty() {
            return Err(StageError::Invalid("empty tree".into()));
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if let TreeNode::Split {
                feature,
                left,
                right,
                ..
            } = node
            {
                if *feature >= n_features {
                    return Err(StageError::Invalid(format!(
                        "node {} splits on feature {} of {}",
                        i, feature, n_features
                    )));
                }
                for child in [left, right] {
                    if *child <= i || *child >= self.nodes.len() {
                        return Err(StageError::Invalid(format!(
                            "node {} has out-of-order child {}",
                            i, child
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Leaf value reached by `row`; `validate` guarantees termination
    fn leaf_value(&self, row: &[f64]) -> f64 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    missing_left,
                } => {
                    let x = row[*feature];
                    index = if x.is_nan() {
                        if *missing_left {
                            *left
                        } else {
                            *right
                        }
                    } else if x < *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

/// Gradient-boosted tree ensemble: `base_score + Σ tree(x)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEnsemble {
    pub n_features: usize,
    #[serde(default)]
    pub base_score: f64,
    pub trees: Vec<RegressionTree>,
}

impl TreeEnsemble {
    pub fn n_features_in(&self) -> usize {
        self.n_features
    }

    fn validate(&self) -> Result<(), StageError> {
        if self.n_features == 0 || self.trees.is_empty() {
            return Err(StageError::Invalid("tree ensemble is empty".into()));
        }
        self.trees.iter().try_for_each(|t| t.validate(self.n_features))
    }

    pub fn predict(&self, x: &Matrix) -> Result<Vec<f64>, StageError> {
        check_width(x, self.n_features)?;
        Ok(x.row_iter()
            .map(|row| self.base_score + self.trees.iter().map(|t| t.leaf_value(row)).sum::<f64>())
            .collect())
    }
}

fn check_width(x: &Matrix, expected: usize) -> Result<(), StageError> {
    if x.n_cols() != expected {
        return Err(StageError::DimensionMismatch {
            expected,
            actual: x.n_cols(),
        });
    }
    Ok(())
}

/// Any persisted stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Artifact {
    ColumnTransformer(ColumnTransformer),
    Pca(Pca),
    #[serde(rename = "kmeans")]
    KMeans(KMeans),
    LinearRegressor(LinearRegressor),
    TreeEnsemble(TreeEnsemble),
}

impl Artifact {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Artifact::ColumnTransformer(_) => "column transformer",
            Artifact::Pca(_) => "PCA reducer",
            Artifact::KMeans(_) => "k-means clusterer",
            Artifact::LinearRegressor(_) => "linear regressor",
            Artifact::TreeEnsemble(_) => "tree ensemble",
        }
    }

    /// Declared input dimensionality
    pub fn n_features_in(&self) -> usize {
        match self {
            Artifact::ColumnTransformer(s) => s.n_features_in(),
            Artifact::Pca(s) => s.n_features_in(),
            Artifact::KMeans(s) => s.n_features_in(),
            Artifact::LinearRegressor(s) => s.n_features_in(),
            Artifact::TreeEnsemble(s) => s.n_features_in(),
        }
    }

    /// Internal consistency check run once at load
    pub fn validate(&self) -> Result<(), StageError> {
        match self {
            Artifact::ColumnTransformer(s) => s.validate(),
            Artifact::Pca(s) => s.validate(),
            Artifact::KMeans(s) => s.validate(),
            Artifact::LinearRegressor(s) => s.validate(),
            Artifact::TreeEnsemble(s) => s.validate(),
        }
    }

    /// First stage: named frame → matrix
    pub fn transform_frame(&self, frame: &Frame) -> Result<Matrix, StageError> {
        match self {
            Artifact::ColumnTransformer(s) => s.transform(frame),
            other => Err(other.wrong_stage("column transformer")),
        }
    }

    /// Intermediate stage: matrix → matrix
    pub fn transform(&self, x: &Matrix) -> Result<Matrix, StageError> {
        match self {
            Artifact::Pca(s) => s.transform(x),
            other => Err(other.wrong_stage("reducer")),
        }
    }

    pub fn predict_clusters(&self, x: &Matrix) -> Result<Vec<i64>, StageError> {
        match self {
            Artifact::KMeans(s) => s.predict(x),
            other => Err(other.wrong_stage("clusterer")),
        }
    }

    pub fn predict_values(&self, x: &Matrix) -> Result<Vec<f64>, StageError> {
        match self {
            Artifact::LinearRegressor(s) => s.predict(x),
            Artifact::TreeEnsemble(s) => s.predict(x),
            other => Err(other.wrong_stage("regressor")),
        }
    }

    fn wrong_stage(&self, expected: &'static str) -> StageError {
        StageError::WrongStage {
            expected,
            found: self.kind_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FeatureValue;

    fn frame(columns: &[&str], rows: Vec<Vec<FeatureValue>>) -> Frame {
        Frame::new(columns.iter().map(|c| c.to_string()).collect(), rows).unwrap()
    }

    fn transformer() -> ColumnTransformer {
        ColumnTransformer {
            numeric: vec![ScaledColumn {
                column: "sq_mt_built".into(),
                mean: 100.0,
                scale: 50.0,
            }],
            categorical: vec![OneHotColumn {
                column: "district".into(),
                categories: vec!["Centro".into(), "Retiro".into()],
            }],
            passthrough: vec!["has_lift".into()],
        }
    }

    #[test]
    fn test_column_transformer_encodes_by_name() {
        let input = frame(
            &["has_lift", "district", "extra", "sq_mt_built"],
            vec![
                vec![
                    FeatureValue::Number(1.0),
                    FeatureValue::Text("Retiro".into()),
                    FeatureValue::Text("ignored".into()),
                    FeatureValue::Number(150.0),
                ],
                vec![
                    FeatureValue::Number(0.0),
                    FeatureValue::Text("Salamanca".into()),
                    FeatureValue::Text("ignored".into()),
                    FeatureValue::Number(100.0),
                ],
            ],
        );
        let out = transformer().transform(&input).unwrap();
        assert_eq!(out.shape(), (2, 4));
        assert_eq!(out.row(0), &[1.0, 0.0, 1.0, 1.0]);
        // unseen category encodes as zeros
        assert_eq!(out.row(1), &[0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_column_transformer_missing_column() {
        let input = frame(&["sq_mt_built"], vec![vec![FeatureValue::Number(1.0)]]);
        assert_eq!(
            transformer().transform(&input),
            Err(StageError::MissingColumn("district".into()))
        );
    }

    #[test]
    fn test_column_transformer_rejects_duplicate_columns() {
        let mut t = transformer();
        t.passthrough.push("sq_mt_built".into());
        assert!(matches!(t.validate(), Err(StageError::Invalid(_))));
    }

    #[test]
    fn test_pca_projects_centered_rows() {
        let pca = Pca {
            mean: vec![1.0, 1.0],
            components: vec![vec![1.0, 0.0], vec![0.0, -1.0]],
        };
        let x = Matrix::from_rows(&[vec![3.0, 4.0]]).unwrap();
        assert_eq!(pca.transform(&x).unwrap().row(0), &[2.0, -3.0]);

        let wide = Matrix::from_rows(&[vec![1.0, 2.0, 3.0]]).unwrap();
        assert_eq!(
            pca.transform(&wide),
            Err(StageError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        );
    }

    #[test]
    fn test_kmeans_nearest_centroid() {
        let km = KMeans {
            centroids: vec![vec![0.0, 0.0], vec![10.0, 10.0], vec![-10.0, 5.0]],
        };
        let x = Matrix::from_rows(&[vec![0.5, 0.2], vec![9.0, 11.0], vec![-8.0, 4.0]]).unwrap();
        assert_eq!(km.predict(&x).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_tree_ensemble_predicts() {
        let ensemble = TreeEnsemble {
            n_features: 2,
            base_score: 100.0,
            trees: vec![
                RegressionTree {
                    nodes: vec![
                        TreeNode::Split {
                            feature: 0,
                            threshold: 5.0,
                            left: 1,
                            right: 2,
                            missing_left: true,
                        },
                        TreeNode::Leaf { value: -10.0 },
                        TreeNode::Leaf { value: 10.0 },
                    ],
                },
                RegressionTree {
                    nodes: vec![TreeNode::Leaf { value: 1.5 }],
                },
            ],
        };
        assert!(ensemble.validate().is_ok());
        let x = Matrix::from_rows(&[vec![1.0, 0.0], vec![7.0, 0.0], vec![f64::NAN, 0.0]]).unwrap();
        assert_eq!(ensemble.predict(&x).unwrap(), vec![91.5, 111.5, 91.5]);
    }

    #[test]
    fn test_tree_with_backward_child_is_invalid() {
        let tree = RegressionTree {
            nodes: vec![
                TreeNode::Split {
                    feature: 0,
                    threshold: 1.0,
                    left: 0,
                    right: 1,
                    missing_left: false,
                },
                TreeNode::Leaf { value: 0.0 },
            ],
        };
        assert!(tree.validate(1).is_err());
    }

    #[test]
    fn test_artifact_json_roundtrip_tagging() {
        let json = r#"{"type":"kmeans","centroids":[[0.0,1.0]]}"#;
        let artifact: Artifact = serde_json::from_str(json).unwrap();
        assert_eq!(artifact.kind_name(), "k-means clusterer");
        assert_eq!(artifact.n_features_in(), 2);

        let x = Matrix::from_rows(&[vec![0.0, 1.0]]).unwrap();
        assert!(matches!(
            artifact.predict_values(&x),
            Err(StageError::WrongStage { expected: "regressor", .. })
        ));
    }
}
