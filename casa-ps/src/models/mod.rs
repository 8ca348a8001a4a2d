//! Fitted pipeline stages and their on-disk store

mod frame;
mod stages;
mod store;

pub use frame::{format_number, FeatureValue, Frame, Matrix};
pub use stages::{
    Artifact, ColumnTransformer, KMeans, LinearRegressor, OneHotColumn, Pca, RegressionTree,
    ScaledColumn, StageError, TreeEnsemble, TreeNode,
};
pub use store::{ArtifactName, ArtifactStore};
