//! Models module.
use std::fmt;

use serde_json::Value;

use config::{parse_section, ConfigError};
use data::RatingDataset;
use super::{FittingError, PredictionError};

pub mod factorization;
pub mod factors;
pub mod repository;

use self::factorization::{Hyperparameters, MatrixFactorization};

kind_tag! {
    /// Rating prediction models.
    pub enum ModelType("model type") {
        /// Matrix factorization trained by stochastic gradient descent.
        MatrixFactorization => "MF",
    }
}

/// A rating prediction model.
pub trait Model: fmt::Debug {
    /// Name of the span the model logs under.
    fn log_name(&self) -> &'static str;
    /// Unique name, used as the persistence key.
    fn name(&self) -> &str;
    /// Whether at least one call to `fit` has completed.
    fn is_fitted(&self) -> bool;
    /// Fit the model to the training ratings.
    fn fit(&mut self, data: &RatingDataset) -> Result<(), FittingError>;
    /// Add a `col_pred` column of predicted ratings to `data`.
    ///
    /// Predicting with a model that was never fitted is allowed; the
    /// scores just carry no information.
    fn predict(&self, data: &mut RatingDataset, col_pred: &str) -> Result<(), PredictionError>;
    /// Full model state, for persistence.
    fn snapshot(&self) -> ModelSnapshot;
}

/// Persisted model state, tagged with the model kind.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ModelSnapshot {
    #[serde(rename = "MF")]
    MatrixFactorization(MatrixFactorization),
}

impl ModelSnapshot {
    pub fn into_model(self) -> Box<dyn Model> {
        match self {
            ModelSnapshot::MatrixFactorization(model) => Box::new(model),
        }
    }
}

/// Build a fresh model of the given kind from its config section.
pub fn provide_model(kind: ModelType, section: Value) -> Result<Box<dyn Model>, ConfigError> {
    match kind {
        ModelType::MatrixFactorization => {
            let hyper: Hyperparameters = parse_section("model_cfg", section)?;
            Ok(Box::new(hyper.build()))
        }
    }
}
