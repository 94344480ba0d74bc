//! # exrec
//!
//! `exrec` runs offline recommender experiments over explicit ratings:
//! it partitions a rating table into train and test sets, fits a latent
//! factor model by stochastic gradient descent, scores the held-out
//! predictions and stores the fitted model.
//!
//! ## Example
//! Fit a small model and score it on a random holdout:
//!
//! ```rust
//! # extern crate exrec;
//! use exrec::data::{RatingDataConfig, RatingDataset};
//! use exrec::evaluation::{Evaluator, SimpleEvaluator};
//! use exrec::metrics::Metric;
//! use exrec::models::factorization::Hyperparameters;
//! use exrec::table::{Column, Table};
//!
//! let table = Table::from_columns(vec![
//!     ("user", Column::Int(vec![0, 0, 1, 1, 2, 2])),
//!     ("item", Column::Int(vec![0, 1, 0, 2, 1, 2])),
//!     ("rate", Column::Float(vec![5.0, 3.0, 4.0, 1.0, 2.0, 4.0])),
//! ]).unwrap();
//! let data = RatingDataset::new(table, &RatingDataConfig::new(3, 3)).unwrap();
//! let (train, mut test) = data.random_split(0.8, 42).unwrap();
//!
//! let mut model = Hyperparameters::new(3, 3)
//!     .latent_dim(4)
//!     .learning_rate(0.01)
//!     .num_epochs(50)
//!     .build();
//! model.fit(&train).unwrap();
//!
//! let evaluator = SimpleEvaluator::new(vec![Metric::Rmse, Metric::Mae]);
//! let scores = evaluator.evaluate(&model, &mut test).unwrap();
//!
//! println!("Test scores: {}", scores);
//! ```
#[macro_use]
extern crate serde_derive;

#[macro_use]
extern crate itertools;

#[macro_use]
extern crate failure;
#[macro_use]
extern crate tracing;

extern crate chrono;
extern crate csv;
extern crate ndarray;
extern crate rand;
extern crate rand_xorshift;
extern crate serde;
extern crate serde_json;
extern crate tracing_subscriber;

#[cfg(test)]
#[macro_use]
extern crate approx;
#[cfg(test)]
extern crate tempfile;

#[macro_use]
pub mod config;
pub mod app;
pub mod data;
pub mod datasets;
pub mod encoding;
pub mod evaluation;
pub mod metrics;
pub mod models;
pub mod table;
pub mod trainer;
pub mod usecase;

use data::DatasetError;
use table::TableError;

/// Alias for user indices.
pub type UserId = usize;
/// Alias for item indices.
pub type ItemId = usize;

/// Fitting error types.
#[derive(Debug, Fail)]
pub enum FittingError {
    /// No interactions to fit on.
    #[fail(display = "No interactions were given.")]
    NoInteractions,
    /// A user index does not fit the model's user factors.
    #[fail(display = "User {} is out of bounds for a model with {} users.", user_id, num_users)]
    UserOutOfBounds {
        /// The offending user.
        user_id: UserId,
        /// Rows of the user factor matrix.
        num_users: usize,
    },
    /// An item index does not fit the model's item factors.
    #[fail(display = "Item {} is out of bounds for a model with {} items.", item_id, num_items)]
    ItemOutOfBounds {
        /// The offending item.
        item_id: ItemId,
        /// Rows of the item factor matrix.
        num_items: usize,
    },
    /// The training data could not be read.
    #[fail(display = "{}", _0)]
    Data(#[cause] DatasetError),
}

impl From<DatasetError> for FittingError {
    fn from(err: DatasetError) -> Self {
        FittingError::Data(err)
    }
}

/// Prediction error types.
#[derive(Debug, Fail)]
pub enum PredictionError {
    /// A user index does not fit the model's user factors.
    #[fail(display = "User {} is out of bounds for a model with {} users.", user_id, num_users)]
    UserOutOfBounds {
        /// The offending user.
        user_id: UserId,
        /// Rows of the user factor matrix.
        num_users: usize,
    },
    /// An item index does not fit the model's item factors.
    #[fail(display = "Item {} is out of bounds for a model with {} items.", item_id, num_items)]
    ItemOutOfBounds {
        /// The offending item.
        item_id: ItemId,
        /// Rows of the item factor matrix.
        num_items: usize,
    },
    /// The test data could not be read or updated.
    #[fail(display = "{}", _0)]
    Data(#[cause] DatasetError),
}

impl From<DatasetError> for PredictionError {
    fn from(err: DatasetError) -> Self {
        PredictionError::Data(err)
    }
}

impl From<TableError> for PredictionError {
    fn from(err: TableError) -> Self {
        PredictionError::Data(DatasetError::from(err))
    }
}
