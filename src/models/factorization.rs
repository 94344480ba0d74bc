//! Matrix factorization for explicit ratings.
//!
//! Every user and item gets a latent vector; the predicted rating is the
//! dot product of the two. Factors are fitted by stochastic gradient
//! descent on the L2-regularized squared error, one rating at a time.
use chrono::{Local, NaiveDateTime};
use ndarray::{Array2, Axis};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;

use data::{index_column, RatingDataset};
use table::{Column, Table};

use super::{Model, ModelSnapshot};
use super::super::{FittingError, ItemId, PredictionError, UserId};

fn default_latent_dim() -> usize {
    20
}

fn default_l2_penalty() -> f64 {
    0.1
}

fn default_learning_rate() -> f64 {
    0.01
}

fn default_num_epochs() -> usize {
    100
}

fn default_seed() -> u64 {
    42
}

/// Hyperparameters for the [MatrixFactorization] model.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Hyperparameters {
    num_users: usize,
    num_items: usize,
    #[serde(default = "default_latent_dim")]
    latent_dim: usize,
    #[serde(default = "default_l2_penalty")]
    l2_penalty: f64,
    #[serde(default = "default_learning_rate")]
    learning_rate: f64,
    #[serde(default = "default_num_epochs")]
    num_epochs: usize,
    #[serde(default = "default_seed")]
    seed: u64,
}

impl Hyperparameters {
    pub fn new(num_users: usize, num_items: usize) -> Self {
        Hyperparameters {
            num_users: num_users,
            num_items: num_items,
            latent_dim: default_latent_dim(),
            l2_penalty: default_l2_penalty(),
            learning_rate: default_learning_rate(),
            num_epochs: default_num_epochs(),
            seed: default_seed(),
        }
    }

    /// Set the number of latent factors.
    pub fn latent_dim(mut self, latent_dim: usize) -> Self {
        self.latent_dim = latent_dim;
        self
    }

    /// Set the L2 penalty.
    pub fn l2_penalty(mut self, l2_penalty: f64) -> Self {
        self.l2_penalty = l2_penalty;
        self
    }

    /// Set the learning rate.
    pub fn learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Set the number of epochs to run per each `fit` call.
    pub fn num_epochs(mut self, num_epochs: usize) -> Self {
        self.num_epochs = num_epochs;
        self
    }

    /// Set the seed for factor initialization and sample shuffling.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Build the model with freshly initialized factors.
    pub fn build(self) -> MatrixFactorization {
        MatrixFactorization::new(self)
    }
}

/// Generate a model name from its hyperparameters and creation time.
pub fn model_name(hyper: &Hyperparameters, created: &NaiveDateTime) -> String {
    format!(
        "MF-{}-num_users_{}-num_items_{}-latent_dim_{}-l2_penalty_{}-num_epochs_{}-learning_rate_{}-seed_{}",
        created.format("%Y%m%d-%H%M%S"),
        hyper.num_users,
        hyper.num_items,
        hyper.latent_dim,
        hyper.l2_penalty,
        hyper.num_epochs,
        hyper.learning_rate,
        hyper.seed
    )
}

/// Matrix factorization model.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatrixFactorization {
    hyper: Hyperparameters,
    name: String,
    num_fits: usize,
    #[serde(with = "::models::factors")]
    user_embedding: Array2<f64>,
    #[serde(with = "::models::factors")]
    item_embedding: Array2<f64>,
}

impl MatrixFactorization {
    /// Create a model whose factors are drawn uniformly from `[0, 1)`,
    /// user factors first.
    pub fn new(hyper: Hyperparameters) -> Self {
        let mut rng = XorShiftRng::seed_from_u64(hyper.seed);

        let user_embedding =
            Array2::from_shape_fn((hyper.num_users, hyper.latent_dim), |_| rng.gen::<f64>());
        let item_embedding =
            Array2::from_shape_fn((hyper.num_items, hyper.latent_dim), |_| rng.gen::<f64>());

        let name = model_name(&hyper, &Local::now().naive_local());

        MatrixFactorization {
            hyper: hyper,
            name: name,
            num_fits: 0,
            user_embedding: user_embedding,
            item_embedding: item_embedding,
        }
    }

    pub fn hyperparameters(&self) -> &Hyperparameters {
        &self.hyper
    }

    pub fn user_embedding(&self) -> &Array2<f64> {
        &self.user_embedding
    }

    pub fn item_embedding(&self) -> &Array2<f64> {
        &self.item_embedding
    }

    /// Update both factors of one rating in place and return the error
    /// before the update. The item factor sees the updated user factor.
    fn sgd_step(&mut self, user_id: UserId, item_id: ItemId, rating: f64) -> f64 {
        let learning_rate = self.hyper.learning_rate;
        let l2_penalty = self.hyper.l2_penalty;

        let mut user_vector = self.user_embedding.row_mut(user_id);
        let mut item_vector = self.item_embedding.row_mut(item_id);

        let error = rating - user_vector.dot(&item_vector);

        user_vector.zip_mut_with(&item_vector, |user, &item| {
            *user += learning_rate * (2.0 * error * item - l2_penalty * *user)
        });
        item_vector.zip_mut_with(&user_vector, |item, &user| {
            *item += learning_rate * (2.0 * error * user - l2_penalty * *item)
        });

        error
    }

    /// Fit the model.
    ///
    /// Each epoch visits every rating once, in an order reshuffled from a
    /// generator seeded once per call. Calling `fit` again continues from
    /// the current factors.
    pub fn fit(&mut self, data: &RatingDataset) -> Result<&mut Self, FittingError> {
        let (user_ids, item_ids, ratings) = data.get_ratings()?;

        if user_ids.is_empty() {
            return Err(FittingError::NoInteractions);
        }

        let num_users = self.user_embedding.nrows();
        let num_items = self.item_embedding.nrows();

        if let Some(&user_id) = user_ids.iter().find(|&&user_id| user_id >= num_users) {
            return Err(FittingError::UserOutOfBounds {
                user_id: user_id,
                num_users: num_users,
            });
        }
        if let Some(&item_id) = item_ids.iter().find(|&&item_id| item_id >= num_items) {
            return Err(FittingError::ItemOutOfBounds {
                item_id: item_id,
                num_items: num_items,
            });
        }

        let mut rng = XorShiftRng::seed_from_u64(self.hyper.seed);
        let mut order: Vec<usize> = (0..ratings.len()).collect();

        info!(
            "Fitting on {} ratings for {} epochs.",
            ratings.len(),
            self.hyper.num_epochs
        );

        for epoch in 0..self.hyper.num_epochs {
            order.shuffle(&mut rng);

            let mut squared_error = 0.0;

            for &idx in &order {
                let error = self.sgd_step(user_ids[idx], item_ids[idx], ratings[idx]);
                squared_error += error * error;
            }

            let mse = squared_error / order.len() as f64;
            debug!("Epoch {}/{}: MSE {}", epoch + 1, self.hyper.num_epochs, mse);

            if !mse.is_finite() {
                warn!(
                    "Training error is {} at epoch {}; try a smaller learning rate.",
                    mse,
                    epoch + 1
                );
            }
        }

        self.num_fits += 1;
        info!("Finished fitting.");

        Ok(self)
    }

    /// Add a `col_pred` column with the predicted rating of every row.
    ///
    /// Rows come back grouped by user, in ascending user order.
    pub fn predict(&self, data: &mut RatingDataset, col_pred: &str) -> Result<(), PredictionError> {
        let num_users = self.user_embedding.nrows();
        let num_items = self.item_embedding.nrows();

        let mut predicted = Vec::new();

        for (user_id, mut rows) in data.groupby_user()? {
            if user_id >= num_users {
                return Err(PredictionError::UserOutOfBounds {
                    user_id: user_id,
                    num_users: num_users,
                });
            }

            let item_ids = index_column(&rows, data.col_item())?;
            if let Some(&item_id) = item_ids.iter().find(|&&item_id| item_id >= num_items) {
                return Err(PredictionError::ItemOutOfBounds {
                    item_id: item_id,
                    num_items: num_items,
                });
            }

            let scores = self
                .item_embedding
                .select(Axis(0), &item_ids)
                .dot(&self.user_embedding.row(user_id));

            rows.set_column(col_pred, Column::Float(scores.to_vec()))?;
            predicted.push(rows);
        }

        let table = if predicted.is_empty() {
            let mut table = data.table().clone();
            table.set_column(col_pred, Column::Float(Vec::new()))?;
            table
        } else {
            Table::concat(predicted)?
        };

        debug!("Predicted {} ratings.", table.len());
        data.set_predictions(table, col_pred)?;

        Ok(())
    }
}

impl Model for MatrixFactorization {
    fn log_name(&self) -> &'static str {
        "MatrixFactorization"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_fitted(&self) -> bool {
        self.num_fits > 0
    }

    fn fit(&mut self, data: &RatingDataset) -> Result<(), FittingError> {
        MatrixFactorization::fit(self, data).map(|_| ())
    }

    fn predict(&self, data: &mut RatingDataset, col_pred: &str) -> Result<(), PredictionError> {
        MatrixFactorization::predict(self, data, col_pred)
    }

    fn snapshot(&self) -> ModelSnapshot {
        ModelSnapshot::MatrixFactorization(self.clone())
    }
}
