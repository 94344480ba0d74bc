//! Training loops.
use failure;
use serde_json::Value;

use config::{parse_section, ConfigError};
use data::RatingDataset;
use evaluation::Evaluator;
use models::Model;

kind_tag! {
    /// Trainers.
    pub enum TrainerType("trainer type") {
        /// Fits once, then optionally scores validation data.
        OneTime => "ONETIME",
    }
}

/// Fits a model, owning it together with the evaluator used to check it.
pub trait Trainer {
    /// Name of the span the trainer logs under.
    fn log_name(&self) -> &'static str;
    fn model(&self) -> &dyn Model;
    fn evaluator(&self) -> &dyn Evaluator;
    /// Fit the model on `train_data`. Validation scores are logged only.
    fn train(
        &mut self,
        train_data: &RatingDataset,
        valid_data: Option<&mut RatingDataset>,
    ) -> Result<(), failure::Error>;
}

/// The one-time trainer takes no parameters.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OneTimeConfig {}

#[derive(Debug)]
pub struct OneTimeTrainer {
    model: Box<dyn Model>,
    evaluator: Box<dyn Evaluator>,
}

impl OneTimeTrainer {
    pub fn new(model: Box<dyn Model>, evaluator: Box<dyn Evaluator>) -> Self {
        OneTimeTrainer {
            model: model,
            evaluator: evaluator,
        }
    }
}

impl Trainer for OneTimeTrainer {
    fn log_name(&self) -> &'static str {
        "OneTimeTrainer"
    }

    fn model(&self) -> &dyn Model {
        &*self.model
    }

    fn evaluator(&self) -> &dyn Evaluator {
        &*self.evaluator
    }

    fn train(
        &mut self,
        train_data: &RatingDataset,
        valid_data: Option<&mut RatingDataset>,
    ) -> Result<(), failure::Error> {
        info!("Start training {}.", self.model.name());
        {
            let span = info_span!("model", kind = self.model.log_name());
            let _enter = span.enter();

            self.model.fit(train_data)?;
        }
        info!("Finished training.");

        if let Some(valid_data) = valid_data {
            info!("Scoring validation data.");

            let span = info_span!("evaluator", kind = self.evaluator.log_name());
            let _enter = span.enter();

            let scores = self.evaluator.evaluate(&*self.model, valid_data)?;
            info!("Validation scores: {}", scores);
        }

        Ok(())
    }
}

/// Build a trainer of the given kind around a model and an evaluator.
pub fn provide_trainer(
    kind: TrainerType,
    section: Value,
    model: Box<dyn Model>,
    evaluator: Box<dyn Evaluator>,
) -> Result<Box<dyn Trainer>, ConfigError> {
    match kind {
        TrainerType::OneTime => {
            let _: OneTimeConfig = parse_section("trainer_cfg", section)?;
            Ok(Box::new(OneTimeTrainer::new(model, evaluator)))
        }
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use data::RatingDataConfig;
    use evaluation::SimpleEvaluator;
    use metrics::Metric;
    use models::factorization::Hyperparameters;
    use table::{Column, Table};

    fn ratings(users: Vec<i64>, items: Vec<i64>, rates: Vec<f64>) -> RatingDataset {
        let table = Table::from_columns(vec![
            ("user", Column::Int(users)),
            ("item", Column::Int(items)),
            ("rate", Column::Float(rates)),
        ]).unwrap();

        RatingDataset::new(table, &RatingDataConfig::new(3, 3)).unwrap()
    }

    fn trainer() -> Box<dyn Trainer> {
        let model = Hyperparameters::new(3, 3).latent_dim(2).num_epochs(10).build();

        provide_trainer(
            TrainerType::OneTime,
            Value::Null,
            Box::new(model),
            Box::new(SimpleEvaluator::new(vec![Metric::Rmse])),
        ).unwrap()
    }

    #[test]
    fn fits_and_scores_validation_data() {
        let mut trainer = trainer();
        let train = ratings(vec![0, 1, 2], vec![0, 1, 2], vec![4.0, 3.0, 5.0]);
        let mut valid = ratings(vec![0, 2], vec![1, 0], vec![2.0, 1.0]);

        assert!(!trainer.model().is_fitted());

        trainer.train(&train, Some(&mut valid)).unwrap();

        assert!(trainer.model().is_fitted());
        assert_eq!(trainer.log_name(), "OneTimeTrainer");
        assert_eq!(valid.col_pred(), Some("pred"));
    }

    #[test]
    fn fitting_errors_propagate() {
        let mut trainer = trainer();
        let empty = ratings(vec![], vec![], vec![]);

        assert!(trainer.train(&empty, None).is_err());
        assert!(!trainer.model().is_fitted());
    }

    #[test]
    fn rejects_unknown_parameters() {
        let model = Hyperparameters::new(3, 3).build();
        let section = ::serde_json::from_str(r#"{"num_rounds": 3}"#).unwrap();

        let result = provide_trainer(
            TrainerType::OneTime,
            section,
            Box::new(model),
            Box::new(SimpleEvaluator::new(vec![Metric::Rmse])),
        );

        assert!(result.is_err());
    }
}
