//! Scoring models against held-out ratings.
use std::fmt;

use serde_json::Value;

use config::{parse_section, ConfigError};
use data::{numeric_column, DatasetError, RatingDataset};
use metrics::{Metric, MetricError};
use models::Model;
use PredictionError;

kind_tag! {
    /// Evaluators.
    pub enum EvaluatorType("evaluator type") {
        /// Computes a fixed list of metrics over every test rating.
        Simple => "SIMPLE",
    }
}

/// Evaluation error types.
#[derive(Debug, Fail)]
pub enum EvaluationError {
    /// The model left the data without a prediction column.
    #[fail(display = "Prediction failed: the model produced no prediction column.")]
    MissingPredictions,
    #[fail(display = "{}", _0)]
    Prediction(#[cause] PredictionError),
    #[fail(display = "Cannot compute {}: {}", metric, cause)]
    Metric {
        metric: Metric,
        #[cause]
        cause: MetricError,
    },
    #[fail(display = "{}", _0)]
    Data(#[cause] DatasetError),
}

impl From<PredictionError> for EvaluationError {
    fn from(err: PredictionError) -> Self {
        EvaluationError::Prediction(err)
    }
}

impl From<DatasetError> for EvaluationError {
    fn from(err: DatasetError) -> Self {
        EvaluationError::Data(err)
    }
}

/// Metric scores, in the order the metrics were configured.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scores {
    values: Vec<(Metric, f64)>,
}

impl Scores {
    pub fn new() -> Self {
        Scores::default()
    }

    /// Record a score, replacing any earlier score of the same metric.
    pub fn insert(&mut self, metric: Metric, value: f64) {
        match self.values.iter_mut().find(|entry| entry.0 == metric) {
            Some(entry) => entry.1 = value,
            None => self.values.push((metric, value)),
        }
    }

    pub fn get(&self, metric: Metric) -> Option<f64> {
        self.values
            .iter()
            .find(|&&(existing, _)| existing == metric)
            .map(|&(_, value)| value)
    }

    pub fn iter(&self) -> ::std::slice::Iter<(Metric, f64)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Display for Scores {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (idx, &(metric, value)) in self.values.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", metric, value)?;
        }

        Ok(())
    }
}

/// Scores a model on a dataset.
pub trait Evaluator: fmt::Debug {
    /// Name of the span the evaluator logs under.
    fn log_name(&self) -> &'static str;
    /// Predict every rating of `data` with `model` and score the
    /// predictions. `data` keeps the prediction column afterwards.
    fn evaluate(&self, model: &dyn Model, data: &mut RatingDataset) -> Result<Scores, EvaluationError>;
}

fn default_col_pred() -> String {
    "pred".to_owned()
}

#[derive(Clone, Debug, Deserialize)]
pub struct SimpleEvaluatorConfig {
    pub metrics: Vec<Metric>,
    #[serde(default = "default_col_pred")]
    pub col_pred: String,
}

/// Computes each configured metric over all ratings at once.
#[derive(Clone, Debug)]
pub struct SimpleEvaluator {
    metrics: Vec<Metric>,
    col_pred: String,
}

impl SimpleEvaluator {
    pub fn new(metrics: Vec<Metric>) -> Self {
        SimpleEvaluator {
            metrics: metrics,
            col_pred: default_col_pred(),
        }
    }

    /// Set the name of the prediction column.
    pub fn col_pred(mut self, col_pred: &str) -> Self {
        self.col_pred = col_pred.to_owned();
        self
    }

    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }
}

impl From<SimpleEvaluatorConfig> for SimpleEvaluator {
    fn from(config: SimpleEvaluatorConfig) -> Self {
        SimpleEvaluator::new(config.metrics).col_pred(&config.col_pred)
    }
}

impl Evaluator for SimpleEvaluator {
    fn log_name(&self) -> &'static str {
        "SimpleEvaluator"
    }

    fn evaluate(&self, model: &dyn Model, data: &mut RatingDataset) -> Result<Scores, EvaluationError> {
        {
            let span = info_span!("model", kind = model.log_name());
            let _enter = span.enter();

            model.predict(data, &self.col_pred)?;
        }

        let col_pred = match data.col_pred() {
            Some(col_pred) if data.table().contains(col_pred) => col_pred,
            _ => {
                error!("Prediction failed.");
                return Err(EvaluationError::MissingPredictions);
            }
        };

        let truth = numeric_column(data.table(), data.col_rating())?;
        let pred = numeric_column(data.table(), col_pred)?;

        let mut scores = Scores::new();
        for &metric in &self.metrics {
            let value = metric
                .compute(&truth, &pred)
                .map_err(|cause| EvaluationError::Metric {
                    metric: metric,
                    cause: cause,
                })?;
            debug!("{}: {}", metric, value);
            scores.insert(metric, value);
        }

        Ok(scores)
    }
}

/// Build an evaluator of the given kind from its config section.
pub fn provide_evaluator(kind: EvaluatorType, section: Value) -> Result<Box<dyn Evaluator>, ConfigError> {
    match kind {
        EvaluatorType::Simple => {
            let config: SimpleEvaluatorConfig = parse_section("evaluator_cfg", section)?;
            Ok(Box::new(SimpleEvaluator::from(config)))
        }
    }
}

#[cfg(test)]
mod tests {

    use serde_json;

    use super::*;
    use data::RatingDataConfig;
    use models::ModelSnapshot;
    use table::{Column, Table};
    use FittingError;

    /// Echoes the true rating, offset by a constant.
    #[derive(Debug)]
    struct OffsetModel {
        offset: f64,
    }

    impl Model for OffsetModel {
        fn log_name(&self) -> &'static str {
            "OffsetModel"
        }

        fn name(&self) -> &str {
            "offset"
        }

        fn is_fitted(&self) -> bool {
            true
        }

        fn fit(&mut self, _: &RatingDataset) -> Result<(), FittingError> {
            Ok(())
        }

        fn predict(&self, data: &mut RatingDataset, col_pred: &str) -> Result<(), PredictionError> {
            let mut table = data.table().clone();
            let pred = numeric_column(&table, data.col_rating())?
                .into_iter()
                .map(|rating| rating + self.offset)
                .collect();
            table.set_column(col_pred, Column::Float(pred))?;

            data.set_predictions(table, col_pred)?;

            Ok(())
        }

        fn snapshot(&self) -> ModelSnapshot {
            unimplemented!()
        }
    }

    /// Never predicts anything.
    #[derive(Debug)]
    struct SilentModel;

    impl Model for SilentModel {
        fn log_name(&self) -> &'static str {
            "SilentModel"
        }

        fn name(&self) -> &str {
            "silent"
        }

        fn is_fitted(&self) -> bool {
            false
        }

        fn fit(&mut self, _: &RatingDataset) -> Result<(), FittingError> {
            Ok(())
        }

        fn predict(&self, _: &mut RatingDataset, _: &str) -> Result<(), PredictionError> {
            Ok(())
        }

        fn snapshot(&self) -> ModelSnapshot {
            unimplemented!()
        }
    }

    fn ratings() -> RatingDataset {
        let table = Table::from_columns(vec![
            ("user", Column::Int(vec![0, 1, 2])),
            ("item", Column::Int(vec![0, 1, 0])),
            ("rate", Column::Float(vec![3.0, 4.0, 5.0])),
        ]).unwrap();

        RatingDataset::new(table, &RatingDataConfig::new(3, 2)).unwrap()
    }

    #[test]
    fn computes_configured_metrics() {
        let evaluator = SimpleEvaluator::new(vec![Metric::Rmse, Metric::Mae, Metric::Mse]);
        let mut data = ratings();

        let scores = evaluator
            .evaluate(&OffsetModel { offset: 0.0 }, &mut data)
            .unwrap();
        assert_eq!(scores.get(Metric::Rmse), Some(0.0));

        let scores = evaluator
            .evaluate(&OffsetModel { offset: 1.0 }, &mut data)
            .unwrap();
        assert_eq!(scores.len(), 3);
        assert_relative_eq!(scores.get(Metric::Rmse).unwrap(), 1.0);
        assert_relative_eq!(scores.get(Metric::Mae).unwrap(), 1.0);
        assert_eq!(scores.get(Metric::Auc), None);
        assert_eq!(scores.to_string(), "RMSE: 1, MAE: 1, MSE: 1");

        assert_eq!(data.col_pred(), Some("pred"));
    }

    #[test]
    fn missing_predictions_fail() {
        let evaluator = SimpleEvaluator::new(vec![Metric::Rmse]);

        match evaluator.evaluate(&SilentModel, &mut ratings()) {
            Err(EvaluationError::MissingPredictions) => {}
            other => panic!("Unexpected result: {:?}", other),
        }
    }

    #[test]
    fn metric_failures_name_the_metric() {
        let evaluator = SimpleEvaluator::new(vec![Metric::Auc]);

        let err = evaluator
            .evaluate(&OffsetModel { offset: 0.5 }, &mut ratings())
            .unwrap_err();

        assert!(err.to_string().starts_with("Cannot compute AUC"));
    }

    #[test]
    fn config_keeps_metric_order() {
        let config: SimpleEvaluatorConfig =
            serde_json::from_str(r#"{"metrics": ["NDCG", "MAE"]}"#).unwrap();
        let evaluator = SimpleEvaluator::from(config);

        assert_eq!(evaluator.metrics(), &[Metric::Ndcg, Metric::Mae]);
    }

    #[test]
    fn provides_simple_evaluator() {
        let evaluator = provide_evaluator(
            EvaluatorType::Simple,
            serde_json::from_str(r#"{"metrics": ["MAE", "NDCG"], "col_pred": "score"}"#).unwrap(),
        ).unwrap();
        let mut data = ratings();

        let scores = evaluator
            .evaluate(&OffsetModel { offset: 0.0 }, &mut data)
            .unwrap();

        assert_eq!(evaluator.log_name(), "SimpleEvaluator");
        assert_eq!(scores.get(Metric::Mae), Some(0.0));
        assert_relative_eq!(scores.get(Metric::Ndcg).unwrap(), 1.0);
        assert_eq!(data.col_pred(), Some("score"));

        assert!(provide_evaluator(EvaluatorType::Simple, Value::Null).is_err());
    }
}
