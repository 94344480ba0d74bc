//! Experiment pipelines.
//!
//! A usecase owns every piece of one experiment run: the datasets, the
//! trainer (and through it the model and evaluator), the model
//! repository and the label encoders needed to write readable output.
use std::path::{Path, PathBuf};

use failure;
use serde_json::Value;

use config::{parse_section, ConfigError};
use data::{RatingDataset, SplitType};
use encoding::LabelEncoder;
use evaluation::Scores;
use models::repository::Repository;
use trainer::Trainer;

kind_tag! {
    /// Experiment pipelines.
    pub enum UsecaseType("usecase type") {
        /// Split (or take pre-split data), train, evaluate, persist.
        TrainTestEval => "TRAINTESTEVAL",
    }
}

/// How far a pipeline run has progressed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    AwaitingInput,
    Splitting,
    Training,
    Evaluating,
    Persisting,
    Done,
}

/// A runnable experiment.
pub trait Usecase {
    /// Name of the span the usecase logs under.
    fn log_name(&self) -> &'static str;
    fn stage(&self) -> Stage;
    /// Run the experiment and return the test scores.
    fn execute(&mut self) -> Result<Scores, failure::Error>;
}

/// Split parameters. They are only required when the data has to be split.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct TrainTestEvalConfig {
    #[serde(default)]
    pub train_ratio: Option<f64>,
    #[serde(default)]
    pub split_type: Option<SplitType>,
    /// Column to stratify on for `SATISFIED` splits.
    #[serde(default)]
    pub filter_by: Option<String>,
    #[serde(default)]
    pub min_samples: Option<usize>,
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Datasets handed to a pipeline.
#[derive(Debug, Default)]
pub struct PipelineData {
    pub all_data: Option<RatingDataset>,
    pub train_data: Option<RatingDataset>,
    pub test_data: Option<RatingDataset>,
    pub valid_data: Option<RatingDataset>,
}

/// Encoders the datasets were label-encoded with.
#[derive(Clone, Debug, Default)]
pub struct Encoders {
    pub user: Option<LabelEncoder>,
    pub item: Option<LabelEncoder>,
}

fn require<T>(value: Option<T>, name: &'static str) -> Result<T, ConfigError> {
    value.ok_or_else(|| {
        error!("{} is not set.", name);
        ConfigError::MissingParameter { name: name }
    })
}

/// Train on one partition, score on the other, store the model.
pub struct TrainTestEval {
    config: TrainTestEvalConfig,
    trainer: Box<dyn Trainer>,
    repository: Box<dyn Repository>,
    data: PipelineData,
    output_file: Option<PathBuf>,
    encoders: Encoders,
    stage: Stage,
    evaluated: Option<RatingDataset>,
}

impl TrainTestEval {
    pub fn new(
        config: TrainTestEvalConfig,
        trainer: Box<dyn Trainer>,
        repository: Box<dyn Repository>,
        data: PipelineData,
    ) -> Self {
        TrainTestEval {
            config: config,
            trainer: trainer,
            repository: repository,
            data: data,
            output_file: None,
            encoders: Encoders::default(),
            stage: Stage::AwaitingInput,
            evaluated: None,
        }
    }

    /// Write the scored test data to `output_file`.
    pub fn output_file<P: Into<PathBuf>>(mut self, output_file: P) -> Self {
        self.output_file = Some(output_file.into());
        self
    }

    /// Decode user and item ids with these encoders before writing output.
    pub fn encoders(mut self, encoders: Encoders) -> Self {
        self.encoders = encoders;
        self
    }

    pub fn trainer(&self) -> &dyn Trainer {
        &*self.trainer
    }

    /// The test data after evaluation, with its prediction column.
    pub fn test_data(&self) -> Option<&RatingDataset> {
        self.evaluated.as_ref()
    }

    /// Take the given train and test sets, or split `all_data`.
    fn resolve_data(
        &mut self,
    ) -> Result<(RatingDataset, RatingDataset, Option<RatingDataset>), failure::Error> {
        match (self.data.train_data.take(), self.data.test_data.take()) {
            (Some(train), Some(test)) => {
                info!("Using the given train and test data.");
                return Ok((train, test, self.data.valid_data.take()));
            }
            (train, test) => {
                self.data.train_data = train;
                self.data.test_data = test;
            }
        }

        let all_data = require(self.data.all_data.as_ref(), "all_data")?;
        let split_type = require(self.config.split_type, "split_type")?;
        let seed = require(self.config.seed, "seed")?;
        let train_ratio = require(self.config.train_ratio, "train_ratio")?;

        self.stage = Stage::Splitting;
        info!("Splitting data with {} split.", split_type);

        let (train, test) = match split_type {
            SplitType::Random => all_data.random_split(train_ratio, seed)?,
            SplitType::Satisfied => {
                let filter_by = require(self.config.filter_by.as_ref(), "filter_by")?;
                let min_samples = require(self.config.min_samples, "min_samples")?;

                all_data.satisfied_split(filter_by, train_ratio, min_samples, seed)?
            }
            SplitType::Timestamp => all_data.timestamp_split(train_ratio)?,
        };

        Ok((train, test, self.data.valid_data.take()))
    }

    fn write_output(&self, test: &mut RatingDataset, output_file: &Path) -> Result<(), failure::Error> {
        if let Some(ref encoder) = self.encoders.user {
            let col_user = test.col_user().to_owned();
            test.label_decode(&col_user, encoder)?;
        }
        if let Some(ref encoder) = self.encoders.item {
            let col_item = test.col_item().to_owned();
            test.label_decode(&col_item, encoder)?;
        }

        test.to_csv(output_file)?;
        info!("Wrote test predictions to {}.", output_file.display());

        Ok(())
    }
}

impl Usecase for TrainTestEval {
    fn log_name(&self) -> &'static str {
        "TrainTestEval"
    }

    fn stage(&self) -> Stage {
        self.stage
    }

    fn execute(&mut self) -> Result<Scores, failure::Error> {
        let (train, mut test, mut valid) = self.resolve_data()?;

        self.stage = Stage::Training;
        {
            let span = info_span!("trainer", kind = self.trainer.log_name());
            let _enter = span.enter();

            self.trainer.train(&train, valid.as_mut())?;
        }

        self.stage = Stage::Evaluating;
        info!("Evaluating the model on test data.");
        let scores = {
            let evaluator = self.trainer.evaluator();
            let span = info_span!("evaluator", kind = evaluator.log_name());
            let _enter = span.enter();

            evaluator.evaluate(self.trainer.model(), &mut test)?
        };

        self.stage = Stage::Persisting;
        if let Some(ref output_file) = self.output_file {
            self.write_output(&mut test, output_file)?;
        }

        self.repository.store(self.trainer.model())?;
        info!("Test scores: {}", scores);

        self.evaluated = Some(test);
        self.stage = Stage::Done;

        Ok(scores)
    }
}

/// Build a usecase of the given kind from its config section.
pub fn provide_usecase(
    kind: UsecaseType,
    section: Value,
    trainer: Box<dyn Trainer>,
    repository: Box<dyn Repository>,
    data: PipelineData,
    output_file: Option<PathBuf>,
    encoders: Encoders,
) -> Result<Box<dyn Usecase>, ConfigError> {
    match kind {
        UsecaseType::TrainTestEval => {
            let config: TrainTestEvalConfig = parse_section("usecase_cfg", section)?;
            let mut usecase = TrainTestEval::new(config, trainer, repository, data).encoders(encoders);

            if let Some(output_file) = output_file {
                usecase = usecase.output_file(output_file);
            }

            Ok(Box::new(usecase))
        }
    }
}
