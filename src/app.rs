//! Wiring an experiment together from its configuration.
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use failure;
use tracing_subscriber;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use config::AppConfig;
use data::{DataType, RatingDataConfig, RatingDataset};
use datasets::{prepare_dir, provide_data_config, provide_dataset, provide_label_encoder};
use encoding::LabelEncoder;
use evaluation::{provide_evaluator, Scores};
use models::provide_model;
use models::repository::{FileRepository, Repository};
use trainer::provide_trainer;
use usecase::{provide_usecase, Encoders, PipelineData, Usecase};

/// Name of the log file written to the output directory.
pub const LOG_FILE: &str = "output.log";
/// Name of the scored test data written to the output directory.
pub const SCORE_FILE: &str = "score.csv";

/// A configured experiment, ready to run.
pub struct App {
    usecase: Box<dyn Usecase>,
}

impl App {
    pub fn new(usecase: Box<dyn Usecase>) -> Self {
        info!("Initialized App.");

        App { usecase: usecase }
    }

    /// Run the experiment.
    pub fn start(&mut self) -> Result<Scores, failure::Error> {
        let span = info_span!("App");
        let _enter = span.enter();

        info!("Executing {}.", self.usecase.log_name());
        let scores = {
            let span = info_span!("usecase", kind = self.usecase.log_name());
            let _enter = span.enter();

            self.usecase.execute()?
        };
        info!("Finished executing {}.", self.usecase.log_name());

        Ok(scores)
    }
}

/// Create the output and repository directories.
pub fn prepare_dirs(config: &AppConfig) -> Result<(), failure::Error> {
    prepare_dir(&config.out_dir)?;
    prepare_dir(&config.repo_dir)?;

    Ok(())
}

/// Log INFO and above to stdout and DEBUG and above to `log_file`.
pub fn init_logging(log_file: &Path) -> Result<(), failure::Error> {
    let file = File::create(log_file)?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_filter(LevelFilter::INFO))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .with_filter(LevelFilter::DEBUG),
        )
        .try_init()?;

    Ok(())
}

fn provide_encoder(
    unique_file: &Option<PathBuf>,
    one_indexed: bool,
    num_classes: usize,
) -> Result<Option<LabelEncoder>, failure::Error> {
    match *unique_file {
        Some(ref path) => Ok(Some(provide_label_encoder(path)?)),
        None if one_indexed => Ok(Some(LabelEncoder::one_indexed(num_classes))),
        None => Ok(None),
    }
}

fn load_dataset(
    path: &Option<PathBuf>,
    kind: DataType,
    config: &RatingDataConfig,
    encoders: &Encoders,
) -> Result<Option<RatingDataset>, failure::Error> {
    let path = match *path {
        Some(ref path) => path,
        None => return Ok(None),
    };

    let mut data = provide_dataset(path, kind, config)?;
    data.label_encode(&config.col_user, encoders.user.as_ref())?;
    data.label_encode(&config.col_item, encoders.item.as_ref())?;

    Ok(Some(data))
}

/// Build the app described by `config`. Directories must already exist.
pub fn provide_app(config: &AppConfig) -> Result<App, failure::Error> {
    let experiment = &config.experiment_cfg;
    let data_config = provide_data_config(experiment.data_type, config.data_cfg.clone())?;

    let repository = FileRepository::new(config.repo_dir.clone());
    let model = match config.model_load_file {
        Some(ref path) => repository.load(path)?,
        None => provide_model(experiment.model_type, config.model_cfg.clone())?,
    };
    info!("This model is {}.", model.name());

    let evaluator = provide_evaluator(experiment.evaluator_type, config.evaluator_cfg.clone())?;
    let trainer = provide_trainer(
        experiment.trainer_type,
        config.trainer_cfg.clone(),
        model,
        evaluator,
    )?;

    let encoders = Encoders {
        user: provide_encoder(&config.unique_user, config.user_one_idx, data_config.num_users)?,
        item: provide_encoder(&config.unique_item, config.item_one_idx, data_config.num_items)?,
    };

    let paths = &config.data_path;
    let data = PipelineData {
        all_data: load_dataset(&paths.all_data, experiment.data_type, &data_config, &encoders)?,
        train_data: load_dataset(&paths.train_data, experiment.data_type, &data_config, &encoders)?,
        test_data: load_dataset(&paths.test_data, experiment.data_type, &data_config, &encoders)?,
        valid_data: load_dataset(&paths.valid_data, experiment.data_type, &data_config, &encoders)?,
    };

    let usecase = provide_usecase(
        experiment.usecase_type,
        config.usecase_cfg.clone(),
        trainer,
        Box::new(repository),
        data,
        Some(config.out_dir.join(SCORE_FILE)),
        encoders,
    )?;

    Ok(App::new(usecase))
}

#[cfg(test)]
mod tests {

    use std::fs;
    use std::io::Write;

    use serde_json;
    use tempfile;

    use super::*;
    use metrics::Metric;
    use table::{Column, Table};

    fn write_ratings(path: &Path) {
        let mut file = File::create(path).unwrap();
        writeln!(file, "user,item,rate").unwrap();

        for idx in 0..40 {
            writeln!(file, "{},{},{}", idx % 5 + 1, idx * 3 % 8 + 1, idx % 5 + 1).unwrap();
        }
    }

    fn app_config(root: &Path, extra: &str) -> AppConfig {
        let path = |name: &str| serde_json::to_string(&root.join(name)).unwrap();

        AppConfig::from_json(&format!(
            r#"{{
                "experiment_cfg": {{
                    "usecase_type": "TRAINTESTEVAL",
                    "data_type": "RATING",
                    "model_type": "MF",
                    "trainer_type": "ONETIME",
                    "evaluator_type": "SIMPLE"
                }},
                "usecase_cfg": {{"split_type": "RANDOM", "train_ratio": 0.75, "seed": 2}},
                "data_cfg": {{"num_users": 5, "num_items": 8}},
                "model_cfg": {{"num_users": 5, "num_items": 8, "latent_dim": 3, "num_epochs": 20}},
                "evaluator_cfg": {{"metrics": ["RMSE", "MAE"]}},
                "data_path": {{"all_data": {}}},
                "out_dir": {},
                "repo_dir": {},
                "user_one_idx": true,
                "item_one_idx": true
                {}
            }}"#,
            path("ratings.csv"),
            path("out"),
            path("repo"),
            extra
        )).unwrap()
    }

    #[test]
    fn runs_experiment_end_to_end() {
        let root = tempfile::tempdir().unwrap();
        write_ratings(&root.path().join("ratings.csv"));

        let config = app_config(root.path(), "");
        prepare_dirs(&config).unwrap();

        let scores = provide_app(&config).unwrap().start().unwrap();

        assert!(scores.get(Metric::Rmse).unwrap().is_finite());
        assert!(scores.get(Metric::Mae).unwrap().is_finite());

        let written = Table::read_csv(config.out_dir.join(SCORE_FILE), b',').unwrap();
        assert_eq!(written.len(), 10);

        // Ids are written back in their original one-indexed form.
        match *written.column("item").unwrap() {
            Column::Int(ref items) => assert!(items.iter().all(|&item| item >= 1 && item <= 8)),
            ref other => panic!("Unexpected column: {:?}", other),
        }

        assert_eq!(fs::read_dir(&config.repo_dir).unwrap().count(), 1);
    }

    #[test]
    fn continues_from_stored_model() {
        let root = tempfile::tempdir().unwrap();
        write_ratings(&root.path().join("ratings.csv"));

        let config = app_config(root.path(), "");
        prepare_dirs(&config).unwrap();
        provide_app(&config).unwrap().start().unwrap();

        let stored = fs::read_dir(&config.repo_dir)
            .unwrap()
            .next()
            .unwrap()
            .unwrap()
            .file_name();
        let extra = format!(
            r#", "model_load_file": {}"#,
            serde_json::to_string(&PathBuf::from(&stored)).unwrap()
        );

        let config = app_config(root.path(), &extra);
        assert!(provide_app(&config).unwrap().start().is_ok());
    }

    #[test]
    fn rejects_file_as_output_dir() {
        let root = tempfile::tempdir().unwrap();
        File::create(root.path().join("out")).unwrap();

        let config = app_config(root.path(), "");

        assert!(prepare_dirs(&config).is_err());
    }

    #[test]
    fn missing_data_file_fails() {
        let root = tempfile::tempdir().unwrap();
        let config = app_config(root.path(), "");
        prepare_dirs(&config).unwrap();

        assert!(provide_app(&config).is_err());
    }
}
