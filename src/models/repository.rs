//! Model persistence.
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use failure;
use serde_json;

use super::{Model, ModelSnapshot};

/// Stores and loads models.
pub trait Repository {
    /// Persist a model under its name and return where it went.
    fn store(&self, model: &dyn Model) -> Result<PathBuf, failure::Error>;
    /// Load a stored model.
    fn load(&self, path: &Path) -> Result<Box<dyn Model>, failure::Error>;
}

/// Keeps each model as `<model name>.json` in one directory.
#[derive(Clone, Debug)]
pub struct FileRepository {
    repo_dir: PathBuf,
}

impl FileRepository {
    pub fn new<P: Into<PathBuf>>(repo_dir: P) -> Self {
        FileRepository {
            repo_dir: repo_dir.into(),
        }
    }

    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }
}

impl Repository for FileRepository {
    fn store(&self, model: &dyn Model) -> Result<PathBuf, failure::Error> {
        let path = self.repo_dir.join(format!("{}.json", model.name()));
        let writer = BufWriter::new(File::create(&path)?);

        serde_json::to_writer(writer, &model.snapshot())?;
        info!("Stored model at {}.", path.display());

        Ok(path)
    }

    /// Relative paths are resolved against the repository directory.
    fn load(&self, path: &Path) -> Result<Box<dyn Model>, failure::Error> {
        let path = self.repo_dir.join(path);
        let reader = BufReader::new(File::open(&path)?);

        let snapshot: ModelSnapshot = serde_json::from_reader(reader)?;
        info!("Loaded model from {}.", path.display());

        Ok(snapshot.into_model())
    }
}

#[cfg(test)]
mod tests {

    use ndarray::Array2;
    use tempfile;

    use super::*;
    use data::{RatingDataConfig, RatingDataset};
    use models::factorization::Hyperparameters;
    use table::{Column, Table};

    #[test]
    fn store_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let repository = FileRepository::new(dir.path());

        let table = Table::from_columns(vec![
            ("user", Column::Int(vec![0, 1, 2])),
            ("item", Column::Int(vec![1, 0, 1])),
            ("rate", Column::Float(vec![4.0, 2.0, 1.5])),
        ]).unwrap();
        let data = RatingDataset::new(table, &RatingDataConfig::new(3, 2)).unwrap();

        let mut model = Hyperparameters::new(3, 2)
            .latent_dim(5)
            .num_epochs(3)
            .build();
        model.fit(&data).unwrap();

        let path = repository.store(&model).unwrap();
        assert_eq!(path, dir.path().join(format!("{}.json", Model::name(&model))));

        let file_name = path.file_name().map(PathBuf::from).unwrap();
        let loaded = repository.load(&file_name).unwrap();

        assert_eq!(loaded.name(), Model::name(&model));
        assert!(loaded.is_fitted());

        match loaded.snapshot() {
            ModelSnapshot::MatrixFactorization(loaded) => {
                assert_eq!(loaded.user_embedding(), model.user_embedding());
                assert_eq!(loaded.item_embedding(), model.item_embedding());
            }
        }
    }

    #[test]
    fn store_and_load_diverged_model() {
        let dir = tempfile::tempdir().unwrap();
        let repository = FileRepository::new(dir.path());
        assert_eq!(repository.repo_dir(), dir.path());

        let table = Table::from_columns(vec![
            ("user", Column::Int(vec![0, 1])),
            ("item", Column::Int(vec![0, 1])),
            ("rate", Column::Float(vec![5.0, 3.0])),
        ]).unwrap();
        let data = RatingDataset::new(table, &RatingDataConfig::new(2, 2)).unwrap();

        let mut model = Hyperparameters::new(2, 2)
            .latent_dim(1)
            .learning_rate(5.0)
            .num_epochs(50)
            .build();
        model.fit(&data).unwrap();
        assert!(model.user_embedding().iter().any(|value| !value.is_finite()));

        let path = repository.store(&model).unwrap();
        let loaded = repository.load(&path).unwrap();

        let same = |left: &Array2<f64>, right: &Array2<f64>| {
            left.dim() == right.dim()
                && left
                    .iter()
                    .zip(right.iter())
                    .all(|(a, b)| a == b || (a.is_nan() && b.is_nan()))
        };

        match loaded.snapshot() {
            ModelSnapshot::MatrixFactorization(loaded) => {
                assert!(same(loaded.user_embedding(), model.user_embedding()));
                assert!(same(loaded.item_embedding(), model.item_embedding()));
                assert_eq!(
                    serde_json::to_value(loaded.hyperparameters()).unwrap(),
                    serde_json::to_value(model.hyperparameters()).unwrap()
                );
            }
        }
    }

    #[test]
    fn load_missing_model() {
        let dir = tempfile::tempdir().unwrap();
        let repository = FileRepository::new(dir.path());

        assert!(repository.load(Path::new("missing.json")).is_err());
    }
}
