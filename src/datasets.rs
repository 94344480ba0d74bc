//! Loading datasets and label encoders from delimited files.
use std::fs::create_dir_all;
use std::path::Path;

use failure;
use serde_json::Value;

use config::{parse_section, ConfigError};
use data::{DataType, RatingDataConfig, RatingDataset};
use encoding::LabelEncoder;
use table::Table;

/// Load error types.
#[derive(Debug, Fail)]
pub enum LoadError {
    /// A path that should be a directory is something else.
    #[fail(display = "`{}` exists and is not a directory.", path)]
    NotADirectory { path: String },
    /// A file without any column.
    #[fail(display = "`{}` has no columns.", path)]
    NoColumns { path: String },
    /// Only single-byte separators can be read.
    #[fail(display = "Separator {:?} is not an ASCII character.", separator)]
    InvalidSeparator { separator: char },
}

/// Create `path` and its parents if missing.
pub fn prepare_dir<P: AsRef<Path>>(path: P) -> Result<(), failure::Error> {
    let path = path.as_ref();

    if path.exists() && !path.is_dir() {
        return Err(LoadError::NotADirectory {
            path: path.display().to_string(),
        }.into());
    }

    if !path.exists() {
        create_dir_all(path)?;
        debug!("Created {}.", path.display());
    }

    Ok(())
}

/// Parse the data section for a data kind.
pub fn provide_data_config(kind: DataType, section: Value) -> Result<RatingDataConfig, ConfigError> {
    match kind {
        DataType::Rating => parse_section("data_cfg", section),
    }
}

/// Read a dataset of the given kind from a delimited file.
pub fn provide_dataset<P: AsRef<Path>>(
    path: P,
    kind: DataType,
    config: &RatingDataConfig,
) -> Result<RatingDataset, failure::Error> {
    if !config.separator.is_ascii() {
        return Err(LoadError::InvalidSeparator {
            separator: config.separator,
        }.into());
    }

    let path = path.as_ref();
    let table = Table::read_csv(path, config.separator as u8)?;
    info!("Loaded {} rows from {}.", table.len(), path.display());

    match kind {
        DataType::Rating => Ok(RatingDataset::new(table, config)?),
    }
}

/// Fit a label encoder to the first column of a file listing every id.
pub fn provide_label_encoder<P: AsRef<Path>>(path: P) -> Result<LabelEncoder, failure::Error> {
    let path = path.as_ref();
    let table = Table::read_csv(path, b',')?;

    let name = table
        .column_names()
        .first()
        .ok_or_else(|| LoadError::NoColumns {
            path: path.display().to_string(),
        })?;

    Ok(LabelEncoder::from_column(table.column(name)?))
}
