//! Experiment configuration.
//!
//! An experiment is described by a JSON document: an `experiment_cfg`
//! block naming the kind of every pipeline role, and one section per
//! role holding that kind's parameters. Sections stay untyped until the
//! matching `provide_*` function deserializes them into the config
//! struct of the selected kind.
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use failure;
use serde::de::DeserializeOwned;
use serde_json;
use serde_json::Value;

use data::DataType;
use evaluation::EvaluatorType;
use models::ModelType;
use trainer::TrainerType;
use usecase::UsecaseType;

/// Configuration error types.
#[derive(Debug, Fail)]
pub enum ConfigError {
    /// A parameter the selected pipeline path needs was not given.
    #[fail(display = "Required parameter `{}` is not set.", name)]
    MissingParameter {
        /// Parameter name.
        name: &'static str,
    },
    /// A kind tag names nothing this crate implements.
    #[fail(display = "Unsupported {}: `{}`.", kind, name)]
    Unsupported {
        /// What was being selected.
        kind: &'static str,
        /// The tag that was given.
        name: String,
    },
    /// A config section does not match the selected kind's parameters.
    #[fail(display = "Invalid `{}` section: {}", section, message)]
    InvalidSection {
        /// Section name.
        section: &'static str,
        /// Deserialization message.
        message: String,
    },
}

/// Declares a kind tag: a fieldless enum parsed from its upper-case
/// configuration name, failing with `ConfigError::Unsupported` otherwise.
macro_rules! kind_tag {
    (
        $(#[$meta:meta])*
        pub enum $name:ident($label:expr) {
            $($(#[$variant_meta:meta])* $variant:ident => $tag:expr,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
        #[serde(try_from = "String")]
        pub enum $name {
            $($(#[$variant_meta])* $variant,)+
        }

        impl $name {
            /// The name this kind has in configuration files.
            pub fn as_str(&self) -> &'static str {
                match *self {
                    $($name::$variant => $tag,)+
                }
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = $crate::config::ConfigError;

            fn from_str(tag: &str) -> Result<Self, Self::Err> {
                $(
                    if tag == $tag {
                        return Ok($name::$variant);
                    }
                )+

                Err($crate::config::ConfigError::Unsupported {
                    kind: $label,
                    name: tag.to_owned(),
                })
            }
        }

        impl ::std::convert::TryFrom<String> for $name {
            type Error = $crate::config::ConfigError;

            fn try_from(tag: String) -> Result<Self, Self::Error> {
                tag.parse()
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

/// Deserialize a config section into the parameters of one kind.
///
/// A missing section (`null`) is read as an empty object, so kinds whose
/// parameters all have defaults need no section at all.
pub fn parse_section<T: DeserializeOwned>(
    section: &'static str,
    value: Value,
) -> Result<T, ConfigError> {
    let value = if value.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        value
    };

    serde_json::from_value(value).map_err(|err| ConfigError::InvalidSection {
        section: section,
        message: err.to_string(),
    })
}

/// The kind selected for each pipeline role.
#[derive(Clone, Debug, Deserialize)]
pub struct ExperimentConfig {
    pub usecase_type: UsecaseType,
    pub data_type: DataType,
    pub model_type: ModelType,
    pub trainer_type: TrainerType,
    pub evaluator_type: EvaluatorType,
}

/// Data files. Either `all_data` (to be split) or a `train_data` and
/// `test_data` pair is expected.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct DataPath {
    #[serde(default)]
    pub all_data: Option<PathBuf>,
    #[serde(default)]
    pub train_data: Option<PathBuf>,
    #[serde(default)]
    pub test_data: Option<PathBuf>,
    #[serde(default)]
    pub valid_data: Option<PathBuf>,
}

/// Top-level application configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub experiment_cfg: ExperimentConfig,
    #[serde(default)]
    pub usecase_cfg: Value,
    #[serde(default)]
    pub data_cfg: Value,
    #[serde(default)]
    pub model_cfg: Value,
    #[serde(default)]
    pub evaluator_cfg: Value,
    #[serde(default)]
    pub trainer_cfg: Value,
    #[serde(default)]
    pub data_path: DataPath,
    /// Receives `output.log` and `score.csv`.
    pub out_dir: PathBuf,
    /// Model repository directory.
    pub repo_dir: PathBuf,
    /// Encode user ids with the one-indexed range `1..=num_users`.
    #[serde(default)]
    pub user_one_idx: bool,
    /// Encode item ids with the one-indexed range `1..=num_items`.
    #[serde(default)]
    pub item_one_idx: bool,
    /// File whose first column lists every user id.
    #[serde(default)]
    pub unique_user: Option<PathBuf>,
    /// File whose first column lists every item id.
    #[serde(default)]
    pub unique_item: Option<PathBuf>,
    /// Stored model to train instead of a fresh one, relative to `repo_dir`.
    #[serde(default)]
    pub model_load_file: Option<PathBuf>,
}

impl AppConfig {
    /// Read the configuration from a JSON file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, failure::Error> {
        let reader = BufReader::new(File::open(path)?);

        Ok(serde_json::from_reader(reader)?)
    }

    /// Parse the configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, failure::Error> {
        Ok(serde_json::from_str(json)?)
    }
}
