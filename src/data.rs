use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use failure;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xorshift::XorShiftRng;

use encoding::{EncodingError, LabelEncoder};
use table::{Cell, Table, TableError};

use super::{ItemId, UserId};

kind_tag! {
    /// How to partition a dataset into train and test sets.
    pub enum SplitType("split type") {
        /// Shuffle-then-cut holdout.
        Random => "RANDOM",
        /// Minimum-count filtered, stratified holdout.
        Satisfied => "SATISFIED",
        /// Chronological holdout.
        Timestamp => "TIMESTAMP",
    }
}

kind_tag! {
    /// Kind of interaction data.
    pub enum DataType("data type") {
        Rating => "RATING",
    }
}

/// Dataset error types.
#[derive(Debug, Fail)]
pub enum DatasetError {
    #[fail(display = "Column `{}` is already encoded.", column)]
    AlreadyEncoded { column: String },
    #[fail(display = "Column `{}` is not encoded yet.", column)]
    NotEncoded { column: String },
    #[fail(display = "Train ratio should be in [0, 1], got {}.", ratio)]
    InvalidRatio { ratio: f64 },
    #[fail(display = "Cannot filter by `{}`: expected the user or item column.", column)]
    InvalidFilterColumn { column: String },
    #[fail(display = "min_samples should be an integer greater than 0.")]
    InvalidMinSamples,
    #[fail(display = "The dataset does not have a timestamp column.")]
    NoTimestamp,
    #[fail(
        display = "Column `{}` should hold non-negative integer indices, found {} values.",
        column,
        found
    )]
    NotIndexed { column: String, found: &'static str },
    #[fail(display = "{}", _0)]
    Table(#[cause] TableError),
    #[fail(display = "{}", _0)]
    Encoding(#[cause] EncodingError),
}

impl From<TableError> for DatasetError {
    fn from(err: TableError) -> Self {
        DatasetError::Table(err)
    }
}

impl From<EncodingError> for DatasetError {
    fn from(err: EncodingError) -> Self {
        DatasetError::Encoding(err)
    }
}

fn default_col_user() -> String {
    "user".to_owned()
}

fn default_col_item() -> String {
    "item".to_owned()
}

fn default_col_rating() -> String {
    "rate".to_owned()
}

fn default_separator() -> char {
    ','
}

/// Schema of a rating file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RatingDataConfig {
    pub num_users: usize,
    pub num_items: usize,
    #[serde(default = "default_col_user")]
    pub col_user: String,
    #[serde(default = "default_col_item")]
    pub col_item: String,
    #[serde(default = "default_col_rating")]
    pub col_rating: String,
    #[serde(default)]
    pub col_timestamp: Option<String>,
    #[serde(default = "default_separator")]
    pub separator: char,
}

impl RatingDataConfig {
    pub fn new(num_users: usize, num_items: usize) -> Self {
        RatingDataConfig {
            num_users: num_users,
            num_items: num_items,
            col_user: default_col_user(),
            col_item: default_col_item(),
            col_rating: default_col_rating(),
            col_timestamp: None,
            separator: default_separator(),
        }
    }

    pub fn col_timestamp(mut self, col_timestamp: &str) -> Self {
        self.col_timestamp = Some(col_timestamp.to_owned());
        self
    }
}

fn check_ratio(ratio: f64) -> Result<(), DatasetError> {
    if ratio >= 0.0 && ratio <= 1.0 {
        Ok(())
    } else {
        Err(DatasetError::InvalidRatio { ratio: ratio })
    }
}

/// Read a column of row indices (encoded user or item ids).
pub fn index_column(table: &Table, name: &str) -> Result<Vec<usize>, DatasetError> {
    let column = table.column(name)?;

    column.to_indices().ok_or_else(|| DatasetError::NotIndexed {
        column: name.to_owned(),
        found: column.type_name(),
    })
}

/// Read a numeric column as floats.
pub fn numeric_column(table: &Table, name: &str) -> Result<Vec<f64>, DatasetError> {
    let column = table.column(name)?;

    column.to_f64().ok_or_else(|| {
        DatasetError::from(TableError::ColumnType {
            name: name.to_owned(),
            expected: "numeric",
            found: column.type_name(),
        })
    })
}

/// Explicit ratings: one `(user, item, rating)` row per interaction, with
/// an optional timestamp and, once a model has scored it, a prediction.
#[derive(Clone, Debug)]
pub struct RatingDataset {
    table: Table,
    num_users: usize,
    num_items: usize,
    col_user: String,
    col_item: String,
    col_rating: String,
    col_timestamp: Option<String>,
    col_pred: Option<String>,
    encoded: BTreeSet<String>,
}

impl RatingDataset {
    /// Wrap a table. Repeated rows are dropped.
    pub fn new(table: Table, config: &RatingDataConfig) -> Result<Self, DatasetError> {
        for name in &[&config.col_user, &config.col_item, &config.col_rating] {
            table.column(name)?;
        }
        if let Some(ref col_timestamp) = config.col_timestamp {
            table.column(col_timestamp)?;
        }

        Ok(RatingDataset {
            table: table.drop_duplicates(),
            num_users: config.num_users,
            num_items: config.num_items,
            col_user: config.col_user.clone(),
            col_item: config.col_item.clone(),
            col_rating: config.col_rating.clone(),
            col_timestamp: config.col_timestamp.clone(),
            col_pred: None,
            encoded: BTreeSet::new(),
        })
    }

    /// A dataset over `table` with this dataset's schema and encoding state.
    fn with_table(&self, table: Table) -> Self {
        RatingDataset {
            table: table,
            num_users: self.num_users,
            num_items: self.num_items,
            col_user: self.col_user.clone(),
            col_item: self.col_item.clone(),
            col_rating: self.col_rating.clone(),
            col_timestamp: self.col_timestamp.clone(),
            col_pred: self.col_pred.clone(),
            encoded: self.encoded.clone(),
        }
    }

    fn split_at(&self, table: &Table, indices: &[usize], idx: usize) -> (Self, Self) {
        let head = self.with_table(table.take(&indices[..idx]));
        let tail = self.with_table(table.take(&indices[idx..]));

        (head, tail)
    }

    /// Replace the values of `column` with their codes. Without an
    /// encoder this does nothing.
    pub fn label_encode(
        &mut self,
        column: &str,
        encoder: Option<&LabelEncoder>,
    ) -> Result<(), DatasetError> {
        let encoder = match encoder {
            Some(encoder) => encoder,
            None => return Ok(()),
        };

        if self.encoded.contains(column) {
            return Err(DatasetError::AlreadyEncoded {
                column: column.to_owned(),
            });
        }

        let encoded = encoder.encode(self.table.column(column)?)?;
        self.table.set_column(column, encoded)?;
        self.encoded.insert(column.to_owned());

        Ok(())
    }

    /// Replace the codes in `column` with the labels they stand for.
    pub fn label_decode(&mut self, column: &str, encoder: &LabelEncoder) -> Result<(), DatasetError> {
        if !self.encoded.contains(column) {
            return Err(DatasetError::NotEncoded {
                column: column.to_owned(),
            });
        }

        let decoded = encoder.decode(self.table.column(column)?)?;
        self.table.set_column(column, decoded)?;
        self.encoded.remove(column);

        Ok(())
    }

    /// Shuffle the rows and put the first `floor(train_ratio * len)` of
    /// them in the train set.
    pub fn random_split(&self, train_ratio: f64, seed: u64) -> Result<(Self, Self), DatasetError> {
        check_ratio(train_ratio)?;

        let mut rng = XorShiftRng::seed_from_u64(seed);
        let mut indices: Vec<usize> = (0..self.len()).collect();
        indices.shuffle(&mut rng);

        let num_train = (train_ratio * self.len() as f64).floor() as usize;
        let (train, test) = self.split_at(&self.table, &indices, num_train);

        debug!("Random split: {} train rows, {} test rows.", train.len(), test.len());

        Ok((train, test))
    }

    /// Stratified split on `filter_by` (the user or item column).
    ///
    /// With `min_samples > 1`, rows are first dropped for every value of
    /// the other id column that occurs fewer than `min_samples` times.
    /// Each stratum then contributes `round(train_ratio * stratum size)`
    /// shuffled rows to the train set and the rest to the test set.
    pub fn satisfied_split(
        &self,
        filter_by: &str,
        train_ratio: f64,
        min_samples: usize,
        seed: u64,
    ) -> Result<(Self, Self), DatasetError> {
        check_ratio(train_ratio)?;

        let other = if filter_by == self.col_user {
            &self.col_item
        } else if filter_by == self.col_item {
            &self.col_user
        } else {
            return Err(DatasetError::InvalidFilterColumn {
                column: filter_by.to_owned(),
            });
        };

        if min_samples < 1 {
            return Err(DatasetError::InvalidMinSamples);
        }

        let table = if min_samples > 1 {
            let mut kept: Vec<usize> = self
                .table
                .group_indices(other)?
                .into_iter()
                .filter(|&(_, ref rows)| rows.len() >= min_samples)
                .flat_map(|(_, rows)| rows)
                .collect();
            kept.sort();

            debug!(
                "Dropped {} rows of groups with fewer than {} samples.",
                self.len() - kept.len(),
                min_samples
            );

            self.table.take(&kept)
        } else {
            self.table.clone()
        };

        let mut rng = XorShiftRng::seed_from_u64(seed);
        let mut train = Vec::with_capacity(table.len());
        let mut test = Vec::with_capacity(table.len());

        for (_, mut rows) in table.group_indices(filter_by)? {
            rows.shuffle(&mut rng);

            let num_train = (train_ratio * rows.len() as f64).round() as usize;
            train.extend_from_slice(&rows[..num_train]);
            test.extend_from_slice(&rows[num_train..]);
        }

        let num_train = train.len();
        train.extend(test);
        let (train, test) = self.split_at(&table, &train, num_train);

        debug!("Satisfied split: {} train rows, {} test rows.", train.len(), test.len());

        Ok((train, test))
    }

    /// Chronological split: the earliest `floor(train_ratio * len)` rows
    /// form the train set.
    pub fn timestamp_split(&self, train_ratio: f64) -> Result<(Self, Self), DatasetError> {
        let col_timestamp = match self.col_timestamp {
            Some(ref col_timestamp) => col_timestamp,
            None => return Err(DatasetError::NoTimestamp),
        };

        check_ratio(train_ratio)?;

        let table = self.table.sort_by_column(col_timestamp)?;
        let indices: Vec<usize> = (0..table.len()).collect();
        let num_train = (train_ratio * table.len() as f64).floor() as usize;
        let (train, test) = self.split_at(&table, &indices, num_train);

        debug!("Timestamp split: {} train rows, {} test rows.", train.len(), test.len());

        Ok((train, test))
    }

    /// Users, items and ratings, aligned by row.
    pub fn get_ratings(&self) -> Result<(Vec<UserId>, Vec<ItemId>, Vec<f64>), DatasetError> {
        Ok((
            index_column(&self.table, &self.col_user)?,
            index_column(&self.table, &self.col_item)?,
            numeric_column(&self.table, &self.col_rating)?,
        ))
    }

    /// Rows of each user, keyed by user index.
    pub fn groupby_user(&self) -> Result<BTreeMap<UserId, Table>, DatasetError> {
        let mut groups = BTreeMap::new();

        for (user, rows) in self.table.group_indices(&self.col_user)? {
            let user_id = match user {
                Cell::Int(user_id) if user_id >= 0 => user_id as UserId,
                _ => {
                    return Err(DatasetError::NotIndexed {
                        column: self.col_user.clone(),
                        found: self.table.column(&self.col_user)?.type_name(),
                    })
                }
            };

            groups.insert(user_id, self.table.take(&rows));
        }

        Ok(groups)
    }

    /// Drop every row whose (user, item) pair occurs in `other`.
    pub fn remove(&mut self, other: &Table) -> Result<(), DatasetError> {
        self.table = self
            .table
            .remove(other, &[self.col_user.as_str(), self.col_item.as_str()])?;

        Ok(())
    }

    /// Append the rows of `other`.
    pub fn add(&mut self, other: &Table) -> Result<(), DatasetError> {
        self.table.append(other)?;

        Ok(())
    }

    pub(crate) fn set_predictions(&mut self, table: Table, col_pred: &str) -> Result<(), DatasetError> {
        table.column(col_pred)?;

        self.table = table;
        self.col_pred = Some(col_pred.to_owned());

        Ok(())
    }

    pub fn to_csv<P: AsRef<Path>>(&self, path: P) -> Result<(), failure::Error> {
        self.table.write_csv(path)
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn num_users(&self) -> usize {
        self.num_users
    }

    pub fn num_items(&self) -> usize {
        self.num_items
    }

    pub fn col_user(&self) -> &str {
        &self.col_user
    }

    pub fn col_item(&self) -> &str {
        &self.col_item
    }

    pub fn col_rating(&self) -> &str {
        &self.col_rating
    }

    /// The column holding model predictions, once a model has scored
    /// this dataset.
    pub fn col_pred(&self) -> Option<&str> {
        self.col_pred.as_ref().map(|col_pred| col_pred.as_str())
    }

    pub fn col_timestamp(&self) -> Option<&str> {
        self.col_timestamp.as_ref().map(|col| col.as_str())
    }

    pub fn has_timestamp(&self) -> bool {
        self.col_timestamp.is_some()
    }

    pub fn is_encoded(&self, column: &str) -> bool {
        self.encoded.contains(column)
    }
}
