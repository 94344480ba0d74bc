//! A small column-oriented table: the in-memory form of rating files.
//!
//! Columns are typed (`Int`, `Float` or `Str`) and all have the same
//! length. Row operations (`take`, deduplication, sorting, grouping) work
//! on row indices and gather every column at once.
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs::File;
use std::hash::{Hash, Hasher};
use std::io::{Read, Write};
use std::path::Path;

use csv;
use failure;

/// Table error types.
#[derive(Debug, Fail)]
pub enum TableError {
    #[fail(display = "Column `{}` does not exist.", name)]
    MissingColumn { name: String },
    #[fail(
        display = "Column `{}` has {} rows, expected {}.",
        name,
        got,
        expected
    )]
    LengthMismatch {
        name: String,
        expected: usize,
        got: usize,
    },
    #[fail(display = "Columns {:?} do not match columns {:?}.", left, right)]
    SchemaMismatch { left: Vec<String>, right: Vec<String> },
    #[fail(
        display = "Column `{}` holds {} values, expected {}.",
        name,
        found,
        expected
    )]
    ColumnType {
        name: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// A single value.
#[derive(Clone, Debug)]
pub enum Cell {
    Int(i64),
    Float(f64),
    Str(String),
}

impl Cell {
    fn rank(&self) -> u8 {
        match *self {
            Cell::Int(_) => 0,
            Cell::Float(_) => 1,
            Cell::Str(_) => 2,
        }
    }

    /// Numeric value of the cell, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Cell::Int(value) => Some(value as f64),
            Cell::Float(value) => Some(value),
            Cell::Str(_) => None,
        }
    }
}

impl Ord for Cell {
    fn cmp(&self, other: &Cell) -> Ordering {
        match (self, other) {
            (&Cell::Int(a), &Cell::Int(b)) => a.cmp(&b),
            (&Cell::Float(a), &Cell::Float(b)) => a.total_cmp(&b),
            (&Cell::Str(ref a), &Cell::Str(ref b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Cell {
    fn partial_cmp(&self, other: &Cell) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Cell) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Cell {}

impl Hash for Cell {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match *self {
            Cell::Int(value) => value.hash(state),
            Cell::Float(value) => value.to_bits().hash(state),
            Cell::Str(ref value) => value.hash(state),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Cell::Int(value) => write!(f, "{}", value),
            Cell::Float(value) => write!(f, "{:?}", value),
            Cell::Str(ref value) => write!(f, "{}", value),
        }
    }
}

/// A typed column.
#[derive(Clone, Debug, PartialEq)]
pub enum Column {
    Int(Vec<i64>),
    Float(Vec<f64>),
    Str(Vec<String>),
}

impl Column {
    pub fn len(&self) -> usize {
        match *self {
            Column::Int(ref values) => values.len(),
            Column::Float(ref values) => values.len(),
            Column::Str(ref values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn type_name(&self) -> &'static str {
        match *self {
            Column::Int(_) => "integer",
            Column::Float(_) => "float",
            Column::Str(_) => "string",
        }
    }

    /// The value in row `idx`.
    pub fn get(&self, idx: usize) -> Option<Cell> {
        match *self {
            Column::Int(ref values) => values.get(idx).map(|&value| Cell::Int(value)),
            Column::Float(ref values) => values.get(idx).map(|&value| Cell::Float(value)),
            Column::Str(ref values) => values.get(idx).map(|value| Cell::Str(value.clone())),
        }
    }

    pub fn cells(&self) -> Vec<Cell> {
        (0..self.len()).filter_map(|idx| self.get(idx)).collect()
    }

    /// Gather the rows at `indices`, in that order.
    pub fn take(&self, indices: &[usize]) -> Column {
        match *self {
            Column::Int(ref values) => Column::Int(indices.iter().map(|&idx| values[idx]).collect()),
            Column::Float(ref values) => {
                Column::Float(indices.iter().map(|&idx| values[idx]).collect())
            }
            Column::Str(ref values) => {
                Column::Str(indices.iter().map(|idx| values[*idx].clone()).collect())
            }
        }
    }

    /// Build the narrowest column holding `cells`: integers if every cell
    /// is an integer, floats if every cell is numeric, strings otherwise.
    pub fn from_cells(cells: Vec<Cell>) -> Column {
        if cells.iter().all(|cell| match *cell {
            Cell::Int(_) => true,
            _ => false,
        }) {
            Column::Int(
                cells
                    .into_iter()
                    .filter_map(|cell| match cell {
                        Cell::Int(value) => Some(value),
                        _ => None,
                    })
                    .collect(),
            )
        } else if cells.iter().all(|cell| cell.as_f64().is_some()) {
            Column::Float(cells.iter().filter_map(Cell::as_f64).collect())
        } else {
            Column::Str(cells.iter().map(|cell| cell.to_string()).collect())
        }
    }

    /// Append `other` to this column. Integers are promoted to floats when
    /// the other side is a float column. Returns `false` if the types
    /// cannot be combined.
    pub fn extend(&mut self, other: &Column) -> bool {
        if self.is_empty() && self.type_name() != other.type_name() {
            *self = other.clone();
            return true;
        }

        let promoted = match (&mut *self, other) {
            (&mut Column::Int(ref mut values), &Column::Int(ref more)) => {
                values.extend_from_slice(more);
                return true;
            }
            (&mut Column::Float(ref mut values), &Column::Float(ref more)) => {
                values.extend_from_slice(more);
                return true;
            }
            (&mut Column::Float(ref mut values), &Column::Int(ref more)) => {
                values.extend(more.iter().map(|&value| value as f64));
                return true;
            }
            (&mut Column::Str(ref mut values), &Column::Str(ref more)) => {
                values.extend_from_slice(more);
                return true;
            }
            (&mut Column::Int(ref values), &Column::Float(ref more)) => {
                let mut promoted: Vec<f64> = values.iter().map(|&value| value as f64).collect();
                promoted.extend_from_slice(more);
                promoted
            }
            _ => return other.is_empty(),
        };

        *self = Column::Float(promoted);
        true
    }

    /// The column as floats, if it is numeric.
    pub fn to_f64(&self) -> Option<Vec<f64>> {
        match *self {
            Column::Int(ref values) => Some(values.iter().map(|&value| value as f64).collect()),
            Column::Float(ref values) => Some(values.clone()),
            Column::Str(_) => None,
        }
    }

    /// The column as row indices, if it holds non-negative integers only.
    pub fn to_indices(&self) -> Option<Vec<usize>> {
        match *self {
            Column::Int(ref values) => values
                .iter()
                .map(|&value| if value >= 0 { Some(value as usize) } else { None })
                .collect(),
            _ => None,
        }
    }
}

/// Named columns of equal length.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    names: Vec<String>,
    columns: Vec<Column>,
}

impl Table {
    pub fn new() -> Self {
        Table::default()
    }

    /// Build a table from `(name, column)` pairs.
    pub fn from_columns<S: Into<String>>(columns: Vec<(S, Column)>) -> Result<Self, TableError> {
        let mut table = Table::new();

        for (name, column) in columns {
            table.set_column(name, column)?;
        }

        Ok(table)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|column| column == name)
    }

    pub fn column(&self, name: &str) -> Result<&Column, TableError> {
        self.names
            .iter()
            .position(|column| column == name)
            .map(|idx| &self.columns[idx])
            .ok_or_else(|| TableError::MissingColumn {
                name: name.to_owned(),
            })
    }

    /// Add a column, replacing any column of the same name.
    pub fn set_column<S: Into<String>>(&mut self, name: S, column: Column) -> Result<(), TableError> {
        let name = name.into();

        if !self.columns.is_empty() && column.len() != self.len() {
            return Err(TableError::LengthMismatch {
                name: name,
                expected: self.len(),
                got: column.len(),
            });
        }

        match self.names.iter().position(|existing| *existing == name) {
            Some(idx) => self.columns[idx] = column,
            None => {
                self.names.push(name);
                self.columns.push(column);
            }
        }

        Ok(())
    }

    pub fn drop_column(&mut self, name: &str) -> Option<Column> {
        let idx = self.names.iter().position(|column| column == name)?;
        self.names.remove(idx);

        Some(self.columns.remove(idx))
    }

    /// Gather the rows at `indices`, in that order.
    pub fn take(&self, indices: &[usize]) -> Table {
        Table {
            names: self.names.clone(),
            columns: self.columns.iter().map(|column| column.take(indices)).collect(),
        }
    }

    fn row(&self, idx: usize) -> Vec<Cell> {
        self.columns
            .iter()
            .filter_map(|column| column.get(idx))
            .collect()
    }

    fn key(&self, idx: usize, keys: &[&Column]) -> Vec<Cell> {
        keys.iter().filter_map(|column| column.get(idx)).collect()
    }

    /// Drop repeated rows, keeping the first occurrence.
    pub fn drop_duplicates(&self) -> Table {
        let mut seen = HashSet::with_capacity(self.len());
        let indices: Vec<usize> = (0..self.len())
            .filter(|&idx| seen.insert(self.row(idx)))
            .collect();

        self.take(&indices)
    }

    /// Stable sort of the rows by one column.
    pub fn sort_by_column(&self, name: &str) -> Result<Table, TableError> {
        let column = self.column(name)?;
        let mut indices: Vec<usize> = (0..self.len()).collect();
        indices.sort_by_key(|&idx| column.get(idx));

        Ok(self.take(&indices))
    }

    /// Row indices per distinct value of a column, in row order.
    pub fn group_indices(&self, name: &str) -> Result<BTreeMap<Cell, Vec<usize>>, TableError> {
        let column = self.column(name)?;
        let mut groups = BTreeMap::new();

        for (idx, cell) in column.cells().into_iter().enumerate() {
            groups.entry(cell).or_insert_with(Vec::new).push(idx);
        }

        Ok(groups)
    }

    /// Rows whose `keys` values do not appear in `other`.
    pub fn remove(&self, other: &Table, keys: &[&str]) -> Result<Table, TableError> {
        let own_keys = keys
            .iter()
            .map(|&key| self.column(key))
            .collect::<Result<Vec<_>, _>>()?;
        let other_keys = keys
            .iter()
            .map(|&key| other.column(key))
            .collect::<Result<Vec<_>, _>>()?;

        let removed: HashSet<Vec<Cell>> = (0..other.len())
            .map(|idx| other.key(idx, &other_keys))
            .collect();
        let indices: Vec<usize> = (0..self.len())
            .filter(|&idx| !removed.contains(&self.key(idx, &own_keys)))
            .collect();

        Ok(self.take(&indices))
    }

    /// Append the rows of a table with the same columns.
    pub fn append(&mut self, other: &Table) -> Result<(), TableError> {
        if self.names.is_empty() {
            *self = other.clone();
            return Ok(());
        }

        let mut own_names = self.names.clone();
        let mut other_names = other.names.clone();
        own_names.sort();
        other_names.sort();

        if own_names != other_names {
            return Err(TableError::SchemaMismatch {
                left: self.names.clone(),
                right: other.names.clone(),
            });
        }

        for (name, column) in izip!(&self.names, &mut self.columns) {
            let more = other.column(name)?;
            if !column.extend(more) {
                return Err(TableError::ColumnType {
                    name: name.clone(),
                    expected: column.type_name(),
                    found: more.type_name(),
                });
            }
        }

        Ok(())
    }

    /// Concatenate tables with the same columns.
    pub fn concat(tables: Vec<Table>) -> Result<Table, TableError> {
        let mut result = Table::new();

        for table in &tables {
            result.append(table)?;
        }

        Ok(result)
    }

    /// Read a CSV file with a header row.
    pub fn read_csv<P: AsRef<Path>>(path: P, delimiter: u8) -> Result<Table, failure::Error> {
        Table::from_reader(File::open(path)?, delimiter)
    }

    /// Read CSV data with a header row. Each column becomes an integer
    /// column if every value parses as one, else a float column if every
    /// value parses as a float, else a string column.
    pub fn from_reader<R: Read>(reader: R, delimiter: u8) -> Result<Table, failure::Error> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let names: Vec<String> = reader.headers()?.iter().map(|name| name.to_owned()).collect();
        let mut raw: Vec<Vec<String>> = vec![Vec::new(); names.len()];

        for record in reader.records() {
            let record = record?;
            for (values, field) in izip!(&mut raw, record.iter()) {
                values.push(field.to_owned());
            }
        }

        let mut table = Table::new();
        for (name, values) in izip!(names, raw) {
            table.set_column(name, infer_column(values))?;
        }

        Ok(table)
    }

    /// Write the table as CSV with a header row.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<(), failure::Error> {
        self.to_writer(File::create(path)?)
    }

    pub fn to_writer<W: Write>(&self, writer: W) -> Result<(), failure::Error> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(&self.names)?;

        for idx in 0..self.len() {
            writer.write_record(self.row(idx).iter().map(|cell| cell.to_string()))?;
        }

        writer.flush()?;

        Ok(())
    }
}

fn infer_column(values: Vec<String>) -> Column {
    let ints: Result<Vec<i64>, _> = values.iter().map(|value| value.parse::<i64>()).collect();
    if let Ok(ints) = ints {
        return Column::Int(ints);
    }

    let floats: Result<Vec<f64>, _> = values.iter().map(|value| value.parse::<f64>()).collect();
    if let Ok(floats) = floats {
        return Column::Float(floats);
    }

    Column::Str(values)
}

#[cfg(test)]
mod tests {

    use super::*;

    fn ratings() -> Table {
        Table::from_columns(vec![
            ("user", Column::Int(vec![2, 0, 1, 0, 2])),
            ("item", Column::Int(vec![1, 0, 2, 0, 0])),
            ("rate", Column::Float(vec![3.0, 5.0, 1.0, 5.0, 4.0])),
        ]).unwrap()
    }

    #[test]
    fn rejects_ragged_columns() {
        let mut table = ratings();

        match table.set_column("pred", Column::Float(vec![1.0])) {
            Err(TableError::LengthMismatch { expected, got, .. }) => {
                assert_eq!(expected, 5);
                assert_eq!(got, 1);
            }
            other => panic!("Unexpected result: {:?}", other),
        }
    }

    #[test]
    fn drop_column() {
        let mut table = ratings();

        assert_eq!(
            table.drop_column("rate"),
            Some(Column::Float(vec![3.0, 5.0, 1.0, 5.0, 4.0]))
        );
        assert_eq!(table.drop_column("rate"), None);
        assert!(table.column("rate").is_err());
        assert_eq!(table.len(), 5);
    }

    #[test]
    fn drop_duplicates_keeps_first() {
        let table = ratings().drop_duplicates();

        assert_eq!(table.len(), 4);
        assert_eq!(table.column("user").unwrap(), &Column::Int(vec![2, 0, 1, 2]));
    }

    #[test]
    fn sort_is_stable() {
        let table = ratings().sort_by_column("user").unwrap();

        assert_eq!(
            table.column("user").unwrap(),
            &Column::Int(vec![0, 0, 1, 2, 2])
        );
        assert_eq!(
            table.column("rate").unwrap(),
            &Column::Float(vec![5.0, 5.0, 1.0, 3.0, 4.0])
        );
    }

    #[test]
    fn groups_in_row_order() {
        let groups = ratings().group_indices("user").unwrap();

        assert_eq!(groups.len(), 3);
        assert_eq!(groups[&Cell::Int(0)], vec![1, 3]);
        assert_eq!(groups[&Cell::Int(2)], vec![0, 4]);
    }

    #[test]
    fn remove_and_append() {
        let table = ratings();
        let removed = table.take(&[0, 2]);

        let mut rest = table.remove(&removed, &["user", "item"]).unwrap();
        assert_eq!(rest.len(), 3);
        assert_eq!(rest.column("item").unwrap(), &Column::Int(vec![0, 0, 0]));

        rest.append(&removed).unwrap();
        assert_eq!(rest.len(), 5);

        let other = Table::from_columns(vec![("user", Column::Int(vec![1]))]).unwrap();
        assert!(rest.append(&other).is_err());
    }

    #[test]
    fn append_promotes_integers() {
        let mut table = Table::from_columns(vec![("rate", Column::Int(vec![1, 2]))]).unwrap();
        let more = Table::from_columns(vec![("rate", Column::Float(vec![2.5]))]).unwrap();

        table.append(&more).unwrap();

        assert_eq!(
            table.column("rate").unwrap(),
            &Column::Float(vec![1.0, 2.0, 2.5])
        );
    }

    #[test]
    fn csv_round_trip() {
        let csv = "user, item ,rate,tag\n1,10,4.5,a\n2,20,3,b\n";
        let table = Table::from_reader(csv.as_bytes(), b',').unwrap();

        assert_eq!(table.column_names(), &["user", "item", "rate", "tag"]);
        assert_eq!(table.column("item").unwrap(), &Column::Int(vec![10, 20]));
        assert_eq!(table.column("rate").unwrap(), &Column::Float(vec![4.5, 3.0]));
        assert_eq!(table.column("tag").unwrap().type_name(), "string");

        let mut written = Vec::new();
        table.to_writer(&mut written).unwrap();

        assert_eq!(
            String::from_utf8(written).unwrap(),
            "user,item,rate,tag\n1,10,4.5,a\n2,20,3.0,b\n"
        );
    }

    #[test]
    fn mixed_cells_build_widest_column() {
        assert_eq!(
            Column::from_cells(vec![Cell::Int(1), Cell::Float(2.5)]),
            Column::Float(vec![1.0, 2.5])
        );
        assert_eq!(
            Column::from_cells(vec![Cell::Int(1), Cell::Str("x".to_owned())]),
            Column::Str(vec!["1".to_owned(), "x".to_owned()])
        );
    }
}
