//! Label encoding between raw ids and contiguous indices.
use std::collections::HashMap;

use table::{Cell, Column};

/// Encoding error types.
#[derive(Debug, Fail)]
pub enum EncodingError {
    #[fail(display = "Label {} was not seen when fitting the encoder.", label)]
    UnknownLabel { label: Cell },
    #[fail(display = "Index {} is out of range for {} classes.", index, num_classes)]
    IndexOutOfRange { index: i64, num_classes: usize },
    #[fail(display = "Only integer indices can be decoded, found {} values.", found)]
    NotIndices { found: &'static str },
}

/// Maps each distinct label to its position in the sorted label set.
#[derive(Clone, Debug)]
pub struct LabelEncoder {
    classes: Vec<Cell>,
    indices: HashMap<Cell, usize>,
}

impl LabelEncoder {
    /// Fit an encoder to the distinct values of `labels`.
    pub fn fit<I: IntoIterator<Item = Cell>>(labels: I) -> Self {
        let mut classes: Vec<Cell> = labels.into_iter().collect();
        classes.sort();
        classes.dedup();

        let indices = classes
            .iter()
            .enumerate()
            .map(|(idx, label)| (label.clone(), idx))
            .collect();

        LabelEncoder {
            classes: classes,
            indices: indices,
        }
    }

    pub fn from_column(column: &Column) -> Self {
        LabelEncoder::fit(column.cells())
    }

    /// Encoder for ids numbered `1..=num_classes`.
    pub fn one_indexed(num_classes: usize) -> Self {
        LabelEncoder::fit((1..num_classes as i64 + 1).map(Cell::Int))
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn classes(&self) -> &[Cell] {
        &self.classes
    }

    /// Replace every label with its index.
    pub fn encode(&self, column: &Column) -> Result<Column, EncodingError> {
        column
            .cells()
            .into_iter()
            .map(|label| match self.indices.get(&label) {
                Some(&idx) => Ok(idx as i64),
                None => Err(EncodingError::UnknownLabel { label: label }),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Column::Int)
    }

    /// Replace every index with its label.
    pub fn decode(&self, column: &Column) -> Result<Column, EncodingError> {
        let indices = match *column {
            Column::Int(ref indices) => indices,
            _ => {
                return Err(EncodingError::NotIndices {
                    found: column.type_name(),
                })
            }
        };

        let labels = indices
            .iter()
            .map(|&index| {
                if index >= 0 && (index as usize) < self.classes.len() {
                    Ok(self.classes[index as usize].clone())
                } else {
                    Err(EncodingError::IndexOutOfRange {
                        index: index,
                        num_classes: self.classes.len(),
                    })
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Column::from_cells(labels))
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn encodes_sorted_labels() {
        let raw = Column::Str(vec!["bob".to_owned(), "alice".to_owned(), "bob".to_owned()]);
        let encoder = LabelEncoder::from_column(&raw);

        assert_eq!(encoder.num_classes(), 2);
        assert_eq!(
            encoder.classes(),
            &[Cell::Str("alice".to_owned()), Cell::Str("bob".to_owned())]
        );

        let encoded = encoder.encode(&raw).unwrap();
        assert_eq!(encoded, Column::Int(vec![1, 0, 1]));
        assert_eq!(encoder.decode(&encoded).unwrap(), raw);
    }

    #[test]
    fn one_indexed_ids() {
        let encoder = LabelEncoder::one_indexed(3);
        let raw = Column::Int(vec![3, 1, 2]);

        let encoded = encoder.encode(&raw).unwrap();
        assert_eq!(encoded, Column::Int(vec![2, 0, 1]));
        assert_eq!(encoder.decode(&encoded).unwrap(), raw);
    }

    #[test]
    fn unknown_label() {
        let encoder = LabelEncoder::one_indexed(3);

        match encoder.encode(&Column::Int(vec![1, 4])) {
            Err(EncodingError::UnknownLabel { label }) => assert_eq!(label, Cell::Int(4)),
            other => panic!("Unexpected result: {:?}", other),
        }
    }

    #[test]
    fn decode_checks_range_and_type() {
        let encoder = LabelEncoder::one_indexed(2);

        assert!(match encoder.decode(&Column::Int(vec![0, 2])) {
            Err(EncodingError::IndexOutOfRange { index: 2, num_classes: 2 }) => true,
            _ => false,
        });
        assert!(match encoder.decode(&Column::Float(vec![0.0])) {
            Err(EncodingError::NotIndices { found }) => found == "float",
            _ => false,
        });
    }
}
