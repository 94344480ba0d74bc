//! Serde encoding for factor matrices.
//!
//! A diverged fit leaves NaN or infinite factors behind, which JSON numbers
//! cannot hold. Entries are written as numbers when finite and as the
//! strings `"NaN"`, `"inf"` or `"-inf"` otherwise, so every stored model
//! loads back unchanged. Use with `#[serde(with = "::models::factors")]`.
use std::f64;
use std::fmt;

use ndarray::Array2;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};

#[derive(Serialize, Deserialize)]
struct Matrix {
    shape: (usize, usize),
    data: Vec<Factor>,
}

struct Factor(f64);

impl Serialize for Factor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let value = self.0;

        if value.is_finite() {
            serializer.serialize_f64(value)
        } else if value.is_nan() {
            serializer.serialize_str("NaN")
        } else if value > 0.0 {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }
}

struct FactorVisitor;

impl<'de> Visitor<'de> for FactorVisitor {
    type Value = Factor;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a number, \"NaN\", \"inf\" or \"-inf\"")
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<Factor, E> {
        Ok(Factor(value))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Factor, E> {
        Ok(Factor(value as f64))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Factor, E> {
        Ok(Factor(value as f64))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Factor, E> {
        match value {
            "NaN" => Ok(Factor(f64::NAN)),
            "inf" => Ok(Factor(f64::INFINITY)),
            "-inf" => Ok(Factor(f64::NEG_INFINITY)),
            _ => Err(E::invalid_value(de::Unexpected::Str(value), &self)),
        }
    }
}

impl<'de> Deserialize<'de> for Factor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(FactorVisitor)
    }
}

pub fn serialize<S: Serializer>(matrix: &Array2<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    Matrix {
        shape: matrix.dim(),
        data: matrix.iter().map(|&value| Factor(value)).collect(),
    }.serialize(serializer)
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Array2<f64>, D::Error> {
    let matrix = Matrix::deserialize(deserializer)?;
    let data = matrix.data.into_iter().map(|factor| factor.0).collect();

    Array2::from_shape_vec(matrix.shape, data).map_err(de::Error::custom)
}
