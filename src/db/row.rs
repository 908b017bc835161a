//! Row module - result rows and the three ways of reading them

use crate::db::params::Value;
use crate::error::{Error, Result};
use rusqlite::types::{FromSql, FromSqlError};
use serde::de::DeserializeOwned;
use serde_json::{Map, Number};
use std::ops::Index;
use std::sync::Arc;

/// One row of a query result
///
/// Column names are shared by every row of the same result.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

/// Something that picks a column out of a row: an index or a column name
pub trait RowIndex {
    fn column_index(&self, columns: &[String]) -> Result<usize>;
}

impl RowIndex for usize {
    fn column_index(&self, columns: &[String]) -> Result<usize> {
        if *self < columns.len() {
            Ok(*self)
        } else {
            Err(Error::InvalidColumn(format!(
                "index {} out of range for {} columns",
                self,
                columns.len()
            )))
        }
    }
}

impl RowIndex for &str {
    fn column_index(&self, columns: &[String]) -> Result<usize> {
        columns
            .iter()
            .position(|c| c == *self)
            .or_else(|| columns.iter().position(|c| c.eq_ignore_ascii_case(self)))
            .ok_or_else(|| Error::InvalidColumn(self.to_string()))
    }
}

impl Row {
    pub(crate) fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Row { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw value of a column, by position or by name
    pub fn value<I: RowIndex>(&self, idx: I) -> Result<&Value> {
        let i = idx.column_index(&self.columns)?;
        Ok(&self.values[i])
    }

    /// Typed value of a column, by position or by name
    pub fn get<I: RowIndex, T: FromSql>(&self, idx: I) -> Result<T> {
        let i = idx.column_index(&self.columns)?;
        T::column_result(self.values[i].as_value_ref()).map_err(|e| match e {
            FromSqlError::InvalidType => Error::Type(format!(
                "column '{}' holds {}, which does not convert to {}",
                self.columns[i],
                self.values[i],
                std::any::type_name::<T>()
            )),
            other => Error::Type(format!("column '{}': {}", self.columns[i], other)),
        })
    }

    /// Unpack the whole row into a tuple
    pub fn tuple<T: FromRow>(&self) -> Result<T> {
        T::from_row(self)
    }

    /// Column name to value view of this row
    pub fn mapping(&self) -> RowMapping {
        RowMapping { row: self.clone() }
    }

    pub fn into_mapping(self) -> RowMapping {
        RowMapping { row: self }
    }

    /// Convert the row to a JSON object keyed by column name
    ///
    /// Blobs are base64-encoded; non-finite reals become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = Map::new();
        for (name, value) in self.columns.iter().zip(&self.values) {
            map.insert(name.clone(), value_to_json(value));
        }
        serde_json::Value::Object(map)
    }

    /// Deserialize the row into a struct whose fields are column names
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.to_json())?)
    }
}

impl Index<usize> for Row {
    type Output = Value;

    fn index(&self, index: usize) -> &Value {
        &self.values[index]
    }
}

impl Index<&str> for Row {
    type Output = Value;

    fn index(&self, name: &str) -> &Value {
        match self.value(name) {
            Ok(value) => value,
            Err(_) => panic!("no column named '{}' in row", name),
        }
    }
}

/// Convert a column value to JSON with proper type handling
fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Integer(i) => serde_json::Value::Number((*i).into()),
        Value::Real(f) => Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Text(t) => serde_json::Value::String(t.clone()),
        Value::Blob(b) => serde_json::Value::String(base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            b,
        )),
    }
}

/// Mapping view of a row: column name to value, in column order
#[derive(Debug, Clone, PartialEq)]
pub struct RowMapping {
    row: Row,
}

impl RowMapping {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.row.value(name).ok()
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.row.columns.iter().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.row.values.iter()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.keys().zip(self.values())
    }

    pub fn len(&self) -> usize {
        self.row.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row.is_empty()
    }

    pub fn row(&self) -> &Row {
        &self.row
    }

    pub fn into_row(self) -> Row {
        self.row
    }
}

impl Index<&str> for RowMapping {
    type Output = Value;

    fn index(&self, name: &str) -> &Value {
        &self.row[name]
    }
}

/// Types that can be built from a whole row, positionally
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> Result<Self>;
}

macro_rules! tuple_from_row {
    ($len:expr => $($t:ident : $i:tt),+) => {
        impl<$($t: FromSql),+> FromRow for ($($t,)+) {
            fn from_row(row: &Row) -> Result<Self> {
                if row.len() != $len {
                    return Err(Error::Type(format!(
                        "row has {} columns, expected {}",
                        row.len(),
                        $len
                    )));
                }
                Ok(($(row.get::<usize, $t>($i)?,)+))
            }
        }
    };
}

tuple_from_row!(1 => A: 0);
tuple_from_row!(2 => A: 0, B: 1);
tuple_from_row!(3 => A: 0, B: 1, C: 2);
tuple_from_row!(4 => A: 0, B: 1, C: 2, D: 3);
tuple_from_row!(5 => A: 0, B: 1, C: 2, D: 3, E: 4);
tuple_from_row!(6 => A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);
