//! Row type - a collection of datums

use std::hash::{Hash, Hasher};

use super::datum::Datum;
use super::error::{ExecutorError, ExecutorResult};

/// A row of datums, also used as the group key
#[derive(Debug, Clone, Default)]
pub struct Row {
    values: Vec<Datum>,
}

impl Row {
    /// Create a new row with the given values
    pub fn new(values: Vec<Datum>) -> Self {
        Row { values }
    }

    /// Get the number of columns in this row
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the row is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get a datum by index
    pub fn get(&self, index: usize) -> ExecutorResult<&Datum> {
        self.values
            .get(index)
            .ok_or(ExecutorError::ColumnIndexOutOfBounds {
                index,
                row_len: self.values.len(),
            })
    }

    /// Push a datum to the end of the row
    pub fn push(&mut self, value: Datum) {
        self.values.push(value);
    }

    /// Get all values as a slice
    pub fn values(&self) -> &[Datum] {
        &self.values
    }

    /// Project specific columns by indices
    pub fn project(&self, indices: &[usize]) -> ExecutorResult<Row> {
        let mut values = Vec::with_capacity(indices.len());
        for &idx in indices {
            values.push(self.get(idx)?.clone());
        }
        Ok(Row { values })
    }
}

impl PartialEq for Row {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl Eq for Row {}

impl Hash for Row {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for datum in &self.values {
            datum.hash(state);
        }
    }
}

impl From<Vec<Datum>> for Row {
    fn from(values: Vec<Datum>) -> Self {
        Row { values }
    }
}
