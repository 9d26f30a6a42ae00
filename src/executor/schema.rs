//! Row schema and text decoding
//!
//! The row source delivers tuples of a fixed shape. `Schema::sales()` is
//! the 8-column sales table the Phi spec language is written against.

use chrono::NaiveDate;

use super::datum::Datum;
use super::error::{ExecutorError, ExecutorResult};
use super::row::Row;

/// Column data types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Boolean,
    Int,
    Float,
    Text,
    Date,
}

/// Column definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Column {
            name: name.into(),
            data_type,
        }
    }
}

/// Ordered column list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Schema { columns }
    }

    /// customer, product, day, month, year, state, quantity, date
    pub fn sales() -> Self {
        Schema::new(vec![
            Column::new("cust", DataType::Text),
            Column::new("prod", DataType::Text),
            Column::new("day", DataType::Int),
            Column::new("month", DataType::Int),
            Column::new("year", DataType::Int),
            Column::new("state", DataType::Text),
            Column::new("quant", DataType::Int),
            Column::new("date", DataType::Date),
        ])
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Get column index by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Decode text fields into a typed row.
    ///
    /// `line` is only used for error reporting.
    pub fn decode(&self, fields: &[&str], line: usize) -> ExecutorResult<Row> {
        if fields.len() != self.columns.len() {
            return Err(ExecutorError::Decode {
                line,
                message: format!(
                    "expected {} fields, found {}",
                    self.columns.len(),
                    fields.len()
                ),
            });
        }

        let mut row = Row::new(Vec::with_capacity(fields.len()));
        for (column, field) in self.columns.iter().zip(fields) {
            row.push(decode_field(column, field.trim(), line)?);
        }
        Ok(row)
    }

    /// Decode one comma-separated line
    pub fn decode_line(&self, text: &str, line: usize) -> ExecutorResult<Row> {
        let fields: Vec<&str> = text.split(',').collect();
        self.decode(&fields, line)
    }
}

fn decode_field(column: &Column, field: &str, line: usize) -> ExecutorResult<Datum> {
    let invalid = || ExecutorError::Decode {
        line,
        message: format!("invalid {:?} value '{}' for {}", column.data_type, field, column.name),
    };

    match column.data_type {
        DataType::Text => Ok(Datum::String(field.to_string())),
        DataType::Int => field.parse().map(Datum::Int).map_err(|_| invalid()),
        DataType::Float => field.parse().map(Datum::Float).map_err(|_| invalid()),
        DataType::Boolean => field.parse().map(Datum::Bool).map_err(|_| invalid()),
        DataType::Date => NaiveDate::parse_from_str(field, "%Y-%m-%d")
            .map(Datum::Date)
            .map_err(|_| invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sales_schema() {
        let schema = Schema::sales();
        assert_eq!(schema.len(), 8);
        assert_eq!(schema.column_index("quant"), Some(6));
        assert_eq!(schema.column_index("amount"), None);
    }

    #[test]
    fn test_decode_line() {
        let schema = Schema::sales();
        let row = schema
            .decode_line("Bloom, Eggs, 21, 2, 2017, NY, 465, 2017-02-21", 1)
            .unwrap();
        assert_eq!(row.get(0).unwrap(), &Datum::String("Bloom".to_string()));
        assert_eq!(row.get(6).unwrap(), &Datum::Int(465));
        assert_eq!(
            row.get(7).unwrap(),
            &Datum::Date(NaiveDate::from_ymd_opt(2017, 2, 21).unwrap())
        );
    }

    #[test]
    fn test_decode_errors() {
        let schema = Schema::sales();
        assert!(matches!(
            schema.decode_line("Bloom,Eggs,21", 3),
            Err(ExecutorError::Decode { line: 3, .. })
        ));
        assert!(matches!(
            schema.decode_line("Bloom,Eggs,x,2,2017,NY,465,2017-02-21", 4),
            Err(ExecutorError::Decode { line: 4, .. })
        ));
        assert!(matches!(
            schema.decode_line("Bloom,Eggs,21,2,2017,NY,465,21/02/2017", 5),
            Err(ExecutorError::Decode { line: 5, .. })
        ));
    }
}
