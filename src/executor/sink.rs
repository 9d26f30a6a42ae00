//! Result sets and sinks

use std::io::{self, Write};

use super::row::Row;

/// Final output of an evaluation
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultSet {
    /// Projected value names, `func_attr` / `func_g_attr` for aggregates
    pub columns: Vec<String>,
    /// One row per surviving group, in discovery order
    pub rows: Vec<Row>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        ResultSet { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render every value with its display form
    pub fn to_strings(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| row.values().iter().map(|v| v.to_string()).collect())
            .collect()
    }
}

/// Consumer of a finished result set
pub trait ResultSink {
    fn write_result(&mut self, result: &ResultSet) -> io::Result<()>;
}

/// Left-aligned text table
///
/// ```text
/// cust  | sum_quant
/// ------+----------
/// Bloom | 465
/// ```
pub struct TableSink<W: Write> {
    out: W,
}

impl<W: Write> TableSink<W> {
    pub fn new(out: W) -> Self {
        TableSink { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ResultSink for TableSink<W> {
    fn write_result(&mut self, result: &ResultSet) -> io::Result<()> {
        let cells = result.to_strings();

        let mut widths: Vec<usize> = result.columns.iter().map(|c| c.chars().count()).collect();
        for row in &cells {
            for (i, cell) in row.iter().enumerate() {
                if let Some(w) = widths.get_mut(i) {
                    *w = (*w).max(cell.chars().count());
                }
            }
        }

        write_line(&mut self.out, &result.columns, &widths)?;
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        writeln!(self.out, "{}", rule.join("-+-"))?;
        for row in &cells {
            write_line(&mut self.out, row, &widths)?;
        }
        self.out.flush()
    }
}

fn write_line<W: Write>(out: &mut W, cells: &[String], widths: &[usize]) -> io::Result<()> {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, w)| format!("{:<width$}", cell, width = *w))
        .collect();
    writeln!(out, "{}", padded.join(" | ").trim_end())
}
