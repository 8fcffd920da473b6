//! Columnar frame holding price series and derived flags

use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A typed column of equal-length data
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Text(Vec<String>),
    Float(Vec<f64>),
    Int(Vec<i64>),
    Bool(Vec<bool>),
    Time(Vec<NaiveDateTime>),
}

/// Scalar used as a match target (e.g. `buy_signal == 1`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl Column {
    /// Number of rows
    pub fn len(&self) -> usize {
        match self {
            Column::Text(v) => v.len(),
            Column::Float(v) => v.len(),
            Column::Int(v) => v.len(),
            Column::Bool(v) => v.len(),
            Column::Time(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype(&self) -> &'static str {
        match self {
            Column::Text(_) => "text",
            Column::Float(_) => "float",
            Column::Int(_) => "int",
            Column::Bool(_) => "bool",
            Column::Time(_) => "time",
        }
    }

    /// Whether the cell at `row` equals `value`.
    ///
    /// Int and Float compare numerically, Bool matches 0/1 integers, NaN never matches.
    pub fn matches(&self, row: usize, value: &Value) -> bool {
        match (self, value) {
            (Column::Float(v), Value::Float(x)) => v[row] == *x,
            (Column::Float(v), Value::Int(x)) => v[row] == *x as f64,
            (Column::Int(v), Value::Int(x)) => v[row] == *x,
            (Column::Int(v), Value::Float(x)) => v[row] as f64 == *x,
            (Column::Bool(v), Value::Bool(x)) => v[row] == *x,
            (Column::Bool(v), Value::Int(x)) => v[row] as i64 == *x,
            (Column::Text(v), Value::Text(x)) => v[row] == *x,
            _ => false,
        }
    }

    /// Grouping key for the cell at `row`
    pub fn key(&self, row: usize) -> String {
        match self {
            Column::Text(v) => v[row].clone(),
            Column::Float(v) => v[row].to_string(),
            Column::Int(v) => v[row].to_string(),
            Column::Bool(v) => v[row].to_string(),
            Column::Time(v) => v[row].to_string(),
        }
    }

    /// Numeric view of a cell, if the column is numeric
    pub fn as_f64(&self, row: usize) -> Option<f64> {
        match self {
            Column::Float(v) => Some(v[row]),
            Column::Int(v) => Some(v[row] as f64),
            Column::Bool(v) => Some(if v[row] { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Gather rows by index
    pub fn take(&self, indices: &[usize]) -> Column {
        match self {
            Column::Text(v) => Column::Text(indices.iter().map(|&i| v[i].clone()).collect()),
            Column::Float(v) => Column::Float(indices.iter().map(|&i| v[i]).collect()),
            Column::Int(v) => Column::Int(indices.iter().map(|&i| v[i]).collect()),
            Column::Bool(v) => Column::Bool(indices.iter().map(|&i| v[i]).collect()),
            Column::Time(v) => Column::Time(indices.iter().map(|&i| v[i]).collect()),
        }
    }
}

/// Rows belonging to one group, in original order
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub key: String,
    pub rows: Vec<usize>,
}

/// Named, typed columns of equal length
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    names: Vec<String>,
    columns: Vec<Column>,
}

impl Frame {
    /// Create an empty frame
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a frame from `(name, column)` pairs
    pub fn from_columns<S: Into<String>>(columns: Vec<(S, Column)>) -> Result<Self> {
        let mut frame = Self::new();
        for (name, column) in columns {
            frame.set_column(name, column)?;
        }
        Ok(frame)
    }

    /// Builder-style [`Frame::set_column`]
    pub fn with_column(mut self, name: impl Into<String>, column: Column) -> Result<Self> {
        self.set_column(name, column)?;
        Ok(self)
    }

    /// Add a column, or overwrite an existing one with the same name
    pub fn set_column(&mut self, name: impl Into<String>, column: Column) -> Result<()> {
        let name = name.into();
        if !self.columns.is_empty() && column.len() != self.height() {
            return Err(Error::InvalidParameter(format!(
                "column '{}' has {} rows, frame has {}",
                name,
                column.len(),
                self.height()
            )));
        }

        match self.position(&name) {
            Some(pos) => self.columns[pos] = column,
            None => {
                self.names.push(name);
                self.columns.push(column);
            }
        }
        Ok(())
    }

    /// Remove a column, returning it if present
    pub fn drop_column(&mut self, name: &str) -> Option<Column> {
        let pos = self.position(name)?;
        self.names.remove(pos);
        Some(self.columns.remove(pos))
    }

    /// Number of rows
    pub fn height(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    /// Number of columns
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.height() == 0
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Look up a column by name
    pub fn column(&self, name: &str) -> Result<&Column> {
        self.position(name)
            .map(|pos| &self.columns[pos])
            .ok_or_else(|| Error::InvalidColumn(name.to_string()))
    }

    /// Float column by name
    pub fn floats(&self, name: &str) -> Result<&[f64]> {
        match self.column(name)? {
            Column::Float(v) => Ok(v),
            other => Err(Error::InvalidColumn(format!(
                "{} is {}, expected float",
                name,
                other.dtype()
            ))),
        }
    }

    /// Bool column by name
    pub fn bools(&self, name: &str) -> Result<&[bool]> {
        match self.column(name)? {
            Column::Bool(v) => Ok(v),
            other => Err(Error::InvalidColumn(format!(
                "{} is {}, expected bool",
                name,
                other.dtype()
            ))),
        }
    }

    /// Time column by name
    pub fn times(&self, name: &str) -> Result<&[NaiveDateTime]> {
        match self.column(name)? {
            Column::Time(v) => Ok(v),
            other => Err(Error::InvalidColumn(format!(
                "{} is {}, expected time",
                name,
                other.dtype()
            ))),
        }
    }

    /// Numeric values of a column as f64 (Int and Bool are widened)
    pub fn numeric(&self, name: &str) -> Result<Vec<f64>> {
        let column = self.column(name)?;
        (0..column.len())
            .map(|row| {
                column.as_f64(row).ok_or_else(|| {
                    Error::InvalidColumn(format!("{} is {}, expected numeric", name, column.dtype()))
                })
            })
            .collect()
    }

    /// New frame with the given rows, in the given order
    pub fn take(&self, indices: &[usize]) -> Frame {
        Frame {
            names: self.names.clone(),
            columns: self.columns.iter().map(|c| c.take(indices)).collect(),
        }
    }

    /// Rows grouped by `key`, groups ordered by first appearance
    pub fn group_indices(&self, key: &str) -> Result<Vec<Group>> {
        let column = self.column(key)?;
        let mut groups: Vec<Group> = Vec::new();
        let mut lookup: HashMap<String, usize> = HashMap::new();

        for row in 0..column.len() {
            let k = column.key(row);
            match lookup.get(&k) {
                Some(&g) => groups[g].rows.push(row),
                None => {
                    lookup.insert(k.clone(), groups.len());
                    groups.push(Group {
                        key: k,
                        rows: vec![row],
                    });
                }
            }
        }

        Ok(groups)
    }

    /// Check the price-series invariants: firm groups are contiguous and time
    /// strictly increases within each firm.
    pub fn validate_series(&self, firm: &str, time: &str) -> Result<()> {
        let times = self.times(time)?;
        for group in self.group_indices(firm)? {
            if let (Some(first), Some(last)) = (group.rows.first(), group.rows.last()) {
                if last - first + 1 != group.rows.len() {
                    return Err(Error::InvalidParameter(format!(
                        "rows of firm '{}' are not contiguous",
                        group.key
                    )));
                }
            }
            if group.rows.windows(2).any(|w| times[w[1]] <= times[w[0]]) {
                return Err(Error::InvalidParameter(format!(
                    "time is not strictly increasing for firm '{}'",
                    group.key
                )));
            }
        }
        Ok(())
    }
}
