//! Values, rows and table definitions.

use crate::error::{Result, TesseraError};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Positional slot index of a row in the row store.
///
/// Row-ids are recycled: once a row is deleted its id may be handed to the
/// next inserted row, so holders must not keep ids across deletes.
pub type RowId = usize;

/// A row: one value per column, in table-definition order.
pub type Row = Vec<Value>;

/// An attribute value.
///
/// Values are totally ordered so they can key a B+Tree:
/// `Null < Boolean < numbers < Str`. `Int` and `Float` compare numerically
/// with each other, so `Int(3) == Float(3.0)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Boolean(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    /// Returns true for `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the string payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Short name of the runtime type, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Boolean(_) => 1,
            Value::Int(_) | Value::Float(_) => 2,
            Value::Str(_) => 3,
        }
    }
}

/// 2^63, the first float past `i64::MAX`.
const I64_UPPER_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// Folds `-0.0` onto `0.0` so both zeros compare equal.
#[inline]
fn normalize_zero(f: f64) -> f64 {
    if f == 0.0 { 0.0 } else { f }
}

#[inline]
fn cmp_float(a: f64, b: f64) -> Ordering {
    normalize_zero(a).total_cmp(&normalize_zero(b))
}

/// Exact comparison of an integer with a float.
///
/// NaN sorts by its sign, like `total_cmp`: positive NaN above every
/// number, negative NaN below.
fn cmp_int_float(i: i64, f: f64) -> Ordering {
    if f.is_nan() {
        return if f.is_sign_negative() {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }
    if f >= I64_UPPER_BOUND {
        return Ordering::Less;
    }
    if f < -I64_UPPER_BOUND {
        return Ordering::Greater;
    }
    // In range, so the floor converts to i64 without loss.
    let floor = f.floor();
    match i.cmp(&(floor as i64)) {
        Ordering::Equal if f > floor => Ordering::Less,
        ord => ord,
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => cmp_float(*a, *b),
            (Value::Int(a), Value::Float(b)) => cmp_int_float(*a, *b),
            (Value::Float(a), Value::Int(b)) => cmp_int_float(*b, *a).reverse(),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "'{}'", s),
        }
    }
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
        Value::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Comparison operator of a row condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "<>", alias = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "LIKE", alias = "like", alias = "Like")]
    Like,
}

impl Comparator {
    /// Textual form as written in statements.
    pub fn as_str(&self) -> &'static str {
        match self {
            Comparator::Eq => "=",
            Comparator::Ne => "<>",
            Comparator::Lt => "<",
            Comparator::Le => "<=",
            Comparator::Gt => ">",
            Comparator::Ge => ">=",
            Comparator::Like => "LIKE",
        }
    }

    /// Evaluates `lhs <op> rhs` using the total value order.
    ///
    /// Returns None for `LIKE`, which is a pattern match rather than an
    /// ordering test.
    pub fn compare(self, lhs: &Value, rhs: &Value) -> Option<bool> {
        let ord = lhs.cmp(rhs);
        let holds = match self {
            Comparator::Eq => ord == Ordering::Equal,
            Comparator::Ne => ord != Ordering::Equal,
            Comparator::Lt => ord == Ordering::Less,
            Comparator::Le => ord != Ordering::Greater,
            Comparator::Gt => ord == Ordering::Greater,
            Comparator::Ge => ord != Ordering::Less,
            Comparator::Like => return None,
        };
        Some(holds)
    }
}

impl std::fmt::Display for Comparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Comparator {
    type Err = TesseraError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "=" => Ok(Comparator::Eq),
            "<>" | "!=" => Ok(Comparator::Ne),
            "<" => Ok(Comparator::Lt),
            "<=" => Ok(Comparator::Le),
            ">" => Ok(Comparator::Gt),
            ">=" => Ok(Comparator::Ge),
            _ if s.eq_ignore_ascii_case("like") => Ok(Comparator::Like),
            _ => Err(TesseraError::InvalidInstruction(format!(
                "unknown comparator {:?}",
                s
            ))),
        }
    }
}

/// Declared type pattern of a column.
///
/// The statement compiler validates literals against this; the storage
/// core never re-checks it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Int,
    Float,
    Str,
    Bool,
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ColumnType::Int => "int",
            ColumnType::Float => "float",
            ColumnType::Str => "str",
            ColumnType::Bool => "bool",
        };
        write!(f, "{}", name)
    }
}

/// Definition of a single column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default)]
    pub is_nullable: bool,
    #[serde(default)]
    pub is_unique: bool,
    /// The column carries a maintained B+Tree index.
    #[serde(default)]
    pub is_key: bool,
}

impl ColumnDefinition {
    /// Creates a non-nullable, non-unique, unindexed column.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            is_nullable: false,
            is_unique: false,
            is_key: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.is_nullable = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.is_unique = true;
        self
    }

    /// Marks the column as indexed.
    pub fn key(mut self) -> Self {
        self.is_key = true;
        self
    }
}

/// Ordered column definitions of the single table.
///
/// The position of a column in the list is its column index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableDefinition {
    columns: Vec<ColumnDefinition>,
}

impl TableDefinition {
    pub fn new(columns: Vec<ColumnDefinition>) -> Self {
        Self { columns }
    }

    /// Builds a definition from the `{index: column}` map form.
    ///
    /// Indices must be exactly `0..n`.
    pub fn from_indexed(columns: BTreeMap<usize, ColumnDefinition>) -> Result<Self> {
        let mut ordered = Vec::with_capacity(columns.len());
        for (expected, (index, column)) in columns.into_iter().enumerate() {
            if index != expected {
                return Err(TesseraError::ConfigError(format!(
                    "column indices must be contiguous from 0, missing {}",
                    expected
                )));
            }
            ordered.push(column);
        }
        Ok(Self { columns: ordered })
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    /// Returns the column at `index`.
    pub fn column(&self, index: usize) -> Result<&ColumnDefinition> {
        self.columns
            .get(index)
            .ok_or(TesseraError::ColumnNotFound(index))
    }

    /// Resolves a column name to its index.
    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Indices of indexed columns.
    pub fn key_columns(&self) -> impl Iterator<Item = usize> + '_ {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_key)
            .map(|(i, _)| i)
    }

    /// Indices of unique columns.
    pub fn unique_columns(&self) -> impl Iterator<Item = usize> + '_ {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_unique)
            .map(|(i, _)| i)
    }
}
