//! Row types of the relational SV tables.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::meta::{AltMeta, ContigMeta, FilterMeta, FormatMeta, InfoMeta, SampleMeta};
use crate::err::Error;

/// Identifier of one SV record (or breakpoint after consolidation).
pub type SvId = String;

/// Set of SV identifiers, the currency of all selection operations.
pub type IdSet = HashSet<SvId>;

/// Names of the fixed tables of a `TableStore`.
pub mod names {
    pub const POSITIONS: &str = "positions";
    pub const FILTERS: &str = "filters";
    pub const FORMATS: &str = "formats";
    pub const CONTIGS_META: &str = "contigs_meta";
    pub const INFOS_META: &str = "infos_meta";
    pub const FORMATS_META: &str = "formats_meta";
    pub const FILTERS_META: &str = "filters_meta";
    pub const ALTS_META: &str = "alts_meta";
    pub const SAMPLES_META: &str = "samples_meta";

    /// All fixed table names, in display order.
    pub const FIXED: &[&str] = &[
        POSITIONS,
        FILTERS,
        FORMATS,
        CONTIGS_META,
        INFOS_META,
        FORMATS_META,
        FILTERS_META,
        ALTS_META,
        SAMPLES_META,
    ];
}

/// Direction a breakend faces.
#[derive(
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    Debug,
    Clone,
    Copy,
    Default,
    strum::Display,
    strum::EnumString,
)]
pub enum Strand {
    /// Sequence left of the breakend is retained, breakend faces right.
    #[serde(rename = "+")]
    #[strum(serialize = "+")]
    Plus,
    /// Sequence right of the breakend is retained, breakend faces left.
    #[serde(rename = "-")]
    #[strum(serialize = "-")]
    Minus,
    /// Unknown orientation.
    #[default]
    #[serde(rename = ".")]
    #[strum(serialize = ".")]
    Unknown,
}

impl Strand {
    /// Parse leniently, anything but `+`/`-` is unknown.
    pub fn from_lenient(s: &str) -> Self {
        s.trim().parse().unwrap_or(Strand::Unknown)
    }

    pub fn is_known(&self) -> bool {
        *self != Strand::Unknown
    }
}

/// Declared type of an INFO or FORMAT field.
#[derive(
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Debug,
    Clone,
    Copy,
    Default,
    strum::Display,
    strum::EnumString,
)]
pub enum FieldType {
    Integer,
    Float,
    Flag,
    Character,
    #[default]
    String,
}

impl FieldType {
    /// Parse one raw value according to the declared type.
    pub fn parse_value(&self, raw: &str) -> Result<Value, String> {
        match self {
            FieldType::Integer => raw
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|e| format!("invalid integer {:?}: {}", raw, e)),
            FieldType::Float => raw
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|e| format!("invalid float {:?}: {}", raw, e)),
            FieldType::Flag => match raw {
                "" | "True" | "true" | "1" => Ok(Value::Flag(true)),
                "False" | "false" | "0" => Ok(Value::Flag(false)),
                _ => Err(format!("invalid flag {:?}", raw)),
            },
            FieldType::Character | FieldType::String => Ok(Value::String(raw.to_string())),
        }
    }

    /// The type a value of unknown declaration is assumed to have.
    pub fn of_value(value: &Value) -> Self {
        match value {
            Value::Integer(_) => FieldType::Integer,
            Value::Float(_) => FieldType::Float,
            Value::Flag(_) => FieldType::Flag,
            Value::String(_) => FieldType::String,
        }
    }
}

/// Declared arity of an INFO or FORMAT field.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Copy, Default)]
pub enum Number {
    /// Fixed number of values.
    Count(usize),
    /// One value per alternate allele.
    A,
    /// One value per allele including the reference.
    R,
    /// One value per genotype.
    G,
    /// Unknown or varying number.
    #[default]
    Unknown,
}

impl std::str::FromStr for Number {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "A" => Number::A,
            "R" => Number::R,
            "G" => Number::G,
            "." => Number::Unknown,
            _ => Number::Count(
                s.parse()
                    .map_err(|_| Error::InvalidHeader(format!("invalid Number={}", s)))?,
            ),
        })
    }
}

impl std::fmt::Display for Number {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Number::Count(n) => write!(f, "{}", n),
            Number::A => write!(f, "A"),
            Number::R => write!(f, "R"),
            Number::G => write!(f, "G"),
            Number::Unknown => write!(f, "."),
        }
    }
}

/// One typed cell of an INFO or FORMAT table.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
#[serde(untagged)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Flag(bool),
    String(String),
}

impl Value {
    /// Coerce a literal of undeclared type.
    ///
    /// Digits (with optional sign) give an integer, anything parseable as a
    /// float gives a float, `True`/`False` give a flag, the rest is a string.
    pub fn infer(raw: &str) -> Self {
        let digits = raw.strip_prefix('-').unwrap_or(raw);
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(value) = raw.parse() {
                return Value::Integer(value);
            }
        }
        if let Ok(value) = raw.parse::<f64>() {
            if !raw.eq_ignore_ascii_case("nan") && !raw.to_ascii_lowercase().contains("inf") {
                return Value::Float(value);
            }
        }
        match raw {
            "True" => Value::Flag(true),
            "False" => Value::Flag(false),
            _ => Value::String(raw.to_string()),
        }
    }

    /// Numeric view of the value, if any.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Flag(_) | Value::String(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v.as_str()),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Flag(true) => write!(f, "True"),
            Value::Flag(false) => write!(f, "False"),
            Value::String(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

/// One row of the position table.
///
/// `chrom2`/`pos2` are unset for single-ended breakends.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct Position {
    pub id: SvId,
    pub chrom1: String,
    /// 1-based position of the first breakend
    pub pos1: i64,
    pub chrom2: Option<String>,
    /// 1-based position of the second breakend
    pub pos2: Option<i64>,
    pub strand1: Strand,
    pub strand2: Strand,
    #[serde(rename = "ref")]
    pub reference: String,
    pub alt: String,
    pub qual: Option<f64>,
    pub svtype: String,
}

/// One row of an INFO table.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct InfoRow {
    pub id: SvId,
    pub value_idx: usize,
    pub value: Value,
}

impl InfoRow {
    pub fn new<I: Into<SvId>>(id: I, value_idx: usize, value: Value) -> Self {
        Self {
            id: id.into(),
            value_idx,
            value,
        }
    }
}

/// One INFO table, named by the lowercase INFO name.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone, Default)]
pub struct InfoTable {
    pub name: String,
    pub rows: Vec<InfoRow>,
}

impl InfoTable {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_ascii_lowercase(),
            rows: Vec::new(),
        }
    }

    pub fn with_rows(name: &str, rows: Vec<InfoRow>) -> Self {
        Self {
            name: name.to_ascii_lowercase(),
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Identifiers having at least one row.
    pub fn ids(&self) -> IdSet {
        self.rows.iter().map(|row| row.id.clone()).collect()
    }

    /// Value at `(id, value_idx)`, if present.
    pub fn value(&self, id: &str, value_idx: usize) -> Option<&Value> {
        self.rows
            .iter()
            .find(|row| row.id == id && row.value_idx == value_idx)
            .map(|row| &row.value)
    }

    /// All values of `id`, ordered by value index.
    pub fn values(&self, id: &str) -> Vec<&Value> {
        let mut rows = self.rows.iter().filter(|row| row.id == id).collect::<Vec<_>>();
        rows.sort_by_key(|row| row.value_idx);
        rows.into_iter().map(|row| &row.value).collect()
    }

    /// Largest value index in the table.
    pub fn max_value_idx(&self) -> Option<usize> {
        self.rows.iter().map(|row| row.value_idx).max()
    }

    /// Insert or overwrite the cell at `(id, value_idx)`.
    pub fn upsert(&mut self, id: &str, value_idx: usize, value: Value) {
        match self
            .rows
            .iter_mut()
            .find(|row| row.id == id && row.value_idx == value_idx)
        {
            Some(row) => row.value = value,
            None => self.rows.push(InfoRow::new(id, value_idx, value)),
        }
    }
}

/// One row of the FILTER table.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct FilterRow {
    pub id: SvId,
    pub filter: String,
}

impl FilterRow {
    pub fn new<I: Into<SvId>, F: Into<String>>(id: I, filter: F) -> Self {
        Self {
            id: id.into(),
            filter: filter.into(),
        }
    }
}

/// One row of the FORMAT table.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct FormatRow {
    pub id: SvId,
    pub sample: String,
    pub format: String,
    pub value_idx: usize,
    pub value: Value,
}

/// A copy of one table of a `TableStore`.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Positions(Vec<Position>),
    Info(InfoTable),
    Filters(Vec<FilterRow>),
    Formats(Vec<FormatRow>),
    ContigsMeta(Vec<ContigMeta>),
    InfosMeta(Vec<InfoMeta>),
    FormatsMeta(Vec<FormatMeta>),
    FiltersMeta(Vec<FilterMeta>),
    AltsMeta(Vec<AltMeta>),
    SamplesMeta(Vec<SampleMeta>),
}

impl Table {
    /// Number of rows.
    pub fn len(&self) -> usize {
        match self {
            Table::Positions(rows) => rows.len(),
            Table::Info(table) => table.len(),
            Table::Filters(rows) => rows.len(),
            Table::Formats(rows) => rows.len(),
            Table::ContigsMeta(rows) => rows.len(),
            Table::InfosMeta(rows) => rows.len(),
            Table::FormatsMeta(rows) => rows.len(),
            Table::FiltersMeta(rows) => rows.len(),
            Table::AltsMeta(rows) => rows.len(),
            Table::SamplesMeta(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Identifiers referenced by an id-keyed table, `None` for metadata.
    pub fn ids(&self) -> Option<IdSet> {
        match self {
            Table::Positions(rows) => Some(rows.iter().map(|row| row.id.clone()).collect()),
            Table::Info(table) => Some(table.ids()),
            Table::Filters(rows) => Some(rows.iter().map(|row| row.id.clone()).collect()),
            Table::Formats(rows) => Some(rows.iter().map(|row| row.id.clone()).collect()),
            _ => None,
        }
    }

    /// Apply `rename` to every id of an id-keyed table.
    pub fn map_ids<F>(self, rename: F) -> Self
    where
        F: Fn(&str) -> SvId,
    {
        match self {
            Table::Positions(rows) => Table::Positions(
                rows.into_iter()
                    .map(|row| Position {
                        id: rename(&row.id),
                        ..row
                    })
                    .collect(),
            ),
            Table::Info(table) => Table::Info(InfoTable {
                name: table.name,
                rows: table
                    .rows
                    .into_iter()
                    .map(|row| InfoRow {
                        id: rename(&row.id),
                        ..row
                    })
                    .collect(),
            }),
            Table::Filters(rows) => Table::Filters(
                rows.into_iter()
                    .map(|row| FilterRow {
                        id: rename(&row.id),
                        ..row
                    })
                    .collect(),
            ),
            Table::Formats(rows) => Table::Formats(
                rows.into_iter()
                    .map(|row| FormatRow {
                        id: rename(&row.id),
                        ..row
                    })
                    .collect(),
            ),
            other => other,
        }
    }

    /// Append the rows of `other`, which must be of the same kind.
    pub fn extend(&mut self, other: Table) -> Result<(), Error> {
        match (self, other) {
            (Table::Positions(lhs), Table::Positions(rhs)) => lhs.extend(rhs),
            (Table::Info(lhs), Table::Info(rhs)) => lhs.rows.extend(rhs.rows),
            (Table::Filters(lhs), Table::Filters(rhs)) => lhs.extend(rhs),
            (Table::Formats(lhs), Table::Formats(rhs)) => lhs.extend(rhs),
            (Table::ContigsMeta(lhs), Table::ContigsMeta(rhs)) => extend_unique(lhs, rhs),
            (Table::InfosMeta(lhs), Table::InfosMeta(rhs)) => extend_unique(lhs, rhs),
            (Table::FormatsMeta(lhs), Table::FormatsMeta(rhs)) => extend_unique(lhs, rhs),
            (Table::FiltersMeta(lhs), Table::FiltersMeta(rhs)) => extend_unique(lhs, rhs),
            (Table::AltsMeta(lhs), Table::AltsMeta(rhs)) => extend_unique(lhs, rhs),
            (Table::SamplesMeta(lhs), Table::SamplesMeta(rhs)) => extend_unique(lhs, rhs),
            (lhs, rhs) => {
                return Err(Error::table(
                    format!("{:?}", std::mem::discriminant(lhs)),
                    format!("cannot extend with {:?}", std::mem::discriminant(&rhs)),
                ))
            }
        }
        Ok(())
    }
}

fn extend_unique<T: PartialEq>(lhs: &mut Vec<T>, rhs: Vec<T>) {
    for row in rhs {
        if !lhs.contains(&row) {
            lhs.push(row);
        }
    }
}

/// A flat table of optional values, the result of format projections.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone, Default)]
pub struct Frame {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<Value>>>,
}

impl Frame {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    /// All cells of one column.
    pub fn column(&self, name: &str) -> Result<Vec<Option<&Value>>, Error> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| Error::table("frame", format!("no column {}", name)))?;
        Ok(self.rows.iter().map(|row| row[idx].as_ref()).collect())
    }

    /// Render one cell, missing values become `.`.
    pub fn render(cell: &Option<Value>) -> String {
        cell.as_ref()
            .map(|value| value.to_string())
            .unwrap_or_else(|| String::from("."))
    }
}
