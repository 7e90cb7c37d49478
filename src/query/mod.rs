//! Evaluation of filter queries against a `TableStore`.

use std::cmp::Ordering;

use crate::{
    err::Error,
    tables::{
        schema::{FieldType, IdSet, Position, Value},
        TableStore,
    },
};

pub mod logic;
pub mod parse;

pub use parse::{Comparison, Operator, Query, Region, Side, Target};

/// How the results of several queries are combined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryLogic {
    /// Progressive intersection starting from all ids.
    And,
    /// Progressive union starting from no ids.
    Or,
    /// Set expression over query indices, see [`logic`].
    Expr(String),
}

impl std::str::FromStr for QueryLogic {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "and" => QueryLogic::And,
            "or" => QueryLogic::Or,
            "" => return Err(Error::query(s, "empty query logic")),
            _ => QueryLogic::Expr(s.trim().to_string()),
        })
    }
}

/// Compare a value with a threshold of possibly different type.
///
/// Numbers compare numerically, strings lexicographically, anything else
/// is incomparable.
pub fn compare(value: &Value, threshold: &Value) -> Option<Ordering> {
    match (value, threshold) {
        (Value::String(lhs), Value::String(rhs)) => Some(lhs.cmp(rhs)),
        (Value::Flag(lhs), Value::Flag(rhs)) => Some(lhs.cmp(rhs)),
        (Value::Integer(lhs), Value::Integer(rhs)) => Some(lhs.cmp(rhs)),
        (lhs, rhs) => lhs.as_f64()?.partial_cmp(&rhs.as_f64()?),
    }
}

/// Type a threshold literal with the declared type, falling back to the
/// literal heuristic.
fn typed_threshold(declared: Option<FieldType>, raw: &str) -> Value {
    match declared {
        Some(FieldType::Flag) | None => Value::infer(raw),
        Some(field_type) => field_type
            .parse_value(raw)
            .unwrap_or_else(|_| Value::infer(raw)),
    }
}

/// Columns of the position table usable in queries.
pub const POSITION_COLUMNS: &[&str] = &[
    "id", "chrom", "chrom1", "pos1", "chrom2", "pos2", "strand1", "strand2", "ref", "alt", "qual",
    "svtype",
];

/// Value of a position column by name, `None` for unknown columns.
fn position_column(position: &Position, column: &str) -> Option<Option<Value>> {
    Some(match column {
        "id" => Some(Value::from(position.id.as_str())),
        "chrom1" | "chrom" => Some(Value::from(position.chrom1.as_str())),
        "pos1" => Some(Value::Integer(position.pos1)),
        "chrom2" => position.chrom2.as_deref().map(Value::from),
        "pos2" => position.pos2.map(Value::Integer),
        "strand1" => Some(Value::String(position.strand1.to_string())),
        "strand2" => Some(Value::String(position.strand2.to_string())),
        "ref" => Some(Value::from(position.reference.as_str())),
        "alt" => Some(Value::from(position.alt.as_str())),
        "qual" => position.qual.map(Value::Float),
        "svtype" => Some(Value::from(position.svtype.as_str())),
        _ => return None,
    })
}

/// Evaluates queries against one store.
#[derive(Debug, Clone, Copy)]
pub struct QueryEngine<'a> {
    store: &'a TableStore,
}

impl<'a> QueryEngine<'a> {
    pub fn new(store: &'a TableStore) -> Self {
        Self { store }
    }

    /// Parse a query in the context of the store's samples.
    pub fn parse(&self, raw: &str) -> Result<Query, Error> {
        Query::parse(raw, &self.store.sample_names())
    }

    /// Ids selected by one query.
    pub fn evaluate(&self, query: &Query) -> Result<IdSet, Error> {
        let selected = match &query.target {
            Target::Locus { side, region } => self.eval_locus(*side, region)?,
            Target::Format {
                sample,
                format,
                value_idx,
            } => self.eval_format(sample, format, *value_idx, query.comparison.as_ref()),
            Target::Field { name, value_idx } => {
                self.eval_field(query, name, *value_idx, query.comparison.as_ref())?
            }
        };
        tracing::trace!("query {:?} selects {} ids", &query.raw, selected.len());

        if query.negated {
            Ok(self
                .store
                .get_ids()
                .difference(&selected)
                .cloned()
                .collect())
        } else {
            Ok(selected)
        }
    }

    fn eval_locus(&self, side: Side, region: &Region) -> Result<IdSet, Error> {
        let meta = self.store.meta();
        if !meta.contigs.is_empty() && !meta.has_contig(&region.chrom) {
            return Err(Error::ContigNotFound(region.chrom.clone()));
        }
        Ok(self
            .store
            .positions()
            .filter(|position| match side {
                Side::First => region.contains(&position.chrom1, position.pos1),
                Side::Second => match (&position.chrom2, position.pos2) {
                    (Some(chrom), Some(pos)) => region.contains(chrom, pos),
                    _ => false,
                },
            })
            .map(|position| position.id.clone())
            .collect())
    }

    fn eval_format(
        &self,
        sample: &str,
        format: &str,
        value_idx: usize,
        comparison: Option<&Comparison>,
    ) -> IdSet {
        let declared = self.store.meta().format(format).map(|meta| meta.field_type);
        let threshold = comparison.map(|cmp| (cmp.op, typed_threshold(declared, &cmp.threshold)));
        self.store
            .formats()
            .iter()
            .filter(|row| row.sample == sample && row.format == format)
            .filter(|row| match &threshold {
                None => true,
                Some((op, threshold)) => {
                    row.value_idx == value_idx
                        && compare(&row.value, threshold)
                            .map(|ordering| op.holds(ordering))
                            .unwrap_or(false)
                }
            })
            .map(|row| row.id.clone())
            .collect()
    }

    fn eval_field(
        &self,
        query: &Query,
        name: &str,
        value_idx: usize,
        comparison: Option<&Comparison>,
    ) -> Result<IdSet, Error> {
        if let Some(table) = self.store.info(name) {
            let declared = self.store.meta().info(name).map(|meta| meta.field_type);
            let members = || table.ids();
            let comparison = match comparison {
                None => return Ok(members()),
                Some(comparison) => comparison,
            };
            let threshold = typed_threshold(declared, &comparison.threshold);

            if declared == Some(FieldType::Flag) || matches!(threshold, Value::Flag(_)) {
                let wanted = match (comparison.op, &threshold) {
                    (Operator::Eq, Value::Flag(flag)) => *flag,
                    (Operator::Ne, Value::Flag(flag)) => !*flag,
                    _ => return Err(Error::query(&query.raw, "flags only support == and !=")),
                };
                return Ok(if wanted {
                    members()
                } else {
                    self.store
                        .get_ids()
                        .difference(&members())
                        .cloned()
                        .collect()
                });
            }

            return Ok(table
                .rows
                .iter()
                .filter(|row| row.value_idx == value_idx)
                .filter(|row| {
                    compare(&row.value, &threshold)
                        .map(|ordering| comparison.op.holds(ordering))
                        .unwrap_or(false)
                })
                .map(|row| row.id.clone())
                .collect());
        }

        let column = name.to_ascii_lowercase();
        if column == "filter" {
            let comparison = comparison
                .ok_or_else(|| Error::query(&query.raw, "filter needs a comparison"))?;
            let threshold = Value::from(comparison.threshold.as_str());
            return Ok(self
                .store
                .filters()
                .iter()
                .filter(|row| {
                    compare(&Value::from(row.filter.as_str()), &threshold)
                        .map(|ordering| comparison.op.holds(ordering))
                        .unwrap_or(false)
                })
                .map(|row| row.id.clone())
                .collect());
        }

        if POSITION_COLUMNS.contains(&column.as_str()) {
            let threshold = comparison.map(|cmp| {
                let declared = match column.as_str() {
                    "pos1" | "pos2" => FieldType::Integer,
                    "qual" => FieldType::Float,
                    _ => FieldType::String,
                };
                (cmp.op, typed_threshold(Some(declared), &cmp.threshold))
            });
            return Ok(self
                .store
                .positions()
                .filter(
                    |position| match (position_column(position, &column).flatten(), &threshold) {
                        (None, _) => false,
                        (Some(_), None) => true,
                        (Some(value), Some((op, threshold))) => compare(&value, threshold)
                            .map(|ordering| op.holds(ordering))
                            .unwrap_or(false),
                    },
                )
                .map(|position| position.id.clone())
                .collect());
        }

        let is_filter = self.store.filters().iter().any(|row| row.filter == name)
            || self.store.meta().filters.iter().any(|meta| meta.id == name)
            || name == "PASS";
        if is_filter && comparison.is_none() {
            return Ok(self
                .store
                .filters()
                .iter()
                .filter(|row| row.filter == name)
                .map(|row| row.id.clone())
                .collect());
        }

        if self.store.is_empty() {
            return Ok(IdSet::new());
        }
        Err(Error::InfoNotFound(name.to_string()))
    }

    /// Ids selected by all `queries` combined with `logic`.
    pub fn filter_ids<S: AsRef<str>>(
        &self,
        queries: &[S],
        logic: &QueryLogic,
    ) -> Result<IdSet, Error> {
        let sets = queries
            .iter()
            .map(|raw| self.evaluate(&self.parse(raw.as_ref())?))
            .collect::<Result<Vec<_>, _>>()?;
        let all = self.store.get_ids();
        Ok(match logic {
            QueryLogic::And => sets.iter().fold(all, |acc, set| {
                acc.intersection(set).cloned().collect()
            }),
            QueryLogic::Or => sets.iter().fold(IdSet::new(), |acc, set| {
                acc.union(set).cloned().collect()
            }),
            QueryLogic::Expr(expr) => logic::evaluate(expr, &sets, &all)?,
        })
    }
}

impl TableStore {
    /// New store with the ids selected by `queries` combined by `logic`
    /// (`"and"`, `"or"` or a set expression such as `"(0 | 1) & 2"`).
    pub fn filter<S: AsRef<str>>(&self, queries: &[S], logic: &str) -> Result<TableStore, Error> {
        let logic = logic.parse::<QueryLogic>()?;
        let ids = QueryEngine::new(self).filter_ids(queries, &logic)?;
        tracing::debug!("filter keeps {} of {} records", ids.len(), self.len());
        Ok(self.filter_by_id(&ids))
    }
}
