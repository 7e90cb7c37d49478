//! Normalization of caller-agnostic BEDPE rows.

use indexmap::IndexMap;

use super::{ci_meta, info, NormalizedRecord, RecordNormalizer, UNCLASSIFIED};
use crate::{
    common::SvCaller,
    err::Error,
    tables::{
        meta::InfoMeta,
        schema::{FieldType, InfoTable, Number},
        store::infer_field_type,
        MetaCatalog, Position, Strand, Table, Value,
    },
    TableStore,
};

/// Source recorded for INFO declarations derived from BEDPE columns.
pub const BEDPE_SOURCE: &str = "bedpe";

/// Required leading columns of a BEDPE file.
pub const COLUMNS: &[&str] = &[
    "chrom1", "start1", "end1", "chrom2", "start2", "end2", "name", "score", "strand1", "strand2",
];

/// One BEDPE row with 0-based half-open intervals.
#[derive(Debug, Clone, PartialEq)]
pub struct BedpeRecord {
    pub chrom1: String,
    pub start1: i64,
    pub end1: i64,
    pub chrom2: String,
    pub start2: i64,
    pub end2: i64,
    /// `None` when `.`
    pub name: Option<String>,
    pub score: Option<f64>,
    pub strand1: Strand,
    pub strand2: Strand,
    /// Explicit SV type column, if any.
    pub svtype: Option<String>,
    /// All other columns, `.` cells are dropped.
    pub extra: IndexMap<String, String>,
}

impl BedpeRecord {
    /// Build from one row keyed by header name.
    pub fn from_row(mut row: IndexMap<String, String>) -> Result<Self, Error> {
        let label = row.get("name").cloned().unwrap_or_else(|| String::from("."));
        let mut take = |column: &str| -> Result<String, Error> {
            row.shift_remove(column)
                .ok_or_else(|| Error::record(label.as_str(), format!("missing column {}", column)))
        };
        let chrom1 = take("chrom1")?;
        let start1 = take("start1")?;
        let end1 = take("end1")?;
        let chrom2 = take("chrom2")?;
        let start2 = take("start2")?;
        let end2 = take("end2")?;
        let name = take("name")?;
        let score = take("score")?;
        let strand1 = take("strand1")?;
        let strand2 = take("strand2")?;

        let int = |column: &str, value: &str| -> Result<i64, Error> {
            value.parse().map_err(|e| {
                Error::record(
                    label.as_str(),
                    format!("invalid {} {:?}: {}", column, value, e),
                )
            })
        };
        let score = match score.as_str() {
            "." | "" => None,
            value => Some(value.parse().map_err(|e| {
                Error::record(label.as_str(), format!("invalid score {:?}: {}", value, e))
            })?),
        };

        Ok(Self {
            start1: int("start1", &start1)?,
            end1: int("end1", &end1)?,
            start2: int("start2", &start2)?,
            end2: int("end2", &end2)?,
            chrom1,
            chrom2,
            name: Some(name).filter(|name| name != "." && !name.is_empty()),
            score,
            strand1: Strand::from_lenient(&strand1),
            strand2: Strand::from_lenient(&strand2),
            svtype: row
                .shift_remove(info::SVTYPE)
                .filter(|svtype| svtype != "." && !svtype.is_empty()),
            extra: row
                .into_iter()
                .filter(|(_, value)| value != "." && !value.is_empty())
                .collect(),
        })
    }
}

/// SV type from chromosomes and strands.
///
/// Rows across chromosomes are breakends, same-chromosome rows that are
/// neither a deletion, duplication nor inversion stay unclassified.
pub fn infer_svtype(record: &BedpeRecord) -> &'static str {
    if record.chrom1 != record.chrom2 {
        return "BND";
    }
    match (record.strand1, record.strand2) {
        (Strand::Plus, Strand::Minus) => "DEL",
        (Strand::Minus, Strand::Plus) => "DUP",
        (lhs, rhs) if lhs == rhs && lhs.is_known() => "INV",
        _ => UNCLASSIFIED,
    }
}

/// ALT for the SV type, brackets for breakends with known orientation.
///
/// Unclassified rows get the missing ALT `.`.
pub fn synthesize_alt(svtype: &str, chrom2: &str, pos2: i64, strands: (Strand, Strand)) -> String {
    let mate = format!("{}:{}", chrom2, pos2);
    match (svtype, strands) {
        (UNCLASSIFIED, _) => String::from(UNCLASSIFIED),
        ("BND", (Strand::Plus, Strand::Minus)) => format!("N[{}[", mate),
        ("BND", (Strand::Plus, Strand::Plus)) => format!("N]{}]", mate),
        ("BND", (Strand::Minus, Strand::Plus)) => format!("]{}]N", mate),
        ("BND", (Strand::Minus, Strand::Minus)) => format!("[{}[N", mate),
        (svtype, _) => format!("<{}>", svtype),
    }
}

/// Confidence interval of `[start, end)` around `start + 1`, when wider
/// than one base.
fn confidence_interval(start: i64, end: i64) -> Option<Vec<Value>> {
    (end - start > 1).then(|| vec![Value::Integer(0), Value::Integer(end - start - 1)])
}

/// Normalizes BEDPE rows, one record per row.
#[derive(Debug, Default, Clone, Copy)]
pub struct BedpeNormalizer;

impl RecordNormalizer for BedpeNormalizer {
    type Input = BedpeRecord;

    fn caller(&self) -> SvCaller {
        SvCaller::Bedpe
    }

    fn normalize(
        &self,
        input: &BedpeRecord,
        _meta: &MetaCatalog,
    ) -> Result<Vec<NormalizedRecord>, Error> {
        let id = input
            .name
            .clone()
            .ok_or_else(|| Error::record(".", "row without name"))?;
        let svtype = input
            .svtype
            .clone()
            .unwrap_or_else(|| infer_svtype(input).to_string());
        let pos1 = input.start1 + 1;
        let pos2 = input.start2 + 1;

        let mut infos = IndexMap::new();
        if svtype != UNCLASSIFIED {
            infos.insert(info::SVTYPE.to_string(), vec![Value::from(svtype.as_str())]);
        }
        if let Some(cipos) = confidence_interval(input.start1, input.end1) {
            infos.insert(info::CIPOS.to_string(), cipos);
        }
        if let Some(ciend) = confidence_interval(input.start2, input.end2) {
            infos.insert(info::CIEND.to_string(), ciend);
        }
        let mut info_keys = IndexMap::new();
        for (column, value) in &input.extra {
            let name = column.to_ascii_lowercase();
            info_keys.insert(name.clone(), column.clone());
            infos.insert(name, vec![Value::infer(value)]);
        }

        Ok(vec![NormalizedRecord {
            position: Position {
                alt: synthesize_alt(&svtype, &input.chrom2, pos2, (input.strand1, input.strand2)),
                id,
                chrom1: input.chrom1.clone(),
                pos1,
                chrom2: Some(input.chrom2.clone()),
                pos2: Some(pos2),
                strand1: input.strand1,
                strand2: input.strand2,
                reference: String::from("N"),
                qual: input.score,
                svtype,
            },
            filters: Vec::new(),
            infos,
            info_keys,
            formats: IndexMap::new(),
        }])
    }

    /// Unify the value types of extra columns, declare all INFO tables and
    /// register the observed chromosomes as contigs.
    fn finalize(&self, mut store: TableStore) -> Result<TableStore, Error> {
        let chroms = store
            .positions()
            .flat_map(|pos| [Some(pos.chrom1.clone()), pos.chrom2.clone()])
            .flatten()
            .collect::<Vec<_>>();
        for chrom in chroms {
            store.meta.push_contig(&chrom, None);
        }

        for name in store.info_names() {
            match name.as_str() {
                info::CIPOS | info::CIEND => store.add_info_meta(ci_meta(&name)),
                info::SVTYPE => store.add_info_meta(InfoMeta::new(
                    "SVTYPE",
                    Number::Count(1),
                    FieldType::String,
                    "Type of structural variant",
                )),
                _ => {
                    let table = store.get_info(&name)?;
                    let field_type = infer_field_type(table.rows.iter().map(|row| &row.value));
                    let rows = table
                        .rows
                        .iter()
                        .cloned()
                        .map(|mut row| {
                            row.value = match (field_type, row.value) {
                                (FieldType::Float, Value::Integer(v)) => Value::Float(v as f64),
                                (FieldType::String, value @ Value::String(_)) => value,
                                (FieldType::String, value) => Value::String(value.to_string()),
                                (_, value) => value,
                            };
                            row
                        })
                        .collect();
                    let key = store.spelled_key(&name);
                    let mut meta = InfoMeta::new(
                        &key,
                        Number::Count(1),
                        field_type,
                        &format!("BEDPE column {}", key),
                    );
                    meta.source = Some(BEDPE_SOURCE.to_string());
                    store.add_info_meta(meta);
                    store.replace_table(&name, Table::Info(InfoTable::with_rows(&name, rows)))?;
                }
            }
        }
        Ok(store)
    }
}
