//! Per-caller normalization of raw records into table rows.

use std::collections::HashMap;

use indexmap::IndexMap;
use itertools::Itertools;

use super::record::RawRecord;
use crate::{
    common::SvCaller,
    err::Error,
    tables::{
        meta::{InfoMeta, MetaCatalog},
        schema::{FieldType, InfoRow, InfoTable, Number, Position, Strand, SvId, Value},
        TableStore,
    },
};

pub mod bedpe;
pub mod delly;
pub mod gridss;
pub mod lumpy;
pub mod manta;

pub use bedpe::{BedpeNormalizer, BedpeRecord};
pub use delly::DellyNormalizer;
pub use gridss::GridssNormalizer;
pub use lumpy::LumpyNormalizer;
pub use manta::MantaNormalizer;

/// The rows one input record contributes to a `TableStore`.
///
/// Only the position carries the id; all other rows get it on insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    pub position: Position,
    /// FILTER values, empty means `PASS`.
    pub filters: Vec<String>,
    /// INFO values by INFO name, the vector index is the value index.
    pub infos: IndexMap<String, Vec<Value>>,
    /// INFO keys as spelled in the input, by lowercase INFO name.
    pub info_keys: IndexMap<String, String>,
    /// FORMAT values by sample and FORMAT name.
    pub formats: IndexMap<String, IndexMap<String, Vec<Value>>>,
}

impl NormalizedRecord {
    pub fn id(&self) -> &str {
        &self.position.id
    }

    /// Copy of the record under another id.
    pub fn with_id(&self, id: &str) -> Self {
        let mut result = self.clone();
        result.position.id = id.to_string();
        result
    }
}

/// Strategy turning one raw record of a caller into normalized rows.
pub trait RecordNormalizer {
    type Input;

    /// The caller the normalizer handles.
    fn caller(&self) -> SvCaller;

    /// Normalize one record, usually into exactly one `NormalizedRecord`.
    fn normalize(
        &self,
        input: &Self::Input,
        meta: &MetaCatalog,
    ) -> Result<Vec<NormalizedRecord>, Error>;

    /// Post-process the store after all records were added.
    fn finalize(&self, store: TableStore) -> Result<TableStore, Error> {
        Ok(store)
    }
}

/// Names of INFO tables with special meaning.
pub mod info {
    pub const SVTYPE: &str = "svtype";
    pub const END: &str = "end";
    pub const MATEID: &str = "mateid";
    pub const PARID: &str = "parid";
    pub const CIPOS: &str = "cipos";
    pub const CIEND: &str = "ciend";
    pub const SECONDARY: &str = "secondary";
    pub const SU: &str = "su";
    pub const SUORG: &str = "suorg";
    pub const STRANDS: &str = "strands";
    pub const ORGBEID: &str = "orgbeid";
}

/// SV type of records that fit no known class.
pub const UNCLASSIFIED: &str = ".";

/// Mate locus and orientation parsed from a breakend ALT.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakendAlt {
    /// `None` for single breakends `.t` / `t.`
    pub mate: Option<(String, i64)>,
    pub strand1: Strand,
    pub strand2: Strand,
    /// Bases outside the brackets (or besides the dot).
    pub sequence: String,
}

impl BreakendAlt {
    /// Length of the inserted sequence, the first or last base is the
    /// reference base.
    pub fn inserted_len(&self) -> usize {
        self.sequence.len().saturating_sub(1)
    }
}

/// Parse a breakend ALT such as `G]chr2:50000]` or `.A`.
pub fn parse_breakend_alt(alt: &str) -> Result<BreakendAlt, Error> {
    let invalid = || Error::InvalidBreakend(alt.to_string());

    if let Some(bracket_idx) = alt.find(['[', ']']) {
        let bracket = alt[bracket_idx..].chars().next().ok_or_else(invalid)?;
        let rest = &alt[bracket_idx + 1..];
        let close_idx = rest.find(bracket).ok_or_else(invalid)?;
        let mate = &rest[..close_idx];
        let (chrom, pos) = mate.rsplit_once(':').ok_or_else(invalid)?;
        let pos = pos.parse::<i64>().map_err(|_| invalid())?;
        if chrom.is_empty() {
            return Err(invalid());
        }

        let leading = &alt[..bracket_idx];
        let trailing = &rest[close_idx + 1..];
        let (strand1, strand2, sequence) = match (leading.is_empty(), bracket) {
            // t[p[
            (false, '[') if trailing.is_empty() => (Strand::Plus, Strand::Minus, leading),
            // t]p]
            (false, ']') if trailing.is_empty() => (Strand::Plus, Strand::Plus, leading),
            // ]p]t
            (true, ']') if !trailing.is_empty() => (Strand::Minus, Strand::Plus, trailing),
            // [p[t
            (true, '[') if !trailing.is_empty() => (Strand::Minus, Strand::Minus, trailing),
            _ => return Err(invalid()),
        };
        Ok(BreakendAlt {
            mate: Some((chrom.to_string(), pos)),
            strand1,
            strand2,
            sequence: sequence.to_string(),
        })
    } else if let Some(sequence) = alt.strip_prefix('.').filter(|s| !s.is_empty()) {
        Ok(BreakendAlt {
            mate: None,
            strand1: Strand::Minus,
            strand2: Strand::Unknown,
            sequence: sequence.to_string(),
        })
    } else if let Some(sequence) = alt.strip_suffix('.').filter(|s| !s.is_empty()) {
        Ok(BreakendAlt {
            mate: None,
            strand1: Strand::Plus,
            strand2: Strand::Unknown,
            sequence: sequence.to_string(),
        })
    } else {
        Err(invalid())
    }
}

/// Whether the ALT is breakend notation rather than symbolic or sequence.
pub fn is_breakend_alt(alt: &str) -> bool {
    alt.contains(['[', ']']) || (alt.len() > 1 && (alt.starts_with('.') || alt.ends_with('.')))
}

/// Locus and orientation of both ends of a record.
#[derive(Debug, Clone, PartialEq)]
pub struct Loci {
    pub pos1: i64,
    pub chrom2: Option<String>,
    pub pos2: Option<i64>,
    pub strand1: Strand,
    pub strand2: Strand,
}

/// SV type of a record from `SVTYPE`, falling back to the ALT.
pub fn svtype_of(record: &RawRecord) -> String {
    if let Some(svtype) = record.info_value("SVTYPE") {
        return svtype.to_string();
    }
    let alt = record.alt();
    if let Some(symbolic) = alt.strip_prefix('<').and_then(|s| s.strip_suffix('>')) {
        symbolic.split(':').next().unwrap_or(symbolic).to_string()
    } else if is_breakend_alt(alt) {
        String::from("BND")
    } else {
        String::from(UNCLASSIFIED)
    }
}

/// Derive both loci with the shared rules for each SV type.
///
/// `three_prime` selects the `++` orientation of inversions.
pub fn locate(record: &RawRecord, svtype: &str, three_prime: bool) -> Result<Loci, Error> {
    let id = record.id.as_deref().unwrap_or(".");
    let pos = record.pos;
    let end = || -> Result<i64, Error> {
        record
            .info_i64("END")?
            .ok_or_else(|| Error::record(id, format!("{} without END", svtype)))
    };
    let same_chrom = Some(record.chrom.clone());

    Ok(match svtype.split(':').next().unwrap_or(svtype) {
        "BND" | "TRA" => {
            let alt = parse_breakend_alt(record.alt())?;
            let (chrom2, pos2) = match alt.mate {
                Some((chrom, pos)) => (Some(chrom), Some(pos)),
                None => (None, None),
            };
            Loci {
                pos1: pos,
                chrom2,
                pos2,
                strand1: alt.strand1,
                strand2: alt.strand2,
            }
        }
        "DEL" => Loci {
            pos1: pos,
            chrom2: same_chrom,
            pos2: Some(end()? + 1),
            strand1: Strand::Plus,
            strand2: Strand::Minus,
        },
        "DUP" => Loci {
            pos1: pos + 1,
            chrom2: same_chrom,
            pos2: Some(end()?),
            strand1: Strand::Minus,
            strand2: Strand::Plus,
        },
        "INV" if three_prime => Loci {
            pos1: pos,
            chrom2: same_chrom,
            pos2: Some(end()?),
            strand1: Strand::Plus,
            strand2: Strand::Plus,
        },
        "INV" => Loci {
            pos1: pos + 1,
            chrom2: same_chrom,
            pos2: Some(end()? + 1),
            strand1: Strand::Minus,
            strand2: Strand::Minus,
        },
        "INS" => Loci {
            pos1: pos,
            chrom2: same_chrom,
            pos2: Some(record.info_i64("END")?.unwrap_or(pos)),
            strand1: Strand::Plus,
            strand2: Strand::Minus,
        },
        _ => Loci {
            pos1: pos,
            chrom2: same_chrom,
            pos2: Some(record.info_i64("END")?.unwrap_or(pos)),
            strand1: Strand::Unknown,
            strand2: Strand::Unknown,
        },
    })
}

/// Type the values of one INFO key.
///
/// Declared flags become one `true` value, undeclared fields are typed by
/// their literal. A declared non-flag key without values yields nothing.
fn info_values(
    id: &str,
    key: &str,
    values: &[String],
    meta: &MetaCatalog,
) -> Result<Vec<Value>, Error> {
    let declared = meta.info(key).map(|meta| meta.field_type);
    typed_values(id, key, values, declared)
}

fn typed_values(
    id: &str,
    key: &str,
    values: &[String],
    declared: Option<FieldType>,
) -> Result<Vec<Value>, Error> {
    match declared {
        Some(FieldType::Flag) => Ok(vec![Value::Flag(true)]),
        Some(_) if values.is_empty() => Ok(Vec::new()),
        None if values.is_empty() => Ok(vec![Value::Flag(true)]),
        Some(field_type) => values
            .iter()
            .map(|raw| {
                field_type
                    .parse_value(raw)
                    .map_err(|msg| Error::record(id, format!("{}: {}", key, msg)))
            })
            .collect(),
        None => Ok(values.iter().map(|raw| Value::infer(raw)).collect()),
    }
}

/// Normalize a VCF record with the given locus derivation.
pub fn normalize_vcf<F>(
    record: &RawRecord,
    meta: &MetaCatalog,
    locate: F,
) -> Result<NormalizedRecord, Error>
where
    F: FnOnce(&RawRecord, &str) -> Result<Loci, Error>,
{
    let id = record
        .id
        .clone()
        .ok_or_else(|| Error::record(".", "record without identifier"))?;
    let svtype = svtype_of(record);
    let loci = locate(record, &svtype)?;

    let mut infos = IndexMap::new();
    let mut info_keys = IndexMap::new();
    for (key, values) in &record.info {
        let values = info_values(&id, key, values, meta)?;
        if values.is_empty() {
            continue;
        }
        let name = key.to_ascii_lowercase();
        info_keys.insert(name.clone(), key.clone());
        infos.insert(name, values);
    }
    if infos.contains_key(info::MATEID) && !infos.contains_key(info::CIPOS) {
        infos.insert(
            info::CIPOS.to_string(),
            vec![Value::Integer(0), Value::Integer(0)],
        );
    }

    let mut formats = IndexMap::new();
    for (sample, fields) in &record.formats {
        let mut typed = IndexMap::new();
        for (key, values) in fields {
            if values.is_empty() {
                continue;
            }
            let declared = meta.format(key).map(|meta| meta.field_type);
            typed.insert(key.clone(), typed_values(&id, key, values, declared)?);
        }
        formats.insert(sample.clone(), typed);
    }

    Ok(NormalizedRecord {
        position: Position {
            id,
            chrom1: record.chrom.clone(),
            pos1: loci.pos1,
            chrom2: loci.chrom2,
            pos2: loci.pos2,
            strand1: loci.strand1,
            strand2: loci.strand2,
            reference: record.reference.clone(),
            alt: record.alt().to_string(),
            qual: record.qual,
            svtype,
        },
        filters: record
            .filters
            .iter()
            .filter(|filter| filter.as_str() != ".")
            .cloned()
            .collect(),
        infos,
        info_keys,
        formats,
    })
}

/// Declaration of a confidence interval INFO.
pub fn ci_meta(name: &str) -> InfoMeta {
    let description = if name.eq_ignore_ascii_case(info::CIPOS) {
        "Confidence interval around POS"
    } else {
        "Confidence interval around END"
    };
    InfoMeta::new(
        &name.to_ascii_uppercase(),
        Number::Count(2),
        FieldType::Integer,
        description,
    )
}

/// Set CIEND of breakends to the CIPOS of their mate.
///
/// Breakends without resolvable mate or mate CIPOS are left alone.
pub fn derive_ciend(mut store: TableStore) -> Result<TableStore, Error> {
    let derived = match (store.info(info::MATEID), store.info(info::CIPOS)) {
        (Some(mates), Some(cipos)) => {
            let cipos = cipos
                .rows
                .iter()
                .sorted_by_key(|row| row.value_idx)
                .map(|row| (row.id.as_str(), &row.value))
                .into_group_map();
            mates
                .rows
                .iter()
                .filter(|row| row.value_idx == 0)
                .filter_map(|row| {
                    let mate = row.value.as_str()?;
                    if store.position(&row.id)?.svtype != "BND" || store.position(mate).is_none() {
                        return None;
                    }
                    let values = cipos.get(mate)?;
                    Some((
                        row.id.clone(),
                        values.iter().map(|value| (*value).clone()).collect::<Vec<_>>(),
                    ))
                })
                .collect::<HashMap<SvId, Vec<Value>>>()
        }
        _ => return Ok(store),
    };
    tracing::debug!("derived CIEND for {} breakends", derived.len());

    let mut ciend = store
        .info(info::CIEND)
        .cloned()
        .unwrap_or_else(|| InfoTable::new(info::CIEND));
    ciend.rows.retain(|row| !derived.contains_key(&row.id));
    for position in store.positions() {
        if let Some(values) = derived.get(&position.id) {
            ciend.rows.extend(
                values
                    .iter()
                    .enumerate()
                    .map(|(idx, value)| InfoRow::new(position.id.as_str(), idx, value.clone())),
            );
        }
    }

    if store.meta().info(info::CIPOS).is_none() {
        store.add_info_meta(ci_meta(info::CIPOS));
    }
    if store.meta().info(info::CIEND).is_none() {
        store.add_info_meta(ci_meta(info::CIEND));
    }
    store.add_info_table(info::CIEND, ciend);
    Ok(store)
}
