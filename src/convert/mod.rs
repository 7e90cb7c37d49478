//! Flat BEDPE-like and VCF-like projections of a `TableStore` and writers
//! for them.

use std::{collections::HashMap, io::Write};

use anyhow::Context;
use itertools::Itertools;
use noodles_vcf as vcf;

use crate::{
    common::SvCaller,
    err::Error,
    ingest::{header::build_header, normalize::info},
    tables::{
        schema::{FieldType, Frame, InfoTable, Position, SvId, Value},
        TableStore,
    },
};

pub mod cli;

/// Leading columns of the BEDPE projection.
pub const BEDPE_COLUMNS: &[&str] = &[
    "chrom1", "start1", "end1", "chrom2", "start2", "end2", "name", "score", "strand1", "strand2",
];

/// Leading columns of the VCF projection.
pub const VCF_COLUMNS: &[&str] = &[
    "CHROM", "POS", "ID", "REF", "ALT", "QUAL", "FILTER", "INFO",
];

/// Options for `TableStore::to_bedpe_like`.
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize, derive_builder::Builder)]
#[builder(default)]
pub struct BedpeLikeOptions {
    /// INFO tables appended as extra columns, in this order.
    pub custom_infonames: Vec<String>,
    /// Whether to add a `filter` column with the `;`-joined FILTER values.
    pub add_filters: bool,
    /// Whether to widen the intervals by `cipos`/`ciend`.
    pub confidence_intervals: bool,
}

/// Values of one INFO table grouped by id, ordered by value index.
fn group_values(table: &InfoTable) -> HashMap<&str, Vec<&Value>> {
    table
        .rows
        .iter()
        .sorted_by_key(|row| row.value_idx)
        .map(|row| (row.id.as_str(), &row.value))
        .into_group_map()
}

/// FILTER values grouped by id.
fn group_filters(store: &TableStore) -> HashMap<&str, Vec<&str>> {
    store
        .filters()
        .iter()
        .map(|row| (row.id.as_str(), row.filter.as_str()))
        .into_group_map()
}

/// 0-based half-open interval around `pos`, optionally widened by `ci`.
fn interval(pos: i64, ci: Option<&Vec<&Value>>) -> (i64, i64) {
    let bounds = ci.and_then(|ci| Some((ci.first()?.as_i64()?, ci.get(1)?.as_i64()?)));
    match bounds {
        Some((lower, upper)) => (pos + lower - 1, pos + upper),
        None => (pos - 1, pos),
    }
}

/// Columns of one INFO table in the BEDPE projection.
fn info_columns(table: &InfoTable) -> Vec<String> {
    match table.max_value_idx() {
        Some(max_idx) if max_idx > 0 => (0..=max_idx)
            .map(|idx| format!("{}_{}", table.name, idx))
            .collect(),
        _ => vec![table.name.clone()],
    }
}

/// POS column of the VCF projection of `position`.
fn vcf_pos(caller: SvCaller, position: &Position) -> i64 {
    let symbolic = position.alt.starts_with('<');
    let shifted = caller != SvCaller::Bedpe
        && symbolic
        && (position.svtype == "DUP"
            || (position.svtype == "INV" && position.strand1 == crate::tables::Strand::Minus));
    if shifted {
        position.pos1 - 1
    } else {
        position.pos1
    }
}

/// VCF key of the INFO table `name`, taken from its declaration or the
/// input spelling.
fn info_key(store: &TableStore, name: &str) -> String {
    store
        .meta
        .info(name)
        .map(|meta| meta.id.clone())
        .unwrap_or_else(|| store.spelled_key(name))
}

impl TableStore {
    /// Project to one BEDPE row per record.
    pub fn to_bedpe_like(&self, options: &BedpeLikeOptions) -> Result<Frame, Error> {
        let tables = options
            .custom_infonames
            .iter()
            .map(|name| self.get_info(name))
            .collect::<Result<Vec<_>, _>>()?;
        let grouped = tables
            .iter()
            .map(|table| group_values(table))
            .collect::<Vec<_>>();
        let (cipos, ciend) = if options.confidence_intervals {
            (
                self.info(info::CIPOS).map(group_values).unwrap_or_default(),
                self.info(info::CIEND).map(group_values).unwrap_or_default(),
            )
        } else {
            Default::default()
        };
        let filters = group_filters(self);

        let mut columns = BEDPE_COLUMNS.iter().map(|c| c.to_string()).collect::<Vec<_>>();
        if options.add_filters {
            columns.push(String::from("filter"));
        }
        let widths = tables
            .iter()
            .map(|table| {
                let names = info_columns(table);
                let width = names.len();
                columns.extend(names);
                width
            })
            .collect::<Vec<_>>();

        let mut frame = Frame::new(columns);
        for position in self.positions() {
            let id = position.id.as_str();
            let (start1, end1) = interval(position.pos1, cipos.get(id));
            let second = position
                .pos2
                .map(|pos2| interval(pos2, ciend.get(id)));
            let mut row = vec![
                Some(Value::from(position.chrom1.as_str())),
                Some(Value::Integer(start1)),
                Some(Value::Integer(end1)),
                position.chrom2.as_deref().map(Value::from),
                second.map(|(start2, _)| Value::Integer(start2)),
                second.map(|(_, end2)| Value::Integer(end2)),
                Some(Value::from(id)),
                position.qual.map(Value::Float),
                Some(Value::String(position.strand1.to_string())),
                Some(Value::String(position.strand2.to_string())),
            ];
            if options.add_filters {
                row.push(
                    filters
                        .get(id)
                        .map(|filters| Value::String(filters.iter().join(";"))),
                );
            }
            for ((table, values), width) in tables.iter().zip(&grouped).zip(&widths) {
                let is_flag = self
                    .meta
                    .info(&table.name)
                    .map(|meta| meta.field_type == FieldType::Flag)
                    .unwrap_or(false);
                let values = values.get(id);
                for idx in 0..*width {
                    row.push(match values.and_then(|values| values.get(idx)) {
                        Some(value) => Some((*value).clone()),
                        None if is_flag => Some(Value::Flag(false)),
                        None => None,
                    });
                }
            }
            frame.rows.push(row);
        }
        Ok(frame)
    }

    /// Project back to VCF body columns, one row per record.
    pub fn to_vcf_like(&self) -> Frame {
        let samples = self.sample_names();
        let filters = group_filters(self);
        let infos = self
            .infos
            .values()
            .map(|table| (info_key(self, &table.name), group_values(table)))
            .collect::<Vec<_>>();
        let formats = self
            .formats()
            .iter()
            .sorted_by_key(|row| row.value_idx)
            .map(|row| ((row.id.as_str(), row.sample.as_str(), row.format.as_str()), &row.value))
            .into_group_map();
        let format_keys = self
            .formats()
            .iter()
            .map(|row| (row.id.as_str(), row.format.as_str()))
            .into_group_map();
        let declared = self
            .meta
            .formats
            .iter()
            .map(|meta| meta.id.as_str())
            .collect::<Vec<_>>();

        let mut columns = VCF_COLUMNS.iter().map(|c| c.to_string()).collect::<Vec<_>>();
        if !samples.is_empty() {
            columns.push(String::from("FORMAT"));
            columns.extend(samples.iter().cloned());
        }

        let mut frame = Frame::new(columns);
        for position in self.positions() {
            let id = position.id.as_str();
            let info = infos
                .iter()
                .filter_map(|(key, grouped)| {
                    let values = grouped.get(id)?;
                    Some(match values.as_slice() {
                        [Value::Flag(true)] => key.clone(),
                        [Value::Flag(false)] => return None,
                        values => format!("{}={}", key, values.iter().join(",")),
                    })
                })
                .join(";");
            let mut row = vec![
                Some(Value::from(position.chrom1.as_str())),
                Some(Value::Integer(vcf_pos(self.caller, position))),
                Some(Value::from(id)),
                Some(Value::from(position.reference.as_str())),
                Some(Value::from(position.alt.as_str())),
                position.qual.map(Value::Float),
                filters
                    .get(id)
                    .map(|filters| Value::String(filters.iter().join(";"))),
                Some(Value::String(if info.is_empty() {
                    String::from(".")
                } else {
                    info
                })),
            ];

            if !samples.is_empty() {
                let present = format_keys.get(id).cloned().unwrap_or_default();
                let keys = declared
                    .iter()
                    .copied()
                    .chain(present.iter().copied())
                    .filter(|key| present.contains(key))
                    .unique()
                    .collect::<Vec<_>>();
                row.push(Some(Value::String(if keys.is_empty() {
                    String::from(".")
                } else {
                    keys.iter().join(":")
                })));
                for sample in &samples {
                    let cell = keys
                        .iter()
                        .map(|key| match formats.get(&(id, sample.as_str(), *key)) {
                            Some(values) => values.iter().join(","),
                            None => String::from("."),
                        })
                        .join(":");
                    row.push(Some(Value::String(if cell.is_empty() {
                        String::from(".")
                    } else {
                        cell
                    })));
                }
            }
            frame.rows.push(row);
        }
        frame
    }
}

/// Write `frame` as TSV with a header row.
pub fn write_table<W: Write>(frame: &Frame, writer: W) -> Result<(), anyhow::Error> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .quote_style(csv::QuoteStyle::Never)
        .from_writer(writer);
    writer.write_record(&frame.columns)?;
    for row in &frame.rows {
        writer.write_record(row.iter().map(Frame::render))?;
    }
    writer.flush()?;
    Ok(())
}

/// Write `store` as BEDPE.
pub fn write_bedpe<W: Write>(
    store: &TableStore,
    writer: W,
    options: &BedpeLikeOptions,
) -> Result<(), anyhow::Error> {
    let frame = store.to_bedpe_like(options)?;
    tracing::debug!("writing {} BEDPE rows", frame.len());
    write_table(&frame, writer)
}

/// Write `store` as VCF, header block followed by the records.
///
/// The rows of `to_vcf_like` are parsed against the header built from the
/// catalog, so a record the header does not describe fails the write.
pub fn write_vcf<W: Write>(store: &TableStore, writer: W) -> Result<(), anyhow::Error> {
    let header = build_header(store.meta())?;
    let frame = store.to_vcf_like();
    tracing::debug!("writing {} VCF records", frame.len());

    let mut body = String::new();
    for row in &frame.rows {
        body.push_str(&row.iter().map(Frame::render).join("\t"));
        body.push('\n');
    }

    let mut writer = vcf::Writer::new(writer);
    writer.write_header(&header)?;
    let mut reader = vcf::Reader::new(body.as_bytes());
    for (record, line) in reader.records(&header).zip(body.lines()) {
        let record = record.with_context(|| format!("invalid VCF record {:?}", line))?;
        writer.write_record(&header, &record)?;
    }
    writer.get_mut().flush()?;
    Ok(())
}

/// Ids as they appear in the `name` column of `frame`.
pub fn frame_ids(frame: &Frame) -> Result<Vec<SvId>, Error> {
    Ok(frame
        .column("name")?
        .into_iter()
        .flatten()
        .map(|value| value.to_string())
        .collect())
}
