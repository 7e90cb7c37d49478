//! Overlap of breakends with BED intervals.

use std::{io::BufRead, path::Path};

use bio::data_structures::interval_tree::ArrayBackedIntervalTree;
use indexmap::IndexMap;

use crate::{
    common::io::open_read_maybe_gz,
    tables::{
        meta::InfoMeta,
        schema::{FieldType, InfoRow, InfoTable, Number, Value},
        TableStore,
    },
};

/// Alias for the interval tree that we use.
type IntervalTree = ArrayBackedIntervalTree<i64, usize>;

/// One BED interval, 0-based half-open.
#[derive(Debug, Default, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BedRecord {
    pub chrom: String,
    pub start: i64,
    pub end: i64,
    pub name: Option<String>,
}

/// BED intervals with one interval tree per chromosome.
#[derive(Debug, Default, Clone)]
pub struct Bed {
    records: IndexMap<String, Vec<BedRecord>>,
    trees: IndexMap<String, IntervalTree>,
}

impl Bed {
    /// Build the index from `records`.
    ///
    /// Records with `start > end` are skipped.
    pub fn new<I: IntoIterator<Item = BedRecord>>(records: I) -> Self {
        let mut result = Self::default();
        for record in records {
            if record.start > record.end {
                tracing::warn!(
                    "skipping BED interval {}:{}-{} with start after end",
                    &record.chrom,
                    record.start,
                    record.end
                );
                continue;
            }
            let chrom_records = result.records.entry(record.chrom.clone()).or_default();
            result
                .trees
                .entry(record.chrom.clone())
                .or_insert_with(IntervalTree::new)
                .insert(record.start..record.end, chrom_records.len());
            chrom_records.push(record);
        }
        result.trees.values_mut().for_each(|tree| tree.index());
        result
    }

    /// Read tab-separated `chrom start end [name ...]` lines.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, anyhow::Error> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .delimiter(b'\t')
            .comment(Some(b'#'))
            .flexible(true)
            .from_reader(reader);

        let mut records = Vec::new();
        for (line_no, row) in reader.records().enumerate() {
            let row = row?;
            if row.get(0).map_or(false, |chrom| chrom.starts_with("track")) {
                continue;
            }
            let field = |idx: usize| {
                row.get(idx)
                    .ok_or_else(|| anyhow::anyhow!("BED line {} has fewer than 3 columns", line_no + 1))
            };
            let coord = |idx: usize| -> Result<i64, anyhow::Error> {
                let raw = field(idx)?;
                raw.parse()
                    .map_err(|e| anyhow::anyhow!("invalid BED coordinate {:?}: {}", raw, e))
            };
            let (start, end) = (coord(1)?, coord(2)?);
            if start < 0 || start > end {
                anyhow::bail!(
                    "invalid BED interval {}-{} on line {}",
                    start,
                    end,
                    line_no + 1
                );
            }
            records.push(BedRecord {
                chrom: field(0)?.to_string(),
                start,
                end,
                name: row.get(3).map(str::to_string),
            });
        }
        tracing::debug!("read {} BED intervals", records.len());
        Ok(Self::new(records))
    }

    /// Load a (possibly gzip-compressed) BED file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let reader = open_read_maybe_gz(path.as_ref())?;
        Self::from_reader(reader)
            .map_err(|e| anyhow::anyhow!("could not read {}: {}", path.as_ref().display(), e))
    }

    pub fn len(&self) -> usize {
        self.records.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Intervals containing the 1-based position `pos`.
    pub fn query(&self, chrom: &str, pos: i64) -> Vec<&BedRecord> {
        match (self.trees.get(chrom), self.records.get(chrom)) {
            (Some(tree), Some(records)) => tree
                .find((pos - 1)..pos)
                .iter()
                .map(|entry| &records[*entry.data()])
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn overlaps(&self, chrom: &str, pos: i64) -> bool {
        !self.query(chrom, pos).is_empty()
    }
}

impl TableStore {
    /// Mark ids whose first and second breakend overlap `bed` in the Flag
    /// tables `<annotation>left` and `<annotation>right`.
    pub fn annotate_bed(&self, bed: &Bed, annotation: &str, description: &str) -> TableStore {
        let mut left = Vec::new();
        let mut right = Vec::new();
        for position in self.positions() {
            if bed.overlaps(&position.chrom1, position.pos1) {
                left.push(InfoRow::new(position.id.as_str(), 0, Value::Flag(true)));
            }
            if let (Some(chrom2), Some(pos2)) = (&position.chrom2, position.pos2) {
                if bed.overlaps(chrom2, pos2) {
                    right.push(InfoRow::new(position.id.as_str(), 0, Value::Flag(true)));
                }
            }
        }
        tracing::debug!(
            "{}: {} left and {} right breakends overlap",
            annotation,
            left.len(),
            right.len()
        );

        let mut result = self.clone();
        for (side, rows) in [("left", left), ("right", right)] {
            let name = format!("{}{}", annotation, side);
            result.add_info_meta(InfoMeta::new(
                &name,
                Number::Count(0),
                FieldType::Flag,
                &format!("{} ({} breakend)", description, side),
            ));
            result.add_info_table(&name, InfoTable::with_rows(&name, rows));
        }
        result
    }
}
