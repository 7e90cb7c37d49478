//! Normalization of LUMPY records.

use super::{info, locate, normalize_vcf, NormalizedRecord, RecordNormalizer};
use crate::{
    common::SvCaller,
    err::Error,
    ingest::record::RawRecord,
    tables::{
        meta::InfoMeta,
        schema::{FieldType, Number},
        MetaCatalog, Strand, Value,
    },
    TableStore,
};

/// LUMPY reports both inversion orientations in one record, which is split
/// into a `++` record `<id>_1` and a `--` record `<id>_2`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LumpyNormalizer;

/// Read support of one strand pair from `STRANDS`, e.g. `++:5,--:3`.
pub fn strand_support(strands: &[String], pair: &str) -> i64 {
    strands
        .iter()
        .filter_map(|entry| entry.split_once(':'))
        .find(|(key, _)| *key == pair)
        .and_then(|(_, count)| count.parse().ok())
        .unwrap_or(0)
}

impl RecordNormalizer for LumpyNormalizer {
    type Input = RawRecord;

    fn caller(&self) -> SvCaller {
        SvCaller::Lumpy
    }

    fn normalize(
        &self,
        input: &RawRecord,
        meta: &MetaCatalog,
    ) -> Result<Vec<NormalizedRecord>, Error> {
        let record = normalize_vcf(input, meta, |record, svtype| locate(record, svtype, true))?;
        if record.position.svtype != "INV" {
            return Ok(vec![record]);
        }

        let strands = input.info.get("STRANDS").cloned().unwrap_or_default();
        let split = |suffix: &str, pair: &str| {
            let mut part = record.with_id(&format!("{}_{}", record.id(), suffix));
            if let Some(su) = part.infos.get(info::SU).cloned() {
                part.infos.insert(info::SUORG.to_string(), su);
            }
            part.infos.insert(
                info::SU.to_string(),
                vec![Value::Integer(strand_support(&strands, pair))],
            );
            part
        };

        let plus = split("1", "++");
        let mut minus = split("2", "--");
        minus.position.strand1 = Strand::Minus;
        minus.position.strand2 = Strand::Minus;
        minus.position.pos1 += 1;
        minus.position.pos2 = minus.position.pos2.map(|pos| pos + 1);

        Ok(vec![plus, minus])
    }

    fn finalize(&self, mut store: TableStore) -> Result<TableStore, Error> {
        if store.has_info(info::SUORG) {
            store.add_info_meta(InfoMeta::new(
                "SUORG",
                Number::Count(1),
                FieldType::Integer,
                "Number of pieces of evidence supporting the variant before splitting inversions",
            ));
        }
        Ok(store)
    }
}
