//! Normalization of Manta records.

use super::{derive_ciend, locate, normalize_vcf, NormalizedRecord, RecordNormalizer};
use crate::{
    common::SvCaller, err::Error, ingest::record::RawRecord, tables::MetaCatalog, TableStore,
};

/// Manta marks `++` inversions with the `INV3` flag.
#[derive(Debug, Default, Clone, Copy)]
pub struct MantaNormalizer;

impl RecordNormalizer for MantaNormalizer {
    type Input = RawRecord;

    fn caller(&self) -> SvCaller {
        SvCaller::Manta
    }

    fn normalize(
        &self,
        input: &RawRecord,
        meta: &MetaCatalog,
    ) -> Result<Vec<NormalizedRecord>, Error> {
        let record = normalize_vcf(input, meta, |record, svtype| {
            locate(record, svtype, record.has_info("INV3"))
        })?;
        Ok(vec![record])
    }

    fn finalize(&self, store: TableStore) -> Result<TableStore, Error> {
        derive_ciend(store)
    }
}
