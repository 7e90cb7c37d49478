//! Normalization of GRIDSS records.

use super::{derive_ciend, locate, normalize_vcf, NormalizedRecord, RecordNormalizer};
use crate::{
    common::SvCaller, err::Error, ingest::record::RawRecord, tables::MetaCatalog, TableStore,
};

/// GRIDSS reports breakend pairs through `MATEID` or, in older versions,
/// through `PARID`.
#[derive(Debug, Default, Clone, Copy)]
pub struct GridssNormalizer;

impl RecordNormalizer for GridssNormalizer {
    type Input = RawRecord;

    fn caller(&self) -> SvCaller {
        SvCaller::Gridss
    }

    fn normalize(
        &self,
        input: &RawRecord,
        meta: &MetaCatalog,
    ) -> Result<Vec<NormalizedRecord>, Error> {
        let locate_gridss =
            |record: &RawRecord, svtype: &str| locate(record, svtype, record.has_info("INV3"));

        let record = match input.info.get("PARID") {
            Some(parid) if !input.has_info("MATEID") => {
                let mut input = input.clone();
                input.info.insert(String::from("MATEID"), parid.clone());
                normalize_vcf(&input, meta, locate_gridss)?
            }
            _ => normalize_vcf(input, meta, locate_gridss)?,
        };
        Ok(vec![record])
    }

    fn finalize(&self, store: TableStore) -> Result<TableStore, Error> {
        derive_ciend(store)
    }
}
