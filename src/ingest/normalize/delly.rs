//! Normalization of Delly records.

use super::{
    is_breakend_alt, locate, normalize_vcf, Loci, NormalizedRecord, RecordNormalizer,
};
use crate::{
    common::SvCaller,
    err::Error,
    ingest::record::RawRecord,
    tables::{MetaCatalog, Strand},
};

/// Delly encodes orientation in `CT` and the second locus of
/// translocations in `CHR2`/`POS2`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DellyNormalizer;

/// Strands of a Delly connection type such as `3to5`.
pub fn strands_from_ct(ct: &str) -> (Strand, Strand) {
    match ct {
        "3to5" => (Strand::Plus, Strand::Minus),
        "5to3" => (Strand::Minus, Strand::Plus),
        "3to3" => (Strand::Plus, Strand::Plus),
        "5to5" => (Strand::Minus, Strand::Minus),
        _ => (Strand::Unknown, Strand::Unknown),
    }
}

fn locate_delly(record: &RawRecord, svtype: &str) -> Result<Loci, Error> {
    let ct = record.info_value("CT").unwrap_or_default();
    let is_translocation = matches!(svtype, "BND" | "TRA");
    if is_translocation && !is_breakend_alt(record.alt()) {
        let id = record.id.as_deref().unwrap_or(".");
        let chrom2 = record
            .info_value("CHR2")
            .ok_or_else(|| Error::record(id, "translocation without CHR2"))?;
        let pos2 = match record.info_i64("POS2")? {
            Some(pos2) => pos2,
            None => record
                .info_i64("END")?
                .ok_or_else(|| Error::record(id, "translocation without POS2 or END"))?,
        };
        let (strand1, strand2) = strands_from_ct(ct);
        return Ok(Loci {
            pos1: record.pos,
            chrom2: Some(chrom2.to_string()),
            pos2: Some(pos2),
            strand1,
            strand2,
        });
    }
    locate(record, svtype, ct == "3to3")
}

impl RecordNormalizer for DellyNormalizer {
    type Input = RawRecord;

    fn caller(&self) -> SvCaller {
        SvCaller::Delly
    }

    fn normalize(
        &self,
        input: &RawRecord,
        meta: &MetaCatalog,
    ) -> Result<Vec<NormalizedRecord>, Error> {
        Ok(vec![normalize_vcf(input, meta, locate_delly)?])
    }
}
