//! Reading of SV VCF and BEDPE files into a `TableStore`.

use std::{io::BufRead, path::Path};

use anyhow::{anyhow, Context};
use indexmap::IndexMap;
use noodles_vcf as vcf;

use crate::{
    common::{io::open_read_maybe_gz, SvCaller},
    err::Error,
    tables::{MetaCatalog, TableStore},
};

pub mod header;
pub mod normalize;
pub mod record;

use normalize::{
    bedpe::BedpeRecord, BedpeNormalizer, DellyNormalizer, GridssNormalizer, LumpyNormalizer,
    MantaNormalizer, RecordNormalizer,
};
use record::RawRecord;

/// Identifier for records with an empty ID column.
fn synthetic_id(caller: SvCaller, record_no: usize) -> String {
    format!("{}_{}", caller, record_no)
}

/// Guess the caller from the `##source=` line of the header.
pub fn guess_caller(meta: &MetaCatalog) -> Option<SvCaller> {
    meta.source.as_deref().and_then(SvCaller::guess_from_source)
}

/// Feed all inputs through `normalizer` into a new store.
///
/// A record failing normalization aborts the build.
pub fn build_store<N, I>(normalizer: &N, meta: MetaCatalog, inputs: I) -> Result<TableStore, Error>
where
    N: RecordNormalizer,
    I: IntoIterator<Item = Result<N::Input, Error>>,
{
    let mut store = TableStore::new(normalizer.caller(), meta);
    for input in inputs {
        let input = input?;
        for record in normalizer.normalize(&input, &store.meta)? {
            store.push_record(record)?;
        }
    }
    store.sync_info_meta();
    normalizer.finalize(store)
}

/// Read a VCF from `reader` with the normalizer of `caller`.
///
/// With `caller == None` the caller is guessed from the header.
pub fn read_vcf_from<R: BufRead>(
    reader: R,
    caller: Option<SvCaller>,
) -> Result<TableStore, anyhow::Error> {
    let mut reader = vcf::Reader::new(reader);
    let header = reader.read_header()?;
    let meta = header::catalog_from_header(&header)?;
    let caller = match caller.or_else(|| guess_caller(&meta)) {
        Some(caller) => caller,
        None => {
            tracing::warn!(
                "could not guess caller from source {:?}, assuming {}",
                meta.source,
                SvCaller::default()
            );
            SvCaller::default()
        }
    };
    tracing::debug!("reading records as {}", caller);

    let records = reader
        .records(&header)
        .enumerate()
        .map(|(record_no, record)| {
            let record = record.map_err(|e| {
                Error::record(synthetic_id(caller, record_no), format!("could not parse: {}", e))
            })?;
            let mut record = RawRecord::from_vcf(&record, &header)?;
            if record.id.is_none() {
                record.id = Some(synthetic_id(caller, record_no));
            }
            Ok::<_, Error>(record)
        });

    let store = match caller {
        SvCaller::Manta => build_store(&MantaNormalizer, meta, records),
        SvCaller::Delly => build_store(&DellyNormalizer, meta, records),
        SvCaller::Lumpy => build_store(&LumpyNormalizer, meta, records),
        SvCaller::Gridss => build_store(&GridssNormalizer, meta, records),
        SvCaller::Bedpe => {
            return Err(anyhow!("BEDPE is not a VCF flavour, use read_bedpe"));
        }
    }?;
    Ok(store)
}

/// Read a (possibly gzip-compressed) VCF file.
pub fn read_vcf<P: AsRef<Path>>(
    path: P,
    caller: Option<SvCaller>,
) -> Result<TableStore, anyhow::Error> {
    tracing::info!("reading VCF {:?}", path.as_ref());
    let reader = open_read_maybe_gz(path.as_ref())?;
    read_vcf_from(reader, caller)
        .with_context(|| format!("could not read {}", path.as_ref().display()))
}

/// Read BEDPE rows from `reader`, the header row is required.
pub fn read_bedpe_from<R: BufRead>(reader: R) -> Result<TableStore, anyhow::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(b'\t')
        .comment(None)
        .from_reader(reader);
    let headers = reader
        .headers()?
        .iter()
        .map(|column| column.trim_start_matches('#').to_ascii_lowercase())
        .collect::<csv::StringRecord>();
    reader.set_headers(headers);

    let rows = reader
        .deserialize::<IndexMap<String, String>>()
        .collect::<Result<Vec<_>, _>>()?;
    tracing::debug!("read {} BEDPE rows", rows.len());

    let records = rows.into_iter().enumerate().map(|(record_no, row)| {
        let mut record = BedpeRecord::from_row(row)?;
        if record.name.is_none() {
            record.name = Some(synthetic_id(SvCaller::Bedpe, record_no));
        }
        Ok::<_, Error>(record)
    });
    Ok(build_store(
        &BedpeNormalizer,
        MetaCatalog {
            fileformat: Some(String::from(header::DEFAULT_FILE_FORMAT)),
            ..Default::default()
        },
        records,
    )?)
}

/// Read a (possibly gzip-compressed) BEDPE file.
pub fn read_bedpe<P: AsRef<Path>>(path: P) -> Result<TableStore, anyhow::Error> {
    tracing::info!("reading BEDPE {:?}", path.as_ref());
    let reader = open_read_maybe_gz(path.as_ref())?;
    read_bedpe_from(reader)
        .with_context(|| format!("could not read {}", path.as_ref().display()))
}
