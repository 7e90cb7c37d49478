//! Normalized relational tables for structural variant calls.
//!
//! VCF files of Manta, Delly, LUMPY and GRIDSS as well as BEDPE files are
//! read into a [`TableStore`]: one position table plus one table per INFO
//! field, FILTER and FORMAT rows, and the header metadata. Stores can be
//! filtered with small queries, breakends can be consolidated into
//! breakpoints, and stores can be written back as VCF or BEDPE.

pub mod annotate;
pub mod classify;
pub mod cohort;
pub mod common;
pub mod convert;
pub mod err;
pub mod ingest;
pub mod query;
pub mod tables;

pub use common::SvCaller;
pub use err::Error;
pub use ingest::{read_bedpe, read_vcf};
pub use tables::TableStore;
