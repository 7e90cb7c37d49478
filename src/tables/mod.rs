//! Relational tables of SV calls.

pub mod breakpoint;
pub mod meta;
pub mod schema;
pub mod store;

pub use meta::MetaCatalog;
pub use schema::{IdSet, InfoTable, Position, Strand, SvId, Table, Value};
pub use store::TableStore;
