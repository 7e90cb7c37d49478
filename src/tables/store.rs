//! The relational store of position, INFO, FILTER and FORMAT tables.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::Serialize;

use super::{
    meta::{InfoMeta, MetaCatalog},
    schema::{
        names, FieldType, FilterRow, FormatRow, IdSet, InfoRow, InfoTable, Number, Position,
        SvId, Table, Value,
    },
};
use crate::{common::SvCaller, err::Error, ingest::normalize::NormalizedRecord};

/// Description used for INFO declarations that were not in the header.
pub const INFERRED_DESCRIPTION: &str = "Inferred from table values";

/// All tables of one call set, keyed by SV identifier.
///
/// INFO tables are kept in insertion order under their lowercase name.
/// Every id has exactly one position row and at least one FILTER row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableStore {
    pub(crate) caller: SvCaller,
    pub(crate) positions: IndexMap<SvId, Position>,
    pub(crate) infos: IndexMap<String, InfoTable>,
    pub(crate) filters: Vec<FilterRow>,
    pub(crate) formats: Vec<FormatRow>,
    pub(crate) meta: MetaCatalog,
    /// INFO keys as spelled in the input, by lowercase table name.
    #[serde(skip)]
    pub(crate) info_keys: IndexMap<String, String>,
}

impl TableStore {
    /// Create an empty store for the given caller and header metadata.
    pub fn new(caller: SvCaller, meta: MetaCatalog) -> Self {
        Self {
            caller,
            positions: IndexMap::new(),
            infos: IndexMap::new(),
            filters: Vec::new(),
            formats: Vec::new(),
            meta,
            info_keys: IndexMap::new(),
        }
    }

    pub fn caller(&self) -> SvCaller {
        self.caller
    }

    pub fn meta(&self) -> &MetaCatalog {
        &self.meta
    }

    /// Position rows in input order.
    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn position(&self, id: &str) -> Option<&Position> {
        self.positions.get(id)
    }

    pub fn filters(&self) -> &[FilterRow] {
        &self.filters
    }

    pub fn formats(&self) -> &[FormatRow] {
        &self.formats
    }

    /// Number of SV records.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// All identifiers as a set.
    pub fn get_ids(&self) -> IdSet {
        self.positions.keys().cloned().collect()
    }

    /// All identifiers in input order.
    pub fn ids(&self) -> impl Iterator<Item = &SvId> {
        self.positions.keys()
    }

    pub fn sample_names(&self) -> Vec<String> {
        self.meta.sample_names()
    }

    /// Lowercase INFO table names in insertion order.
    pub fn info_names(&self) -> Vec<String> {
        self.infos.keys().cloned().collect()
    }

    /// Names of all tables, fixed ones first.
    pub fn table_names(&self) -> Vec<String> {
        names::FIXED
            .iter()
            .map(|name| name.to_string())
            .chain(self.infos.keys().cloned())
            .collect()
    }

    /// Add the rows of one normalized record.
    ///
    /// Fails without touching the store when the id is already taken.
    pub fn push_record(&mut self, record: NormalizedRecord) -> Result<(), Error> {
        let id = record.position.id.clone();
        if self.positions.contains_key(&id) {
            return Err(Error::record(id, "duplicate SV identifier"));
        }

        if record.filters.is_empty() {
            self.filters.push(FilterRow::new(id.as_str(), "PASS"));
        } else {
            self.filters.extend(
                record
                    .filters
                    .into_iter()
                    .map(|filter| FilterRow::new(id.as_str(), filter)),
            );
        }

        for (key, values) in record.infos {
            let name = key.to_ascii_lowercase();
            if !self.info_keys.contains_key(&name) {
                match record.info_keys.get(&name) {
                    Some(spelled) => {
                        self.info_keys.insert(name.clone(), spelled.clone());
                    }
                    None if key != name => {
                        self.info_keys.insert(name.clone(), key);
                    }
                    None => {}
                }
            }
            if !self.infos.contains_key(&name) {
                self.infos.insert(name.clone(), InfoTable::new(&name));
            }
            if let Some(table) = self.infos.get_mut(&name) {
                table.rows.extend(
                    values
                        .into_iter()
                        .enumerate()
                        .map(|(idx, value)| InfoRow::new(id.as_str(), idx, value)),
                );
            }
        }

        for (sample, fields) in record.formats {
            for (format, values) in fields {
                self.formats
                    .extend(values.into_iter().enumerate().map(|(value_idx, value)| {
                        FormatRow {
                            id: id.clone(),
                            sample: sample.clone(),
                            format: format.clone(),
                            value_idx,
                            value,
                        }
                    }));
            }
        }

        self.positions.insert(id, record.position);
        Ok(())
    }

    /// Create empty tables for declared INFO fields and declarations for
    /// tables that were never declared.
    pub fn sync_info_meta(&mut self) {
        let declared = self
            .meta
            .infos
            .iter()
            .map(|meta| meta.id.to_ascii_lowercase())
            .collect::<Vec<_>>();
        for name in declared {
            if !self.infos.contains_key(&name) {
                self.infos.insert(name.clone(), InfoTable::new(&name));
            }
        }

        let undeclared = self
            .infos
            .values()
            .filter(|table| self.meta.info(&table.name).is_none())
            .map(|table| infer_info_meta(table, &self.spelled_key(&table.name)))
            .collect::<Vec<_>>();
        for meta in undeclared {
            tracing::debug!("INFO {} not declared in header, inferring", &meta.id);
            self.meta.push_info(meta);
        }
    }

    /// INFO key of a table as spelled in the input, uppercase if unknown.
    pub fn spelled_key(&self, name: &str) -> String {
        let name = name.to_ascii_lowercase();
        self.info_keys
            .get(&name)
            .cloned()
            .unwrap_or_else(|| name.to_ascii_uppercase())
    }

    /// Copy of the table called `name`.
    pub fn get_table(&self, name: &str) -> Result<Table, Error> {
        Ok(match name {
            names::POSITIONS => Table::Positions(self.positions.values().cloned().collect()),
            names::FILTERS => Table::Filters(self.filters.clone()),
            names::FORMATS => Table::Formats(self.formats.clone()),
            names::CONTIGS_META => Table::ContigsMeta(self.meta.contigs.clone()),
            names::INFOS_META => Table::InfosMeta(self.meta.infos.clone()),
            names::FORMATS_META => Table::FormatsMeta(self.meta.formats.clone()),
            names::FILTERS_META => Table::FiltersMeta(self.meta.filters.clone()),
            names::ALTS_META => Table::AltsMeta(self.meta.alts.clone()),
            names::SAMPLES_META => Table::SamplesMeta(self.meta.samples.clone()),
            _ => Table::Info(
                self.infos
                    .get(&name.to_ascii_lowercase())
                    .cloned()
                    .ok_or_else(|| Error::TableNotFound(name.to_string()))?,
            ),
        })
    }

    /// INFO table by case-insensitive name.
    pub fn get_info(&self, name: &str) -> Result<&InfoTable, Error> {
        self.info(name)
            .ok_or_else(|| Error::InfoNotFound(name.to_string()))
    }

    pub fn info(&self, name: &str) -> Option<&InfoTable> {
        self.infos.get(&name.to_ascii_lowercase())
    }

    pub fn has_info(&self, name: &str) -> bool {
        self.infos.contains_key(&name.to_ascii_lowercase())
    }

    /// Register an INFO table, replacing an existing one of the same name.
    ///
    /// A declaration is inferred from the values if none exists.
    pub fn add_info_table(&mut self, name: &str, mut table: InfoTable) {
        let name = name.to_ascii_lowercase();
        table.name = name.clone();
        if self.meta.info(&name).is_none() {
            let key = self.spelled_key(&name);
            self.meta.push_info(infer_info_meta(&table, &key));
        }
        self.infos.insert(name, table);
    }

    /// Register or replace the declaration of an INFO field.
    pub fn add_info_meta(&mut self, meta: InfoMeta) {
        self.meta.push_info(meta);
    }

    /// Remove an INFO table together with its declaration.
    pub fn remove_info_table(&mut self, name: &str) -> Result<InfoTable, Error> {
        let table = self
            .infos
            .shift_remove(&name.to_ascii_lowercase())
            .ok_or_else(|| Error::InfoNotFound(name.to_string()))?;
        self.meta.remove_info(name);
        Ok(table)
    }

    /// Swap the table called `name` for `table` of the same kind.
    pub fn replace_table(&mut self, name: &str, table: Table) -> Result<(), Error> {
        let mismatch = |table: &Table| {
            Error::table(
                name,
                format!("cannot replace with {} rows of another kind", table.len()),
            )
        };
        match (name, table) {
            (names::POSITIONS, Table::Positions(rows)) => {
                self.positions = rows.into_iter().map(|row| (row.id.clone(), row)).collect();
            }
            (names::FILTERS, Table::Filters(rows)) => self.filters = rows,
            (names::FORMATS, Table::Formats(rows)) => self.formats = rows,
            (names::CONTIGS_META, Table::ContigsMeta(rows)) => self.meta.contigs = rows,
            (names::INFOS_META, Table::InfosMeta(rows)) => self.meta.infos = rows,
            (names::FORMATS_META, Table::FormatsMeta(rows)) => self.meta.formats = rows,
            (names::FILTERS_META, Table::FiltersMeta(rows)) => self.meta.filters = rows,
            (names::ALTS_META, Table::AltsMeta(rows)) => self.meta.alts = rows,
            (names::SAMPLES_META, Table::SamplesMeta(rows)) => self.meta.samples = rows,
            (name, table) if names::FIXED.contains(&name) => return Err(mismatch(&table)),
            (name, Table::Info(mut info)) => {
                let slot = self
                    .infos
                    .get_mut(&name.to_ascii_lowercase())
                    .ok_or_else(|| Error::TableNotFound(name.to_string()))?;
                info.name = slot.name.clone();
                *slot = info;
            }
            (name, table) => {
                if !self.has_info(name) {
                    return Err(Error::TableNotFound(name.to_string()));
                }
                return Err(mismatch(&table));
            }
        }
        Ok(())
    }

    /// New store restricted to `ids` in every table.
    pub fn filter_by_id(&self, ids: &IdSet) -> TableStore {
        self.retain_ids(|id| ids.contains(id))
    }

    /// New store without `ids` in any table.
    pub fn drop_by_id(&self, ids: &IdSet) -> TableStore {
        self.retain_ids(|id| !ids.contains(id))
    }

    fn retain_ids<F>(&self, keep: F) -> TableStore
    where
        F: Fn(&str) -> bool,
    {
        TableStore {
            caller: self.caller,
            positions: self
                .positions
                .iter()
                .filter(|(id, _)| keep(id))
                .map(|(id, row)| (id.clone(), row.clone()))
                .collect(),
            infos: self
                .infos
                .iter()
                .map(|(name, table)| {
                    let rows = table
                        .rows
                        .iter()
                        .filter(|row| keep(&row.id))
                        .cloned()
                        .collect();
                    (name.clone(), InfoTable::with_rows(name, rows))
                })
                .collect(),
            filters: self
                .filters
                .iter()
                .filter(|row| keep(&row.id))
                .cloned()
                .collect(),
            formats: self
                .formats
                .iter()
                .filter(|row| keep(&row.id))
                .cloned()
                .collect(),
            meta: self.meta.clone(),
            info_keys: self.info_keys.clone(),
        }
    }

    /// Upsert one INFO cell, a `false` flag deletes the cell.
    pub fn set_value_for_info_by_id(
        &mut self,
        name: &str,
        id: &str,
        value_idx: usize,
        value: Value,
    ) -> Result<(), Error> {
        if !self.positions.contains_key(id) {
            return Err(Error::record(id, "unknown SV identifier"));
        }
        let table = self
            .infos
            .get_mut(&name.to_ascii_lowercase())
            .ok_or_else(|| Error::InfoNotFound(name.to_string()))?;
        if value == Value::Flag(false) {
            table
                .rows
                .retain(|row| !(row.id == id && row.value_idx == value_idx));
        } else {
            table.upsert(id, value_idx, value);
        }
        Ok(())
    }

    /// Replace the identifier `old` by `new` in every table.
    pub fn replace_svid(&mut self, old: &str, new: &str) -> Result<(), Error> {
        if !self.positions.contains_key(old) {
            return Err(Error::record(old, "unknown SV identifier"));
        }
        if old != new && self.positions.contains_key(new) {
            return Err(Error::record(new, "duplicate SV identifier"));
        }
        let mapping = HashMap::from([(old.to_string(), new.to_string())]);
        self.rename_ids(&mapping);
        Ok(())
    }

    /// Rename ids store-wide, ids missing from `mapping` are kept.
    ///
    /// The caller guarantees that the renamed ids stay unique.
    pub(crate) fn rename_ids(&mut self, mapping: &HashMap<SvId, SvId>) {
        let rename = |id: &SvId| mapping.get(id).cloned().unwrap_or_else(|| id.clone());

        self.positions = std::mem::take(&mut self.positions)
            .into_iter()
            .map(|(id, row)| {
                let id = rename(&id);
                (id.clone(), Position { id, ..row })
            })
            .collect();
        for table in self.infos.values_mut() {
            for row in table.rows.iter_mut() {
                row.id = rename(&row.id);
            }
        }
        for row in self.filters.iter_mut() {
            row.id = rename(&row.id);
        }
        for row in self.formats.iter_mut() {
            row.id = rename(&row.id);
        }
    }

    /// Concatenate stores with disjoint identifiers.
    ///
    /// The metadata of later stores is merged into that of the first.
    pub fn concat<I>(stores: I) -> Result<TableStore, Error>
    where
        I: IntoIterator<Item = TableStore>,
    {
        let mut stores = stores.into_iter();
        let mut result = match stores.next() {
            Some(store) => store,
            None => return Ok(TableStore::new(SvCaller::default(), MetaCatalog::default())),
        };
        for store in stores {
            if let Some(id) = store
                .positions
                .keys()
                .find(|id| result.positions.contains_key(*id))
            {
                return Err(Error::record(id.as_str(), "duplicate SV identifier"));
            }
            result.meta.merge(&store.meta);
            for (name, key) in store.info_keys {
                result.info_keys.entry(name).or_insert(key);
            }
            result.positions.extend(store.positions);
            result.filters.extend(store.filters);
            result.formats.extend(store.formats);
            for (name, table) in store.infos {
                match result.infos.get_mut(&name) {
                    Some(existing) => existing.rows.extend(table.rows),
                    None => {
                        result.infos.insert(name, table);
                    }
                }
            }
        }
        Ok(result)
    }
}

/// Declaration for an INFO table without one.
///
/// Tables with value index 0 only get `Number=1`, others `Number=.`.
pub fn infer_info_meta(table: &InfoTable, key: &str) -> InfoMeta {
    let number = match table.max_value_idx() {
        Some(0) => Number::Count(1),
        _ => Number::Unknown,
    };
    let field_type = infer_field_type(table.rows.iter().map(|row| &row.value));
    let number = if field_type == FieldType::Flag {
        Number::Count(0)
    } else {
        number
    };
    InfoMeta::new(key, number, field_type, INFERRED_DESCRIPTION)
}

/// Common type of all values, widening integer to float and anything
/// heterogeneous to string.
pub fn infer_field_type<'a, I>(values: I) -> FieldType
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut result: Option<FieldType> = None;
    for value in values {
        let this = FieldType::of_value(value);
        result = Some(match (result, this) {
            (None, this) => this,
            (Some(prev), this) if prev == this => prev,
            (Some(FieldType::Integer), FieldType::Float)
            | (Some(FieldType::Float), FieldType::Integer) => FieldType::Float,
            _ => FieldType::String,
        });
    }
    result.unwrap_or_default()
}

#[cfg(test)]
pub(crate) mod test {
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::tables::schema::Strand;

    pub(crate) fn record(id: &str, chrom: &str, pos: i64, svtype: &str) -> NormalizedRecord {
        NormalizedRecord {
            position: Position {
                id: id.to_string(),
                chrom1: chrom.to_string(),
                pos1: pos,
                chrom2: Some(chrom.to_string()),
                pos2: Some(pos + 100),
                strand1: Strand::Plus,
                strand2: Strand::Minus,
                reference: "N".to_string(),
                alt: format!("<{}>", svtype),
                qual: None,
                svtype: svtype.to_string(),
            },
            filters: vec![],
            infos: IndexMap::from([
                ("SVTYPE".to_string(), vec![Value::from(svtype)]),
                ("SVLEN".to_string(), vec![Value::Integer(-100)]),
            ]),
            info_keys: IndexMap::new(),
            formats: IndexMap::new(),
        }
    }

    pub(crate) fn store() -> TableStore {
        let mut store = TableStore::new(SvCaller::Manta, MetaCatalog::default());
        let mut sv1 = record("sv1", "chr1", 100, "DEL");
        sv1.filters = vec!["MinQUAL".to_string(), "Ploidy".to_string()];
        sv1.infos
            .insert("IMPRECISE".to_string(), vec![Value::Flag(true)]);
        store.push_record(sv1).unwrap();
        store.push_record(record("sv2", "chr1", 1000, "DUP")).unwrap();
        store.push_record(record("sv3", "chr2", 500, "DEL")).unwrap();
        store.sync_info_meta();
        store
    }

    #[test]
    fn push_record_builds_tables() {
        let store = store();

        assert_eq!(store.len(), 3);
        assert_eq!(store.info_names(), vec!["svtype", "svlen", "imprecise"]);
        assert_eq!(
            store.filters(),
            &[
                FilterRow::new("sv1", "MinQUAL"),
                FilterRow::new("sv1", "Ploidy"),
                FilterRow::new("sv2", "PASS"),
                FilterRow::new("sv3", "PASS"),
            ]
        );
        assert_eq!(store.get_info("IMPRECISE").unwrap().ids(), IdSet::from(["sv1".into()]));
        let meta = store.meta().info("svlen").unwrap();
        assert_eq!(meta.number, Number::Count(1));
        assert_eq!(meta.field_type, FieldType::Integer);
        assert_eq!(store.meta().info("imprecise").unwrap().field_type, FieldType::Flag);
    }

    #[test]
    fn undeclared_keys_keep_spelling() {
        let mut store = TableStore::new(SvCaller::Delly, MetaCatalog::default());
        let mut sv1 = record("sv1", "chr1", 100, "DEL");
        sv1.infos.insert("pe".to_string(), vec![Value::Integer(3)]);
        sv1.infos.insert("svmethod".to_string(), vec![Value::from("EMBL")]);
        sv1.info_keys
            .insert("svmethod".to_string(), "SVMETHOD".to_string());
        store.push_record(sv1).unwrap();
        store.sync_info_meta();

        assert_eq!(store.meta().info("svtype").unwrap().id, "SVTYPE");
        assert_eq!(store.meta().info("svmethod").unwrap().id, "SVMETHOD");
        assert_eq!(store.meta().info("pe").unwrap().id, "PE");

        store.add_info_table(
            "Score",
            InfoTable::with_rows("score", vec![InfoRow::new("sv1", 0, Value::Float(0.5))]),
        );
        assert_eq!(store.meta().info("score").unwrap().id, "SCORE");
    }

    #[test]
    fn push_record_rejects_duplicate() {
        let mut store = store();
        let err = store.push_record(record("sv1", "chr1", 1, "DEL")).unwrap_err();
        assert_eq!(err, Error::record("sv1", "duplicate SV identifier"));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn get_table_not_found() {
        let store = store();
        assert_eq!(
            store.get_table("nope"),
            Err(Error::TableNotFound("nope".into()))
        );
        assert!(matches!(store.get_table("SVLEN"), Ok(Table::Info(_))));
        assert!(matches!(store.get_table("positions"), Ok(Table::Positions(rows)) if rows.len() == 3));
    }

    #[test]
    fn filter_by_id_leaves_no_orphans() {
        let store = store();
        let ids = IdSet::from(["sv1".to_string(), "sv3".to_string()]);
        let filtered = store.filter_by_id(&ids);

        assert_eq!(filtered.get_ids(), ids);
        for name in filtered.table_names() {
            if let Some(table_ids) = filtered.get_table(&name).unwrap().ids() {
                assert!(table_ids.is_subset(&ids), "orphans in {}", name);
            }
        }
        assert_eq!(filtered.info_names(), store.info_names());

        let dropped = store.drop_by_id(&ids);
        assert_eq!(dropped.get_ids(), IdSet::from(["sv2".to_string()]));
    }

    #[test]
    fn add_and_remove_info_table() {
        let mut store = store();
        store.add_info_table(
            "Score",
            InfoTable::with_rows("score", vec![InfoRow::new("sv1", 0, Value::Float(0.5))]),
        );
        assert_eq!(store.meta().info("score").unwrap().field_type, FieldType::Float);

        store.remove_info_table("score").unwrap();
        assert!(store.meta().info("score").is_none());
        assert_eq!(
            store.remove_info_table("score"),
            Err(Error::InfoNotFound("score".into()))
        );
    }

    #[test]
    fn replace_table() {
        let mut store = store();
        store
            .replace_table("filters", Table::Filters(vec![FilterRow::new("sv1", "PASS")]))
            .unwrap();
        assert_eq!(store.filters().len(), 1);

        assert!(matches!(
            store.replace_table("filters", Table::Positions(vec![])),
            Err(Error::InvalidTable { .. })
        ));
        assert_eq!(
            store.replace_table("nope", Table::Info(InfoTable::new("nope"))),
            Err(Error::TableNotFound("nope".into()))
        );
    }

    #[test]
    fn set_value_for_info_by_id() {
        let mut store = store();
        store
            .set_value_for_info_by_id("imprecise", "sv2", 0, Value::Flag(true))
            .unwrap();
        assert_eq!(store.get_info("imprecise").unwrap().len(), 2);

        store
            .set_value_for_info_by_id("imprecise", "sv1", 0, Value::Flag(false))
            .unwrap();
        assert_eq!(
            store.get_info("imprecise").unwrap().ids(),
            IdSet::from(["sv2".to_string()])
        );

        store
            .set_value_for_info_by_id("svlen", "sv2", 0, Value::Integer(-5))
            .unwrap();
        assert_eq!(
            store.get_info("svlen").unwrap().value("sv2", 0),
            Some(&Value::Integer(-5))
        );
    }

    #[test]
    fn replace_svid() {
        let mut store = store();
        store.replace_svid("sv1", "del1").unwrap();

        assert!(store.position("sv1").is_none());
        assert_eq!(store.position("del1").unwrap().id, "del1");
        assert_eq!(store.ids().next().map(String::as_str), Some("del1"));
        assert!(store.filters().iter().all(|row| row.id != "sv1"));
        assert!(store.replace_svid("sv2", "sv3").is_err());
    }

    #[test]
    fn concat_disjoint() {
        let lhs = store().filter_by_id(&IdSet::from(["sv1".to_string()]));
        let rhs = store().drop_by_id(&IdSet::from(["sv1".to_string()]));
        let both = TableStore::concat(vec![lhs.clone(), rhs]).unwrap();
        assert_eq!(both.get_ids(), store().get_ids());

        assert!(TableStore::concat(vec![lhs.clone(), lhs]).is_err());
    }

    #[rstest::rstest]
    #[case(vec![Value::Integer(1), Value::Integer(2)], FieldType::Integer)]
    #[case(vec![Value::Integer(1), Value::Float(2.5)], FieldType::Float)]
    #[case(vec![Value::Integer(1), Value::from("x")], FieldType::String)]
    #[case(vec![], FieldType::String)]
    fn infer_field_type(#[case] values: Vec<Value>, #[case] expected: FieldType) {
        assert_eq!(expected, super::infer_field_type(values.iter()));
    }
}
