//! Manual SV type classification from named query sets.

use std::{collections::HashMap, io::BufRead, path::Path};

use crate::{
    common::io::open_read_maybe_gz,
    err::Error,
    query::{QueryEngine, QueryLogic},
    tables::{
        meta::InfoMeta,
        schema::{FieldType, InfoRow, InfoTable, Number, Value},
        TableStore,
    },
};

/// INFO table holding the assigned manual SV type.
pub const MANUAL_SV_TYPE: &str = "manual_sv_type";

/// Name assigned to records matching no definition.
pub const OTHERS: &str = "others";

/// One named SV type: records selected by `queries` combined with `logic`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ManualSvTypeDefinition {
    pub name: String,
    pub queries: Vec<String>,
    pub logic: String,
}

/// Parse blank-line separated definition blocks.
///
/// ```text
/// name 'small_del'
/// 0 svtype == DEL
/// 1 svlen > -100
/// logic 0 & 1
/// ```
///
/// Queries are numbered from 0 in order, `logic` defaults to `and`.
pub fn parse_definitions(text: &str) -> Result<Vec<ManualSvTypeDefinition>, Error> {
    let invalid = |line: &str, msg: &str| Error::query(line, msg);

    let mut result = Vec::new();
    let mut current: Option<ManualSvTypeDefinition> = None;
    for line in text.lines().map(str::trim) {
        if line.starts_with('#') {
            continue;
        }
        if line.is_empty() {
            result.extend(current.take());
            continue;
        }
        let (key, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        match key {
            "name" => {
                result.extend(current.take());
                current = Some(ManualSvTypeDefinition {
                    name: rest.trim_matches(|c| c == '\'' || c == '"').to_string(),
                    queries: Vec::new(),
                    logic: String::from("and"),
                });
            }
            "logic" => {
                current
                    .as_mut()
                    .ok_or_else(|| invalid(line, "logic before name"))?
                    .logic = rest.to_string();
            }
            idx => {
                let definition = current
                    .as_mut()
                    .ok_or_else(|| invalid(line, "query before name"))?;
                if idx.parse::<usize>().ok() != Some(definition.queries.len()) {
                    return Err(invalid(
                        line,
                        &format!("expected query number {}", definition.queries.len()),
                    ));
                }
                definition.queries.push(rest.to_string());
            }
        }
    }
    result.extend(current);
    Ok(result)
}

/// Read definitions from a (possibly gzip-compressed) file.
pub fn read_definitions<P: AsRef<Path>>(
    path: P,
) -> Result<Vec<ManualSvTypeDefinition>, anyhow::Error> {
    let mut text = String::new();
    for line in open_read_maybe_gz(path.as_ref())?.lines() {
        text.push_str(&line?);
        text.push('\n');
    }
    Ok(parse_definitions(&text)?)
}

impl TableStore {
    /// Assign each record the name of the first matching definition, or
    /// `others`, in the String table `manual_sv_type`.
    pub fn classify_manual_svtype(
        &self,
        definitions: &[ManualSvTypeDefinition],
    ) -> Result<TableStore, Error> {
        let engine = QueryEngine::new(self);
        let matches = definitions
            .iter()
            .map(|definition| {
                let logic = definition.logic.parse::<QueryLogic>()?;
                engine.filter_ids(definition.queries.as_slice(), &logic)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let rows = self
            .ids()
            .map(|id| {
                let name = definitions
                    .iter()
                    .zip(&matches)
                    .find(|(_, ids)| ids.contains(id))
                    .map(|(definition, _)| definition.name.as_str())
                    .unwrap_or(OTHERS);
                InfoRow::new(id.as_str(), 0, Value::from(name))
            })
            .collect::<Vec<_>>();

        let mut result = self.clone();
        result.add_info_meta(InfoMeta::new(
            MANUAL_SV_TYPE,
            Number::Count(1),
            FieldType::String,
            "Manually defined SV type",
        ));
        result.add_info_table(MANUAL_SV_TYPE, InfoTable::with_rows(MANUAL_SV_TYPE, rows));
        Ok(result)
    }

    /// Number of records per manual SV type, in order of first occurrence.
    pub fn get_manual_sv_type_counts(&self) -> Result<Vec<(String, usize)>, Error> {
        let table = self.get_info(MANUAL_SV_TYPE)?;
        let mut order = Vec::new();
        let mut counts = HashMap::new();
        for row in table.rows.iter().filter(|row| row.value_idx == 0) {
            let name = row.value.to_string();
            let count = counts.entry(name.clone()).or_insert(0);
            if *count == 0 {
                order.push(name);
            }
            *count += 1;
        }
        Ok(order
            .into_iter()
            .map(|name| {
                let count = counts.get(&name).copied().unwrap_or_default();
                (name, count)
            })
            .collect())
    }
}
