//! Consolidation of mated breakends into breakpoints.

use std::collections::HashMap;

use super::{
    meta::InfoMeta,
    schema::{FieldType, IdSet, InfoRow, InfoTable, Number, Position, Strand, SvId, Value},
    TableStore,
};
use crate::{
    common::SvCaller,
    err::Error,
    ingest::normalize::{info, parse_breakend_alt},
};

/// Prefix of the ids assigned to consolidated breakpoints.
pub const BREAKPOINT_PREFIX: &str = "breakpoint:";

/// SV type of a breakend given whether it has a usable mate.
///
/// `inserted_len` is the length of the sequence inserted at the junction.
pub fn classify_breakend(position: &Position, has_mate: bool, inserted_len: usize) -> &'static str {
    let (chrom2, pos2) = match (&position.chrom2, position.pos2) {
        (Some(chrom2), Some(pos2)) if has_mate => (chrom2, pos2),
        _ => return "BND",
    };
    let (pos1, strand1, strand2) = (position.pos1, position.strand1, position.strand2);

    if *chrom2 != position.chrom1 {
        "TRA"
    } else if strand1 == strand2 && strand1.is_known() {
        "INV"
    } else if 2 * inserted_len as i64 > (pos2 - pos1).abs() {
        "INS"
    } else if (pos1 < pos2 && strand1 == Strand::Minus && strand2 == Strand::Plus)
        || (pos1 > pos2 && strand1 == Strand::Plus && strand2 == Strand::Minus)
    {
        "DUP"
    } else {
        "DEL"
    }
}

/// Outcome of pairing the breakends of one store.
#[derive(Debug, Default)]
struct Pairing {
    /// Original id to breakpoint id.
    renamed: HashMap<SvId, SvId>,
    /// Breakpoint id to SV type.
    svtypes: HashMap<SvId, String>,
    /// Rows of the `orgbeid` table.
    origins: Vec<InfoRow>,
    /// Consumed mates and dropped secondary breakends.
    skipped: IdSet,
}

fn pair_breakends(store: &TableStore) -> Pairing {
    let mates = store
        .info(info::MATEID)
        .filter(|_| store.caller.reports_mates())
        .map(|table| {
            table
                .rows
                .iter()
                .filter(|row| row.value_idx == 0)
                .filter_map(|row| row.value.as_str().map(|mate| (row.id.clone(), mate.to_string())))
                .collect::<HashMap<_, _>>()
        })
        .unwrap_or_default();
    let secondary = match store.caller {
        SvCaller::Lumpy => store
            .info(info::SECONDARY)
            .map(InfoTable::ids)
            .unwrap_or_default(),
        _ => IdSet::new(),
    };

    let mut pairing = Pairing {
        skipped: secondary.clone(),
        ..Default::default()
    };
    let mut emitted = IdSet::new();
    let mut consumed = IdSet::new();
    for position in store.positions().filter(|position| position.svtype == "BND") {
        if secondary.contains(&position.id) || consumed.contains(&position.id) {
            continue;
        }
        let mate = mates.get(&position.id).filter(|mate| {
            *mate != &position.id
                && !emitted.contains(*mate)
                && !consumed.contains(*mate)
                && store
                    .position(mate)
                    .map(|mate| mate.svtype == "BND")
                    .unwrap_or(false)
        });
        if mates.contains_key(&position.id) && mate.is_none() {
            tracing::debug!("breakend {} has no usable mate", &position.id);
        }
        let inserted_len = parse_breakend_alt(&position.alt)
            .map(|alt| alt.inserted_len())
            .unwrap_or(0);
        let svtype = classify_breakend(position, mate.is_some(), inserted_len);

        let breakpoint = format!("{}{}", BREAKPOINT_PREFIX, pairing.renamed.len());
        pairing
            .origins
            .push(InfoRow::new(breakpoint.as_str(), 0, Value::from(position.id.as_str())));
        if let Some(mate) = mate {
            pairing
                .origins
                .push(InfoRow::new(breakpoint.as_str(), 1, Value::from(mate.as_str())));
            pairing.skipped.insert(mate.clone());
            consumed.insert(mate.clone());
        }
        pairing.svtypes.insert(breakpoint.clone(), svtype.to_string());
        pairing.renamed.insert(position.id.clone(), breakpoint);
        emitted.insert(position.id.clone());
    }
    pairing
}

/// Set the SV type in the position table and the `svtype` INFO table.
///
/// Ids without `svtype` row get one appended in position order.
fn set_svtypes(store: &mut TableStore, svtypes: &HashMap<SvId, String>) {
    for (id, svtype) in svtypes {
        if let Some(position) = store.positions.get_mut(id) {
            position.svtype = svtype.clone();
        }
    }
    let table = match store.infos.get_mut(info::SVTYPE) {
        Some(table) => table,
        None => return,
    };

    let mut updated = IdSet::new();
    for row in table.rows.iter_mut().filter(|row| row.value_idx == 0) {
        if let Some(svtype) = svtypes.get(&row.id) {
            row.value = Value::from(svtype.as_str());
            updated.insert(row.id.clone());
        }
    }
    let missing = store
        .positions
        .keys()
        .filter(|id| !updated.contains(*id))
        .filter_map(|id| {
            svtypes
                .get(id)
                .map(|svtype| InfoRow::new(id.as_str(), 0, Value::from(svtype.as_str())))
        })
        .collect::<Vec<_>>();
    table.rows.extend(missing);
}

impl TableStore {
    /// Collapse mated breakends into one breakpoint record each.
    ///
    /// Every breakend gets the id `breakpoint:<n>` in input order, mates are
    /// dropped and the original ids are kept in the `orgbeid` table. The
    /// `mateid` and `parid` tables go away as they name consumed breakends.
    /// Delly breakends are relabelled `TRA` without pairing.
    pub fn breakend2breakpoint(&self) -> Result<TableStore, Error> {
        if self.caller == SvCaller::Delly {
            let svtypes = self
                .positions()
                .filter(|position| position.svtype == "BND")
                .map(|position| (position.id.clone(), String::from("TRA")))
                .collect::<HashMap<_, _>>();
            tracing::info!("relabelling {} Delly breakends as TRA", svtypes.len());
            let mut result = self.clone();
            set_svtypes(&mut result, &svtypes);
            return Ok(result);
        }

        let pairing = pair_breakends(self);
        tracing::info!(
            "consolidated {} breakends into {} breakpoints",
            pairing.renamed.len() + pairing.skipped.len(),
            pairing.renamed.len()
        );

        let mut result = self.drop_by_id(&pairing.skipped);
        result.rename_ids(&pairing.renamed);
        set_svtypes(&mut result, &pairing.svtypes);

        result.add_info_meta(InfoMeta::new(
            "ORGBEID",
            Number::Unknown,
            FieldType::String,
            "Original breakend IDs",
        ));
        result.add_info_table(
            info::ORGBEID,
            InfoTable::with_rows(info::ORGBEID, pairing.origins),
        );
        for name in [info::MATEID, info::PARID, info::SECONDARY] {
            if result.has_info(name) && (name != info::SECONDARY || self.caller == SvCaller::Lumpy)
            {
                result.remove_info_table(name)?;
            }
        }
        Ok(result)
    }
}
