//! Behaviour of the public API on the fixture files.

use std::collections::BTreeSet;

use pretty_assertions::assert_eq;

use svtables::{
    read_bedpe, read_vcf,
    tables::{IdSet, Strand, Table, Value},
    SvCaller, TableStore,
};

fn manta() -> TableStore {
    read_vcf("tests/data/manta-min.vcf", None).unwrap()
}

fn ids(store: &TableStore) -> Vec<String> {
    store.ids().cloned().collect()
}

/// Every id referenced by any table.
fn referenced_ids(store: &TableStore) -> IdSet {
    let mut result = IdSet::new();
    for name in store.table_names() {
        if let Ok(table) = store.get_table(&name) {
            result.extend(table.ids().unwrap_or_default());
        }
    }
    result
}

#[test]
fn manta_deletion_and_duplication_loci() {
    let store = manta();

    let del = store.position("MantaDEL:0:1:2:0:0:0").unwrap();
    assert_eq!((del.pos1, del.pos2), (100, Some(201)));
    assert_eq!((del.strand1, del.strand2), (Strand::Plus, Strand::Minus));

    let dup = store.position("MantaDUP:TANDEM:5:0:1:0:0:0").unwrap();
    assert_eq!((dup.pos1, dup.pos2), (1001, Some(2000)));
    assert_eq!((dup.strand1, dup.strand2), (Strand::Minus, Strand::Plus));
}

#[test]
fn manta_mated_breakends_become_translocation() -> Result<(), anyhow::Error> {
    let store = manta();
    assert_eq!(store.caller(), SvCaller::Manta);
    // CIEND of a breakend is the CIPOS of its mate
    assert_eq!(
        store.get_info("ciend")?.values("MantaBND:1:0:1:0:0:0:0"),
        vec![&Value::Integer(-4), &Value::Integer(4)]
    );

    let result = store.breakend2breakpoint()?;
    assert_eq!(result.len(), store.len() - 1);
    let tra = result.position("breakpoint:0").unwrap();
    assert_eq!(tra.svtype, "TRA");
    assert_eq!((tra.chrom1.as_str(), tra.chrom2.as_deref()), ("chr1", Some("chr2")));
    assert_eq!(
        result.get_info("orgbeid")?.values("breakpoint:0"),
        vec![
            &Value::from("MantaBND:1:0:1:0:0:0:0"),
            &Value::from("MantaBND:1:0:1:0:0:0:1")
        ]
    );
    assert!(!result.has_info("mateid"));
    assert!(!referenced_ids(&result).contains("MantaBND:1:0:1:0:0:0:1"));

    Ok(())
}

#[test]
fn consolidation_is_deterministic_and_conserving() -> Result<(), anyhow::Error> {
    for path in [
        "tests/data/manta-min.vcf",
        "tests/data/lumpy-min.vcf",
        "tests/data/gridss-min.vcf",
    ] {
        let store = read_vcf(path, None)?;
        let first = store.breakend2breakpoint()?;
        let second = store.breakend2breakpoint()?;
        assert_eq!(first, second);

        let breakends = store
            .positions()
            .filter(|position| position.svtype == "BND")
            .count();
        let non_breakends = store.len() - breakends;
        let origins = first
            .get_info("orgbeid")?
            .rows
            .iter()
            .map(|row| row.value.to_string())
            .collect::<BTreeSet<_>>();
        assert_eq!(first.len() - non_breakends, first.get_info("orgbeid")?.ids().len());
        assert!(origins.len() <= breakends);
    }

    Ok(())
}

#[test]
fn gridss_breakend_classification() -> Result<(), anyhow::Error> {
    let result = read_vcf("tests/data/gridss-min.vcf", None)?.breakend2breakpoint()?;

    assert_eq!(
        result
            .positions()
            .map(|position| (position.id.as_str(), position.svtype.as_str()))
            .collect::<Vec<_>>(),
        vec![
            ("breakpoint:0", "DEL"),
            ("breakpoint:1", "INS"),
            ("breakpoint:2", "BND"),
        ]
    );

    Ok(())
}

#[test]
fn lumpy_inversion_split_and_secondary() -> Result<(), anyhow::Error> {
    let store = read_vcf("tests/data/lumpy-min.vcf", None)?;
    assert_eq!(ids(&store), vec!["1", "2_1", "2_2", "3_1", "3_2"]);
    assert_eq!(store.get_info("su")?.value("2_1", 0), Some(&Value::Integer(4)));
    assert_eq!(store.get_info("su")?.value("2_2", 0), Some(&Value::Integer(6)));

    let result = store.breakend2breakpoint()?;
    assert_eq!(ids(&result), vec!["1", "2_1", "2_2", "breakpoint:0"]);
    assert_eq!(result.position("breakpoint:0").unwrap().svtype, "TRA");
    assert!(!result.has_info("secondary"));

    Ok(())
}

#[test]
fn delly_translocation_relabelled() -> Result<(), anyhow::Error> {
    let store = read_vcf("tests/data/delly-min.vcf", None)?;
    assert_eq!(store.caller(), SvCaller::Delly);

    let bnd = store.position("BND00000004").unwrap();
    assert_eq!((bnd.chrom2.as_deref(), bnd.pos2), (Some("2"), Some(60000)));
    assert_eq!((bnd.strand1, bnd.strand2), (Strand::Minus, Strand::Minus));

    let result = store.breakend2breakpoint()?;
    assert_eq!(ids(&result), ids(&store));
    assert_eq!(result.position("BND00000004").unwrap().svtype, "TRA");
    assert_eq!(
        result.get_info("svtype")?.value("BND00000004", 0),
        Some(&Value::from("TRA"))
    );

    Ok(())
}

#[test]
fn filter_and_keeps_small_deletions() -> Result<(), anyhow::Error> {
    let store = manta();
    let result = store.filter(&["svtype == DEL", "svlen > -101"], "and")?;
    assert_eq!(ids(&result), vec!["MantaDEL:0:1:2:0:0:0"]);

    let result = store.filter(&["svtype == DEL", "svlen > -100"], "and")?;
    assert!(result.is_empty());

    Ok(())
}

#[test]
fn filter_is_idempotent() -> Result<(), anyhow::Error> {
    let store = manta();
    let queries = ["svlen > 0", "!IMPRECISE"];

    let once = store.filter(&queries, "and")?;
    let twice = once.filter(&queries, "and")?;
    assert_eq!(once, twice);
    assert_eq!(ids(&once), vec!["MantaINV:3:0:1:0:0:0"]);

    Ok(())
}

#[test]
fn filter_logic_laws() -> Result<(), anyhow::Error> {
    let store = manta();
    let (a, b) = ("svtype == DEL", "PASS");

    let both = store.filter(&[a, b], "and")?;
    let chained = store.filter(&[a], "and")?.filter(&[b], "and")?;
    assert_eq!(ids(&both), ids(&chained));

    let either = store.filter(&[a, b], "or")?;
    let mut union = ids(&store.filter(&[a], "and")?);
    union.extend(ids(&store.filter(&[b], "and")?));
    assert_eq!(
        ids(&either).into_iter().collect::<BTreeSet<_>>(),
        union.into_iter().collect::<BTreeSet<_>>()
    );

    let expr = store.filter(&[a, b], "0 & 1")?;
    assert_eq!(ids(&expr), ids(&both));

    Ok(())
}

#[test]
fn filter_by_id_leaves_no_orphans() {
    let store = manta();
    let keep = ["MantaDEL:0:1:2:0:0:0", "MantaBND:1:0:1:0:0:0:1"]
        .iter()
        .map(|id| id.to_string())
        .collect::<IdSet>();

    let result = store.filter_by_id(&keep);
    assert_eq!(result.len(), 2);
    assert!(referenced_ids(&result).is_subset(&keep));
    assert!(result.formats().iter().all(|row| keep.contains(&row.id)));
    assert!(result.filters().iter().all(|row| keep.contains(&row.id)));
}

#[test]
fn vcf_round_trip() -> Result<(), anyhow::Error> {
    let store = manta();
    let frame = store.to_vcf_like();
    let text = std::fs::read_to_string("tests/data/manta-min.vcf")?;

    let info = frame.column_index("INFO").unwrap();
    for (row, line) in frame
        .rows
        .iter()
        .zip(text.lines().filter(|line| !line.starts_with('#')))
    {
        let expected = line.split('\t').collect::<Vec<_>>();
        let rendered = row
            .iter()
            .map(svtables::tables::schema::Frame::render)
            .collect::<Vec<_>>();
        if expected[4].contains('[') || expected[4].contains(']') {
            continue;
        }
        for (idx, (lhs, rhs)) in expected.iter().zip(&rendered).enumerate() {
            if idx == info {
                assert_eq!(
                    lhs.split(';').collect::<BTreeSet<_>>(),
                    rhs.split(';').collect::<BTreeSet<_>>()
                );
            } else {
                assert_eq!(lhs, rhs);
            }
        }
    }

    Ok(())
}

#[test]
fn bedpe_ingest_and_tables() -> Result<(), anyhow::Error> {
    let store = read_bedpe("tests/data/min.bedpe")?;

    assert_eq!(ids(&store), vec!["del1", "dup1", "inv1", "bedpe_3"]);
    assert_eq!(
        store
            .positions()
            .map(|position| position.svtype.as_str())
            .collect::<Vec<_>>(),
        vec!["DEL", "DUP", "INV", "BND"]
    );
    assert_eq!(
        store.get_info("cipos")?.values("dup1"),
        vec![&Value::Integer(0), &Value::Integer(20)]
    );
    assert_eq!(store.get_info("size")?.value("del1", 0), Some(&Value::Float(100.0)));
    assert_eq!(store.get_info("caller")?.value("inv1", 0), Some(&Value::from("lumpy")));
    let score = store.position("inv1").and_then(|position| position.qual);
    assert!(float_cmp::approx_eq!(f64, score.unwrap_or_default(), 10.0, ulps = 2));

    match store.get_table("positions")? {
        Table::Positions(rows) => assert_eq!(rows.len(), 4),
        _ => panic!("not the position table"),
    }
    assert_eq!(store.filter(&["size >= 1000"], "and")?.len(), 2);

    Ok(())
}
