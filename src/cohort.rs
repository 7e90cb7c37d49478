//! Several patients' stores behind cohort-wide identifiers.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::{
    convert::BedpeLikeOptions,
    err::Error,
    tables::{
        schema::{Frame, SvId, Table, Value},
        TableStore,
    },
};

/// Column of `Cohort::to_bedpe_like` naming the patient.
pub const PATIENT_COLUMN: &str = "patient";

/// Cohort-wide identifier of a patient's record.
pub fn global_id(patient: &str, local_id: &str) -> SvId {
    format!("{}_{}", patient, local_id)
}

/// One row of the patient mapping table.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PatientRow {
    pub id: SvId,
    pub patient: String,
    pub local_id: SvId,
}

/// Per-patient stores, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct Cohort {
    patients: IndexMap<String, TableStore>,
}

impl Cohort {
    /// Build from `(patient, store)` pairs, patient names must be unique.
    pub fn new<I, P>(stores: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (P, TableStore)>,
        P: Into<String>,
    {
        let mut patients = IndexMap::new();
        for (patient, store) in stores {
            let patient = patient.into();
            if patients.contains_key(&patient) {
                return Err(Error::table(PATIENT_COLUMN, format!("duplicate patient {}", patient)));
            }
            patients.insert(patient, store);
        }
        Ok(Self { patients })
    }

    pub fn patient_ids(&self) -> Vec<&str> {
        self.patients.keys().map(String::as_str).collect()
    }

    pub fn store(&self, patient: &str) -> Option<&TableStore> {
        self.patients.get(patient)
    }

    /// Number of records over all patients.
    pub fn len(&self) -> usize {
        self.patients.values().map(TableStore::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mapping of global ids to patient and local id.
    pub fn patient_table(&self) -> Vec<PatientRow> {
        self.patients
            .iter()
            .flat_map(|(patient, store)| {
                store.ids().map(move |local_id| PatientRow {
                    id: global_id(patient, local_id),
                    patient: patient.clone(),
                    local_id: local_id.clone(),
                })
            })
            .collect()
    }

    /// All patients' records in one store, with global ids.
    pub fn merged(&self) -> Result<TableStore, Error> {
        let stores = self.patients.iter().map(|(patient, store)| {
            let mapping = store
                .ids()
                .map(|id| (id.clone(), global_id(patient, id)))
                .collect::<HashMap<_, _>>();
            let mut store = store.clone();
            store.rename_ids(&mapping);
            store
        });
        TableStore::concat(stores)
    }

    /// The table `name` of all patients having it, with global ids.
    pub fn get_table(&self, name: &str) -> Result<Table, Error> {
        let mut result: Option<Table> = None;
        for (patient, store) in &self.patients {
            let table = match store.get_table(name) {
                Ok(table) => table.map_ids(|id| global_id(patient, id)),
                Err(Error::TableNotFound(_)) => continue,
                Err(e) => return Err(e),
            };
            result = Some(match result.take() {
                Some(mut merged) => {
                    merged.extend(table)?;
                    merged
                }
                None => table,
            });
        }
        result.ok_or_else(|| Error::TableNotFound(name.to_string()))
    }

    /// Apply `TableStore::filter` to each patient.
    pub fn filter<S: AsRef<str>>(&self, queries: &[S], logic: &str) -> Result<Cohort, Error> {
        let patients = self
            .patients
            .iter()
            .map(|(patient, store)| Ok((patient.clone(), store.filter(queries, logic)?)))
            .collect::<Result<IndexMap<_, _>, Error>>()?;
        Ok(Self { patients })
    }

    /// BEDPE projection of all patients with a leading `patient` column.
    ///
    /// Columns missing for a patient are left empty.
    pub fn to_bedpe_like(&self, options: &BedpeLikeOptions) -> Result<Frame, Error> {
        let frames = self
            .patients
            .iter()
            .map(|(patient, store)| Ok((patient, store.to_bedpe_like(options)?)))
            .collect::<Result<Vec<_>, Error>>()?;

        let mut columns = vec![String::from(PATIENT_COLUMN)];
        for (_, frame) in &frames {
            for column in &frame.columns {
                if !columns.contains(column) {
                    columns.push(column.clone());
                }
            }
        }

        let mut result = Frame::new(columns);
        for (patient, frame) in frames {
            let indices = result
                .columns
                .iter()
                .map(|column| frame.column_index(column))
                .collect::<Vec<_>>();
            for row in frame.rows {
                let mut cells = indices
                    .iter()
                    .map(|idx| idx.and_then(|idx| row[idx].clone()))
                    .collect::<Vec<_>>();
                cells[0] = Some(Value::from(patient.as_str()));
                result.rows.push(cells);
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{convert::BedpeLikeOptionsBuilder, tables::store::test::store};

    fn cohort() -> Cohort {
        let other = store().filter(&["svtype == DEL"], "and").unwrap();
        Cohort::new(vec![("index", store()), ("father", other)]).unwrap()
    }

    #[test]
    fn patient_table() {
        let cohort = cohort();

        assert_eq!(cohort.patient_ids(), vec!["index", "father"]);
        assert_eq!(cohort.len(), 5);
        assert_eq!(
            cohort.patient_table()[3],
            PatientRow {
                id: String::from("father_sv1"),
                patient: String::from("father"),
                local_id: String::from("sv1"),
            }
        );
    }

    #[test]
    fn duplicate_patient() {
        assert!(matches!(
            Cohort::new(vec![("a", store()), ("a", store())]),
            Err(Error::InvalidTable { .. })
        ));
    }

    #[test]
    fn get_table_global_ids() -> Result<(), anyhow::Error> {
        let table = cohort().get_table("svtype")?;

        let ids = match table {
            Table::Info(table) => table.rows.into_iter().map(|row| row.id).collect::<Vec<_>>(),
            _ => panic!("not an INFO table"),
        };
        assert_eq!(
            ids,
            vec!["index_sv1", "index_sv2", "index_sv3", "father_sv1", "father_sv3"]
        );

        Ok(())
    }

    #[test]
    fn merged_store() -> Result<(), anyhow::Error> {
        let merged = cohort().merged()?;

        assert_eq!(merged.len(), 5);
        assert_eq!(
            merged.get_info("imprecise")?.ids(),
            ["index_sv1", "father_sv1"]
                .iter()
                .map(|id| id.to_string())
                .collect::<crate::tables::IdSet>()
        );
        assert!(matches!(
            cohort().get_table("nope"),
            Err(Error::TableNotFound(_))
        ));

        Ok(())
    }

    #[test]
    fn filter_each_patient() -> Result<(), anyhow::Error> {
        let filtered = cohort().filter(&["be1 chr1"], "and")?;

        assert_eq!(filtered.store("index").map(TableStore::len), Some(2));
        assert_eq!(filtered.store("father").map(TableStore::len), Some(1));

        Ok(())
    }

    #[test]
    fn to_bedpe_like_patient_column() -> Result<(), anyhow::Error> {
        let options = BedpeLikeOptionsBuilder::default()
            .custom_infonames(vec![String::from("svtype")])
            .build()?;
        let frame = cohort().to_bedpe_like(&options)?;

        assert_eq!(frame.columns[0], "patient");
        assert_eq!(frame.columns.last().map(String::as_str), Some("svtype"));
        assert_eq!(frame.len(), 5);
        assert_eq!(
            frame.rows[4].iter().map(Frame::render).take(8).collect::<Vec<_>>(),
            vec!["father", "chr2", "499", "500", "chr2", "599", "600", "sv3"]
        );

        Ok(())
    }
}
