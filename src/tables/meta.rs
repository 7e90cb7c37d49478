//! Header-derived metadata catalog.

use serde::{Deserialize, Serialize};

use super::schema::{FieldType, Number};

/// One `##contig` declaration.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct ContigMeta {
    pub id: String,
    pub length: Option<u64>,
}

/// One `##INFO` declaration.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct InfoMeta {
    pub id: String,
    pub number: Number,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub description: String,
    pub source: Option<String>,
    pub version: Option<String>,
}

impl InfoMeta {
    pub fn new(id: &str, number: Number, field_type: FieldType, description: &str) -> Self {
        Self {
            id: id.to_string(),
            number,
            field_type,
            description: description.to_string(),
            source: None,
            version: None,
        }
    }
}

/// One `##FORMAT` declaration.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct FormatMeta {
    pub id: String,
    pub number: Number,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub description: String,
}

/// One `##FILTER` declaration.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct FilterMeta {
    pub id: String,
    pub description: String,
}

/// One `##ALT` declaration.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct AltMeta {
    pub id: String,
    pub description: String,
}

/// One sample column.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct SampleMeta {
    pub id: String,
}

/// Metadata of one input file.
///
/// Built once from the header, then only touched when an INFO field is
/// synthesized or removed.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone, Default)]
pub struct MetaCatalog {
    pub fileformat: Option<String>,
    pub source: Option<String>,
    pub contigs: Vec<ContigMeta>,
    pub infos: Vec<InfoMeta>,
    pub formats: Vec<FormatMeta>,
    pub filters: Vec<FilterMeta>,
    pub alts: Vec<AltMeta>,
    pub samples: Vec<SampleMeta>,
}

impl MetaCatalog {
    /// INFO declaration by case-insensitive name.
    pub fn info(&self, name: &str) -> Option<&InfoMeta> {
        self.infos
            .iter()
            .find(|meta| meta.id.eq_ignore_ascii_case(name))
    }

    /// FORMAT declaration by case-insensitive name.
    pub fn format(&self, name: &str) -> Option<&FormatMeta> {
        self.formats
            .iter()
            .find(|meta| meta.id.eq_ignore_ascii_case(name))
    }

    pub fn has_contig(&self, name: &str) -> bool {
        self.contigs.iter().any(|contig| contig.id == name)
    }

    pub fn has_sample(&self, name: &str) -> bool {
        self.samples.iter().any(|sample| sample.id == name)
    }

    pub fn sample_names(&self) -> Vec<String> {
        self.samples.iter().map(|sample| sample.id.clone()).collect()
    }

    /// Register an INFO declaration, replacing one with the same name.
    pub fn push_info(&mut self, meta: InfoMeta) {
        match self
            .infos
            .iter_mut()
            .find(|other| other.id.eq_ignore_ascii_case(&meta.id))
        {
            Some(other) => *other = meta,
            None => self.infos.push(meta),
        }
    }

    /// Remove the INFO declaration, returns whether one was present.
    pub fn remove_info(&mut self, name: &str) -> bool {
        let before = self.infos.len();
        self.infos.retain(|meta| !meta.id.eq_ignore_ascii_case(name));
        before != self.infos.len()
    }

    /// Register a contig unless already known.
    pub fn push_contig(&mut self, id: &str, length: Option<u64>) {
        if !self.has_contig(id) {
            self.contigs.push(ContigMeta {
                id: id.to_string(),
                length,
            });
        }
    }

    /// Merge the declarations of `other` into `self`, keeping existing ones.
    pub fn merge(&mut self, other: &MetaCatalog) {
        if self.fileformat.is_none() {
            self.fileformat = other.fileformat.clone();
        }
        if self.source.is_none() {
            self.source = other.source.clone();
        }
        for contig in &other.contigs {
            self.push_contig(&contig.id, contig.length);
        }
        for info in &other.infos {
            if self.info(&info.id).is_none() {
                self.infos.push(info.clone());
            }
        }
        for format in &other.formats {
            if self.format(&format.id).is_none() {
                self.formats.push(format.clone());
            }
        }
        for filter in &other.filters {
            if !self.filters.iter().any(|f| f.id == filter.id) {
                self.filters.push(filter.clone());
            }
        }
        for alt in &other.alts {
            if !self.alts.iter().any(|a| a.id == alt.id) {
                self.alts.push(alt.clone());
            }
        }
        for sample in &other.samples {
            if !self.has_sample(&sample.id) {
                self.samples.push(sample.clone());
            }
        }
    }
}
