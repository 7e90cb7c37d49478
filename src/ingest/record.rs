//! Raw columns of one VCF record as read by noodles.

use indexmap::IndexMap;
use noodles_vcf as vcf;
use vcf::header::record::value::map::info;

use crate::err::Error;

/// Values of one INFO or FORMAT key, flags map to an empty list.
pub type Values = Vec<String>;

/// One VCF record with its columns as text.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawRecord {
    pub chrom: String,
    pub pos: i64,
    /// ID column, `None` when `.`
    pub id: Option<String>,
    pub reference: String,
    pub alts: Vec<String>,
    pub qual: Option<f64>,
    /// FILTER column, empty when `.`
    pub filters: Vec<String>,
    pub info: IndexMap<String, Values>,
    /// Per-sample FORMAT values in FORMAT key order.
    pub formats: IndexMap<String, IndexMap<String, Values>>,
}

/// Render an array of optional values, missing ones as `.`.
fn render<T: ToString>(values: &[Option<T>]) -> Values {
    values
        .iter()
        .map(|value| {
            value
                .as_ref()
                .map(|value| value.to_string())
                .unwrap_or_else(|| String::from("."))
        })
        .collect()
}

fn info_values(value: &vcf::record::info::field::Value) -> Values {
    use vcf::record::info::field::{value::Array, Value};

    match value {
        Value::Flag => Values::new(),
        Value::Integer(value) => vec![value.to_string()],
        Value::Float(value) => vec![value.to_string()],
        Value::Character(value) => vec![value.to_string()],
        Value::String(value) => vec![value.clone()],
        Value::Array(Array::Integer(values)) => render(values),
        Value::Array(Array::Float(values)) => render(values),
        Value::Array(Array::Character(values)) => render(values),
        Value::Array(Array::String(values)) => render(values),
    }
}

fn sample_values(value: &vcf::record::genotypes::sample::Value) -> Values {
    use vcf::record::genotypes::sample::{value::Array, Value};

    match value {
        Value::Integer(value) => vec![value.to_string()],
        Value::Float(value) => vec![value.to_string()],
        Value::Character(value) => vec![value.to_string()],
        Value::String(value) => vec![value.clone()],
        Value::Array(Array::Integer(values)) => render(values),
        Value::Array(Array::Float(values)) => render(values),
        Value::Array(Array::Character(values)) => render(values),
        Value::Array(Array::String(values)) => render(values),
    }
}

impl RawRecord {
    /// Take the columns of a record parsed against `header`.
    ///
    /// A missing (`.`) value of a key declared with a type other than
    /// `Flag` drops the key, undeclared keys without value are flags.
    pub fn from_vcf(record: &vcf::Record, header: &vcf::Header) -> Result<Self, Error> {
        let id = record
            .ids()
            .iter()
            .map(|id| id.to_string())
            .next()
            .filter(|id| id != ".");
        let label = id.clone().unwrap_or_else(|| String::from("."));

        let mut info = IndexMap::new();
        for key in record.info().keys() {
            match record.info().get(key).flatten() {
                Some(value) => {
                    info.insert(key.to_string(), info_values(value));
                }
                None if header
                    .infos()
                    .get(key)
                    .map(|meta| !matches!(meta.ty(), info::Type::Flag))
                    .unwrap_or(false) =>
                {
                    tracing::trace!("{}: skipping missing value of {}", &label, key);
                }
                None => {
                    info.insert(key.to_string(), Values::new());
                }
            }
        }

        let keys = record.genotypes().keys();
        let mut formats = IndexMap::new();
        for (sample_name, sample) in header.sample_names().iter().zip(record.genotypes().values()) {
            let fields = keys
                .iter()
                .map(|key| {
                    let values = sample
                        .get(key)
                        .flatten()
                        .map(sample_values)
                        .unwrap_or_default();
                    (key.to_string(), values)
                })
                .collect::<IndexMap<_, _>>();
            formats.insert(sample_name.clone(), fields);
        }

        let pos = usize::from(record.position());
        Ok(Self {
            chrom: record.chromosome().to_string(),
            pos: i64::try_from(pos)
                .map_err(|e| Error::record(label.as_str(), format!("invalid POS {}: {}", pos, e)))?,
            id,
            reference: record.reference_bases().to_string(),
            alts: record
                .alternate_bases()
                .iter()
                .map(|allele| allele.to_string())
                .collect(),
            qual: record
                .quality_score()
                .map(|score| f64::from(f32::from(score))),
            filters: record
                .filters()
                .map(|filters| filters.to_string())
                .filter(|filters| filters != ".")
                .map(|filters| filters.split(';').map(|s| s.to_string()).collect())
                .unwrap_or_default(),
            info,
            formats,
        })
    }

    /// The first ALT allele.
    pub fn alt(&self) -> &str {
        self.alts.first().map(String::as_str).unwrap_or(".")
    }

    /// First value of an INFO key.
    pub fn info_value(&self, key: &str) -> Option<&str> {
        self.info
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Whether an INFO flag (or any INFO key) is present.
    pub fn has_info(&self, key: &str) -> bool {
        self.info.contains_key(key)
    }

    /// First value of an INFO key as integer.
    pub fn info_i64(&self, key: &str) -> Result<Option<i64>, Error> {
        self.info_value(key)
            .map(|value| {
                value.parse().map_err(|e| {
                    Error::record(
                        self.id.as_deref().unwrap_or("."),
                        format!("invalid {}={:?}: {}", key, value, e),
                    )
                })
            })
            .transpose()
    }
}

#[cfg(test)]
pub(crate) mod test {
    use noodles_vcf as vcf;
    use pretty_assertions::assert_eq;

    use super::*;

    /// Declarations of the INFO and FORMAT keys the unit tests use.
    const DECLARATIONS: &str = "##fileformat=VCFv4.2\n\
        ##INFO=<ID=SVTYPE,Number=1,Type=String,Description=\"Type of structural variant\">\n\
        ##INFO=<ID=END,Number=1,Type=Integer,Description=\"End position of the variant\">\n\
        ##INFO=<ID=SVLEN,Number=.,Type=Integer,Description=\"Difference in length between REF and ALT alleles\">\n\
        ##INFO=<ID=CIPOS,Number=2,Type=Integer,Description=\"Confidence interval around POS\">\n\
        ##INFO=<ID=CIEND,Number=2,Type=Integer,Description=\"Confidence interval around END\">\n\
        ##INFO=<ID=IMPRECISE,Number=0,Type=Flag,Description=\"Imprecise structural variation\">\n\
        ##INFO=<ID=MATEID,Number=.,Type=String,Description=\"ID of mate breakend\">\n\
        ##INFO=<ID=PARID,Number=1,Type=String,Description=\"ID of partner breakend\">\n\
        ##INFO=<ID=INV3,Number=0,Type=Flag,Description=\"Inversion breakends open 3' of reported location\">\n\
        ##INFO=<ID=INV5,Number=0,Type=Flag,Description=\"Inversion breakends open 5' of reported location\">\n\
        ##INFO=<ID=SECONDARY,Number=0,Type=Flag,Description=\"Secondary breakend\">\n\
        ##INFO=<ID=STRANDS,Number=.,Type=String,Description=\"Strand orientation of the adjacency\">\n\
        ##INFO=<ID=SU,Number=.,Type=Integer,Description=\"Number of pieces of evidence\">\n\
        ##INFO=<ID=CHR2,Number=1,Type=String,Description=\"Chromosome of the second breakend\">\n\
        ##INFO=<ID=POS2,Number=1,Type=Integer,Description=\"Position of the second breakend\">\n\
        ##INFO=<ID=CT,Number=1,Type=String,Description=\"Paired-end signature induced connection type\">\n\
        ##FORMAT=<ID=PR,Number=.,Type=Integer,Description=\"Spanning paired-read support\">\n\
        ##FORMAT=<ID=SR,Number=.,Type=Integer,Description=\"Split reads\">\n";

    /// Header with the shared declarations and the given samples.
    pub(crate) fn header(samples: &[&str]) -> vcf::Header {
        let mut text = String::from(DECLARATIONS);
        text.push_str("#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO");
        if !samples.is_empty() {
            text.push_str("\tFORMAT");
            for sample in samples {
                text.push('\t');
                text.push_str(sample);
            }
        }
        text.push('\n');
        vcf::Reader::new(text.as_bytes())
            .read_header()
            .expect("test header must parse")
    }

    /// Parse one body line against `header`.
    pub(crate) fn parse_line(line: &str, header: &vcf::Header) -> Result<RawRecord, anyhow::Error> {
        let record = vcf::Reader::new(line.as_bytes())
            .records(header)
            .next()
            .ok_or_else(|| anyhow::anyhow!("no record in {:?}", line))??;
        Ok(RawRecord::from_vcf(&record, header)?)
    }

    /// Parse one sites-only body line.
    pub(crate) fn raw_record(line: &str) -> Result<RawRecord, anyhow::Error> {
        parse_line(line, &header(&[]))
    }

    #[test]
    fn from_vcf_full() -> Result<(), anyhow::Error> {
        let header = header(&["normal", "tumor"]);
        let line = "chr1\t100\tMantaDEL:0:1:2:0:0:0\tT\t<DEL>\t.\tMinQUAL;Ploidy\t\
            END=200;SVTYPE=DEL;SVLEN=-100;CIPOS=-5,5;IMPRECISE\tPR:SR\t10,0:.\t8,4:3,2";
        let record = parse_line(line, &header)?;

        assert_eq!(record.chrom, "chr1");
        assert_eq!(record.pos, 100);
        assert_eq!(record.id.as_deref(), Some("MantaDEL:0:1:2:0:0:0"));
        assert_eq!(record.alt(), "<DEL>");
        assert_eq!(record.qual, None);
        assert_eq!(record.filters, vec!["MinQUAL", "Ploidy"]);
        assert_eq!(record.info["CIPOS"], vec!["-5", "5"]);
        assert_eq!(record.info["IMPRECISE"], Vec::<String>::new());
        assert_eq!(record.info_i64("END")?, Some(200));
        assert_eq!(record.formats["tumor"]["SR"], vec!["3", "2"]);
        assert_eq!(record.formats["normal"]["SR"], Vec::<String>::new());

        Ok(())
    }

    #[test]
    fn from_vcf_sites_only() -> Result<(), anyhow::Error> {
        let record = raw_record("2\t5\t.\tN\t<INV>\t12.5\tPASS\t.")?;

        assert_eq!(record.id, None);
        assert_eq!(record.qual, Some(12.5));
        assert_eq!(record.filters, vec!["PASS"]);
        assert!(record.info.is_empty());
        assert!(record.formats.is_empty());

        Ok(())
    }

    #[test]
    fn from_vcf_missing_declared_value() -> Result<(), anyhow::Error> {
        let record = raw_record("1\t5\tsv1\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;END=100;SVLEN=.")?;

        assert!(!record.has_info("SVLEN"));
        assert_eq!(record.info_value("SVTYPE"), Some("DEL"));

        Ok(())
    }

    #[rstest::rstest]
    #[case("chr1\t100\tsv1")]
    #[case("chr1\tabc\tsv1\tN\t<DEL>\t.\tPASS\t.")]
    #[case("chr1\t100\tsv1\tN\t<DEL>\thigh\tPASS\t.")]
    #[case("chr1\t100\tsv1\tN\t<DEL>\t.\tPASS\tEND=x")]
    fn parse_line_fails(#[case] line: &str) {
        assert!(raw_record(line).is_err());
    }

    #[test]
    fn info_i64_fails_on_garbage() {
        let mut record = RawRecord {
            id: Some("sv1".into()),
            ..Default::default()
        };
        record.info.insert("END".into(), vec!["x".into()]);

        assert!(record.info_i64("END").is_err());
    }
}
