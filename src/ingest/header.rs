//! Conversion between noodles VCF headers and the `MetaCatalog`.

use noodles_vcf as vcf;
use vcf::header::record::value::{
    map::{format, info, AlternativeAllele, Contig, Filter, Format, Info},
    Collection, Map,
};

use crate::{
    err::Error,
    tables::{
        meta::{AltMeta, ContigMeta, FilterMeta, FormatMeta, InfoMeta, MetaCatalog, SampleMeta},
        schema::{FieldType, Number},
    },
};

/// File format written when the catalog has none.
pub const DEFAULT_FILE_FORMAT: &str = "VCFv4.1";

fn invalid<T: std::fmt::Display>(what: &str, value: T) -> Error {
    Error::InvalidHeader(format!("{} {}", what, value))
}

fn field_type<T: std::fmt::Display>(ty: T) -> Result<FieldType, Error> {
    let ty = ty.to_string();
    ty.parse().map_err(|_| invalid("Type", ty))
}

/// Collect the declarations of a parsed header.
pub fn catalog_from_header(header: &vcf::Header) -> Result<MetaCatalog, Error> {
    let source = match header.other_records().get("source") {
        Some(Collection::Unstructured(lines)) => lines.first().cloned(),
        _ => None,
    };

    let mut infos = Vec::new();
    for (key, meta) in header.infos() {
        infos.push(InfoMeta {
            id: key.to_string(),
            number: meta.number().to_string().parse()?,
            field_type: field_type(meta.ty())?,
            description: meta.description().to_string(),
            source: meta.other_fields().get("Source").cloned(),
            version: meta.other_fields().get("Version").cloned(),
        });
    }
    let mut formats = Vec::new();
    for (key, meta) in header.formats() {
        formats.push(FormatMeta {
            id: key.to_string(),
            number: meta.number().to_string().parse()?,
            field_type: field_type(meta.ty())?,
            description: meta.description().to_string(),
        });
    }

    Ok(MetaCatalog {
        fileformat: Some(header.file_format().to_string()),
        source,
        contigs: header
            .contigs()
            .iter()
            .map(|(name, contig)| ContigMeta {
                id: name.to_string(),
                length: contig.length().map(|length| length as u64),
            })
            .collect(),
        infos,
        formats,
        filters: header
            .filters()
            .iter()
            .map(|(id, filter)| FilterMeta {
                id: id.clone(),
                description: filter.description().to_string(),
            })
            .collect(),
        alts: header
            .alternative_alleles()
            .iter()
            .map(|(symbol, alt)| AltMeta {
                id: symbol.to_string(),
                description: alt.description().to_string(),
            })
            .collect(),
        samples: header
            .sample_names()
            .iter()
            .map(|id| SampleMeta { id: id.clone() })
            .collect(),
    })
}

fn number(number: Number) -> Result<vcf::header::Number, Error> {
    number
        .to_string()
        .parse()
        .map_err(|_| invalid("Number", number))
}

fn info_map(meta: &InfoMeta) -> Result<Map<Info>, Error> {
    let ty: info::Type = meta
        .field_type
        .to_string()
        .parse()
        .map_err(|_| invalid("Type", meta.field_type))?;
    let mut builder = Map::<Info>::builder()
        .set_number(number(meta.number)?)
        .set_type(ty)
        .set_description(meta.description.clone());
    for (key, value) in [("Source", &meta.source), ("Version", &meta.version)] {
        if let Some(value) = value {
            builder = builder.insert(key.parse().map_err(|_| invalid("key", key))?, value.clone());
        }
    }
    builder
        .build()
        .map_err(|e| invalid(&format!("INFO {}:", meta.id), e))
}

fn format_map(meta: &FormatMeta) -> Result<Map<Format>, Error> {
    // FORMAT has no flags
    let ty = match meta.field_type {
        FieldType::Flag => format::Type::String,
        field_type => field_type
            .to_string()
            .parse()
            .map_err(|_| invalid("Type", field_type))?,
    };
    Ok(Map::<Format>::new(
        number(meta.number)?,
        ty,
        meta.description.clone(),
    ))
}

/// Build a noodles header declaring everything in `catalog`.
pub fn build_header(catalog: &MetaCatalog) -> Result<vcf::Header, Error> {
    let file_format = catalog.fileformat.as_deref().unwrap_or(DEFAULT_FILE_FORMAT);
    let mut builder = vcf::Header::builder().set_file_format(
        file_format
            .parse()
            .map_err(|_| invalid("fileformat", file_format))?,
    );

    if let Some(source) = &catalog.source {
        builder = builder
            .insert(
                "source".parse().map_err(|_| invalid("key", "source"))?,
                vcf::header::record::Value::from(source.as_str()),
            )
            .map_err(|e| invalid("source", e))?;
    }
    for contig in &catalog.contigs {
        let mut map = Map::<Contig>::builder();
        if let Some(length) = contig.length {
            map = map.set_length(length as usize);
        }
        builder = builder.add_contig(
            contig
                .id
                .parse()
                .map_err(|_| invalid("contig", &contig.id))?,
            map.build().map_err(|e| invalid("contig", e))?,
        );
    }
    for meta in &catalog.infos {
        builder = builder.add_info(
            meta.id.parse().map_err(|_| invalid("INFO", &meta.id))?,
            info_map(meta)?,
        );
    }
    for meta in &catalog.formats {
        builder = builder.add_format(
            meta.id.parse().map_err(|_| invalid("FORMAT", &meta.id))?,
            format_map(meta)?,
        );
    }
    for meta in &catalog.filters {
        builder = builder.add_filter(
            meta.id.as_str(),
            Map::<Filter>::new(meta.description.as_str()),
        );
    }
    for meta in &catalog.alts {
        builder = builder.add_alternative_allele(
            meta.id.parse().map_err(|_| invalid("ALT", &meta.id))?,
            Map::<AlternativeAllele>::new(meta.description.as_str()),
        );
    }
    for sample in &catalog.samples {
        builder = builder.add_sample_name(sample.id.clone());
    }

    Ok(builder.build())
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    const HEADER: &str = "##fileformat=VCFv4.1\n\
        ##source=GenerateSVCandidates 1.6.0\n\
        ##contig=<ID=chr1,length=248956422>\n\
        ##INFO=<ID=SVTYPE,Number=1,Type=String,Description=\"Type of structural variant\">\n\
        ##INFO=<ID=CIPOS,Number=2,Type=Integer,Description=\"Confidence interval, around POS\">\n\
        ##INFO=<ID=IMPRECISE,Number=0,Type=Flag,Description=\"Imprecise structural variation\">\n\
        ##FORMAT=<ID=PR,Number=.,Type=Integer,Description=\"Spanning paired-read support\">\n\
        ##FILTER=<ID=MinQUAL,Description=\"QUAL score is less than 20\">\n\
        ##ALT=<ID=DEL,Description=\"Deletion\">\n\
        #CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tnormal\ttumor\n";

    fn read(text: &str) -> Result<vcf::Header, anyhow::Error> {
        Ok(vcf::Reader::new(text.as_bytes()).read_header()?)
    }

    #[test]
    fn catalog_from_header_full() -> Result<(), anyhow::Error> {
        let catalog = catalog_from_header(&read(HEADER)?)?;

        assert_eq!(catalog.fileformat.as_deref(), Some("VCFv4.1"));
        assert_eq!(catalog.source.as_deref(), Some("GenerateSVCandidates 1.6.0"));
        assert_eq!(
            catalog.contigs,
            vec![ContigMeta {
                id: "chr1".into(),
                length: Some(248956422)
            }]
        );
        assert_eq!(catalog.infos.len(), 3);
        assert_eq!(catalog.infos[0].id, "SVTYPE");
        assert_eq!(catalog.infos[1].number, Number::Count(2));
        assert_eq!(catalog.infos[1].description, "Confidence interval, around POS");
        assert_eq!(catalog.infos[2].field_type, FieldType::Flag);
        assert_eq!(catalog.formats[0].number, Number::Unknown);
        assert!(catalog.filters.iter().any(|filter| filter.id == "MinQUAL"));
        assert_eq!(catalog.alts[0].id, "DEL");
        assert_eq!(catalog.alts[0].description, "Deletion");
        assert_eq!(catalog.sample_names(), vec!["normal", "tumor"]);

        Ok(())
    }

    #[test]
    fn build_header_round_trip() -> Result<(), anyhow::Error> {
        let catalog = catalog_from_header(&read(HEADER)?)?;
        let header = build_header(&catalog)?;

        let mut writer = vcf::Writer::new(Vec::new());
        writer.write_header(&header)?;
        let text = String::from_utf8(writer.get_ref().clone())?;

        assert!(text.starts_with("##fileformat=VCFv4.1\n"));
        assert!(text.contains("##source=GenerateSVCandidates 1.6.0\n"));
        assert!(text.contains("##INFO=<ID=CIPOS,Number=2,Type=Integer,"));
        assert!(text.contains("\tFORMAT\tnormal\ttumor\n"));
        assert_eq!(catalog_from_header(&read(&text)?)?, catalog);

        Ok(())
    }

    #[test]
    fn build_header_defaults() -> Result<(), anyhow::Error> {
        let mut catalog = MetaCatalog::default();
        catalog.push_info(InfoMeta::new(
            "ORGBEID",
            Number::Unknown,
            FieldType::String,
            "Original breakend IDs",
        ));
        let header = build_header(&catalog)?;

        assert_eq!(header.file_format().to_string(), DEFAULT_FILE_FORMAT);
        assert_eq!(header.infos().len(), 1);
        assert!(header.sample_names().is_empty());

        Ok(())
    }

    #[rstest::rstest]
    #[case("##INFO=<ID=SVTYPE,Number=1,Type=Strange,Description=\"x\">\n")]
    #[case("#CHROM\tPOS\n")]
    fn read_header_fails(#[case] line: &str) {
        let text = format!(
            "##fileformat=VCFv4.1\n{}#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n",
            line
        );
        assert!(read(&text).is_err());
    }
}
