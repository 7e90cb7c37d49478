//! Implementation of the `convert` sub command.

use std::io::Write;

use crate::{
    common::{
        io::{open_write_maybe_gz, open_read_maybe_gz},
        SvCaller,
    },
    ingest::{read_bedpe_from, read_vcf_from},
    tables::TableStore,
};

use super::{write_bedpe, write_vcf, BedpeLikeOptionsBuilder};

/// Format of the input file.
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum InputFormat {
    #[default]
    Vcf,
    Bedpe,
}

/// Format of the output file.
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Bedpe,
    Vcf,
    /// All tables of the store as JSON.
    Json,
}

/// Command line arguments for `convert` sub command.
#[derive(Debug, clap::Parser)]
#[command(author, version, about = "Convert SV calls between VCF, BEDPE and JSON", long_about = None)]
pub struct Args {
    /// Path to the input file, may be gzip-compressed.
    #[arg(long)]
    pub path_input: String,
    /// Format of the input file.
    #[arg(long, value_enum, default_value_t = InputFormat::Vcf)]
    pub input_format: InputFormat,
    /// Caller that produced the VCF, guessed from the header if unset.
    #[arg(long, value_enum)]
    pub caller: Option<SvCaller>,
    /// Consolidate mated breakends into breakpoints.
    #[arg(long, default_value_t = false)]
    pub breakpoints: bool,
    /// Filter queries, e.g. `svtype == DEL`.
    #[arg(long)]
    pub query: Vec<String>,
    /// How to combine the queries: `and`, `or` or a set expression.
    #[arg(long, default_value = "and")]
    pub logic: String,
    /// Path to the output file, `.gz` for compression.
    #[arg(long)]
    pub path_output: String,
    /// Format of the output file.
    #[arg(long, value_enum, default_value_t = OutputFormat::Bedpe)]
    pub output_format: OutputFormat,
    /// INFO tables to add as BEDPE columns.
    #[arg(long)]
    pub info: Vec<String>,
    /// Widen BEDPE intervals by the confidence intervals.
    #[arg(long, default_value_t = false)]
    pub confidence_intervals: bool,
}

/// Read the input of `args` into a store.
fn load(args: &Args) -> Result<TableStore, anyhow::Error> {
    let reader = open_read_maybe_gz(&args.path_input)?;
    let store = match args.input_format {
        InputFormat::Vcf => read_vcf_from(reader, args.caller)?,
        InputFormat::Bedpe => read_bedpe_from(reader)?,
    };
    tracing::info!(
        "read {} records with {} INFO tables",
        store.len(),
        store.info_names().len()
    );
    Ok(store)
}

/// Main entry point for `convert` sub command.
pub fn run(args_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    let before_anything = std::time::Instant::now();
    tracing::info!("args_common = {:?}", &args_common);
    tracing::info!("args = {:?}", &args);

    tracing::info!("loading {} input...", args.input_format);
    let mut store = load(args)
        .map_err(|e| anyhow::anyhow!("could not read {}: {}", &args.path_input, e))?;

    if args.breakpoints {
        tracing::info!("consolidating breakends...");
        store = store.breakend2breakpoint()?;
    }
    if !args.query.is_empty() {
        tracing::info!("applying {} queries...", args.query.len());
        let before = store.len();
        store = store.filter(args.query.as_slice(), &args.logic)?;
        tracing::info!("... kept {} of {} records", store.len(), before);
    }

    tracing::info!("writing {} output...", args.output_format);
    let mut writer = open_write_maybe_gz(&args.path_output)
        .map_err(|e| anyhow::anyhow!("could not open {} for writing: {}", &args.path_output, e))?;
    match args.output_format {
        OutputFormat::Bedpe => {
            let options = BedpeLikeOptionsBuilder::default()
                .custom_infonames(args.info.clone())
                .add_filters(true)
                .confidence_intervals(args.confidence_intervals)
                .build()
                .map_err(|e| anyhow::anyhow!("invalid BEDPE options: {}", e))?;
            write_bedpe(&store, &mut writer, &options)?;
        }
        OutputFormat::Vcf => write_vcf(&store, &mut writer)?,
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, &store)?;
            writeln!(writer)?;
        }
    }
    writer.flush()?;

    tracing::info!(
        "All of `convert` completed in {:?}",
        before_anything.elapsed()
    );
    Ok(())
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    fn args(path_output: &str, output_format: OutputFormat) -> Args {
        Args {
            path_input: String::from("tests/data/manta-min.vcf"),
            input_format: InputFormat::Vcf,
            caller: None,
            breakpoints: true,
            query: vec![String::from("svtype == TRA")],
            logic: String::from("and"),
            path_output: path_output.to_string(),
            output_format,
            info: vec![String::from("orgbeid")],
            confidence_intervals: false,
        }
    }

    #[test]
    fn smoke_test_bedpe() -> Result<(), anyhow::Error> {
        let tmpdir = temp_testdir::TempDir::default();
        let path_output = tmpdir.join("out.bedpe");
        let args = args(&format!("{}", path_output.display()), OutputFormat::Bedpe);

        run(&crate::common::Args::default(), &args)?;

        let text = std::fs::read_to_string(&path_output)?;
        let lines = text.lines().collect::<Vec<_>>();
        assert_eq!(
            lines[0],
            "chrom1\tstart1\tend1\tchrom2\tstart2\tend2\tname\tscore\tstrand1\tstrand2\tfilter\t\
             orgbeid_0\torgbeid_1"
        );
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("chr1\t"));
        assert!(lines[1].ends_with("\tMantaBND:1:0:1:0:0:0:0\tMantaBND:1:0:1:0:0:0:1"));

        Ok(())
    }

    #[test]
    fn smoke_test_vcf_and_json() -> Result<(), anyhow::Error> {
        let tmpdir = temp_testdir::TempDir::default();

        let path_vcf = tmpdir.join("out.vcf");
        run(
            &crate::common::Args::default(),
            &args(&format!("{}", path_vcf.display()), OutputFormat::Vcf),
        )?;
        let text = std::fs::read_to_string(&path_vcf)?;
        assert!(text.starts_with("##fileformat=VCFv4.1"));
        assert!(text.contains("##INFO=<ID=ORGBEID,"));

        let path_json = tmpdir.join("out.json");
        run(
            &crate::common::Args::default(),
            &args(&format!("{}", path_json.display()), OutputFormat::Json),
        )?;
        let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path_json)?)?;
        assert_eq!(value["caller"], "manta");

        Ok(())
    }
}
