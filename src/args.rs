use crate::rank::RankCode;
use crate::table::Mode;
use clap::Parser;
use std::path::PathBuf;

/// Command line arguments for the abundance pipeline.
///
/// One invocation covers the whole run: parse every report, roll counts up
/// to the target rank, build the cross-sample table, and render the chart.
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about = "Aggregate Kraken2-style classification reports into cross-sample abundance plots",
    long_about = "Aggregate Kraken2-style classification reports into cross-sample abundance plots.
Inputs may be report files or directories, which are scanned recursively for '*_report.txt'.
Each report becomes one column of the abundance table, in input order."
)]
pub struct AbundanceArgs {
    /// Report files or directories containing '*_report.txt'
    #[clap(required = true)]
    pub input: Vec<PathBuf>,

    /// Target rollup rank code (R, D, K, P, C, O, F, G, S)
    #[clap(short, long, default_value = "G", value_parser = parse_rank_code)]
    pub rank: RankCode,

    /// Table cell semantics: raw read counts or per-sample fractions
    #[clap(long, value_enum, default_value_t = Mode::Relative)]
    pub mode: Mode,

    /// Taxa below this relative abundance in every sample are folded into 'other'
    #[clap(long, default_value_t = 0.0, value_parser = parse_fraction)]
    pub min_abundance: f64,

    /// Keep only the N most abundant taxa, folding the rest into 'other'
    #[clap(long)]
    pub top_n: Option<usize>,

    /// Destination for the rendered chart (.svg for vector, bitmap otherwise)
    #[clap(short, long, default_value = "abundance.png")]
    pub output: PathBuf,

    /// Column display names, overriding those derived from file names
    #[clap(long, value_delimiter = ',')]
    pub sample_labels: Option<Vec<String>>,

    /// Require the exact rank code; sub-ranks like G1 no longer fold into G
    #[clap(long, default_value_t = false)]
    pub exact_rank: bool,

    /// Allowed slack when checking that clade counts add up (0 = exact)
    #[clap(long, default_value_t = 0.0)]
    pub tolerance: f64,

    /// Rollup entries below this read count are folded into 'other'
    #[clap(long, default_value_t = 0)]
    pub min_reads: u64,

    /// Taxon names removed before normalization, e.g. a host genome
    #[clap(long, value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Also write the abundance table as TSV
    #[clap(long)]
    pub table_out: Option<PathBuf>,

    /// Also write a JSON run summary
    #[clap(long)]
    pub summary_out: Option<PathBuf>,

    /// The number of threads to use
    #[clap(short = 'p', long = "num-threads", default_value_t = num_cpus::get())]
    pub num_threads: usize,
}

/// Accepts a single base rank letter; 'U' is not a rollup target.
pub fn parse_rank_code(s: &str) -> Result<RankCode, String> {
    let code = s
        .parse::<crate::rank::Rank>()
        .map_err(|e| e.to_string())
        .and_then(|rank| {
            if rank.sub != 0 {
                Err(format!("'{}' is a sub-rank; use its base code", s))
            } else {
                Ok(rank.code)
            }
        })?;
    if code == RankCode::Unclassified {
        return Err("cannot roll up at rank 'U'".to_string());
    }
    Ok(code)
}

pub fn parse_fraction(s: &str) -> Result<f64, String> {
    let value = s.parse::<f64>().map_err(|e| e.to_string())?;
    if !(0.0..=1.0).contains(&value) {
        return Err(format!("{} is not within [0, 1]", value));
    }
    Ok(value)
}
