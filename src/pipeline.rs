use crate::args::AbundanceArgs;
use crate::error::{AbundanceError, Result};
use crate::plot::{self, PlotOptions};
use crate::rank::RankCode;
use crate::report::ReportRecords;
use crate::table::{AbundanceTable, Mode};
use crate::taxonomy::{RankRollup, RollupOptions, TaxonomyTree};
use crate::utils::{find_report_files, open_report_reader, sample_name};
use log::info;
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Machine-readable account of one pipeline run.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub rank: String,
    pub mode: Mode,
    pub taxa: usize,
    pub output: String,
    pub samples: Vec<SampleSummary>,
}

#[derive(Debug, Serialize)]
pub struct SampleSummary {
    pub sample: String,
    pub path: String,
    pub total_reads: u64,
    pub taxa: usize,
}

/// Runs the whole pipeline: parse -> aggregate per report (in parallel,
/// order preserved), build the table once, render the chart, and write the
/// optional tabular outputs. Fails on the first error with the offending
/// file attached; no partial outputs are produced.
pub fn run(args: &AbundanceArgs) -> Result<RunSummary> {
    let files = expand_inputs(&args.input)?;
    let labels = sample_labels(&files, args.sample_labels.as_deref())?;
    info!("processing {} report file(s)", files.len());

    let rollup_opts = RollupOptions {
        exact_rank: args.exact_rank,
        min_reads: args.min_reads,
        exclude: args.exclude.clone(),
    };

    // Per-sample work is independent; rayon's ordered collect keeps column
    // order identical to input order no matter which file finishes first.
    let rollups: Vec<RankRollup> = files
        .par_iter()
        .map(|path| process_report(path, args.rank, args.tolerance, &rollup_opts))
        .collect::<Result<Vec<_>>>()?;

    let samples: Vec<(String, RankRollup)> =
        labels.into_iter().zip(rollups.into_iter()).collect();
    for ((label, rollup), path) in samples.iter().zip(&files) {
        info!(
            "{}: {} reads across {} taxa at rank {} ({})",
            label,
            rollup.total,
            rollup.counts.len(),
            args.rank.as_char(),
            path.display()
        );
    }

    let table = AbundanceTable::build(&samples, args.mode, args.min_abundance, args.top_n);

    let title = format!("Abundance at rank {}", args.rank.as_char());
    plot::render(&table, &args.output, &PlotOptions::for_table(&table, title))?;
    info!("chart written to {}", args.output.display());

    if let Some(table_path) = &args.table_out {
        write_table_tsv(&table, table_path)?;
        info!("table written to {}", table_path.display());
    }

    let summary = RunSummary {
        rank: args.rank.as_char().to_string(),
        mode: args.mode,
        taxa: table.rows().len(),
        output: args.output.display().to_string(),
        samples: samples
            .iter()
            .zip(&files)
            .map(|((label, rollup), path)| SampleSummary {
                sample: label.clone(),
                path: path.display().to_string(),
                total_reads: rollup.total,
                taxa: rollup.counts.len(),
            })
            .collect(),
    };

    if let Some(summary_path) = &args.summary_out {
        let file = fs::File::create(summary_path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), &summary)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        info!("summary written to {}", summary_path.display());
    }

    Ok(summary)
}

/// Parses and aggregates one report into its rank rollup.
fn process_report(
    path: &Path,
    rank: RankCode,
    tolerance: f64,
    opts: &RollupOptions,
) -> Result<RankRollup> {
    let run = || -> Result<RankRollup> {
        let reader = open_report_reader(path)?;
        let tree = TaxonomyTree::from_records(ReportRecords::new(reader))?;
        tree.validate(tolerance)?;
        Ok(tree.rollup(rank, opts))
    };
    run().map_err(|e| e.with_path(path))
}

/// Turns the CLI inputs into a flat file list: files pass through,
/// directories are scanned for report files.
fn expand_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let found = find_report_files(input);
            if found.is_empty() {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("no '*_report.txt' files under {}", input.display()),
                )
                .into());
            }
            files.extend(found);
        } else {
            files.push(input.clone());
        }
    }
    Ok(files)
}

fn sample_labels(files: &[PathBuf], overrides: Option<&[String]>) -> Result<Vec<String>> {
    match overrides {
        Some(labels) => {
            if labels.len() != files.len() {
                return Err(AbundanceError::SampleLabelCount {
                    expected: files.len(),
                    actual: labels.len(),
                });
            }
            Ok(labels.to_vec())
        }
        None => Ok(files.iter().map(|p| sample_name(p)).collect()),
    }
}

fn write_table_tsv(table: &AbundanceTable, path: &Path) -> Result<()> {
    // Same staging discipline as the chart: no readable-but-truncated file.
    let staging = path.with_extension("tsv.tmp");
    let file = fs::File::create(&staging)?;
    let mut writer = BufWriter::new(file);
    table.write_tsv(&mut writer)?;
    writer.flush()?;
    drop(writer);
    fs::rename(&staging, path)?;
    Ok(())
}
