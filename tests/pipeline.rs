use flate2::write::GzEncoder;
use flate2::Compression;
use kr_abundance::rank::RankCode;
use kr_abundance::report::ReportRecords;
use kr_abundance::table::{AbundanceTable, Mode};
use kr_abundance::taxonomy::{RankRollup, RollupOptions, TaxonomyTree};
use kr_abundance::utils::{find_report_files, open_report_reader, sample_name};
use kr_abundance::AbundanceError;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;

const SAMPLE_A: &str = "\
  0.00\t0\t0\tU\t0\tunclassified
100.00\t100\t0\tR\t1\troot
 60.00\t60\t20\tG\t100\t  GenusA
 40.00\t40\t40\tS\t101\t    SpeciesA1
 40.00\t40\t40\tG\t200\t  GenusB
";

const SAMPLE_B: &str = "\
  0.00\t0\t0\tU\t0\tunclassified
100.00\t200\t0\tR\t1\troot
100.00\t200\t200\tG\t100\t  GenusA
";

fn write_report(dir: &Path, name: &str, text: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, text).unwrap();
    path
}

fn aggregate(path: &Path, rank: RankCode) -> Result<RankRollup, AbundanceError> {
    let reader = open_report_reader(path)?;
    let tree = TaxonomyTree::from_records(ReportRecords::new(reader))?;
    tree.validate(0.0)?;
    Ok(tree.rollup(rank, &RollupOptions::default()))
}

#[test]
fn two_reports_roll_up_to_relative_genus_abundances() {
    let dir = TempDir::new().unwrap();
    let a = write_report(dir.path(), "gutA_report.txt", SAMPLE_A);
    let b = write_report(dir.path(), "gutB_report.txt", SAMPLE_B);

    let rollups = vec![
        (sample_name(&a), aggregate(&a, RankCode::Genus).unwrap()),
        (sample_name(&b), aggregate(&b, RankCode::Genus).unwrap()),
    ];
    let table = AbundanceTable::build(&rollups, Mode::Relative, 0.0, None);

    assert_eq!(table.samples(), ["gutA", "gutB"]);
    for s in 0..2 {
        assert!((table.column_sum(s) - 1.0).abs() < 1e-6);
    }

    let genus_a = table
        .rows()
        .iter()
        .position(|r| r.name == "GenusA")
        .unwrap();
    let genus_b = table
        .rows()
        .iter()
        .position(|r| r.name == "GenusB")
        .unwrap();
    assert!((table.value(genus_a, 0) - 0.6).abs() < 1e-9);
    assert!((table.value(genus_b, 0) - 0.4).abs() < 1e-9);
    // GenusB never appears in sample B: dense zero, not absent.
    assert_eq!(table.value(genus_b, 1), 0.0);
}

#[test]
fn gzipped_reports_parse_identically() {
    let dir = TempDir::new().unwrap();
    let plain = write_report(dir.path(), "plain_report.txt", SAMPLE_A);

    let gz_path = dir.path().join("zipped_report.txt.gz");
    let mut encoder = GzEncoder::new(fs::File::create(&gz_path).unwrap(), Compression::default());
    encoder.write_all(SAMPLE_A.as_bytes()).unwrap();
    encoder.finish().unwrap();

    let from_plain = aggregate(&plain, RankCode::Genus).unwrap();
    let from_gz = aggregate(&gz_path, RankCode::Genus).unwrap();
    assert_eq!(from_plain, from_gz);
    assert_eq!(sample_name(&gz_path), "zipped");
}

#[test]
fn dangling_parent_aborts_with_no_rollup() {
    let dir = TempDir::new().unwrap();
    let text = "\
100.00\t10\t0\tR\t1\troot
 50.00\t5\t5\tS\t9\t      Orphan species
";
    let path = write_report(dir.path(), "broken_report.txt", text);
    let err = aggregate(&path, RankCode::Genus).unwrap_err();
    assert!(matches!(err, AbundanceError::MalformedReport { .. }));
}

#[test]
fn inconsistent_report_surfaces_the_offending_taxon() {
    let dir = TempDir::new().unwrap();
    let text = "\
100.00\t100\t0\tR\t1\troot
 50.00\t50\t50\tG\t100\t  GenusA
";
    let path = write_report(dir.path(), "short_report.txt", text);
    match aggregate(&path, RankCode::Genus) {
        Err(AbundanceError::InconsistentTree { taxids, .. }) => assert_eq!(taxids, vec![1]),
        other => panic!("expected InconsistentTree, got {:?}", other),
    }
}

#[test]
fn directory_scan_finds_reports_in_stable_order() {
    let dir = TempDir::new().unwrap();
    write_report(dir.path(), "b_report.txt", SAMPLE_B);
    write_report(dir.path(), "a_report.txt", SAMPLE_A);
    write_report(dir.path(), "notes.txt", "not a report");

    let files = find_report_files(dir.path());
    let names: Vec<String> = files.iter().map(|p| sample_name(p)).collect();
    assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
}

#[test]
fn aggregation_is_idempotent_across_re_parses() {
    let dir = TempDir::new().unwrap();
    let path = write_report(dir.path(), "again_report.txt", SAMPLE_A);
    let first = aggregate(&path, RankCode::Genus).unwrap();
    let second = aggregate(&path, RankCode::Genus).unwrap();
    assert_eq!(first, second);
}
