use crate::taxonomy::{RankRollup, OTHER_LABEL, OTHER_TAXON_ID};
use serde::Serialize;
use std::collections::HashMap;
use std::io::{self, Write};

/// Whether table cells hold raw read counts or per-sample fractions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Raw,
    Relative,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaxonRow {
    pub taxon_id: u64,
    pub name: String,
}

/// The cross-sample abundance matrix: one column per sample in input order,
/// one row per taxon seen in any sample, dense (absent combinations are 0).
/// Immutable once built; consumed by the renderer and the TSV writer.
#[derive(Debug, Clone)]
pub struct AbundanceTable {
    samples: Vec<String>,
    rows: Vec<TaxonRow>,
    // Row-major, rows.len() x samples.len().
    values: Vec<Vec<f64>>,
    mode: Mode,
}

impl AbundanceTable {
    /// Combines per-sample rollups into one table.
    ///
    /// Rows are sorted by descending cross-sample total, ties broken by
    /// taxon id ascending; the "other" pseudo-taxon, when present, is always
    /// the last row. `min_abundance` folds taxa below the threshold in every
    /// sample into "other"; `top_n` caps the number of named rows the same
    /// way. Both fold rather than drop, so relative columns keep summing to
    /// 1.0 (or to 0.0 for a sample with no reads at all).
    pub fn build(
        rollups: &[(String, RankRollup)],
        mode: Mode,
        min_abundance: f64,
        top_n: Option<usize>,
    ) -> AbundanceTable {
        let samples: Vec<String> = rollups.iter().map(|(name, _)| name.clone()).collect();
        let totals: Vec<u64> = rollups.iter().map(|(_, r)| r.total).collect();

        // Union of taxa across samples, with first-seen display names.
        let mut names: HashMap<u64, String> = HashMap::new();
        for (_, rollup) in rollups {
            for (&id, name) in &rollup.names {
                names.entry(id).or_insert_with(|| name.clone());
            }
        }

        let mut ids: Vec<u64> = names.keys().copied().filter(|&id| id != OTHER_TAXON_ID).collect();

        let count_of = |id: u64, s: usize| -> u64 {
            rollups[s].1.counts.get(&id).copied().unwrap_or(0)
        };
        let fraction_of = |id: u64, s: usize| -> f64 {
            if totals[s] == 0 {
                0.0
            } else {
                count_of(id, s) as f64 / totals[s] as f64
            }
        };

        // Low-abundance filter: only taxa below the threshold in *every*
        // sample are folded, so a taxon prominent in one sample survives.
        let mut folded: Vec<u64> = Vec::new();
        if min_abundance > 0.0 {
            ids.retain(|&id| {
                let everywhere_low =
                    (0..samples.len()).all(|s| fraction_of(id, s) < min_abundance);
                if everywhere_low {
                    folded.push(id);
                }
                !everywhere_low
            });
        }

        // Presentation order is part of the contract: descending total
        // abundance in the table's own units, ties by taxon id.
        let cross_total = |id: u64| -> f64 {
            (0..samples.len())
                .map(|s| match mode {
                    Mode::Raw => count_of(id, s) as f64,
                    Mode::Relative => fraction_of(id, s),
                })
                .sum()
        };
        ids.sort_by(|&a, &b| {
            cross_total(b)
                .partial_cmp(&cross_total(a))
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });

        if let Some(cap) = top_n {
            folded.extend(ids.split_off(cap.min(ids.len())));
        }

        let mut other_counts: Vec<u64> = (0..samples.len())
            .map(|s| count_of(OTHER_TAXON_ID, s))
            .collect();
        for &id in &folded {
            for (s, slot) in other_counts.iter_mut().enumerate() {
                *slot += count_of(id, s);
            }
        }

        let mut rows: Vec<TaxonRow> = Vec::with_capacity(ids.len() + 1);
        let mut counts: Vec<Vec<u64>> = Vec::with_capacity(ids.len() + 1);
        for &id in &ids {
            rows.push(TaxonRow {
                taxon_id: id,
                name: names[&id].clone(),
            });
            counts.push((0..samples.len()).map(|s| count_of(id, s)).collect());
        }
        if other_counts.iter().any(|&c| c > 0) {
            rows.push(TaxonRow {
                taxon_id: OTHER_TAXON_ID,
                name: OTHER_LABEL.to_string(),
            });
            counts.push(other_counts);
        }

        let values: Vec<Vec<f64>> = counts
            .iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .map(|(s, &count)| match mode {
                        Mode::Raw => count as f64,
                        Mode::Relative => {
                            if totals[s] == 0 {
                                0.0
                            } else {
                                count as f64 / totals[s] as f64
                            }
                        }
                    })
                    .collect()
            })
            .collect();

        AbundanceTable {
            samples,
            rows,
            values,
            mode,
        }
    }

    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    pub fn rows(&self) -> &[TaxonRow] {
        &self.rows
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn value(&self, row: usize, sample: usize) -> f64 {
        self.values[row][sample]
    }

    pub fn column_sum(&self, sample: usize) -> f64 {
        self.values.iter().map(|row| row[sample]).sum()
    }

    /// Writes the table as TSV: one header line, then
    /// `taxon_id <tab> name <tab> one column per sample`.
    pub fn write_tsv<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        write!(writer, "taxon_id\tname")?;
        for sample in &self.samples {
            write!(writer, "\t{}", sample)?;
        }
        writeln!(writer)?;
        for (row, values) in self.rows.iter().zip(&self.values) {
            write!(writer, "{}\t{}", row.taxon_id, row.name)?;
            for value in values {
                match self.mode {
                    Mode::Raw => write!(writer, "\t{}", *value as u64)?,
                    Mode::Relative => write!(writer, "\t{:.6}", value)?,
                }
            }
            writeln!(writer)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn rollup(entries: &[(u64, &str, u64)]) -> RankRollup {
        let mut counts = HashMap::new();
        let mut names = HashMap::new();
        let mut total = 0;
        for &(id, name, count) in entries {
            counts.insert(id, count);
            names.insert(id, name.to_string());
            total += count;
        }
        RankRollup {
            counts,
            names,
            total,
        }
    }

    fn two_samples() -> Vec<(String, RankRollup)> {
        vec![
            (
                "s1".to_string(),
                rollup(&[(100, "GenusA", 60), (200, "GenusB", 40)]),
            ),
            (
                "s2".to_string(),
                rollup(&[(100, "GenusA", 10), (300, "GenusC", 90)]),
            ),
        ]
    }

    #[test]
    fn relative_columns_sum_to_one() {
        let table = AbundanceTable::build(&two_samples(), Mode::Relative, 0.0, None);
        for s in 0..2 {
            assert!((table.column_sum(s) - 1.0).abs() < 1e-6);
        }
        assert_eq!(table.value(1, 0), 0.6); // GenusA in s1
    }

    #[test]
    fn rows_sorted_by_descending_total_with_id_tiebreak() {
        let table = AbundanceTable::build(&two_samples(), Mode::Raw, 0.0, None);
        let ids: Vec<u64> = table.rows().iter().map(|r| r.taxon_id).collect();
        // GenusC total 90, GenusA 70, GenusB 40.
        assert_eq!(ids, vec![300, 100, 200]);

        // Equal totals fall back to ascending taxon id.
        let tied = vec![(
            "s1".to_string(),
            rollup(&[(7, "B", 10), (3, "A", 10)]),
        )];
        let table = AbundanceTable::build(&tied, Mode::Raw, 0.0, None);
        let ids: Vec<u64> = table.rows().iter().map(|r| r.taxon_id).collect();
        assert_eq!(ids, vec![3, 7]);
    }

    #[test]
    fn missing_combinations_are_zero_not_absent() {
        let table = AbundanceTable::build(&two_samples(), Mode::Raw, 0.0, None);
        let genus_b = table
            .rows()
            .iter()
            .position(|r| r.taxon_id == 200)
            .unwrap();
        assert_eq!(table.value(genus_b, 1), 0.0);
    }

    #[test]
    fn zero_total_sample_yields_all_zero_relative_column() {
        let rollups = vec![
            (
                "full".to_string(),
                rollup(&[(100, "GenusA", 50)]),
            ),
            ("empty".to_string(), rollup(&[])),
        ];
        let table = AbundanceTable::build(&rollups, Mode::Relative, 0.0, None);
        assert!((table.column_sum(0) - 1.0).abs() < 1e-6);
        assert_eq!(table.column_sum(1), 0.0);
    }

    #[test]
    fn min_abundance_folds_into_other_and_conserves_mass() {
        let rollups = vec![(
            "s1".to_string(),
            rollup(&[(100, "GenusA", 97), (200, "GenusB", 2), (300, "GenusC", 1)]),
        )];
        let table = AbundanceTable::build(&rollups, Mode::Relative, 0.05, None);
        let names: Vec<&str> = table.rows().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["GenusA", "other"]);
        assert!((table.column_sum(0) - 1.0).abs() < 1e-6);
        // other holds 3 of 100 reads
        assert!((table.value(1, 0) - 0.03).abs() < 1e-9);
    }

    #[test]
    fn min_abundance_keeps_taxa_prominent_in_any_sample() {
        let rollups = vec![
            (
                "s1".to_string(),
                rollup(&[(100, "GenusA", 99), (200, "GenusB", 1)]),
            ),
            (
                "s2".to_string(),
                rollup(&[(100, "GenusA", 50), (200, "GenusB", 50)]),
            ),
        ];
        let table = AbundanceTable::build(&rollups, Mode::Relative, 0.05, None);
        assert!(table.rows().iter().any(|r| r.taxon_id == 200));
    }

    #[test]
    fn top_n_folds_the_remainder() {
        let table = AbundanceTable::build(&two_samples(), Mode::Relative, 0.0, Some(2));
        let names: Vec<&str> = table.rows().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["GenusC", "GenusA", "other"]);
        for s in 0..2 {
            assert!((table.column_sum(s) - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn other_bucket_from_rollup_merges_with_folded_rows() {
        let rollups = vec![(
            "s1".to_string(),
            rollup(&[(0, "other", 10), (100, "GenusA", 89), (200, "GenusB", 1)]),
        )];
        let table = AbundanceTable::build(&rollups, Mode::Raw, 0.05, None);
        let other = table.rows().last().unwrap();
        assert_eq!(other.taxon_id, 0);
        assert_eq!(table.value(table.rows().len() - 1, 0), 11.0);
    }

    #[test]
    fn tsv_output_is_stable() {
        let table = AbundanceTable::build(&two_samples(), Mode::Raw, 0.0, None);
        let mut out = Vec::new();
        table.write_tsv(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("taxon_id\tname\ts1\ts2"));
        assert_eq!(lines.next(), Some("300\tGenusC\t0\t90"));
    }
}
