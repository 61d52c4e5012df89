use crate::error::{AbundanceError, Result};
use crate::rank::Rank;
use std::io::BufRead;

/// One line of a Kraken2-style classification report.
///
/// Reports carry six tab-separated fields per taxon:
/// `percent, reads_clade, reads_direct, rank, taxon_id, indented name`,
/// where the indentation of the name (two spaces per level) encodes the
/// position in the taxonomy tree.
#[derive(Debug, Clone, PartialEq)]
pub struct TaxonRecord {
    pub taxon_id: u64,
    pub name: String,
    pub rank: Rank,
    /// Immediate ancestor, resolved from indentation. `None` for the
    /// depth-zero lines (root and the unclassified bucket).
    pub parent_id: Option<u64>,
    /// Reads assigned to this taxon or any descendant.
    pub reads_clade: u64,
    /// Reads assigned exactly to this taxon.
    pub reads_direct: u64,
    pub percent: f64,
    pub depth: usize,
    /// Line number in the source report, for error messages.
    pub line: usize,
}

/// Lazy reader over one classification report.
///
/// Yields `TaxonRecord`s in file order; once consumed it cannot be restarted
/// (re-parsing requires re-opening the source). Blank lines and lines
/// starting with `#` are skipped. The clade-count invariant is not checked
/// here: that needs the full tree and belongs to the aggregator.
pub struct ReportRecords<R: BufRead> {
    reader: R,
    line_no: usize,
    // Ancestry stack of (depth, taxon_id) for parent resolution.
    stack: Vec<(usize, u64)>,
    done: bool,
}

impl<R: BufRead> ReportRecords<R> {
    pub fn new(reader: R) -> Self {
        ReportRecords {
            reader,
            line_no: 0,
            stack: Vec::new(),
            done: false,
        }
    }

    fn parse_line(&mut self, line: &str) -> Result<TaxonRecord> {
        let fields: Vec<&str> = line.splitn(6, '\t').collect();
        if fields.len() < 6 {
            return Err(AbundanceError::malformed(
                self.line_no,
                format!("expected 6 tab-separated fields, found {}", fields.len()),
            ));
        }

        let percent = fields[0].trim().parse::<f64>().map_err(|_| {
            AbundanceError::malformed(self.line_no, format!("invalid percentage '{}'", fields[0]))
        })?;
        let reads_clade = fields[1].trim().parse::<u64>().map_err(|_| {
            AbundanceError::malformed(self.line_no, format!("invalid clade count '{}'", fields[1]))
        })?;
        let reads_direct = fields[2].trim().parse::<u64>().map_err(|_| {
            AbundanceError::malformed(self.line_no, format!("invalid direct count '{}'", fields[2]))
        })?;
        let rank = fields[3]
            .trim()
            .parse::<Rank>()
            .map_err(|e| AbundanceError::malformed(self.line_no, e))?;
        let taxon_id = fields[4].trim().parse::<u64>().map_err(|_| {
            AbundanceError::malformed(self.line_no, format!("invalid taxon id '{}'", fields[4]))
        })?;

        let name_field = fields[5].trim_end();
        let indent = name_field.len() - name_field.trim_start_matches(' ').len();
        if indent % 2 != 0 {
            return Err(AbundanceError::malformed(
                self.line_no,
                format!("odd name indentation of {} spaces", indent),
            ));
        }
        let depth = indent / 2;
        let name = name_field.trim_start_matches(' ').to_string();
        if name.is_empty() {
            return Err(AbundanceError::malformed(self.line_no, "empty taxon name"));
        }

        // Drop finished siblings, then the remaining top is the parent.
        while self
            .stack
            .last()
            .map_or(false, |&(d, _)| d >= depth)
        {
            self.stack.pop();
        }
        let parent_id = if depth == 0 {
            None
        } else {
            match self.stack.last() {
                Some(&(d, id)) if d == depth - 1 => Some(id),
                _ => {
                    return Err(AbundanceError::malformed(
                        self.line_no,
                        format!("taxon '{}' at depth {} has no parent at depth {}", name, depth, depth - 1),
                    ))
                }
            }
        };
        self.stack.push((depth, taxon_id));

        Ok(TaxonRecord {
            taxon_id,
            name,
            rank,
            parent_id,
            reads_clade,
            reads_direct,
            percent,
            depth,
            line: self.line_no,
        })
    }
}

impl<R: BufRead> Iterator for ReportRecords<R> {
    type Item = Result<TaxonRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut line = String::new();
        loop {
            line.clear();
            match self.reader.read_line(&mut line) {
                Ok(0) => {
                    self.done = true;
                    return None;
                }
                Ok(_) => {}
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            }
            self.line_no += 1;
            let trimmed = line.trim_end_matches(['\n', '\r']);
            if trimmed.trim().is_empty() || trimmed.trim_start().starts_with('#') {
                continue;
            }
            let result = self.parse_line(trimmed);
            if result.is_err() {
                self.done = true;
            }
            return Some(result);
        }
    }
}
