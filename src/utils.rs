use flate2::read::MultiGzDecoder;
use regex::Regex;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub fn open_file<P: AsRef<Path>>(path: P) -> io::Result<File> {
    File::open(&path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            io::Error::new(e.kind(), format!("File not found: {:?}", path.as_ref()))
        } else {
            e
        }
    })
}

/// Opens a report for line-wise reading, transparently decompressing
/// gzip-compressed files by extension.
pub fn open_report_reader<P: AsRef<Path>>(path: P) -> io::Result<Box<dyn BufRead + Send>> {
    let file = open_file(&path)?;
    let is_gz = path
        .as_ref()
        .extension()
        .map(|ext| ext == "gz")
        .unwrap_or(false);
    if is_gz {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Recursively collects classifier report files (`*_report.txt`, optionally
/// gzipped) under `path`, sorted for a stable sample order.
pub fn find_report_files<P: AsRef<Path>>(path: P) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.ends_with("_report.txt") || name.ends_with("_report.txt.gz"))
                .unwrap_or(false)
        })
        .map(|e| e.path().to_path_buf())
        .collect();
    files.sort_unstable();
    files
}

/// Derives a sample identifier from a report file name by stripping the
/// conventional `_report.txt[.gz]` suffix (and plain extensions otherwise).
pub fn sample_name(path: &Path) -> String {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let re = Regex::new(r"(_report)?(\.txt)?(\.gz)?$").unwrap();
    let trimmed = re.replace(file_name, "");
    if trimmed.is_empty() {
        file_name.to_string()
    } else {
        trimmed.into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_names_strip_report_suffixes() {
        assert_eq!(sample_name(Path::new("/data/barcode03_report.txt")), "barcode03");
        assert_eq!(sample_name(Path::new("gut_A_report.txt.gz")), "gut_A");
        assert_eq!(sample_name(Path::new("sample1.txt")), "sample1");
        assert_eq!(sample_name(Path::new("plain")), "plain");
    }
}
