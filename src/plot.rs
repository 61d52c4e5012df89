use crate::error::{AbundanceError, Result};
use crate::table::{AbundanceTable, Mode};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

/// Rendering knobs. The chart itself is always a stacked bar chart, one bar
/// per sample, one segment per table row.
#[derive(Debug, Clone)]
pub struct PlotOptions {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl PlotOptions {
    /// Sized like the original pipeline's plots: a 1100px base that grows a
    /// little with the number of samples.
    pub fn for_table(table: &AbundanceTable, title: impl Into<String>) -> Self {
        PlotOptions {
            title: title.into(),
            width: 1100 + 5 * table.samples().len() as u32,
            height: 800,
        }
    }
}

impl Default for PlotOptions {
    fn default() -> Self {
        PlotOptions {
            title: "Taxonomic abundance".to_string(),
            width: 1100,
            height: 800,
        }
    }
}

/// Renders `table` to `path`, picking the backend from the extension
/// (`.svg` is vector, everything else goes through the bitmap backend).
///
/// The image is written to a hidden staging file in the destination
/// directory and renamed into place on success, so an interrupted render
/// never leaves a truncated file behind under the real name. All plotting
/// state lives inside this call; nothing global is touched.
pub fn render(table: &AbundanceTable, path: &Path, opts: &PlotOptions) -> Result<()> {
    if table.samples().is_empty() {
        return Err(AbundanceError::Render {
            path: path.display().to_string(),
            reason: "no samples to plot".to_string(),
        });
    }

    let staging = staging_path(path);
    let drawn = if path.extension().and_then(|e| e.to_str()) == Some("svg") {
        let root = SVGBackend::new(&staging, (opts.width, opts.height)).into_drawing_area();
        draw_stacked_bars(&root, table, opts)
    } else {
        let root = BitMapBackend::new(&staging, (opts.width, opts.height)).into_drawing_area();
        draw_stacked_bars(&root, table, opts)
    };

    if let Err(reason) = drawn {
        let _ = fs::remove_file(&staging);
        return Err(AbundanceError::Render {
            path: path.display().to_string(),
            reason,
        });
    }
    fs::rename(&staging, path)?;
    Ok(())
}

/// Staging file next to the destination, keeping the extension last so the
/// backend still recognizes the image format.
fn staging_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("abundance");
    match path.extension().and_then(|s| s.to_str()) {
        Some(ext) => path.with_file_name(format!(".{}.tmp.{}", stem, ext)),
        None => path.with_file_name(format!(".{}.tmp", stem)),
    }
}

fn draw_stacked_bars<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    table: &AbundanceTable,
    opts: &PlotOptions,
) -> std::result::Result<(), String> {
    let samples = table.samples();
    let n = samples.len();

    let y_max = match table.mode() {
        Mode::Relative => 1.0,
        Mode::Raw => (0..n)
            .map(|s| table.column_sum(s))
            .fold(0.0f64, f64::max)
            .max(1.0),
    };
    let y_desc = match table.mode() {
        Mode::Relative => "relative abundance",
        Mode::Raw => "reads",
    };

    root.fill(&WHITE).map_err(|e| e.to_string())?;

    let mut chart = ChartBuilder::on(root)
        .caption(&opts.title, ("sans-serif", 28))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(70)
        .build_cartesian_2d((0..n).into_segmented(), 0f64..y_max * 1.02)
        .map_err(|e| e.to_string())?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .y_desc(y_desc)
        .x_desc("sample")
        .x_label_formatter(&|seg| match seg {
            SegmentValue::CenterOf(i) | SegmentValue::Exact(i) => {
                samples.get(*i).cloned().unwrap_or_default()
            }
            SegmentValue::Last => String::new(),
        })
        .label_style(("sans-serif", 14))
        .draw()
        .map_err(|e| e.to_string())?;

    // Stack segments bottom-up in row order, so the legend order matches
    // the visual order of the most abundant taxa.
    let mut offsets = vec![0.0f64; n];
    for (ri, row) in table.rows().iter().enumerate() {
        let color = Palette99::pick(ri);
        let bars: Vec<_> = (0..n)
            .map(|s| {
                let y0 = offsets[s];
                let y1 = y0 + table.value(ri, s);
                offsets[s] = y1;
                let mut bar = Rectangle::new(
                    [
                        (SegmentValue::Exact(s), y0),
                        (SegmentValue::Exact(s + 1), y1),
                    ],
                    color.filled(),
                );
                bar.set_margin(0, 0, 8, 8);
                bar
            })
            .collect();
        chart
            .draw_series(bars)
            .map_err(|e| e.to_string())?
            .label(row.name.clone())
            .legend(move |(x, y)| {
                Rectangle::new([(x, y - 5), (x + 12, y + 5)], color.filled())
            });
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .label_font(("sans-serif", 14))
        .draw()
        .map_err(|e| e.to_string())?;

    root.present().map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staging_path_keeps_the_extension_last() {
        let staged = staging_path(Path::new("/tmp/out/abundance.png"));
        assert_eq!(staged, PathBuf::from("/tmp/out/.abundance.tmp.png"));
        let staged = staging_path(Path::new("chart.svg"));
        assert_eq!(staged, PathBuf::from(".chart.tmp.svg"));
    }

    #[test]
    fn empty_table_is_a_render_error() {
        let table = AbundanceTable::build(&[], Mode::Relative, 0.0, None);
        let err = render(&table, Path::new("nope.png"), &PlotOptions::default()).unwrap_err();
        assert!(matches!(err, AbundanceError::Render { .. }));
    }
}
