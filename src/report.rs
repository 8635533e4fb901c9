use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use palette::{Hsl, IntoColor, Srgb};

use crate::calls::PurityTable;
use crate::consensus::ConsensusResult;

/// Label shown for cells without a consensus.
pub const UNDEFINED_LABEL: &str = "NA";

const UNDEFINED_COLOR: &str = "#9e9e9e";

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues, as
/// `#rrggbb` strings.
pub fn generate_palette(n: usize) -> Vec<String> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            let rgb: Srgb<u8> = rgb.into_format();
            format!("#{:02x}{:02x}{:02x}", rgb.red, rgb.green, rgb.blue)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Label counts
// ---------------------------------------------------------------------------

/// Cells per consensus label in natural level order. Undefined cells come
/// last under `None`.
pub fn label_counts(result: &ConsensusResult) -> Vec<(Option<String>, usize)> {
    let mut counts: Vec<(Option<String>, usize)> = result
        .counts()
        .into_iter()
        .map(|(label, n)| (Some(label.join()), n))
        .collect();
    let undefined = result.consensus.len() - result.labeled();
    if undefined > 0 {
        counts.push((None, undefined));
    }
    counts
}

fn display_label(label: &Option<String>) -> &str {
    label.as_deref().unwrap_or(UNDEFINED_LABEL)
}

/// Plain-text run summary.
pub fn text_summary(purity: &PurityTable, result: &ConsensusResult) -> String {
    let mut out = String::new();
    let total = purity.len();
    let _ = writeln!(out, "Cells: {total}");
    let _ = writeln!(out, "Pure calls per model:");
    for model in purity.models() {
        let _ = writeln!(out, "  {model:<20} {:>8}", purity.pure_count(model));
    }
    let _ = writeln!(out, "Consensus labels:");
    for (label, n) in label_counts(result) {
        let label = display_label(&label);
        let pct = if total == 0 { 0.0 } else { 100.0 * n as f64 / total as f64 };
        let _ = writeln!(out, "  {label:<20} {n:>8}  ({pct:.1}%)");
    }
    if !result.dropped.is_empty() {
        let _ = writeln!(out, "Dropped ambiguous values:");
        for (label, n) in &result.dropped {
            let _ = writeln!(out, "  {label:<20} {n:>8}");
        }
    }
    out
}

// ---------------------------------------------------------------------------
// SVG bar chart
// ---------------------------------------------------------------------------

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Horizontal bar chart of label counts.
pub fn bar_chart_svg(counts: &[(Option<String>, usize)], title: &str) -> String {
    const BAR_HEIGHT: usize = 22;
    const GAP: usize = 6;
    const LABEL_WIDTH: usize = 180;
    const PLOT_WIDTH: usize = 420;
    const TOP: usize = 40;

    let defined = counts.iter().filter(|(l, _)| l.is_some()).count();
    let palette = generate_palette(defined);
    let max = counts.iter().map(|(_, n)| *n).max().unwrap_or(0).max(1);
    let height = TOP + counts.len() * (BAR_HEIGHT + GAP) + GAP;
    let width = LABEL_WIDTH + PLOT_WIDTH + 80;

    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" font-family="sans-serif" font-size="12">"#
    );
    let _ = writeln!(
        svg,
        r#"  <text x="{}" y="24" font-size="16" text-anchor="middle">{}</text>"#,
        width / 2,
        escape(title)
    );

    let mut colors = palette.iter();
    for (row, (label, n)) in counts.iter().enumerate() {
        let y = TOP + row * (BAR_HEIGHT + GAP);
        let bar = PLOT_WIDTH * n / max;
        let color = match label {
            Some(_) => colors.next().map(String::as_str).unwrap_or(UNDEFINED_COLOR),
            None => UNDEFINED_COLOR,
        };
        let _ = writeln!(
            svg,
            r#"  <text x="{}" y="{}" text-anchor="end">{}</text>"#,
            LABEL_WIDTH - 8,
            y + BAR_HEIGHT * 2 / 3,
            escape(display_label(label))
        );
        let _ = writeln!(
            svg,
            r#"  <rect x="{LABEL_WIDTH}" y="{y}" width="{bar}" height="{BAR_HEIGHT}" fill="{color}"/>"#
        );
        let _ = writeln!(
            svg,
            r#"  <text x="{}" y="{}">{n}</text>"#,
            LABEL_WIDTH + bar + 6,
            y + BAR_HEIGHT * 2 / 3
        );
    }
    svg.push_str("</svg>\n");
    svg
}

/// Write the bar chart for `result` to `path`.
pub fn write_bar_chart(result: &ConsensusResult, title: &str, path: &Path) -> Result<()> {
    let svg = bar_chart_svg(&label_counts(result), title);
    std::fs::write(path, svg).with_context(|| format!("writing report {}", path.display()))
}
