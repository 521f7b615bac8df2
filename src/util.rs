//! Common utilities for qbank-pdf
//!
//! Small helpers shared by the pipeline, the PDF writer and the CLI.

use std::io;
use std::path::{Path, PathBuf};

/// Millimetres per PDF point
pub const MM_PER_POINT: f32 = 25.4 / 72.0;

/// `.pdf` files directly inside `dir`, sorted by path
///
/// The extension check is case-insensitive; subdirectories are not searched.
pub fn collect_pdf_files<P: AsRef<Path>>(dir: P) -> io::Result<Vec<PathBuf>> {
    let mut pdf_files = Vec::new();
    for entry in std::fs::read_dir(dir.as_ref())? {
        let path = entry?.path();
        if path.is_file() && is_pdf(&path) {
            pdf_files.push(path);
        }
    }
    pdf_files.sort();
    Ok(pdf_files)
}

/// Whether the path has a `.pdf` extension
pub fn is_pdf(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// Convert points to millimeters
#[inline]
pub fn points_to_mm(points: f32) -> f32 {
    points * MM_PER_POINT
}

/// Format duration in human-readable format
pub fn format_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs > 0 {
        format!("{}.{:03}s", secs, millis)
    } else {
        format!("{}ms", millis)
    }
}
