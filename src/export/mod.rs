/*!
 * # Document export
 *
 * Builds printable PDFs for quotations and orders, and converts uploaded
 * logo images to and from data URLs. Rendering is pure: the same entity,
 * company profile and timestamp always produce the same bytes.
 */

use std::path::Path;
use thiserror::Error;

pub mod logo;
pub mod pdf;

pub use logo::{decode_data_url, encode_data_url, LogoRaster};
pub use pdf::{render_order, render_quotation};

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("PDF generation failed: {0}")]
    Pdf(String),
    #[error("{0}")]
    InvalidImage(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Writes generated bytes to disk for hosts that want a file instead of a response body.
pub fn write_to_path(path: &Path, bytes: &[u8]) -> Result<(), ExportError> {
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Suggested download name, e.g. `quotation-Q-00042.pdf`
pub fn file_name(kind: &str, number: &str) -> String {
    let safe: String = number
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    format!("{}-{}.pdf", kind, safe)
}
