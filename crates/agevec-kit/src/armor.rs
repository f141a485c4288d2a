//! ASCII armor
//!
//! ```text
//! -----BEGIN AGE ENCRYPTED FILE-----
//! <64 columns of padded standard base64>
//! ...
//! <last line, 1..=64 columns, '=' padded>
//! -----END AGE ENCRYPTED FILE-----
//! ```
//!
//! [`armor`] always produces the canonical form. [`armor_with`] can omit the
//! padding, break the padding bits, drop the END line, or change the line
//! width, for vectors that a strict decoder has to reject.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

use crate::header::not_canonical_base64;

pub const BEGIN_LINE: &str = "-----BEGIN AGE ENCRYPTED FILE-----";
pub const END_LINE: &str = "-----END AGE ENCRYPTED FILE-----";

/// Base64 columns per armor line.
pub const COLUMNS: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArmorError {
    #[error("missing BEGIN line")]
    MissingBegin,

    #[error("missing END line")]
    MissingEnd,

    #[error("line {0} is {1} columns, expected {COLUMNS}")]
    LineLength(usize, usize),

    #[error("empty line {0} inside armor")]
    EmptyLine(usize),

    #[error("trailing data after END line")]
    TrailingData,

    #[error("invalid base64: {0}")]
    Base64(String),

    #[error("input has no spare bits to make non-canonical")]
    NoSpareBits,
}

/// How the final base64 group is written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Padding {
    #[default]
    Canonical,
    /// `=` characters stripped
    Omitted,
    /// Last significant character bumped so a spare bit is set
    NonCanonical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmorOptions {
    pub padding: Padding,
    pub end_line: bool,
    pub line_width: usize,
}

impl Default for ArmorOptions {
    fn default() -> Self {
        Self {
            padding: Padding::Canonical,
            end_line: true,
            line_width: COLUMNS,
        }
    }
}

/// Canonical armor of `data`.
pub fn armor(data: &[u8]) -> String {
    let encoded = STANDARD.encode(data);
    wrap(&encoded, COLUMNS, true)
}

/// Armor with the given deviations from the canonical form.
pub fn armor_with(data: &[u8], options: &ArmorOptions) -> Result<String, ArmorError> {
    let mut encoded = STANDARD.encode(data);
    match options.padding {
        Padding::Canonical => {}
        Padding::Omitted => {
            let trimmed = encoded.trim_end_matches('=').len();
            encoded.truncate(trimmed);
        }
        Padding::NonCanonical => {
            if data.len() % 3 == 0 {
                return Err(ArmorError::NoSpareBits);
            }
            let pad = encoded.len() - encoded.trim_end_matches('=').len();
            let significant = &encoded[..encoded.len() - pad];
            let bumped = not_canonical_base64(significant).ok_or(ArmorError::NoSpareBits)?;
            encoded = format!("{bumped}{}", "=".repeat(pad));
        }
    }
    Ok(wrap(&encoded, options.line_width.max(1), options.end_line))
}

fn wrap(encoded: &str, width: usize, end_line: bool) -> String {
    let mut out = String::with_capacity(encoded.len() + encoded.len() / width + 80);
    out.push_str(BEGIN_LINE);
    out.push('\n');
    for line in encoded.as_bytes().chunks(width) {
        // base64 output is ASCII
        out.push_str(&String::from_utf8_lossy(line));
        out.push('\n');
    }
    if end_line {
        out.push_str(END_LINE);
        out.push('\n');
    }
    out
}

/// Strict armor decoder.
///
/// Accepts surrounding whitespace but requires exact BEGIN/END lines, full
/// 64-column lines except the last, canonical padded base64, and nothing
/// after the END line.
pub fn dearmor(text: &str) -> Result<Vec<u8>, ArmorError> {
    let text = text.trim_start();
    let mut lines = text.split('\n');

    if lines.next() != Some(BEGIN_LINE) {
        return Err(ArmorError::MissingBegin);
    }

    let mut encoded = String::new();
    let mut short_seen = false;
    let mut found_end = false;
    let mut lineno = 1;
    for line in lines.by_ref() {
        lineno += 1;
        if line == END_LINE {
            found_end = true;
            break;
        }
        if line.is_empty() {
            return Err(ArmorError::EmptyLine(lineno));
        }
        if short_seen || line.len() > COLUMNS {
            return Err(ArmorError::LineLength(lineno, line.len()));
        }
        if line.len() < COLUMNS {
            short_seen = true;
        }
        encoded.push_str(line);
    }
    if !found_end {
        return Err(ArmorError::MissingEnd);
    }
    if lines.any(|l| !l.trim().is_empty()) {
        return Err(ArmorError::TrailingData);
    }

    STANDARD
        .decode(&encoded)
        .map_err(|e| ArmorError::Base64(e.to_string()))
}
