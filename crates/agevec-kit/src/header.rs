//! Header assembly: version line, stanza lines, MAC line
//!
//! The header is kept as a log of lines rather than a byte buffer. Negative
//! vectors mutate a line that was just written by unreading it, editing the
//! text, and pushing it back; `restore_line` re-appends the last unread line
//! verbatim.

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::keys::{hkdf_derive, FileKey};

type HmacSha256 = Hmac<Sha256>;

pub const VERSION_PREFIX: &str = "age-encryption.org/";
pub const STANZA_PREFIX: &str = "->";
pub const MAC_PREFIX: &str = "---";

/// Raw bytes per stanza body line (64 base64 columns).
pub const BODY_BYTES_PER_LINE: usize = 48;

const B64_ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

#[derive(Debug, Default, Clone)]
pub struct HeaderAssembler {
    lines: Vec<String>,
    unread: Vec<String>,
}

impl HeaderAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line; the `\n` terminator is added on output.
    pub fn push_line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    /// Remove and return the most recently written line.
    pub fn unread_line(&mut self) -> Option<String> {
        let line = self.lines.pop()?;
        self.unread.push(line.clone());
        Some(line)
    }

    /// Re-append the most recently unread line, unchanged.
    pub fn restore_line(&mut self) -> Option<&str> {
        let line = self.unread.pop()?;
        self.lines.push(line);
        self.lines.last().map(String::as_str)
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Overwrite line `index` in place. Returns the previous text.
    pub fn replace_line(&mut self, index: usize, line: impl Into<String>) -> Option<String> {
        let slot = self.lines.get_mut(index)?;
        Some(std::mem::replace(slot, line.into()))
    }

    /// Index of the most recent line starting with `prefix`.
    pub fn rfind_line(&self, prefix: &str) -> Option<usize> {
        self.lines.iter().rposition(|l| l.starts_with(prefix))
    }

    /// Byte offset of line `index` in [`bytes`](Self::bytes).
    pub fn line_offset(&self, index: usize) -> Option<usize> {
        if index >= self.lines.len() {
            return None;
        }
        Some(self.lines[..index].iter().map(|l| l.len() + 1).sum())
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Every line, `\n`-terminated.
    pub fn bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.lines.iter().map(|l| l.len() + 1).sum());
        for line in &self.lines {
            out.extend_from_slice(line.as_bytes());
            out.push(b'\n');
        }
        out
    }

    /// HMAC-SHA256 over the header so far plus the `---` delimiter.
    pub fn mac(&self, file_key: &FileKey) -> anyhow::Result<[u8; 32]> {
        header_mac(file_key, &self.bytes())
    }
}

/// HMAC-SHA256(HKDF(file_key, info = "header"), header || "---").
pub fn header_mac(file_key: &FileKey, header: &[u8]) -> anyhow::Result<[u8; 32]> {
    let key = hkdf_derive(file_key.as_bytes(), None, b"header")?;
    let mut mac = <HmacSha256 as Mac>::new_from_slice(&key)
        .map_err(|e| anyhow::anyhow!("HMAC key setup failed: {e}"))?;
    mac.update(header);
    mac.update(MAC_PREFIX.as_bytes());
    Ok(mac.finalize().into_bytes().into())
}

/// `"-> " + args.join(" ")`
pub fn args_line(args: &[&str]) -> String {
    std::iter::once(STANZA_PREFIX)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Inverse of [`args_line`]: strip `"-> "` and split on single spaces.
pub fn split_args_line(line: &str) -> Vec<String> {
    let rest = line
        .strip_prefix(STANZA_PREFIX)
        .map(|r| r.strip_prefix(' ').unwrap_or(r))
        .unwrap_or(line);
    rest.split(' ').map(str::to_string).collect()
}

/// Stanza body lines: unpadded base64 in 48-byte segments, always ending with
/// a short (possibly empty) line.
pub fn body_lines(body: &[u8]) -> Vec<String> {
    let mut lines = Vec::with_capacity(body.len() / BODY_BYTES_PER_LINE + 1);
    let mut rest = body;
    loop {
        let take = rest.len().min(BODY_BYTES_PER_LINE);
        let (line, tail) = rest.split_at(take);
        lines.push(b64(line));
        rest = tail;
        if take < BODY_BYTES_PER_LINE {
            break;
        }
    }
    lines
}

/// `"--- " + b64(mac)`
pub fn mac_line(mac: &[u8]) -> String {
    format!("{MAC_PREFIX} {}", b64(mac))
}

/// Unpadded standard base64.
pub fn b64(data: &[u8]) -> String {
    STANDARD_NO_PAD.encode(data)
}

/// Append `=` padding to an unpadded base64 string.
pub fn with_padding(line: &str) -> String {
    let pad = (4 - line.len() % 4) % 4;
    format!("{line}{}", "=".repeat(pad))
}

/// Replace the last character with the next one in the base64 alphabet.
///
/// When the encoding ends in spare zero bits this only sets the lowest spare
/// bit, producing a non-canonical encoding of the same bytes. Returns `None`
/// for an empty string or a last character of `/` or outside the alphabet.
pub fn not_canonical_base64(s: &str) -> Option<String> {
    let last = *s.as_bytes().last()?;
    let idx = B64_ALPHABET.iter().position(|&c| c == last)?;
    let next = *B64_ALPHABET.get(idx + 1)?;
    let mut out = s[..s.len() - 1].to_string();
    out.push(next as char);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unread_and_restore() {
        let mut h = HeaderAssembler::new();
        h.push_line("age-encryption.org/v1");
        h.push_line("-> X25519 abc");

        assert_eq!(h.unread_line().as_deref(), Some("-> X25519 abc"));
        assert_eq!(h.bytes(), b"age-encryption.org/v1\n");

        assert_eq!(h.restore_line(), Some("-> X25519 abc"));
        assert_eq!(h.bytes(), b"age-encryption.org/v1\n-> X25519 abc\n");
        assert_eq!(h.restore_line(), None);
    }

    #[test]
    fn test_replace_and_locate_lines() {
        let mut h = HeaderAssembler::new();
        h.push_line("age-encryption.org/v1");
        h.push_line("-> X25519 abc");
        h.push_line("Ym9keQ");
        h.push_line("-> scrypt c2FsdA 10");
        h.push_line("Ym9keQ");

        assert_eq!(h.rfind_line(STANZA_PREFIX), Some(3));
        assert_eq!(h.line_offset(1), Some(22));
        assert_eq!(h.line_offset(5), None);

        assert_eq!(h.replace_line(1, "-> X25519 xyz").as_deref(), Some("-> X25519 abc"));
        assert_eq!(h.lines()[1], "-> X25519 xyz");
        assert!(h.replace_line(9, "nope").is_none());
    }

    #[test]
    fn test_unread_empty() {
        let mut h = HeaderAssembler::new();
        assert!(h.unread_line().is_none());
    }

    #[test]
    fn test_unread_preserves_carriage_return() {
        let mut h = HeaderAssembler::new();
        h.push_line("age-encryption.org/v1\r");
        assert_eq!(h.unread_line().as_deref(), Some("age-encryption.org/v1\r"));
    }

    #[test]
    fn test_args_line_roundtrip() {
        let line = args_line(&["scrypt", "c2FsdA", "10"]);
        assert_eq!(line, "-> scrypt c2FsdA 10");
        assert_eq!(split_args_line(&line), vec!["scrypt", "c2FsdA", "10"]);
    }

    #[test]
    fn test_args_line_no_arguments() {
        assert_eq!(args_line(&[]), "->");
        assert_eq!(split_args_line("->"), vec![""]);
    }

    #[test]
    fn test_body_lines_short() {
        let lines = body_lines(&[0u8; 32]);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].len(), 43);
    }

    #[test]
    fn test_body_lines_exact_multiple_ends_with_empty_line() {
        let lines = body_lines(&[0u8; 48]);
        assert_eq!(lines, vec!["A".repeat(64), String::new()]);
    }

    #[test]
    fn test_body_lines_empty() {
        assert_eq!(body_lines(&[]), vec![String::new()]);
    }

    #[test]
    fn test_with_padding() {
        assert_eq!(with_padding("YQ"), "YQ==");
        assert_eq!(with_padding("YWI"), "YWI=");
        assert_eq!(with_padding("YWJj"), "YWJj");
        assert_eq!(with_padding(""), "");
    }

    #[test]
    fn test_not_canonical_decodes_to_same_bytes_leniently() {
        let canonical = b64(b"YELLOW SUBMARINE");
        let altered = not_canonical_base64(&canonical).unwrap();
        assert_ne!(canonical, altered);

        // The strict engine rejects it, a lenient one accepts the same bytes
        assert!(STANDARD_NO_PAD.decode(&altered).is_err());
        let lenient = base64::engine::GeneralPurpose::new(
            &base64::alphabet::STANDARD,
            base64::engine::GeneralPurposeConfig::new()
                .with_encode_padding(false)
                .with_decode_padding_mode(base64::engine::DecodePaddingMode::RequireNone)
                .with_decode_allow_trailing_bits(true),
        );
        assert_eq!(lenient.decode(&altered).unwrap(), b"YELLOW SUBMARINE");
    }

    #[test]
    fn test_not_canonical_edge_cases() {
        assert_eq!(not_canonical_base64(""), None);
        assert_eq!(not_canonical_base64("ab/"), None);
        assert_eq!(not_canonical_base64("ab="), None);
        assert_eq!(not_canonical_base64("AZ").as_deref(), Some("Aa"));
    }

    #[test]
    fn test_header_mac_changes_with_key_and_content() {
        let k1 = FileKey::from_bytes(b"YELLOW SUBMARINE".to_vec());
        let k2 = FileKey::from_bytes(b"PURPLE SUBMARINE".to_vec());
        let header = b"age-encryption.org/v1\n";

        let m1 = header_mac(&k1, header).unwrap();
        assert_eq!(m1, header_mac(&k1, header).unwrap());
        assert_ne!(m1, header_mac(&k2, header).unwrap());
        assert_ne!(m1, header_mac(&k1, b"age-encryption.org/v2\n").unwrap());
    }

    #[test]
    fn test_mac_line_format() {
        let line = mac_line(&[0u8; 32]);
        assert!(line.starts_with("--- "));
        assert_eq!(line.len(), 4 + 43);
    }
}
