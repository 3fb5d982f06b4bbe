//! Doxygen identifier mangling.
//!
//! Doxygen turns class, file and namespace names into file-system safe
//! identifiers with a fixed substitution table. Cross references computed
//! here only resolve when they match Doxygen character for character, so the
//! table below is copied verbatim from Doxygen's `escapeCharsInString`.
//!
//! ```rust
//! use doxprep::docs::codec;
//!
//! assert_eq!(codec::escape("A:B", true, true), "_a_1_b");
//! assert_eq!(codec::convert_ref_to_name("class_logger_base"), "LoggerBase");
//! ```

use sha2::{Digest, Sha256};

/// Doxygen refuses to create names this long and hashes the tail instead.
pub const MAX_FILE_NAME_LEN: usize = 128;
const DIGEST_HEX_LEN: usize = 32;

/// Characters with a fixed escape sequence.
pub const ESCAPE_TABLE: &[(char, &str)] = &[
    (':', "_1"),
    ('/', "_2"),
    ('<', "_3"),
    ('>', "_4"),
    ('*', "_5"),
    ('&', "_6"),
    ('|', "_7"),
    ('!', "_9"),
    (',', "_00"),
    (' ', "_01"),
    ('{', "_02"),
    ('}', "_03"),
    ('?', "_04"),
    ('^', "_05"),
    ('%', "_06"),
    ('(', "_07"),
    (')', "_08"),
    ('+', "_09"),
    ('=', "_0a"),
    ('$', "_0b"),
    ('\\', "_0c"),
    ('@', "_0d"),
    (']', "_0e"),
    ('[', "_0f"),
    ('#', "_0g"),
    ('"', "_0h"),
    ('~', "_0i"),
    ('\'', "_0j"),
    (';', "_0k"),
    ('`', "_0l"),
];

/// Ids of pages and examples are never escaped by Doxygen.
pub const PAGE_PREFIXES: &[&str] = &["change_log", "example_", "extra_", "page_"];

const REF_PREFIXES: &[&str] = &["module__", "group__", "dir_", "class", "namespace", "concept"];

// `_dep_incl` must be tried before `_incl`.
const REF_SUFFIXES: &[&str] = &[
    "_dep_incl",
    "_incl",
    "_inherit_graph",
    "_coll_graph",
    "-members",
    "-example",
];

fn escape_token(c: char) -> Option<&'static str> {
    ESCAPE_TABLE
        .iter()
        .find(|(ch, _)| *ch == c)
        .map(|(_, token)| *token)
}

fn unescape_token(token: &str) -> Option<char> {
    ESCAPE_TABLE
        .iter()
        .find(|(_, t)| &t[1..] == token)
        .map(|(ch, _)| *ch)
}

/// Escaping settings, matching the Doxygen configuration of the project.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameCodec {
    /// Doxygen's `CASE_SENSE_NAMES`; when set, uppercase letters are kept.
    pub case_sense_names: bool,
}

impl NameCodec {
    pub fn new(case_sense_names: bool) -> Self {
        Self { case_sense_names }
    }

    pub fn escape(&self, name: &str, allow_dots: bool, allow_underscore: bool) -> String {
        let mut out = String::with_capacity(name.len() * 2);
        for c in name.chars() {
            match c {
                '_' if allow_underscore => out.push('_'),
                '_' => out.push_str("__"),
                '.' if allow_dots => out.push('.'),
                '.' => out.push_str("_8"),
                c if !c.is_ascii() => {
                    let mut buf = [0u8; 4];
                    for byte in c.encode_utf8(&mut buf).bytes() {
                        out.push_str(&format!("_x{:02x}", byte));
                    }
                }
                c => match escape_token(c) {
                    Some(token) => out.push_str(token),
                    None if c.is_ascii_uppercase() && !self.case_sense_names => {
                        out.push('_');
                        out.push(c.to_ascii_lowercase());
                    }
                    None => out.push(c),
                },
            }
        }
        out
    }

    /// Escape `name` and bound its length the way Doxygen does for output files.
    pub fn convert_name_to_file(
        &self,
        name: &str,
        allow_dots: bool,
        allow_underscore: bool,
    ) -> String {
        let escaped = self.escape(name, allow_dots, allow_underscore);
        if escaped.len() < MAX_FILE_NAME_LEN {
            return escaped;
        }
        let digest = Sha256::digest(escaped.as_bytes());
        let hex: String = digest[..16].iter().map(|b| format!("{:02x}", b)).collect();
        // escaped output is pure ASCII, so byte slicing is safe
        format!("{}{}", &escaped[..MAX_FILE_NAME_LEN - DIGEST_HEX_LEN], hex)
    }
}

pub fn escape(name: &str, allow_dots: bool, allow_underscore: bool) -> String {
    NameCodec::default().escape(name, allow_dots, allow_underscore)
}

pub fn convert_name_to_file(name: &str, allow_dots: bool, allow_underscore: bool) -> String {
    NameCodec::default().convert_name_to_file(name, allow_dots, allow_underscore)
}

fn hex_value(c: char) -> Option<u8> {
    c.to_digit(16).map(|d| d as u8)
}

/// Read a `_xHH` escape starting at `chars[i]`, returning the byte if it is
/// a non-ASCII byte (ASCII never gets hex escaped).
fn hex_byte_at(chars: &[char], i: usize) -> Option<u8> {
    if chars.get(i) != Some(&'_') || chars.get(i + 1) != Some(&'x') {
        return None;
    }
    let hi = chars.get(i + 2).copied().and_then(hex_value)?;
    let lo = chars.get(i + 3).copied().and_then(hex_value)?;
    let byte = (hi << 4) | lo;
    (byte >= 0x80).then_some(byte)
}

fn utf8_sequence_len(lead: u8) -> usize {
    match lead {
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        0xf0..=0xf7 => 4,
        _ => 1,
    }
}

/// A `_x` escape is ambiguous with an escaped uppercase `X` followed by two
/// hex-looking characters. It is only read as raw bytes when the escapes
/// spell out a complete UTF-8 sequence.
fn utf8_run_at(chars: &[char], i: usize) -> Option<(Vec<u8>, usize)> {
    let lead = hex_byte_at(chars, i)?;
    let len = utf8_sequence_len(lead);
    if len < 2 {
        return None;
    }
    let mut bytes = vec![lead];
    for k in 1..len {
        let byte = hex_byte_at(chars, i + 4 * k)?;
        if byte & 0xc0 != 0x80 {
            return None;
        }
        bytes.push(byte);
    }
    std::str::from_utf8(&bytes).ok()?;
    Some((bytes, 4 * len))
}

/// Invert [`escape`].
///
/// Sequences that are not in the table are copied through unchanged rather
/// than rejected.
pub fn unescape(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out: Vec<u8> = Vec::with_capacity(s.len());
    let mut buf = [0u8; 4];
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c != '_' {
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            i += 1;
            continue;
        }
        if let Some((bytes, consumed)) = utf8_run_at(&chars, i) {
            out.extend_from_slice(&bytes);
            i += consumed;
            continue;
        }
        let next = chars.get(i + 1).copied();
        let decoded = match next {
            Some('0') => chars
                .get(i + 2)
                .and_then(|d| unescape_token(&format!("0{}", d)))
                .map(|ch| (ch, 3)),
            Some('_') => Some(('_', 2)),
            Some('8') => Some(('.', 2)),
            Some(d @ '1'..='9') => unescape_token(&d.to_string()).map(|ch| (ch, 2)),
            Some(l) if l.is_ascii_lowercase() => Some((l.to_ascii_uppercase(), 2)),
            _ => None,
        };
        match decoded {
            Some((ch, consumed)) => {
                out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
                i += consumed;
            }
            None => {
                tracing::trace!(position = i, input = s, "unrecognized escape sequence");
                out.push(b'_');
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Turn the base name of a Doxygen output file back into the documented name.
pub fn convert_ref_to_name(escaped_ref: &str) -> String {
    if PAGE_PREFIXES.iter().any(|p| escaped_ref.starts_with(p))
        || escaped_ref.len() >= MAX_FILE_NAME_LEN
    {
        return escaped_ref.to_string();
    }
    let mut name = escaped_ref;
    if let Some(stripped) = REF_PREFIXES.iter().find_map(|p| name.strip_prefix(p)) {
        name = stripped;
    }
    if let Some(stripped) = REF_SUFFIXES.iter().find_map(|s| name.strip_suffix(s)) {
        name = stripped;
    }
    unescape(name)
}
