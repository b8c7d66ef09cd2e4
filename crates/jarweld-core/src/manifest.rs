//! JAR manifest main attributes.
//!
//! Only the main section is modelled; per-entry sections of merged inputs
//! carry signing digests that no longer hold after relocation and are
//! dropped. Attribute order is preserved, with `Manifest-Version` always
//! written first.

use tracing::warn;

/// Key written first in every manifest.
pub const MANIFEST_VERSION: &str = "Manifest-Version";

/// Maximum bytes per physical manifest line, excluding the line break.
const LINE_LIMIT: usize = 72;

/// Ordered main attributes of a manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    attributes: Vec<(String, String)>,
}

impl Manifest {
    /// A manifest with no attributes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the main section of a manifest.
    ///
    /// Accepts CRLF, LF or CR line breaks and joins continuation lines (those
    /// starting with a single space). Lines without a `:` are ignored.
    pub fn parse(text: &str) -> Self {
        let mut logical: Vec<String> = Vec::new();
        for line in text.split("\r\n").flat_map(|l| l.split(['\n', '\r'])) {
            if line.is_empty() {
                if logical.is_empty() {
                    continue;
                }
                break;
            }
            if let (Some(rest), Some(last)) = (line.strip_prefix(' '), logical.last_mut()) {
                last.push_str(rest);
            } else {
                logical.push(line.to_string());
            }
        }

        let mut manifest = Self::new();
        for line in logical {
            if let Some((key, value)) = line.split_once(':') {
                let value = value.strip_prefix(' ').unwrap_or(value);
                manifest.insert(key.trim(), value);
            }
        }
        manifest
    }

    /// Value of `key`, compared case-insensitively.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Set `key`, replacing an existing value in place. Keys compare
    /// case-insensitively. Returns the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let (key, value) = (key.into(), value.into());
        match self
            .attributes
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&key))
        {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.attributes.push((key, value));
                None
            }
        }
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Whether no attribute is set.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Attributes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Union `other` into `self`; later values win. Returns the number of
    /// attributes whose value changed.
    pub fn merge_from(&mut self, other: &Self, origin: &str) -> usize {
        let mut overridden = 0;
        for (key, value) in other.iter() {
            if let Some(previous) = self.insert(key, value)
                && previous != value
            {
                warn!(
                    key,
                    previous = %previous,
                    value,
                    origin,
                    "manifest attribute overridden"
                );
                overridden += 1;
            }
        }
        overridden
    }

    /// Serialize with CRLF line breaks and 72-byte line wrapping.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = String::new();
        let version = self.get(MANIFEST_VERSION).unwrap_or("1.0");
        write_attribute(&mut out, MANIFEST_VERSION, version);
        for (key, value) in self.iter() {
            if !key.eq_ignore_ascii_case(MANIFEST_VERSION) {
                write_attribute(&mut out, key, value);
            }
        }
        out.push_str("\r\n");
        out.into_bytes()
    }
}

fn write_attribute(out: &mut String, key: &str, value: &str) {
    let line = format!("{key}: {value}");
    let mut rest = line.as_str();
    let mut limit = LINE_LIMIT;
    loop {
        let cut = floor_char_boundary(rest, limit);
        out.push_str(&rest[..cut]);
        out.push_str("\r\n");
        rest = &rest[cut..];
        if rest.is_empty() {
            break;
        }
        out.push(' ');
        limit = LINE_LIMIT - 1;
    }
}

/// Largest char boundary `<= max` (at least one char, so wrapping progresses).
fn floor_char_boundary(s: &str, max: usize) -> usize {
    if s.len() <= max {
        return s.len();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    if cut == 0 {
        s.chars().next().map_or(s.len(), char::len_utf8)
    } else {
        cut
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_continuations_and_stops_at_first_section() {
        let text = "Manifest-Version: 1.0\r\nMain-Class: com.example.VeryLong\r\n Name\r\n\r\nName: a/B.class\r\nSHA-256-Digest: xyz\r\n";
        let manifest = Manifest::parse(text);
        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest.get("main-class"), Some("com.example.VeryLongName"));
        assert_eq!(manifest.get("SHA-256-Digest"), None);
    }

    #[test]
    fn union_keeps_last_value() {
        let mut merged = Manifest::parse("A: 1\nB: 2\n");
        let overridden = merged.merge_from(&Manifest::parse("B: 3\nC: 4\n"), "fabric");
        assert_eq!(overridden, 1);
        let pairs: Vec<_> = merged.iter().collect();
        assert_eq!(pairs, vec![("A", "1"), ("B", "3"), ("C", "4")]);
    }

    #[test]
    fn writes_version_first_with_crlf() {
        let mut manifest = Manifest::new();
        manifest.insert("Created-By", "jarweld");
        let text = String::from_utf8(manifest.to_bytes()).unwrap();
        assert_eq!(text, "Manifest-Version: 1.0\r\nCreated-By: jarweld\r\n\r\n");
    }

    #[test]
    fn long_values_wrap_at_72_bytes() {
        let mut manifest = Manifest::new();
        let value = "x".repeat(200);
        manifest.insert("Long", value.clone());
        let bytes = manifest.to_bytes();
        let text = String::from_utf8(bytes).unwrap();

        assert!(text.split("\r\n").all(|line| line.len() <= 72));
        let reparsed = Manifest::parse(&text);
        assert_eq!(reparsed.get("Long"), Some(value.as_str()));
    }

    #[test]
    fn wrapping_respects_char_boundaries() {
        let mut manifest = Manifest::new();
        let value = "é".repeat(80);
        manifest.insert("Accents", value.clone());
        let text = String::from_utf8(manifest.to_bytes()).unwrap();
        assert_eq!(Manifest::parse(&text).get("Accents"), Some(value.as_str()));
    }
}
