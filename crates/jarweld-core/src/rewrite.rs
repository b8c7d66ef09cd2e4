//! Textual path substitution
//!
//! Resource files refer to classes and other resources by name in several
//! spellings (`a/B`, `a.B`, `a\B`, with or without `.class`). A
//! [`Substitutions`] set holds every spelling of every mapping and rewrites a
//! text in a single left-to-right pass, taking the longest key that matches
//! at each position. Keys never interfere with each other's output, so the
//! result does not depend on insertion order.
//!
//! A match that already sits inside an occurrence of its own replacement is
//! left alone. With class-convention targets the replacement always contains
//! the key (`a/B` → `forge/a/B`), so this is what keeps a second application
//! of the same set from producing `forge/forge/a/B`.

use std::collections::HashMap;

use jarweld_schema::{CLASS_SUFFIX, strip_class_suffix};

#[derive(Debug, Clone)]
struct Rule {
    from: String,
    to: String,
    /// Byte offsets at which `from` occurs inside `to`.
    self_offsets: Vec<usize>,
}

impl Rule {
    fn new(from: String, to: String) -> Self {
        let self_offsets = to.match_indices(from.as_str()).map(|(i, _)| i).collect();
        Self {
            from,
            to,
            self_offsets,
        }
    }

    /// If the match at `at` lies inside an occurrence of `to`, the end of that
    /// occurrence.
    fn enclosing_replacement(&self, text: &str, at: usize) -> Option<usize> {
        self.self_offsets.iter().find_map(|&offset| {
            let start = at.checked_sub(offset)?;
            let end = start + self.to.len();
            (text.get(start..end) == Some(self.to.as_str())).then_some(end)
        })
    }
}

/// An order-independent set of literal text substitutions.
#[derive(Debug, Clone, Default)]
pub struct Substitutions {
    rules: Vec<Rule>,
    /// Rule indices keyed by first byte, longest key first.
    by_first: HashMap<u8, Vec<usize>>,
}

impl Substitutions {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the set holds no keys.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Add `from → to`. Identity pairs and empty keys are ignored; the first
    /// target registered for a key is kept.
    pub fn insert(&mut self, from: impl Into<String>, to: impl Into<String>) -> bool {
        let (from, to) = (from.into(), to.into());
        let Some(&first) = from.as_bytes().first() else {
            return false;
        };
        if from == to {
            return false;
        }

        let bucket = self.by_first.entry(first).or_default();
        if bucket.iter().any(|&i| self.rules[i].from == from) {
            return false;
        }
        let index = self.rules.len();
        let position = bucket
            .iter()
            .position(|&i| self.rules[i].from.len() < from.len())
            .unwrap_or(bucket.len());
        bucket.insert(position, index);
        self.rules.push(Rule::new(from, to));
        true
    }

    /// Add the slash, dot and backslash spellings of `from → to`.
    pub fn insert_path_forms(&mut self, from: &str, to: &str) {
        for (from, to) in path_forms(from).into_iter().zip(path_forms(to)) {
            self.insert(from, to);
        }
    }

    /// Add every spelling under which a class may be referenced from text:
    /// each separator form with and without `.class`, and the quoted simple
    /// name.
    ///
    /// A top-level class has a single suffix-less spelling; it is mapped to
    /// the binary (dotted) name of its target.
    pub fn insert_class(&mut self, original: &str, relocated: &str) {
        self.insert_path_forms(original, relocated);

        let bare = strip_class_suffix(original);
        if bare.len() < original.len() {
            let target = strip_class_suffix(relocated);
            if !bare.contains('/') {
                self.insert(bare, target.replace('/', "."));
            }
            self.insert_path_forms(bare, target);
        }

        if original.ends_with(CLASS_SUFFIX) {
            self.insert(
                format!("\"{}\"", simple_name(original)),
                format!("\"{}\"", simple_name(relocated)),
            );
        }
    }

    /// Rewrite `text`, returning `None` when nothing changed.
    pub fn apply(&self, text: &str) -> Option<String> {
        if self.rules.is_empty() {
            return None;
        }

        let bytes = text.as_bytes();
        let mut out = String::new();
        let mut copied = 0;
        let mut changed = false;
        let mut at = 0;

        while at < bytes.len() {
            let Some(rule) = self.longest_match(text, at) else {
                at += 1;
                continue;
            };

            if let Some(end) = rule.enclosing_replacement(text, at) {
                at = end.max(at + rule.from.len());
                continue;
            }

            out.push_str(&text[copied..at]);
            out.push_str(&rule.to);
            at += rule.from.len();
            copied = at;
            changed = true;
        }

        if !changed {
            return None;
        }
        out.push_str(&text[copied..]);
        Some(out)
    }

    fn longest_match(&self, text: &str, at: usize) -> Option<&Rule> {
        let rest = &text.as_bytes()[at..];
        self.by_first
            .get(rest.first()?)?
            .iter()
            .map(|&i| &self.rules[i])
            .find(|rule| rest.starts_with(rule.from.as_bytes()))
    }
}

/// Slash, dot and backslash spellings of a forward-slash path.
pub fn path_forms(path: &str) -> [String; 3] {
    [
        path.to_string(),
        path.replace('/', "."),
        path.replace('/', "\\"),
    ]
}

/// Final segment of a class path without `.class`.
fn simple_name(path: &str) -> &str {
    let bare = strip_class_suffix(path);
    bare.rsplit_once('/').map_or(bare, |(_, name)| name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class_set(pairs: &[(&str, &str)]) -> Substitutions {
        let mut subs = Substitutions::new();
        for (from, to) in pairs {
            subs.insert_class(from, to);
        }
        subs
    }

    #[test]
    fn rewrites_every_spelling_of_a_class() {
        let subs = class_set(&[("com/x/Util.class", "forge/com/x/Util.class")]);
        let text = "a=com.x.Util b=com/x/Util c=com\\x\\Util d=com/x/Util.class";
        assert_eq!(
            subs.apply(text).unwrap(),
            "a=forge.com.x.Util b=forge/com/x/Util c=forge\\com\\x\\Util d=forge/com/x/Util.class"
        );
    }

    #[test]
    fn applying_twice_is_idempotent() {
        let subs = class_set(&[("com/x/Util.class", "forge/com/x/Util.class")]);
        let once = subs.apply(r#"{"entry":"com.x.Util"}"#).unwrap();
        assert_eq!(once, r#"{"entry":"forge.com.x.Util"}"#);
        assert_eq!(subs.apply(&once), None);
    }

    #[test]
    fn longest_key_wins_regardless_of_insertion_order() {
        let mut forward = Substitutions::new();
        forward.insert("a.B", "x.a.B");
        forward.insert("a.Bc", "y.a.Bc");

        let mut reverse = Substitutions::new();
        reverse.insert("a.Bc", "y.a.Bc");
        reverse.insert("a.B", "x.a.B");

        let text = "a.Bc a.B";
        assert_eq!(forward.apply(text), reverse.apply(text));
        assert_eq!(forward.apply(text).unwrap(), "y.a.Bc x.a.B");
    }

    #[test]
    fn identity_pairs_are_dropped() {
        let subs = class_set(&[("com/x/Util.class", "forge/com/x/Util.class")]);
        // quoted simple name maps to itself
        assert!(subs.apply("\"Util\"").is_none());

        let mut plain = Substitutions::new();
        assert!(!plain.insert("same", "same"));
        assert!(plain.is_empty());
    }

    #[test]
    fn top_level_class_is_rewritten_without_suffix() {
        let subs = class_set(&[("Util.class", "forge/Util.class")]);
        let once = subs.apply("Main-Class: Util\nfile: Util.class\n").unwrap();
        assert_eq!(once, "Main-Class: forge.Util\nfile: forge/Util.class\n");
        assert_eq!(subs.apply(&once), None);
    }

    #[test]
    fn path_forms_cover_three_separators() {
        assert_eq!(
            path_forms("assets/x/a.json"),
            ["assets/x/a.json", "assets.x.a.json", "assets\\x\\a.json"].map(String::from)
        );
    }

    #[test]
    fn non_ascii_text_is_preserved() {
        let mut subs = Substitutions::new();
        subs.insert_path_forms("a/b.json", "a/forge-b.json");
        assert_eq!(
            subs.apply("ünïcode a/b.json ✓").unwrap(),
            "ünïcode a/forge-b.json ✓"
        );
    }

    #[test]
    fn first_target_for_a_key_is_kept() {
        let mut subs = Substitutions::new();
        assert!(subs.insert("k", "v1"));
        assert!(!subs.insert("k", "v2"));
        assert_eq!(subs.apply("k").unwrap(), "v1");
    }
}
