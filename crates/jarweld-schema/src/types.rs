//! Namespaces, entry kinds and bundle descriptors.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;

use crate::{CLASS_SUFFIX, MANIFEST_PATH, SERVICES_PREFIX};

/// Relocation tag of one input variant (e.g. `forge`, `fabric`).
///
/// Namespaces become the first package segment of relocated classes, so they
/// must be valid JVM identifiers: `[A-Za-z_][A-Za-z0-9_]*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Namespace(String);

/// Errors that can occur when validating a [`Namespace`].
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum NamespaceError {
    /// The tag is empty.
    #[error("namespace must not be empty")]
    Empty,

    /// The tag contains a character that is not allowed in a package segment.
    #[error("invalid namespace '{0}': expected [A-Za-z_][A-Za-z0-9_]*")]
    Invalid(String),
}

impl Namespace {
    /// Validate and wrap a namespace tag.
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceError::Empty`] for an empty tag, or
    /// [`NamespaceError::Invalid`] if it is not a valid JVM identifier.
    pub fn new(tag: impl Into<String>) -> Result<Self, NamespaceError> {
        let tag = tag.into();
        let mut chars = tag.chars();
        let Some(first) = chars.next() else {
            return Err(NamespaceError::Empty);
        };
        let head_ok = first.is_ascii_alphabetic() || first == '_';
        if !head_ok || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(NamespaceError::Invalid(tag));
        }
        Ok(Self(tag))
    }

    /// Return the tag as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Namespace {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Namespace {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Namespace {
    type Error = NamespaceError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl TryFrom<&str> for Namespace {
    type Error = NamespaceError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Namespace> for String {
    fn from(ns: Namespace) -> Self {
        ns.0
    }
}

/// How an archive entry participates in relocation, decided by its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Compiled class (`*.class`); renamed by the bytecode remapper.
    Class,
    /// The JAR manifest; never relocated, merged attribute-wise.
    Manifest,
    /// `META-INF/services/*`; never renamed, merged line-wise.
    Service,
    /// Any other file; renamed with a namespaced file name.
    Resource,
}

impl EntryKind {
    /// Classify a normalized (forward-slash) archive path.
    pub fn of(path: &str) -> Self {
        if path.ends_with(CLASS_SUFFIX) {
            Self::Class
        } else if path == MANIFEST_PATH {
            Self::Manifest
        } else if path.starts_with(SERVICES_PREFIX) {
            Self::Service
        } else {
            Self::Resource
        }
    }
}

/// Normalize an archive path to forward slashes without a leading `./` or `/`.
pub fn normalize_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    let trimmed = path.trim_start_matches("./").trim_start_matches('/');
    trimmed.to_string()
}

/// Strip the `.class` suffix if present.
pub fn strip_class_suffix(path: &str) -> &str {
    path.strip_suffix(CLASS_SUFFIX).unwrap_or(path)
}

/// Descriptor written next to the sub-bundles of a multi-version archive.
///
/// Maps each version-range expression (e.g. `[1.20,1.21)`) to the internal
/// path of its sub-bundle, plus the path of the shared bundle holding files
/// common to every version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiversionDescriptor {
    /// Schema version of this descriptor.
    pub schema: u32,
    /// Version range expression to sub-bundle path.
    pub versions: BTreeMap<String, String>,
    /// Sub-bundle shared by every version, if any file was common.
    pub common: Option<String>,
}

impl MultiversionDescriptor {
    /// Current descriptor schema version.
    pub const SCHEMA: u32 = 1;

    /// Create an empty descriptor at the current schema version.
    pub fn new() -> Self {
        Self {
            schema: Self::SCHEMA,
            ..Self::default()
        }
    }
}

/// `fabric.mod.json` of a multi-version bundle.
///
/// Fabric loads nested jars declared by a mod descriptor, so the outer bundle
/// carries a library mod whose only job is to list the version sub-bundles.
/// It depends on the bundled mod's own id when one is known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FabricModDescriptor {
    /// Always 1.
    pub schema_version: u32,
    /// Mod id of the bundle itself.
    pub id: String,
    /// Version of the bundle.
    pub version: String,
    /// Nested jars, one per version sub-bundle.
    pub jars: Vec<NestedJar>,
    /// Mod id to version requirement.
    #[serde(default)]
    pub depends: BTreeMap<String, String>,
    /// Free-form metadata for other mods (e.g. Mod Menu badges).
    #[serde(default)]
    pub custom: serde_json::Value,
}

/// One `jars` element of a [`FabricModDescriptor`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestedJar {
    /// Path of the nested jar inside the outer archive.
    pub file: String,
}

impl FabricModDescriptor {
    /// Descriptor for a bundle `id` at `version` nesting `jars`, depending on
    /// `depends_on` at any version when given.
    pub fn library(
        id: impl Into<String>,
        version: impl Into<String>,
        jars: impl IntoIterator<Item = String>,
        depends_on: Option<&str>,
    ) -> Self {
        Self {
            schema_version: 1,
            id: id.into(),
            version: version.into(),
            jars: jars.into_iter().map(|file| NestedJar { file }).collect(),
            depends: depends_on
                .map(|id| (id.to_string(), "*".to_string()))
                .into_iter()
                .collect(),
            custom: serde_json::json!({ "modmenu": { "badges": ["library"] } }),
        }
    }
}

/// The `id` field of a mod's own `fabric.mod.json`, if it parses.
pub fn fabric_mod_id(descriptor: &[u8]) -> Option<String> {
    #[derive(Deserialize)]
    struct IdOnly {
        id: String,
    }
    serde_json::from_slice::<IdOnly>(descriptor).ok().map(|d| d.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_accepts_identifiers() {
        assert!(Namespace::new("forge").is_ok());
        assert!(Namespace::new("_quilt2").is_ok());
    }

    #[test]
    fn namespace_rejects_separators_and_digits() {
        assert_eq!(Namespace::new(""), Err(NamespaceError::Empty));
        assert!(Namespace::new("neo/forge").is_err());
        assert!(Namespace::new("neo.forge").is_err());
        assert!(Namespace::new("neo-forge").is_err());
        assert!(Namespace::new("1forge").is_err());
    }

    #[test]
    fn namespace_deserializes_with_validation() {
        let ok: Namespace = serde_json::from_str("\"fabric\"").unwrap();
        assert_eq!(ok.as_str(), "fabric");
        assert!(serde_json::from_str::<Namespace>("\"fab ric\"").is_err());
    }

    #[test]
    fn entry_kinds() {
        assert_eq!(EntryKind::of("com/x/Util.class"), EntryKind::Class);
        assert_eq!(EntryKind::of("META-INF/MANIFEST.MF"), EntryKind::Manifest);
        assert_eq!(
            EntryKind::of("META-INF/services/com.x.Api"),
            EntryKind::Service
        );
        assert_eq!(EntryKind::of("assets/x/lang/en_us.json"), EntryKind::Resource);
    }

    #[test]
    fn normalize_backslashes_and_leading_separators() {
        assert_eq!(normalize_path("com\\x\\Util.class"), "com/x/Util.class");
        assert_eq!(normalize_path("./a/b.txt"), "a/b.txt");
        assert_eq!(normalize_path("/a/b.txt"), "a/b.txt");
    }

    #[test]
    fn fabric_descriptor_lists_jars_and_dependency() {
        let descriptor = FabricModDescriptor::library(
            "bundle",
            "1.0.0",
            ["META-INF/multiversion/a.jar".to_string()],
            Some("examplemod"),
        );
        let json: serde_json::Value = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(json["schemaVersion"], 1);
        assert_eq!(json["jars"][0]["file"], "META-INF/multiversion/a.jar");
        assert_eq!(json["depends"]["examplemod"], "*");
        assert_eq!(json["custom"]["modmenu"]["badges"][0], "library");

        let without = FabricModDescriptor::library("bundle", "1.0.0", Vec::new(), None);
        assert!(without.depends.is_empty());
    }

    #[test]
    fn fabric_mod_id_reads_only_the_id() {
        let json = br#"{"schemaVersion":1,"id":"examplemod","version":"2.0","entrypoints":{}}"#;
        assert_eq!(fabric_mod_id(json).as_deref(), Some("examplemod"));
        assert_eq!(fabric_mod_id(b"not json"), None);
    }

    #[test]
    fn descriptor_roundtrips_through_json() {
        let mut descriptor = MultiversionDescriptor::new();
        descriptor
            .versions
            .insert("[1.20,1.21)".into(), "META-INF/multiversion/a.jar".into());
        let json = serde_json::to_string(&descriptor).unwrap();
        let back: MultiversionDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, descriptor);
        assert_eq!(back.schema, MultiversionDescriptor::SCHEMA);
    }
}
