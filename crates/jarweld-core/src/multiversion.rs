//! Multi-version bundling.
//!
//! Packs N builds of the same mod, one per game version range, into a single
//! outer archive. Files that are byte-identical in every build are hoisted
//! into one shared bundle; each version keeps only what differs.
//!
//! Layout of the output:
//!
//! ```text
//! META-INF/MANIFEST.MF
//! META-INF/multiversion.json          descriptor
//! META-INF/multiversion/common.jar    shared files (maximum compression)
//! META-INF/multiversion/<file>.jar    one per version (stored)
//! fabric.mod.json                     library mod nesting every version
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use jarweld_schema::{
    ContentHash, FabricModDescriptor, MANIFEST_PATH, MultiversionDescriptor, fabric_mod_id,
};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::archive::{Archive, ArchiveEntry, Compression};
use crate::error::{MergeError, Result};
use crate::manifest::Manifest;

/// Location of the [`MultiversionDescriptor`] in the outer archive.
pub const DESCRIPTOR_PATH: &str = "META-INF/multiversion.json";
/// Directory holding every sub-bundle.
pub const BUNDLE_DIR: &str = "META-INF/multiversion";
/// Sub-bundle of files shared by every version.
pub const COMMON_BUNDLE: &str = "META-INF/multiversion/common.jar";
/// Fabric mod descriptor, in the outer archive and in each build.
pub const FABRIC_DESCRIPTOR: &str = "fabric.mod.json";

/// Fewest builds worth bundling.
pub const MIN_VERSIONS: usize = 2;

/// Loader metadata every build must keep for itself.
const EXCLUDED_FILES: [&str; 6] = [
    MANIFEST_PATH,
    "META-INF/mods.toml",
    "META-INF/neoforge.mods.toml",
    FABRIC_DESCRIPTOR,
    "quilt.mod.json",
    "pack.mcmeta",
];

const EXCLUDED_PREFIXES: [&str; 3] = ["META-INF/services/", "META-INF/jars/", "META-INF/jarjar/"];

const EXCLUDED_EXTENSIONS: [&str; 2] = ["png", "jar"];

/// Whether `path` always stays in its version bundle.
pub fn is_excluded(path: &str) -> bool {
    EXCLUDED_FILES.contains(&path)
        || EXCLUDED_PREFIXES.iter().any(|p| path.starts_with(p))
        || Path::new(path)
            .extension()
            .and_then(std::ffi::OsStr::to_str)
            .is_some_and(|ext| {
                EXCLUDED_EXTENSIONS
                    .iter()
                    .any(|x| ext.eq_ignore_ascii_case(x))
            })
}

/// One build and the version range it targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInput {
    /// Version range expression, e.g. `[1.20,1.21)`.
    pub range: String,
    /// The build archive.
    pub path: PathBuf,
}

impl VersionInput {
    /// Pair a build with its range.
    pub fn new(range: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            range: range.into(),
            path: path.into(),
        }
    }
}

/// What [`bundle`] wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiversionReport {
    /// Files hoisted into the shared bundle.
    pub common: usize,
    /// Descriptor written to [`DESCRIPTOR_PATH`].
    pub descriptor: MultiversionDescriptor,
    /// Descriptor written to [`FABRIC_DESCRIPTOR`].
    pub fabric: FabricModDescriptor,
}

/// Paths whose content is identical in every archive and not excluded.
pub fn common_paths(archives: &[Archive]) -> HashSet<String> {
    let Some((first, rest)) = archives.split_first() else {
        return HashSet::new();
    };
    first
        .files()
        .filter(|entry| !is_excluded(&entry.path))
        .filter(|entry| {
            rest.iter()
                .all(|other| other.get(&entry.path).is_some_and(|o| !o.is_dir && o.hash == entry.hash))
        })
        .map(|entry| entry.path.clone())
        .collect()
}

/// Bundle `inputs` into the archive at `dest`.
///
/// # Errors
///
/// Returns [`MergeError::NoInputs`] for an empty input list,
/// [`MergeError::Config`] for a single build or a repeated range,
/// [`MergeError::MissingInput`] if any build is missing (before anything is
/// written), or any archive or descriptor error.
pub fn bundle(inputs: &[VersionInput], dest: &Path) -> Result<MultiversionReport> {
    if inputs.is_empty() {
        return Err(MergeError::NoInputs);
    }
    if inputs.len() < MIN_VERSIONS {
        return Err(MergeError::Config(format!(
            "at least {MIN_VERSIONS} builds are needed to bundle versions, got {}",
            inputs.len()
        )));
    }
    let mut ranges = HashSet::new();
    if let Some(dup) = inputs.iter().find(|i| !ranges.insert(i.range.as_str())) {
        return Err(MergeError::Config(format!(
            "version range '{}' is given more than once",
            dup.range
        )));
    }
    if let Some(missing) = inputs.iter().find(|i| !i.path.is_file()) {
        return Err(MergeError::MissingInput {
            name: missing.range.clone(),
            path: missing.path.clone(),
        });
    }

    let archives: Vec<Archive> = inputs
        .par_iter()
        .map(|input| Archive::open(&input.path))
        .collect::<Result<_>>()?;

    let common = common_paths(&archives);
    let mut descriptor = MultiversionDescriptor::new();
    let mut outer = Vec::with_capacity(inputs.len() + 3);

    let mut manifest = Manifest::new();
    manifest.insert("Created-By", concat!("jarweld ", env!("CARGO_PKG_VERSION")));
    outer.push(ArchiveEntry::file(MANIFEST_PATH, manifest.to_bytes()));

    if !common.is_empty() {
        let shared: Vec<ArchiveEntry> = archives[0]
            .files()
            .filter(|e| common.contains(&e.path))
            .cloned()
            .collect();
        let bytes = Archive::from_entries(COMMON_BUNDLE, shared).to_bytes(Compression::Maximum)?;
        outer.push(ArchiveEntry::file(COMMON_BUNDLE, bytes));
        descriptor.common = Some(COMMON_BUNDLE.to_string());
    }

    let mut used = HashSet::new();
    used.insert(COMMON_BUNDLE.to_string());
    for (index, (input, archive)) in inputs.iter().zip(&archives).enumerate() {
        let own: Vec<ArchiveEntry> = archive
            .entries()
            .iter()
            .filter(|e| !common.contains(&e.path))
            .cloned()
            .collect();
        let location = bundle_path(&input.path, index, &mut used);
        debug!(range = %input.range, bundle = %location, entries = own.len(), "version bundle");

        let bytes = Archive::from_entries(&location, own).to_bytes(Compression::Stored)?;
        outer.push(ArchiveEntry::file(location.as_str(), bytes));
        descriptor.versions.insert(input.range.clone(), location);
    }

    let descriptor_json = serde_json::to_vec_pretty(&descriptor)?;
    let fabric = fabric_descriptor(&archives, &descriptor, &descriptor_json);
    outer.push(ArchiveEntry::file(DESCRIPTOR_PATH, descriptor_json));
    outer.push(ArchiveEntry::file(
        FABRIC_DESCRIPTOR,
        serde_json::to_vec_pretty(&fabric)?,
    ));
    Archive::from_entries(dest, outer).write(Compression::Deflated)?;

    info!(
        output = %dest.display(),
        versions = descriptor.versions.len(),
        common = common.len(),
        "bundled versions"
    );
    Ok(MultiversionReport {
        common: common.len(),
        descriptor,
        fabric,
    })
}

/// Library mod nesting every version sub-bundle.
///
/// Its id is derived from the descriptor so two different bundles never
/// share one; it depends on the first mod id found among the builds.
fn fabric_descriptor(
    archives: &[Archive],
    descriptor: &MultiversionDescriptor,
    descriptor_json: &[u8],
) -> FabricModDescriptor {
    let depends_on = archives
        .iter()
        .filter_map(|a| a.get(FABRIC_DESCRIPTOR))
        .find_map(|entry| fabric_mod_id(&entry.data));
    if depends_on.is_none() {
        debug!("no build carries a fabric mod id");
    }
    FabricModDescriptor::library(
        format!("jarweld_multiversion_{}", ContentHash::compute(descriptor_json).short()),
        env!("CARGO_PKG_VERSION"),
        descriptor.versions.values().cloned(),
        depends_on.as_deref(),
    )
}

/// `META-INF/multiversion/<file name>`, prefixed with the input index when
/// the name is already taken.
fn bundle_path(input: &Path, index: usize, used: &mut HashSet<String>) -> String {
    let name = input
        .file_name()
        .map_or_else(|| format!("version-{index}.jar"), |n| n.to_string_lossy().into_owned());
    let mut location = format!("{BUNDLE_DIR}/{name}");
    if used.contains(&location) {
        location = format!("{BUNDLE_DIR}/{index}-{name}");
    }
    used.insert(location.clone());
    location
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn build(dir: &Path, name: &str, files: &[(&str, &str)]) -> PathBuf {
        let path = dir.join(name);
        let mut archive = Archive::empty(&path);
        for (entry, content) in files {
            archive.insert(ArchiveEntry::file(*entry, content.as_bytes().to_vec()));
        }
        archive.write(Compression::Deflated).unwrap();
        path
    }

    fn nested(outer: &Archive, entry: &str, dir: &Path) -> Archive {
        let path = dir.join(entry.replace('/', "_"));
        std::fs::write(&path, &outer.get(entry).unwrap().data).unwrap();
        Archive::open(&path).unwrap()
    }

    #[test]
    fn exclusions() {
        assert!(is_excluded("META-INF/MANIFEST.MF"));
        assert!(is_excluded("META-INF/services/x.Api"));
        assert!(is_excluded("META-INF/jarjar/dep.jar"));
        assert!(is_excluded("assets/x/icon.PNG"));
        assert!(is_excluded("pack.mcmeta"));
        assert!(!is_excluded("assets/x/lang/en_us.json"));
        assert!(!is_excluded("com/x/Util.class"));
    }

    #[test]
    fn identical_files_are_hoisted() {
        let dir = TempDir::new().unwrap();
        let inputs = vec![
            VersionInput::new("[1.18,1.19)", build(dir.path(), "v1.jar", &[("a", "H"), ("b", "1")])),
            VersionInput::new("[1.19,1.20)", build(dir.path(), "v2.jar", &[("a", "H"), ("b", "2")])),
            VersionInput::new("[1.20,)", build(dir.path(), "v3.jar", &[("a", "H"), ("b", "3")])),
        ];
        let dest = dir.path().join("bundle.jar");
        let report = bundle(&inputs, &dest).unwrap();
        assert_eq!(report.common, 1);

        let outer = Archive::open(&dest).unwrap();
        let common = nested(&outer, COMMON_BUNDLE, dir.path());
        assert_eq!(common.get("a").unwrap().data, b"H");
        assert!(!common.contains("b"));

        for (range, content) in [("[1.18,1.19)", "1"), ("[1.19,1.20)", "2"), ("[1.20,)", "3")] {
            let location = &report.descriptor.versions[range];
            let version = nested(&outer, location, dir.path());
            assert!(!version.contains("a"));
            assert_eq!(version.get("b").unwrap().data, content.as_bytes());
        }

        let descriptor: MultiversionDescriptor =
            serde_json::from_slice(&outer.get(DESCRIPTOR_PATH).unwrap().data).unwrap();
        assert_eq!(descriptor, report.descriptor);
        assert!(outer.contains(MANIFEST_PATH));
    }

    #[test]
    fn excluded_files_stay_per_version() {
        let dir = TempDir::new().unwrap();
        let inputs = vec![
            VersionInput::new("[1,2)", build(dir.path(), "a.jar", &[("pack.mcmeta", "{}")])),
            VersionInput::new("[2,3)", build(dir.path(), "b.jar", &[("pack.mcmeta", "{}")])),
        ];
        let report = bundle(&inputs, &dir.path().join("out.jar")).unwrap();
        assert_eq!(report.common, 0);
        assert_eq!(report.descriptor.common, None);
    }

    #[test]
    fn clashing_file_names_are_disambiguated() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("x")).unwrap();
        let inputs = vec![
            VersionInput::new("[1,2)", build(dir.path(), "mod.jar", &[("a", "1")])),
            VersionInput::new("[2,3)", build(&dir.path().join("x"), "mod.jar", &[("a", "2")])),
        ];
        let report = bundle(&inputs, &dir.path().join("out.jar")).unwrap();
        assert_eq!(report.descriptor.versions["[1,2)"], "META-INF/multiversion/mod.jar");
        assert_eq!(report.descriptor.versions["[2,3)"], "META-INF/multiversion/1-mod.jar");
    }

    #[test]
    fn missing_input_aborts_before_writing() {
        let dir = TempDir::new().unwrap();
        let inputs = vec![
            VersionInput::new("[1,2)", build(dir.path(), "a.jar", &[("a", "1")])),
            VersionInput::new("[2,3)", dir.path().join("missing.jar")),
        ];
        let dest = dir.path().join("out.jar");
        let err = bundle(&inputs, &dest).unwrap_err();
        assert!(matches!(err, MergeError::MissingInput { .. }));
        assert!(!dest.exists());
        assert!(matches!(bundle(&[], &dest), Err(MergeError::NoInputs)));
    }

    #[test]
    fn single_build_is_rejected() {
        let dir = TempDir::new().unwrap();
        let inputs = vec![VersionInput::new(
            "[1,2)",
            build(
                dir.path(),
                "a.jar",
                &[("com/x/A.class", "a"), ("assets/x/lang/en_us.json", "{}")],
            ),
        )];
        let dest = dir.path().join("out.jar");
        let err = bundle(&inputs, &dest).unwrap_err();
        assert!(matches!(err, MergeError::Config(_)));
        assert!(!dest.exists());
    }

    #[test]
    fn fabric_descriptor_nests_versions_and_depends_on_the_mod() {
        let dir = TempDir::new().unwrap();
        let inputs = vec![
            VersionInput::new("[1,2)", build(dir.path(), "a.jar", &[("a", "1")])),
            VersionInput::new(
                "[2,3)",
                build(
                    dir.path(),
                    "b.jar",
                    &[("a", "2"), ("fabric.mod.json", r#"{"schemaVersion":1,"id":"examplemod"}"#)],
                ),
            ),
        ];
        let dest = dir.path().join("out.jar");
        let report = bundle(&inputs, &dest).unwrap();

        let outer = Archive::open(&dest).unwrap();
        let fabric: FabricModDescriptor =
            serde_json::from_slice(&outer.get(FABRIC_DESCRIPTOR).unwrap().data).unwrap();
        assert_eq!(fabric, report.fabric);
        assert!(fabric.id.starts_with("jarweld_multiversion_"));
        let files: Vec<&str> = fabric.jars.iter().map(|j| j.file.as_str()).collect();
        assert_eq!(
            files,
            vec!["META-INF/multiversion/a.jar", "META-INF/multiversion/b.jar"]
        );
        assert_eq!(fabric.depends.get("examplemod").map(String::as_str), Some("*"));

        // the build keeps its own descriptor
        let b = nested(&outer, "META-INF/multiversion/b.jar", dir.path());
        assert!(b.contains(FABRIC_DESCRIPTOR));
    }
}
