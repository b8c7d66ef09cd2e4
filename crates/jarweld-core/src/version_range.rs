//! Minecraft version range detection from mod metadata.

use tracing::{debug, warn};

use crate::archive::{Archive, ArchiveEntry};

/// Range matching every version, used when nothing better is declared.
pub const ANY_VERSION: &str = "[0,)";

/// Metadata files consulted, in order.
pub const MOD_METADATA: [&str; 2] = ["META-INF/mods.toml", "META-INF/neoforge.mods.toml"];

/// The `versionRange` of the `minecraft` dependency declared in a
/// `mods.toml` document.
///
/// Dependencies are `[[dependencies.<modid>]]` arrays of tables; the first
/// entry with `modId = "minecraft"` wins.
///
/// # Errors
///
/// Returns the parse error if `text` is not valid TOML.
pub fn from_mods_toml(text: &str) -> Result<Option<String>, toml::de::Error> {
    let document: toml::Table = text.parse()?;
    let Some(dependencies) = document.get("dependencies").and_then(toml::Value::as_table) else {
        return Ok(None);
    };

    let range = dependencies
        .values()
        .filter_map(toml::Value::as_array)
        .flatten()
        .filter_map(toml::Value::as_table)
        .find(|dep| dep.get("modId").and_then(toml::Value::as_str) == Some("minecraft"))
        .and_then(|dep| dep.get("versionRange"))
        .and_then(toml::Value::as_str)
        .map(str::to_string);
    Ok(range)
}

/// Detect the version range of `archive`, falling back to [`ANY_VERSION`].
pub fn detect(archive: &Archive) -> String {
    for name in MOD_METADATA {
        let Some(text) = archive.get(name).and_then(ArchiveEntry::text) else {
            continue;
        };
        match from_mods_toml(text) {
            Ok(Some(range)) => {
                debug!(archive = %archive.path().display(), range = %range, "detected version range");
                return range;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(archive = %archive.path().display(), file = name, error = %e, "unreadable mod metadata");
            }
        }
    }
    ANY_VERSION.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODS_TOML: &str = r#"
modLoader = "javafml"
loaderVersion = "[47,)"

[[mods]]
modId = "example"

[[dependencies.example]]
modId = "forge"
versionRange = "[47,)"

[[dependencies.example]]
modId = "minecraft"
mandatory = true
versionRange = "[1.20.1,1.21)"
"#;

    #[test]
    fn finds_minecraft_dependency() {
        assert_eq!(
            from_mods_toml(MODS_TOML).unwrap().as_deref(),
            Some("[1.20.1,1.21)")
        );
    }

    #[test]
    fn missing_dependency_is_none() {
        assert_eq!(from_mods_toml("modLoader = \"javafml\"").unwrap(), None);
        assert!(from_mods_toml("not = [valid").is_err());
    }

    #[test]
    fn detect_reads_neoforge_metadata_and_defaults() {
        let mut archive = Archive::empty("neo.jar");
        archive.insert(ArchiveEntry::file("META-INF/neoforge.mods.toml", MODS_TOML));
        assert_eq!(detect(&archive), "[1.20.1,1.21)");

        assert_eq!(detect(&Archive::empty("bare.jar")), ANY_VERSION);
    }
}
