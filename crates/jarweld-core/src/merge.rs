//! Merge pipeline orchestration.
//!
//! Registration → class relocation → resource relocation → combination →
//! optional duplicate collapse → placement of the result. Every stage works
//! on copies inside a scratch directory, so neither the caller's inputs nor
//! an existing output are touched until the final atomic rename.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use jarweld_schema::Namespace;
use tempfile::TempDir;
use tracing::{info, warn};

use crate::archive::{self, parent_dir};
use crate::collapse::{CollapseReport, Collapser};
use crate::combine::{CombineReport, Combiner};
use crate::config::{DEFAULT_MAX_PASSES, MergeConfig};
use crate::detect::VariantPolicy;
use crate::error::{MergeError, Result};
use crate::namespaced::NamespacedArchive;
use crate::paths;
use crate::relocate::{ClassRelocation, ClassRelocator};
use crate::remapper::Remapper;
use crate::reporter::Reporter;
use crate::resources::{ResourceRelocation, ResourceRelocator};

/// One archive to merge under a namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputArchive {
    /// Relocation tag.
    pub namespace: Namespace,
    /// The caller's archive; never modified.
    pub path: PathBuf,
    /// Whether a missing file aborts the merge.
    pub required: bool,
}

impl InputArchive {
    /// A required input.
    ///
    /// # Errors
    ///
    /// Returns an error if `namespace` is not a valid namespace tag.
    pub fn new(namespace: &str, path: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            namespace: Namespace::new(namespace)?,
            path: path.into(),
            required: true,
        })
    }

    /// Skip this input with a warning when its file is missing.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// What a merge did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeReport {
    /// Where the result was written.
    pub output: PathBuf,
    /// Namespaces merged, in registration order.
    pub merged: Vec<Namespace>,
    /// Optional inputs that were missing.
    pub skipped: Vec<Namespace>,
    /// Class relocation loop outcome.
    pub classes: ClassRelocation,
    /// Resource relocation loop outcome.
    pub resources: ResourceRelocation,
    /// Combination summary.
    pub combine: CombineReport,
    /// Collapse summary, when names were given.
    pub collapse: Option<CollapseReport>,
}

/// Merges namespaced archives into one.
#[derive(Debug)]
pub struct Merger<R> {
    remapper: R,
    inputs: Vec<InputArchive>,
    policy: VariantPolicy,
    max_passes: usize,
    collapse: Vec<String>,
    manifest: Vec<(String, String)>,
    work_dir: Option<PathBuf>,
}

impl<R: Remapper> Merger<R> {
    /// A merger with no inputs and default settings.
    pub fn new(remapper: R) -> Self {
        Self {
            remapper,
            inputs: Vec::new(),
            policy: VariantPolicy::default(),
            max_passes: DEFAULT_MAX_PASSES,
            collapse: Vec::new(),
            manifest: Vec::new(),
            work_dir: None,
        }
    }

    /// Build a merger from a loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if an input namespace is invalid or repeated.
    pub fn from_config(config: &MergeConfig, remapper: R) -> Result<Self> {
        let mut merger = Self::new(remapper)
            .policy(config.policy())
            .max_passes(config.max_passes)
            .collapse(config.collapse.clone())
            .manifest_attributes(config.manifest.clone());
        if let Some(work) = &config.work_dir {
            merger = merger.work_dir(work.clone());
        }
        for input in &config.inputs {
            let mut archive = InputArchive::new(&input.namespace, &input.path)?;
            archive.required = input.required;
            merger.add_input(archive)?;
        }
        Ok(merger)
    }

    /// Register an input. Registration order decides which archive is
    /// "first seen" for conflict resolution and combination.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::DuplicateNamespace`] if the namespace is taken.
    pub fn add_input(&mut self, input: InputArchive) -> Result<()> {
        if self.inputs.iter().any(|i| i.namespace == input.namespace) {
            return Err(MergeError::DuplicateNamespace(input.namespace));
        }
        self.inputs.push(input);
        Ok(())
    }

    /// Registered inputs in order.
    pub fn inputs(&self) -> &[InputArchive] {
        &self.inputs
    }

    /// Which owners of a conflicting variant are relocated.
    #[must_use]
    pub fn policy(mut self, policy: VariantPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Pass limit of each relocation loop.
    #[must_use]
    pub fn max_passes(mut self, max_passes: usize) -> Self {
        self.max_passes = max_passes;
        self
    }

    /// Class names to fold back to a single canonical copy after combining.
    #[must_use]
    pub fn collapse(mut self, names: Vec<String>) -> Self {
        self.collapse = names;
        self
    }

    /// Attributes set on the merged manifest after all inputs.
    #[must_use]
    pub fn manifest_attributes(mut self, attributes: impl IntoIterator<Item = (String, String)>) -> Self {
        self.manifest = attributes.into_iter().collect();
        self
    }

    /// Parent of the per-run scratch directory; the system temp dir if unset.
    #[must_use]
    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    /// Run the full pipeline and atomically write the result to `output`.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::MissingInput`] or [`MergeError::NoInputs`]
    /// before any work is done, and otherwise the first error of any stage.
    /// `output` is left untouched on error.
    pub fn run(&self, output: &Path, reporter: &dyn Reporter) -> Result<MergeReport> {
        let started = Instant::now();

        let (present, skipped) = self.resolve_inputs(reporter)?;
        let scratch = self.scratch()?;
        let work = scratch.path();
        info!(work = %work.display(), inputs = present.len(), "starting merge");

        reporter.stage("Registering inputs");
        let mut archives = register(&present, &paths::inputs_dir(work), reporter)?;
        let tables = paths::tables_dir(work);

        reporter.stage("Relocating classes");
        let classes = ClassRelocator::new(&self.remapper, &tables)
            .policy(self.policy)
            .max_passes(self.max_passes)
            .run(&mut archives, reporter)?;

        reporter.stage("Relocating resources");
        let resources = ResourceRelocator::new()
            .policy(self.policy)
            .max_passes(self.max_passes)
            .run(&mut archives, reporter)?;

        reporter.stage("Combining");
        let staging = paths::staging_path(work);
        let combine = Combiner::new()
            .extra_attributes(self.manifest.iter().cloned())
            .combine(&archives, &staging)?;

        let collapse = if self.collapse.is_empty() {
            None
        } else {
            reporter.stage("Collapsing duplicates");
            let namespaces: Vec<Namespace> = present.iter().map(|i| i.namespace.clone()).collect();
            let collapser = Collapser::new(&self.remapper, &tables);
            Some(collapser.collapse(&staging, &namespaces, &self.collapse)?)
        };

        place(&staging, output)?;
        let entries = archive::verify(output)?;
        reporter.summary(entries, &output.display().to_string(), started.elapsed().as_secs_f64());
        info!(output = %output.display(), entries, "merge complete");

        Ok(MergeReport {
            output: output.to_path_buf(),
            merged: present.iter().map(|i| i.namespace.clone()).collect(),
            skipped,
            classes,
            resources,
            combine,
            collapse,
        })
    }

    /// Split registered inputs into present ones and skipped optional ones.
    fn resolve_inputs(&self, reporter: &dyn Reporter) -> Result<(Vec<&InputArchive>, Vec<Namespace>)> {
        let mut present = Vec::new();
        let mut skipped = Vec::new();
        for input in &self.inputs {
            if input.path.is_file() {
                present.push(input);
            } else if input.required {
                return Err(MergeError::MissingInput {
                    name: input.namespace.to_string(),
                    path: input.path.clone(),
                });
            } else {
                warn!(
                    namespace = %input.namespace,
                    path = %input.path.display(),
                    "optional input missing, skipping"
                );
                reporter.warning(&format!(
                    "skipping '{}': {} not found",
                    input.namespace,
                    input.path.display()
                ));
                skipped.push(input.namespace.clone());
            }
        }
        if present.is_empty() {
            return Err(MergeError::NoInputs);
        }
        Ok((present, skipped))
    }

    fn scratch(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("jarweld-");
        let dir = match &self.work_dir {
            Some(root) => {
                fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        Ok(dir)
    }
}

/// Verify each input and copy it into `dir` as `<namespace>.jar`.
fn register(
    inputs: &[&InputArchive],
    dir: &Path,
    reporter: &dyn Reporter,
) -> Result<Vec<NamespacedArchive>> {
    fs::create_dir_all(dir)?;
    let mut archives = Vec::with_capacity(inputs.len());
    for input in inputs {
        let entries = archive::verify(&input.path)?;
        let copy = dir.join(format!("{}.jar", input.namespace));
        fs::copy(&input.path, &copy)?;
        reporter.input(&input.namespace, entries);
        archives.push(NamespacedArchive::new(input.namespace.clone(), copy));
    }
    Ok(archives)
}

/// Copy `staging` next to `output` and rename it into place.
fn place(staging: &Path, output: &Path) -> Result<()> {
    let dir = parent_dir(output);
    fs::create_dir_all(dir)?;
    let mut tmp = tempfile::Builder::new()
        .prefix(".jarweld-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    io::copy(&mut fs::File::open(staging)?, tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;
    tmp.persist(output).map_err(io::Error::from)?;
    Ok(())
}
