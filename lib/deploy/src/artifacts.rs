//! Discovery of compiled artifacts.
use std::{fs, path::Path};

use diamond_cut::{artifact::ContractArtifact, overlap::IncludePatterns};
use eyre::{bail, Context};
use tracing::debug;
use walkdir::WalkDir;

/// Every contract artifact of a build.
#[derive(Debug, Clone, Default)]
pub struct ArtifactStore {
    artifacts: Vec<ContractArtifact>,
}

impl ArtifactStore {
    /// Wraps already parsed artifacts.
    #[must_use]
    pub fn new(mut artifacts: Vec<ContractArtifact>) -> Self {
        artifacts.sort_by_key(ContractArtifact::fully_qualified_name);
        Self { artifacts }
    }

    /// Reads every artifact under `dir`, recursively.
    ///
    /// Debug files (`*.dbg.json`) and the `build-info` directory are skipped.
    ///
    /// # Errors
    ///
    /// * If `dir` can't be walked or an artifact can't be parsed.
    pub fn load(dir: impl AsRef<Path>) -> eyre::Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            bail!(
                "artifacts directory {} does not exist, compile first",
                dir.display()
            );
        }

        let mut artifacts = Vec::new();
        let walker = WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.file_name() != "build-info");
        for entry in walker {
            let entry = entry.wrap_err("failed to walk artifacts directory")?;
            let path = entry.path();
            let is_artifact = entry.file_type().is_file()
                && path.extension().is_some_and(|ext| ext == "json")
                && !path.to_string_lossy().ends_with(".dbg.json");
            if !is_artifact {
                continue;
            }

            let json = fs::read_to_string(path).wrap_err_with(|| {
                format!("failed to read {}", path.display())
            })?;
            let artifact = ContractArtifact::from_json(&json).wrap_err_with(
                || format!("failed to parse {}", path.display()),
            )?;
            debug!(
                artifact = %artifact.fully_qualified_name(),
                "loaded artifact"
            );
            artifacts.push(artifact);
        }

        Ok(Self::new(artifacts))
    }

    /// Finds an artifact by contract name or fully qualified name.
    ///
    /// # Errors
    ///
    /// * If no artifact, or more than one, has that name.
    pub fn get(&self, name: &str) -> eyre::Result<&ContractArtifact> {
        let mut matches = self.artifacts.iter().filter(|a| {
            a.contract_name == name || a.fully_qualified_name() == name
        });
        let Some(artifact) = matches.next() else {
            bail!("no artifact for contract `{name}`");
        };
        if let Some(other) = matches.next() {
            bail!(
                "contract name `{name}` is ambiguous: `{}` and `{}`, use a fully qualified name",
                artifact.fully_qualified_name(),
                other.fully_qualified_name()
            );
        }
        Ok(artifact)
    }

    /// Artifacts whose fully qualified name matches `include`, sorted by
    /// fully qualified name.
    pub fn matching<'a>(
        &'a self,
        include: &'a IncludePatterns,
    ) -> impl Iterator<Item = &'a ContractArtifact> {
        self.artifacts
            .iter()
            .filter(move |a| include.matches(&a.fully_qualified_name()))
    }

    /// Number of artifacts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    /// Whether there is no artifact.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}
