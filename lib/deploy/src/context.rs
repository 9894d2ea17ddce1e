use std::path::{Path, PathBuf};

use eyre::ContextCompat;

use crate::settings::Settings;

/// Name of the package receiving the combined interface and the deployment
/// record.
pub const CONTRACTS_PACKAGE: &str = "contracts";

/// File name of the deployment record inside the contracts package.
pub const RECORD_FILE: &str = "deployment.json";

/// Everything a command needs to know about the project.
///
/// Package paths are resolved against the project root, which is the
/// directory holding the settings file.
#[derive(Debug, Clone)]
pub struct Context {
    root: PathBuf,
    artifacts: PathBuf,
    settings: Settings,
}

impl Context {
    /// Creates a context for the project at `root`.
    ///
    /// Artifacts are looked up in `<root>/artifacts` unless overridden with
    /// [`Context::with_artifacts`].
    pub fn new(root: impl Into<PathBuf>, settings: Settings) -> Self {
        let root = root.into();
        Self { artifacts: root.join("artifacts"), root, settings }
    }

    /// Loads the settings file at `path`.
    ///
    /// # Errors
    ///
    /// * If the file can't be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        let settings = Settings::load(path)?;
        let root = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        Ok(Self::new(root, settings))
    }

    /// Overrides the artifacts directory. Relative paths are resolved
    /// against the project root.
    #[must_use]
    pub fn with_artifacts(mut self, artifacts: impl AsRef<Path>) -> Self {
        self.artifacts = self.root.join(artifacts);
        self
    }

    /// The parsed settings.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The project root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The directory holding the compiled artifacts.
    #[must_use]
    pub fn artifacts_dir(&self) -> &Path {
        &self.artifacts
    }

    /// Directory of the package called `name`.
    ///
    /// # Errors
    ///
    /// * If no such package is configured.
    pub fn package(&self, name: &str) -> eyre::Result<PathBuf> {
        self.settings
            .packages
            .get(name)
            .map(|dir| self.root.join(dir))
            .with_context(|| format!("unable to locate the `{name}` package"))
    }

    /// Where the combined interface artifact is written.
    ///
    /// # Errors
    ///
    /// * If the contracts package is not configured.
    pub fn interface_path(&self) -> eyre::Result<PathBuf> {
        self.artifact_path(&self.settings.interface.name)
    }

    /// Where the exported artifact of `contract_name` is written.
    ///
    /// # Errors
    ///
    /// * If the contracts package is not configured.
    pub fn artifact_path(&self, contract_name: &str) -> eyre::Result<PathBuf> {
        let name = format!("{contract_name}.json");
        Ok(self.package(CONTRACTS_PACKAGE)?.join(name))
    }

    /// Where the deployment record is written.
    ///
    /// # Errors
    ///
    /// * If the contracts package is not configured.
    pub fn record_path(&self) -> eyre::Result<PathBuf> {
        Ok(self.package(CONTRACTS_PACKAGE)?.join(RECORD_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(packages: &str) -> Settings {
        format!(
            r#"
            [network]
            name = "hardhat"
            chain_id = 31337

            {packages}

            [interface]
            name = "ZKGame"
            "#
        )
        .parse()
        .unwrap()
    }

    #[test]
    fn resolves_packages_against_root() {
        let context =
            Context::new("/project", settings("")).with_artifacts("out");

        assert_eq!(context.artifacts_dir(), Path::new("/project/out"));
        assert_eq!(
            context.interface_path().unwrap(),
            Path::new("/project/packages/contracts/ZKGame.json")
        );
        assert_eq!(
            context.artifact_path("Initializer").unwrap(),
            Path::new("/project/packages/contracts/Initializer.json")
        );
        assert_eq!(
            context.record_path().unwrap(),
            Path::new("/project/packages/contracts/deployment.json")
        );
    }

    #[test]
    fn reports_missing_packages() {
        let context = Context::new(
            "/project",
            settings("[packages]\nsnarks = \"packages/snarks\""),
        );

        assert_eq!(
            context.package("snarks").unwrap(),
            Path::new("/project/packages/snarks")
        );
        let err = context.record_path().unwrap_err();
        assert!(err.to_string().contains("`contracts` package"));
    }

    #[test]
    fn loads_settings_next_to_project() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("diamond.toml");
        std::fs::write(
            &path,
            "[network]\nname = \"hardhat\"\nchain_id = 31337\n\
             [interface]\nname = \"Game\"\n",
        )
        .unwrap();

        let context = Context::load(&path).unwrap();
        assert_eq!(context.root(), dir.path());
        assert_eq!(context.artifacts_dir(), dir.path().join("artifacts"));
    }
}
