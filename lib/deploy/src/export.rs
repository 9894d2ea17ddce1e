//! Building and writing the combined interface of the diamond.
use std::{fs, path::Path};

use diamond_cut::{
    artifact::ContractArtifact,
    overlap::{Rejection, Resolution},
};
use eyre::{bail, Context as _};
use tracing::{debug, info, warn};

use crate::{artifacts::ArtifactStore, context::Context};

/// Merges the declarations of every included artifact into the combined
/// interface.
///
/// # Errors
///
/// * If an artifact's ABI can't be read.
/// * If two declarations collide and the interface is strict.
pub fn build_interface(
    context: &Context,
    store: &ArtifactStore,
) -> eyre::Result<Resolution> {
    let settings = &context.settings().interface;
    let include = settings.include_patterns()?;

    let mut declarations = Vec::new();
    for artifact in store.matching(&include) {
        debug!(artifact = %artifact.fully_qualified_name(), "merging artifact");
        declarations.extend(artifact.declarations().wrap_err_with(|| {
            format!("failed to read the ABI of `{}`", artifact.contract_name)
        })?);
    }

    let resolution = settings
        .resolver()?
        .resolve(&settings.name, declarations)
        .wrap_err_with(|| {
            format!("failed to build the `{}` interface", settings.name)
        })?;

    for rejected in &resolution.rejected {
        match &rejected.reason {
            Rejection::Duplicate => {
                debug!(
                    declaration = %rejected.declaration,
                    "skipped duplicate"
                );
            }
            Rejection::Filtered => {
                debug!(declaration = %rejected.declaration, "excluded");
            }
            Rejection::Collision(collision) => {
                warn!(%collision, "skipped colliding declaration");
            }
        }
    }

    Ok(resolution)
}

/// Builds the combined interface and writes it to the contracts package,
/// together with the ABI of every exported contract.
///
/// # Errors
///
/// * If the interface can't be built or written.
/// * If an exported contract has no artifact or is named like the interface.
pub fn export_interface(
    context: &Context,
    store: &ArtifactStore,
) -> eyre::Result<Resolution> {
    let resolution = build_interface(context, store)?;

    let exported = context
        .settings()
        .exported_contracts()
        .into_iter()
        .map(|name| {
            if name == resolution.interface.name {
                bail!("cannot export `{name}`, it is the combined interface");
            }
            let artifact = store.get(&name)?;
            Ok(ContractArtifact { bytecode: None, ..artifact.clone() })
        })
        .collect::<eyre::Result<Vec<_>>>()?;

    let path = context.interface_path()?;
    write(&path, &ContractArtifact::combined(&resolution.interface))?;
    info!(
        interface = %resolution.interface.name,
        declarations = resolution.interface.declarations.len(),
        path = %path.display(),
        "wrote combined interface"
    );

    for artifact in &exported {
        let path = context.artifact_path(&artifact.contract_name)?;
        write(&path, artifact)?;
        info!(
            contract = %artifact.contract_name,
            path = %path.display(),
            "exported ABI"
        );
    }

    Ok(resolution)
}

fn write(path: &Path, artifact: &ContractArtifact) -> eyre::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .wrap_err_with(|| format!("failed to create {}", dir.display()))?;
    }
    fs::write(path, artifact.to_json()? + "\n")
        .wrap_err_with(|| format!("failed to write {}", path.display()))
}
