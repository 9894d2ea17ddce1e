//! The deployment records written after every successful deployment.
use std::{collections::BTreeMap, fs, io::ErrorKind, path::Path};

use alloy_primitives::Address;
use diamond_cut::interface::FacetRecord;
use eyre::Context;
use serde::{Deserialize, Serialize};

/// Where a diamond was deployed and which facets it routes to.
///
/// The record doubles as the planner's memory: the facet records are the
/// previous selectors of the next upgrade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    /// Name of the deployment group.
    pub group: String,
    /// Name of the network.
    pub network: String,
    /// Chain id of the network.
    pub chain_id: u64,
    /// Block in which the diamond was initialized. Always `0` on development
    /// networks.
    pub start_block: u64,
    /// Address of the diamond.
    pub diamond_address: Address,
    /// Address of the initializer.
    pub init_address: Address,
    /// Facets routed through the diamond.
    pub facets: Vec<FacetRecord>,
}

impl DeploymentRecord {
    /// Whether this record describes a deployment of `group` on the given
    /// network.
    #[must_use]
    pub fn is_for(&self, group: &str, network: &str, chain_id: u64) -> bool {
        self.group == group
            && self.network == network
            && self.chain_id == chain_id
    }
}

/// The record of every deployment group, keyed by group name.
///
/// Groups are deployed one at a time, and each one only replaces its own
/// entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeploymentRecords(BTreeMap<String, DeploymentRecord>);

impl DeploymentRecords {
    /// Reads the records at `path`. A missing file holds no records.
    ///
    /// # Errors
    ///
    /// * If the file exists but can't be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        let json = match fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(Self::default())
            }
            Err(e) => {
                return Err(e).wrap_err_with(|| {
                    format!("failed to read {}", path.display())
                })
            }
        };

        serde_json::from_str(&json)
            .wrap_err_with(|| format!("failed to parse {}", path.display()))
    }

    /// Writes every record to `path`, replacing whatever was there.
    ///
    /// # Errors
    ///
    /// * If the file can't be written.
    pub fn save(&self, path: impl AsRef<Path>) -> eyre::Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).wrap_err_with(|| {
                format!("failed to create {}", dir.display())
            })?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json + "\n")
            .wrap_err_with(|| format!("failed to write {}", path.display()))
    }

    /// The record of `group`, if it was ever deployed.
    #[must_use]
    pub fn get(&self, group: &str) -> Option<&DeploymentRecord> {
        self.0.get(group)
    }

    /// Stores `record` under its group, returning the one it replaces.
    pub fn insert(
        &mut self,
        record: DeploymentRecord,
    ) -> Option<DeploymentRecord> {
        self.0.insert(record.group.clone(), record)
    }

    /// Number of recorded groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no group was recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
