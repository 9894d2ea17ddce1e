//! Deploys and upgrades the diamonds of every deployment group.
//!
//! A group is deployed strictly in order: the diamond and its initializer
//! (first deployment only), then every facet, each confirmed before the next
//! one is sent. Only once every facet address is known are the cuts planned
//! and submitted in a single `diamondCut` call. The deployment record is
//! written last, and only if everything succeeded.
use alloy_primitives::{hex, utils::format_ether, Address, Bytes};
use diamond_cut::{
    batch::UpgradeBatch,
    cut::UpgradeCall,
    diamond::DiamondState,
    interface::Facet,
    planner::FacetChange,
};
use eyre::{bail, Context as _, ContextCompat};
use tracing::{debug, info, warn};

use crate::{
    artifacts::ArtifactStore,
    chain::{Chain, Ext},
    context::Context,
    record::{DeploymentRecord, DeploymentRecords},
    settings::{DeploymentSettings, FacetSettings},
};

/// Stand-in address of facets that were never deployed, used when planning
/// without a chain.
pub const UNDEPLOYED: Address = Address::repeat_byte(0xff);

/// Deploys deployment groups to a [`Chain`].
#[derive(Debug)]
pub struct Orchestrator<C> {
    chain: C,
    context: Context,
    artifacts: ArtifactStore,
}

impl<C: Chain> Orchestrator<C> {
    /// Creates an orchestrator deploying `artifacts` to `chain`.
    pub fn new(chain: C, context: Context, artifacts: ArtifactStore) -> Self {
        Self { chain, context, artifacts }
    }

    /// Checks that the chain is the configured network and, outside
    /// development networks, that the deployer can pay for the deployment.
    ///
    /// # Errors
    ///
    /// * If the chain id doesn't match or the deployer balance is too low.
    pub async fn check_network(&self) -> eyre::Result<()> {
        let network = &self.context.settings().network;
        let chain_id = self.chain.chain_id().await?;
        if chain_id != network.chain_id {
            bail!(
                "connected to chain {chain_id}, but network `{}` expects chain {}",
                network.name,
                network.chain_id
            );
        }

        if network.is_development() {
            return Ok(());
        }

        let deployer = self.chain.deployer().await?;
        let balance = self.chain.balance(deployer).await?;
        if balance < network.required_balance {
            bail!(
                "deployer {deployer} has {} ether, at least {} ether are required on `{}`",
                format_ether(balance),
                format_ether(network.required_balance),
                network.name
            );
        }
        Ok(())
    }

    /// Deploys every group, one after the other.
    ///
    /// # Errors
    ///
    /// * If the network checks fail.
    /// * If any group fails. Later groups are not deployed.
    pub async fn deploy_all(&self) -> eyre::Result<Vec<DeploymentRecord>> {
        self.check_network().await?;

        let mut records = Vec::new();
        for group in self.context.settings().deployments.keys() {
            records.push(self.deploy_group(group).await?);
        }
        Ok(records)
    }

    /// Deploys one group: a fresh diamond if the deployment record doesn't
    /// describe this group on this network, an upgrade otherwise.
    ///
    /// # Errors
    ///
    /// * If the group is unknown, an artifact is missing, a deployment
    ///   reverts, the upgrade can't be planned or `diamondCut` reverts. No
    ///   record is written in that case.
    pub async fn deploy_group(
        &self,
        group: &str,
    ) -> eyre::Result<DeploymentRecord> {
        let settings = self.group(group)?;
        let network = &self.context.settings().network;
        let record_path = self.context.record_path()?;
        let previous = previous_record(&self.context, group)?;

        let (diamond, init, snapshot, init_call, start_block) = match &previous
        {
            Some(record) => {
                info!(
                    group,
                    diamond = %record.diamond_address,
                    "upgrading diamond"
                );
                let facets = self
                    .chain
                    .facets(record.diamond_address)
                    .await
                    .wrap_err("failed to read the facets of the diamond")?;
                (
                    record.diamond_address,
                    record.init_address,
                    DiamondState::from_facets(facets),
                    None,
                    Some(record.start_block),
                )
            }
            None => {
                info!(group, network = %network.name, "deploying new diamond");
                let diamond = self.deploy(&settings.diamond).await?;
                let init = self.deploy(&settings.initializer).await?;
                let calldata = Bytes::from(settings.init_calldata()?);
                let init_call = Some((init, calldata));
                (diamond, init, DiamondState::new(), init_call, None)
            }
        };

        let mut batch = UpgradeBatch::new(
            snapshot,
            previous.iter().flat_map(|r| r.facets.iter().cloned()),
        );
        for facet in &settings.facets {
            let address = self.deploy(&facet.name).await?;
            batch.collect(upsert(&self.artifacts, facet, address)?)?;
        }
        for name in retired(previous.as_ref(), settings) {
            info!(facet = name, "retiring facet");
            batch.collect(FacetChange::Retire { name: name.to_string() })?;
        }

        batch
            .validate()
            .wrap_err_with(|| format!("failed to plan the `{group}` upgrade"))?;
        let cuts = batch.take_cuts()?;
        for cut in &cuts {
            debug!(%cut, "planned cut");
        }

        let mut receipt_block = None;
        if cuts.is_empty() && init_call.is_none() {
            info!(group, "diamond is up to date");
        } else {
            let call = match init_call {
                Some((init, calldata)) => {
                    UpgradeCall::new(cuts).with_init(init, calldata)
                }
                None => UpgradeCall::new(cuts),
            };
            let receipt = self
                .chain
                .diamond_cut(diamond, &call)
                .await
                .wrap_err("failed to send diamondCut")?;
            if !receipt.status {
                bail!(
                    "diamondCut on {diamond} reverted: {}",
                    hex::encode_prefixed(&receipt.revert_data)
                );
            }
            info!(
                group,
                cuts = call.cuts.len(),
                block = receipt.block_number,
                "diamond cut"
            );
            receipt_block = Some(receipt.block_number);
        }

        let start_block = if network.is_development() {
            0
        } else {
            start_block.or(receipt_block).unwrap_or_default()
        };
        let record = DeploymentRecord {
            group: group.to_string(),
            network: network.name.clone(),
            chain_id: network.chain_id,
            start_block,
            diamond_address: diamond,
            init_address: init,
            facets: batch.records(),
        };
        let mut records = DeploymentRecords::load(&record_path)?;
        records.insert(record.clone());
        records.save(&record_path)?;
        info!(
            group,
            path = %record_path.display(),
            "wrote deployment record"
        );

        Ok(record)
    }

    fn group(&self, group: &str) -> eyre::Result<&DeploymentSettings> {
        self.context
            .settings()
            .deployments
            .get(group)
            .with_context(|| format!("no deployment group named `{group}`"))
    }

    async fn deploy(&self, contract: &str) -> eyre::Result<Address> {
        let artifact = self.artifacts.get(contract)?;
        let receipt = self
            .chain
            .deploy(artifact)
            .await
            .wrap_err_with(|| format!("failed to deploy `{contract}`"))?;
        if !receipt.status {
            bail!("deployment of `{contract}` reverted");
        }
        let address = receipt.address()?;
        info!(contract, %address, "deployed");
        Ok(address)
    }
}

/// Plans the upgrade of `group` from the deployment record alone, as if every
/// facet kept its address. Facets deployed for the first time are given the
/// [`UNDEPLOYED`] address.
///
/// # Errors
///
/// * If the group is unknown, an artifact is missing or the upgrade can't be
///   planned.
pub fn plan_upgrade(
    context: &Context,
    artifacts: &ArtifactStore,
    group: &str,
) -> eyre::Result<UpgradeBatch> {
    let settings = context
        .settings()
        .deployments
        .get(group)
        .with_context(|| format!("no deployment group named `{group}`"))?;
    let previous = previous_record(context, group)?;
    let records =
        previous.as_ref().map(|r| r.facets.as_slice()).unwrap_or_default();
    if previous.is_none() {
        warn!(group, "no deployment record, planning a first deployment");
    }

    let mut batch = UpgradeBatch::new(
        DiamondState::from_records(records),
        records.iter().cloned(),
    )
    .trusting_records();
    for facet in &settings.facets {
        let address = records
            .iter()
            .find(|r| r.name == facet.name)
            .map_or(UNDEPLOYED, |r| r.address);
        batch.collect(upsert(artifacts, facet, address)?)?;
    }
    for name in retired(previous.as_ref(), settings) {
        batch.collect(FacetChange::Retire { name: name.to_string() })?;
    }

    batch
        .validate()
        .wrap_err_with(|| format!("failed to plan the `{group}` upgrade"))?;
    Ok(batch)
}

/// The record of `group`, if it was deployed on the configured network.
fn previous_record(
    context: &Context,
    group: &str,
) -> eyre::Result<Option<DeploymentRecord>> {
    let network = &context.settings().network;
    let records = DeploymentRecords::load(context.record_path()?)?;
    Ok(records.get(group).cloned().filter(|r| {
        let matches = r.is_for(group, &network.name, network.chain_id);
        if !matches {
            debug!(
                group,
                network = %r.network,
                chain_id = r.chain_id,
                "deployment record belongs to another network"
            );
        }
        matches
    }))
}

fn upsert(
    artifacts: &ArtifactStore,
    facet: &FacetSettings,
    address: Address,
) -> eyre::Result<FacetChange> {
    let artifact = artifacts.get(&facet.name)?;
    let declarations = facet
        .selectors
        .apply(artifact.declarations()?)
        .wrap_err_with(|| {
            format!("invalid selectors for facet `{}`", facet.name)
        })?;
    Ok(FacetChange::Upsert(Facet::new(&facet.name, address, declarations)))
}

/// Previously recorded facets the group no longer lists.
fn retired<'a>(
    previous: Option<&'a DeploymentRecord>,
    settings: &'a DeploymentSettings,
) -> impl Iterator<Item = &'a str> {
    previous
        .into_iter()
        .flat_map(|r| &r.facets)
        .map(|r| r.name.as_str())
        .filter(|name| !settings.facets.iter().any(|f| f.name == *name))
}
