//! The chain a diamond is deployed to.
use std::collections::BTreeMap;

use alloy_primitives::{Address, Bytes, Selector, U256};
use async_trait::async_trait;
use diamond_cut::{artifact::ContractArtifact, cut::UpgradeCall};
use eyre::ContextCompat;

/// Outcome of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// Whether the transaction succeeded.
    pub status: bool,
    /// Block the transaction was mined in.
    pub block_number: u64,
    /// Address of the created contract, for deployments.
    pub contract_address: Option<Address>,
    /// Revert data, for failed transactions.
    pub revert_data: Bytes,
}

/// Extension trait to recover address of the contract that was deployed.
pub trait Ext {
    /// Returns the address of the contract from the [`Receipt`].
    ///
    /// # Errors
    ///
    /// May fail if there's no contract address.
    fn address(&self) -> eyre::Result<Address>;
}

impl Ext for Receipt {
    fn address(&self) -> eyre::Result<Address> {
        self.contract_address.context("should contain contract address")
    }
}

/// The operations deployment needs from a chain.
///
/// Transactions are sent from a single deployer account and are confirmed
/// before the call returns.
#[async_trait]
pub trait Chain: Send + Sync {
    /// Chain id of the network.
    async fn chain_id(&self) -> eyre::Result<u64>;

    /// Account sending every transaction.
    async fn deployer(&self) -> eyre::Result<Address>;

    /// Balance of `account`, in wei.
    async fn balance(&self, account: Address) -> eyre::Result<U256>;

    /// Deploys `artifact` without constructor arguments.
    async fn deploy(
        &self,
        artifact: &ContractArtifact,
    ) -> eyre::Result<Receipt>;

    /// Every facet of `diamond` and its selectors, as the loupe `facets()`
    /// function reports them.
    async fn facets(
        &self,
        diamond: Address,
    ) -> eyre::Result<BTreeMap<Address, Vec<Selector>>>;

    /// Calls `diamondCut` on `diamond`.
    ///
    /// A reverted call is a receipt with a `false` status, not an error.
    async fn diamond_cut(
        &self,
        diamond: Address,
        call: &UpgradeCall,
    ) -> eyre::Result<Receipt>;
}

#[async_trait]
impl<T: Chain + ?Sized> Chain for &T {
    async fn chain_id(&self) -> eyre::Result<u64> {
        (**self).chain_id().await
    }

    async fn deployer(&self) -> eyre::Result<Address> {
        (**self).deployer().await
    }

    async fn balance(&self, account: Address) -> eyre::Result<U256> {
        (**self).balance(account).await
    }

    async fn deploy(
        &self,
        artifact: &ContractArtifact,
    ) -> eyre::Result<Receipt> {
        (**self).deploy(artifact).await
    }

    async fn facets(
        &self,
        diamond: Address,
    ) -> eyre::Result<BTreeMap<Address, Vec<Selector>>> {
        (**self).facets(diamond).await
    }

    async fn diamond_cut(
        &self,
        diamond: Address,
        call: &UpgradeCall,
    ) -> eyre::Result<Receipt> {
        (**self).diamond_cut(diamond, call).await
    }
}
