//! An in-memory development chain.
use std::collections::{BTreeMap, BTreeSet};

use alloy_dyn_abi::DynSolType;
use alloy_primitives::{Address, Bytes, Selector, U256};
use async_trait::async_trait;
use diamond_cut::{
    abi::InitializationFunctionReverted,
    artifact::ContractArtifact,
    cut::UpgradeCall,
    diamond::{CutError, DiamondState},
    interface::Declaration,
};
use eyre::bail;
use tokio::sync::Mutex;
use tracing::debug;

use crate::chain::{Chain, Receipt};

/// Default deployer of the development network.
pub const DEFAULT_DEPLOYER: Address = Address::repeat_byte(0xde);

/// Balance every account of the development network starts with: 100 ether.
const DEFAULT_BALANCE: u128 = 100_000_000_000_000_000_000;

/// A chain that lives in memory.
///
/// Contracts are "deployed" by keeping their artifacts, and every diamond is
/// a [`DiamondState`] driven by ABI-encoded `diamondCut` calldata. The
/// initializer is not executed, but its calldata must decode against the
/// function it calls. Every transaction is mined in its own block.
#[derive(Debug)]
pub struct Devnet {
    chain_id: u64,
    deployer: Address,
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    nonce: u64,
    block: u64,
    balances: BTreeMap<Address, U256>,
    contracts: BTreeMap<Address, ContractArtifact>,
    diamonds: BTreeMap<Address, DiamondState>,
    initialized: BTreeMap<Address, Bytes>,
    rejected: BTreeSet<String>,
}

impl State {
    fn mine(&mut self) -> u64 {
        self.block += 1;
        self.block
    }
}

impl Devnet {
    /// Creates a development chain with the given id.
    #[must_use]
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            deployer: DEFAULT_DEPLOYER,
            state: Mutex::new(State::default()),
        }
    }

    /// Sets the balance of `account`.
    #[must_use]
    pub fn with_balance(mut self, account: Address, balance: U256) -> Self {
        self.state.get_mut().balances.insert(account, balance);
        self
    }

    /// Makes every deployment of `contract_name` revert.
    #[must_use]
    pub fn reject(mut self, contract_name: impl Into<String>) -> Self {
        self.state.get_mut().rejected.insert(contract_name.into());
        self
    }

    /// Current block number.
    pub async fn block_number(&self) -> u64 {
        self.state.lock().await.block
    }

    /// Artifact of the contract deployed at `address`.
    pub async fn code_at(&self, address: Address) -> Option<ContractArtifact> {
        self.state.lock().await.contracts.get(&address).cloned()
    }

    /// Calldata of the last initializer `diamond` ran.
    pub async fn init_calldata(&self, diamond: Address) -> Option<Bytes> {
        self.state.lock().await.initialized.get(&diamond).cloned()
    }
}

#[async_trait]
impl Chain for Devnet {
    async fn chain_id(&self) -> eyre::Result<u64> {
        Ok(self.chain_id)
    }

    async fn deployer(&self) -> eyre::Result<Address> {
        Ok(self.deployer)
    }

    async fn balance(&self, account: Address) -> eyre::Result<U256> {
        let state = self.state.lock().await;
        Ok(state
            .balances
            .get(&account)
            .copied()
            .unwrap_or(U256::from(DEFAULT_BALANCE)))
    }

    async fn deploy(
        &self,
        artifact: &ContractArtifact,
    ) -> eyre::Result<Receipt> {
        if artifact.bytecode()?.is_none() {
            bail!(
                "`{}` has no bytecode, is it abstract or an interface?",
                artifact.fully_qualified_name()
            );
        }

        let mut state = self.state.lock().await;
        let address = self.deployer.create(state.nonce);
        state.nonce += 1;
        let block_number = state.mine();

        if state.rejected.contains(&artifact.contract_name) {
            debug!(contract = %artifact.contract_name, "deployment reverted");
            return Ok(Receipt {
                status: false,
                block_number,
                contract_address: None,
                revert_data: Bytes::new(),
            });
        }

        state.contracts.insert(address, artifact.clone());
        Ok(Receipt {
            status: true,
            block_number,
            contract_address: Some(address),
            revert_data: Bytes::new(),
        })
    }

    async fn facets(
        &self,
        diamond: Address,
    ) -> eyre::Result<BTreeMap<Address, Vec<Selector>>> {
        let state = self.state.lock().await;
        if !state.contracts.contains_key(&diamond) {
            bail!("no contract deployed at {diamond}");
        }
        Ok(state
            .diamonds
            .get(&diamond)
            .map(DiamondState::facets)
            .unwrap_or_default())
    }

    async fn diamond_cut(
        &self,
        diamond: Address,
        call: &UpgradeCall,
    ) -> eyre::Result<Receipt> {
        let call = UpgradeCall::abi_decode(&call.abi_encode())?;

        let mut state = self.state.lock().await;
        if !state.contracts.contains_key(&diamond) {
            bail!("no contract deployed at {diamond}");
        }
        let block_number = state.mine();

        let mut next =
            state.diamonds.get(&diamond).cloned().unwrap_or_default();
        let result = match next.diamond_cut(&call) {
            Ok(()) => initialize(&state, &call),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                state.diamonds.insert(diamond, next);
                if !call.init.is_zero() {
                    state.initialized.insert(diamond, call.calldata.clone());
                }
                Ok(Receipt {
                    status: true,
                    block_number,
                    contract_address: None,
                    revert_data: Bytes::new(),
                })
            }
            Err(e) => {
                debug!(%diamond, error = %e, "diamondCut reverted");
                Ok(Receipt {
                    status: false,
                    block_number,
                    contract_address: None,
                    revert_data: e.revert_data().into(),
                })
            }
        }
    }
}

/// Checks that the initializer of `call` implements the function its
/// calldata calls and that the arguments decode against its parameters.
fn initialize(state: &State, call: &UpgradeCall) -> Result<(), CutError> {
    if call.init.is_zero() {
        return Ok(());
    }

    let declarations = state
        .contracts
        .get(&call.init)
        .and_then(|artifact| artifact.declarations().ok())
        .unwrap_or_default();
    let functions: Vec<&Declaration> =
        declarations.iter().filter(|d| d.is_function()).collect();
    let initializer = DiamondState::from_facets([(
        call.init,
        functions.iter().filter_map(|d| d.selector()).collect(),
    )]);
    initializer.route(&call.calldata)?;

    let args = call.calldata.get(4..).unwrap_or_default();
    let decodes = functions
        .iter()
        .find(|d| {
            d.selector().is_some_and(|s| call.calldata.starts_with(&s[..]))
        })
        .is_some_and(|function| {
            function
                .inputs()
                .iter()
                .map(|ty| DynSolType::parse(ty))
                .collect::<Result<Vec<_>, _>>()
                .and_then(|types| {
                    DynSolType::Tuple(types).abi_decode_params(args)
                })
                .is_ok()
        });
    if decodes {
        Ok(())
    } else {
        Err(CutError::InitReverted(InitializationFunctionReverted {
            initializationContractAddress: call.init,
            data: Bytes::new(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use diamond_cut::{abi::FunctionNotFound, cut::Cut, signature::selector};
    use serde_json::{json, Value};

    use super::*;
    use crate::chain::Ext;

    fn function(name: &str, inputs: &[&str]) -> Value {
        let inputs: Vec<_> =
            inputs.iter().map(|ty| json!({ "name": "", "type": ty })).collect();
        json!({
            "type": "function",
            "name": name,
            "inputs": inputs,
            "outputs": [],
            "stateMutability": "nonpayable",
        })
    }

    fn contract(name: &str, abi: Vec<Value>) -> ContractArtifact {
        ContractArtifact {
            contract_name: name.to_string(),
            source_name: format!("contracts/{name}.sol"),
            abi,
            bytecode: Some("0x6080".to_string()),
        }
    }

    fn artifact(name: &str, functions: &[&str]) -> ContractArtifact {
        contract(name, functions.iter().map(|f| function(f, &[])).collect())
    }

    async fn deployed(devnet: &Devnet, artifact: &ContractArtifact) -> Address {
        devnet.deploy(artifact).await.unwrap().address().unwrap()
    }

    #[tokio::test]
    async fn deploys_at_create_addresses() {
        let devnet = Devnet::new(31337);
        let first = devnet.deploy(&artifact("Diamond", &[])).await.unwrap();
        let second =
            devnet.deploy(&artifact("FooFacet", &["foo"])).await.unwrap();

        assert!(first.status);
        assert_eq!(first.address().unwrap(), DEFAULT_DEPLOYER.create(0));
        assert_eq!(second.address().unwrap(), DEFAULT_DEPLOYER.create(1));
        assert_eq!(second.block_number, 2);
        assert_eq!(devnet.block_number().await, 2);
        let code = devnet.code_at(DEFAULT_DEPLOYER.create(1)).await.unwrap();
        assert_eq!(code.contract_name, "FooFacet");
    }

    #[tokio::test]
    async fn refuses_artifacts_without_bytecode() {
        let devnet = Devnet::new(31337);
        let mut interface = artifact("IFoo", &["foo"]);
        interface.bytecode = Some("0x".to_string());
        assert!(devnet.deploy(&interface).await.is_err());
    }

    #[tokio::test]
    async fn rejected_deployments_revert() {
        let devnet = Devnet::new(31337).reject("FooFacet");
        let receipt =
            devnet.deploy(&artifact("FooFacet", &["foo"])).await.unwrap();
        assert!(!receipt.status);
        assert!(receipt.address().is_err());
    }

    #[tokio::test]
    async fn balances_default_to_hundred_ether() {
        let rich = Address::repeat_byte(1);
        let devnet = Devnet::new(1).with_balance(rich, U256::from(7));
        assert_eq!(devnet.balance(rich).await.unwrap(), U256::from(7));
        assert_eq!(
            devnet.balance(Address::repeat_byte(2)).await.unwrap(),
            U256::from(DEFAULT_BALANCE)
        );
    }

    #[tokio::test]
    async fn cuts_and_initializes_diamond() {
        let devnet = Devnet::new(31337);
        let diamond = deployed(&devnet, &artifact("Diamond", &[])).await;
        let init = deployed(&devnet, &artifact("Init", &["init"])).await;
        let facet = deployed(&devnet, &artifact("FooFacet", &["foo"])).await;

        let foo = selector("foo()");
        let calldata = Bytes::from(selector("init()").to_vec());
        let call = UpgradeCall::new(vec![Cut::add(facet, vec![foo])])
            .with_init(init, calldata.clone());
        let receipt = devnet.diamond_cut(diamond, &call).await.unwrap();

        assert!(receipt.status);
        assert_eq!(
            devnet.facets(diamond).await.unwrap(),
            BTreeMap::from([(facet, vec![foo])])
        );
        assert_eq!(devnet.init_calldata(diamond).await, Some(calldata));
    }

    #[tokio::test]
    async fn reverted_cut_leaves_diamond_untouched() {
        let devnet = Devnet::new(31337);
        let diamond = deployed(&devnet, &artifact("Diamond", &[])).await;
        let facet = deployed(&devnet, &artifact("FooFacet", &["foo"])).await;

        let foo = selector("foo()");
        let call = UpgradeCall::new(vec![
            Cut::add(facet, vec![foo]),
            Cut::remove(vec![selector("bar()")]),
        ]);
        let receipt = devnet.diamond_cut(diamond, &call).await.unwrap();

        assert!(!receipt.status);
        assert!(!receipt.revert_data.is_empty());
        assert!(devnet.facets(diamond).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn init_must_implement_called_function() {
        let devnet = Devnet::new(31337);
        let diamond = deployed(&devnet, &artifact("Diamond", &[])).await;
        let init = deployed(&devnet, &artifact("Init", &["setup"])).await;

        let call = UpgradeCall::new(vec![])
            .with_init(init, selector("init()").to_vec().into());
        let receipt = devnet.diamond_cut(diamond, &call).await.unwrap();

        assert!(!receipt.status);
        let expected = CutError::FunctionNotFound(FunctionNotFound {
            selector: selector("init()"),
        });
        assert_eq!(receipt.revert_data, Bytes::from(expected.revert_data()));
        assert_eq!(devnet.init_calldata(diamond).await, None);
    }

    #[tokio::test]
    async fn init_arguments_must_decode() {
        let devnet = Devnet::new(31337);
        let diamond = deployed(&devnet, &artifact("Diamond", &[])).await;
        let seeder = contract("Seeder", vec![function("init", &["uint256"])]);
        let init = deployed(&devnet, &seeder).await;
        let init_selector = selector("init(uint256)");

        let truncated = UpgradeCall::new(vec![])
            .with_init(init, init_selector.to_vec().into());
        let receipt = devnet.diamond_cut(diamond, &truncated).await.unwrap();
        assert!(!receipt.status);
        let expected = CutError::InitReverted(InitializationFunctionReverted {
            initializationContractAddress: init,
            data: Bytes::new(),
        });
        assert_eq!(receipt.revert_data, Bytes::from(expected.revert_data()));

        let mut calldata = init_selector.to_vec();
        calldata.extend(U256::from(7).to_be_bytes::<32>());
        let call = UpgradeCall::new(vec![])
            .with_init(init, calldata.clone().into());
        let receipt = devnet.diamond_cut(diamond, &call).await.unwrap();
        assert!(receipt.status);
        assert_eq!(devnet.init_calldata(diamond).await, Some(calldata.into()));
    }

    #[tokio::test]
    async fn unknown_diamond_is_an_error() {
        let devnet = Devnet::new(31337);
        let call = UpgradeCall::new(vec![]);
        let unknown = Address::repeat_byte(9);
        assert!(devnet.diamond_cut(unknown, &call).await.is_err());
        assert!(devnet.facets(unknown).await.is_err());
    }
}
