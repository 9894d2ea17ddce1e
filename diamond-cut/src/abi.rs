//! Solidity bindings of the [EIP-2535] upgrade interface and the errors a
//! diamond reverts with.
//!
//! Error names follow the reference `LibDiamond` implementation, so revert
//! data produced by [`crate::diamond::CutError::revert_data`] decodes the same
//! way against a deployed diamond.
//!
//! [EIP-2535]: https://eips.ethereum.org/EIPS/eip-2535
#![allow(missing_docs)]
use alloy_sol_types::{sol, SolCall};

use crate::{
    cut::{Cut, CutAction, UpgradeCall},
    error::{Error, Result},
};

sol! {
    /// Action of a single facet cut.
    #[derive(Debug, PartialEq, Eq)]
    enum FacetCutAction {
        Add,
        Replace,
        Remove,
    }

    /// A block of selectors to add, replace or remove.
    #[derive(Debug, PartialEq, Eq)]
    struct FacetCut {
        address facetAddress;
        FacetCutAction action;
        bytes4[] functionSelectors;
    }

    /// Adds, replaces or removes any number of functions and optionally
    /// executes a function with delegatecall.
    #[derive(Debug, PartialEq, Eq)]
    function diamondCut(FacetCut[] cuts, address init, bytes initCalldata) external;
}

sol! {
    #[derive(Debug, PartialEq, Eq)]
    error NoSelectorsProvidedForFacetForCut(address facet);
    #[derive(Debug, PartialEq, Eq)]
    error CannotAddSelectorsToZeroAddress(bytes4[] selectors);
    #[derive(Debug, PartialEq, Eq)]
    error CannotAddFunctionToDiamondThatAlreadyExists(bytes4 selector);
    #[derive(Debug, PartialEq, Eq)]
    error CannotReplaceFunctionsFromFacetWithZeroAddress(bytes4[] selectors);
    #[derive(Debug, PartialEq, Eq)]
    error CannotReplaceFunctionWithTheSameFunctionFromTheSameFacet(bytes4 selector);
    #[derive(Debug, PartialEq, Eq)]
    error CannotReplaceFunctionThatDoesNotExists(bytes4 selector);
    #[derive(Debug, PartialEq, Eq)]
    error RemoveFacetAddressMustBeZeroAddress(address facet);
    #[derive(Debug, PartialEq, Eq)]
    error CannotRemoveFunctionThatDoesNotExist(bytes4 selector);
    #[derive(Debug, PartialEq, Eq)]
    error InitAddressZeroButCalldataNotEmpty(bytes data);
    #[derive(Debug, PartialEq, Eq)]
    error FunctionNotFound(bytes4 selector);
    #[derive(Debug, PartialEq, Eq)]
    error InitializationFunctionReverted(
        address initializationContractAddress,
        bytes data
    );
}

impl From<CutAction> for FacetCutAction {
    fn from(action: CutAction) -> Self {
        match action {
            CutAction::Add => FacetCutAction::Add,
            CutAction::Replace => FacetCutAction::Replace,
            CutAction::Remove => FacetCutAction::Remove,
        }
    }
}

impl TryFrom<FacetCutAction> for CutAction {
    type Error = Error;

    fn try_from(action: FacetCutAction) -> Result<Self> {
        match action {
            FacetCutAction::Add => Ok(CutAction::Add),
            FacetCutAction::Replace => Ok(CutAction::Replace),
            FacetCutAction::Remove => Ok(CutAction::Remove),
            _ => Err(Error::Decode("unknown facet cut action".to_string())),
        }
    }
}

impl From<&Cut> for FacetCut {
    fn from(cut: &Cut) -> Self {
        FacetCut {
            facetAddress: cut.facet_address,
            action: cut.action.into(),
            functionSelectors: cut.selectors.clone(),
        }
    }
}

impl TryFrom<FacetCut> for Cut {
    type Error = Error;

    fn try_from(cut: FacetCut) -> Result<Self> {
        Ok(Cut {
            facet_address: cut.facetAddress,
            action: cut.action.try_into()?,
            selectors: cut.functionSelectors,
        })
    }
}

impl UpgradeCall {
    /// ABI-encodes this call as `diamondCut` calldata, selector included.
    #[must_use]
    pub fn abi_encode(&self) -> Vec<u8> {
        diamondCutCall {
            cuts: self.cuts.iter().map(FacetCut::from).collect(),
            init: self.init,
            initCalldata: self.calldata.clone(),
        }
        .abi_encode()
    }

    /// Decodes `diamondCut` calldata.
    ///
    /// # Errors
    ///
    /// * [`Error::Decode`] if `data` is not valid `diamondCut` calldata.
    pub fn abi_decode(data: &[u8]) -> Result<Self> {
        let call = diamondCutCall::abi_decode(data)
            .map_err(|e| Error::Decode(e.to_string()))?;
        Ok(UpgradeCall {
            cuts: call
                .cuts
                .into_iter()
                .map(Cut::try_from)
                .collect::<Result<Vec<_>>>()?,
            init: call.init,
            calldata: call.initCalldata,
        })
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{Address, Bytes, Selector};
    use alloy_sol_types::SolError;

    use super::*;
    use crate::signature;

    #[test]
    fn selector_matches_codec() {
        assert_eq!(
            diamondCutCall::SELECTOR,
            *signature::selector(
                "diamondCut((address,uint8,bytes4[])[],address,bytes)"
            )
        );
        assert_eq!(
            CannotAddFunctionToDiamondThatAlreadyExists::SELECTOR,
            *signature::selector(
                "CannotAddFunctionToDiamondThatAlreadyExists(bytes4)"
            )
        );
    }

    #[test]
    fn encodes_upgrade_call() {
        let facet = Address::repeat_byte(0x11);
        let init = Address::repeat_byte(0x22);
        let call = UpgradeCall::new(vec![
            Cut::remove(vec![Selector::repeat_byte(0x01)]),
            Cut::replace(facet, vec![Selector::repeat_byte(0x02)]),
            Cut::add(
                facet,
                vec![Selector::repeat_byte(0x03), Selector::repeat_byte(0x04)],
            ),
        ])
        .with_init(init, Bytes::from_static(&[0xe1, 0xc7, 0x39, 0x2a]));

        let data = call.abi_encode();
        assert_eq!(data[..4], diamondCutCall::SELECTOR);
        assert_eq!(UpgradeCall::abi_decode(&data).unwrap(), call);
    }

    #[test]
    fn rejects_foreign_calldata() {
        let err =
            UpgradeCall::abi_decode(&[0xde, 0xad, 0xbe, 0xef]).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }
}
