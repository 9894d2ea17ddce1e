#![allow(dead_code)]
use alloy_primitives::{Address, Bytes, FixedBytes, B256, I256, U256};
use diamond_cut::signature::selector;
use diamond_cut_proc::facet;

#[facet]
pub trait IErc20 {
    fn total_supply(&self) -> U256;

    fn balance_of(&self, account: Address) -> U256;

    fn transfer(&mut self, to: Address, value: U256) -> bool;
}

#[facet]
pub trait IOwnership {
    fn owner(&self) -> Address;

    #[selector(name = "transferOwnership")]
    fn set_owner(&mut self, owner: Address);
}

#[facet]
pub trait IKitchenSink {
    fn flags(&self, on: bool, level: u8, delta: i64, offset: I256);

    fn blobs(&self, data: Bytes, hash: B256, tag: FixedBytes<16>, name: String);

    fn lists(
        &self,
        items: Vec<U256>,
        pairs: [(Address, u128); 2],
        nested: Vec<Vec<u32>>,
    );

    fn borrowed(&self, label: &str, ids: &[u64]);
}

#[facet]
pub trait IEmpty {}

struct Token;

impl IErc20 for Token {
    fn total_supply(&self) -> U256 {
        U256::ZERO
    }

    fn balance_of(&self, _account: Address) -> U256 {
        U256::ZERO
    }

    fn transfer(&mut self, _to: Address, _value: U256) -> bool {
        true
    }
}

struct Owned;

impl IOwnership for Owned {
    fn owner(&self) -> Address {
        Address::ZERO
    }

    fn set_owner(&mut self, _owner: Address) {}
}

struct Sink;

impl IKitchenSink for Sink {
    fn flags(&self, _: bool, _: u8, _: i64, _: I256) {}

    fn blobs(&self, _: Bytes, _: B256, _: FixedBytes<16>, _: String) {}

    fn lists(&self, _: Vec<U256>, _: [(Address, u128); 2], _: Vec<Vec<u32>>) {}

    fn borrowed(&self, _: &str, _: &[u64]) {}
}

struct Nothing;

impl IEmpty for Nothing {}

#[test]
fn derives_erc20_selectors() {
    assert_eq!(
        <Token as IErc20>::SIGNATURES,
        ["totalSupply()", "balanceOf(address)", "transfer(address,uint256)"]
    );
    assert_eq!(
        <Token as IErc20>::SELECTORS,
        [
            [0x18, 0x16, 0x0d, 0xdd],
            [0x70, 0xa0, 0x82, 0x31],
            [0xa9, 0x05, 0x9c, 0xbb]
        ]
    );
    assert_eq!(
        <Token as IErc20>::INTERFACE_ID,
        0x1816_0ddd ^ 0x70a0_8231 ^ 0xa905_9cbb
    );
}

#[test]
fn honours_selector_override() {
    assert_eq!(
        <Owned as IOwnership>::SIGNATURES,
        ["owner()", "transferOwnership(address)"]
    );
    assert_eq!(<Owned as IOwnership>::SELECTORS[0], [0x8d, 0xa5, 0xcb, 0x5b]);
    assert_eq!(<Owned as IOwnership>::SELECTORS[1], [0xf2, 0xfd, 0xe3, 0x8b]);
}

#[test]
fn maps_rust_types() {
    assert_eq!(
        <Sink as IKitchenSink>::SIGNATURES,
        [
            "flags(bool,uint8,int64,int256)",
            "blobs(bytes,bytes32,bytes16,string)",
            "lists(uint256[],(address,uint128)[2],uint32[][])",
            "borrowed(string,uint64[])",
        ]
    );
}

#[test]
fn matches_runtime_codec() {
    for (signature, expected) in <Sink as IKitchenSink>::SIGNATURES
        .iter()
        .zip(<Sink as IKitchenSink>::SELECTORS)
    {
        assert_eq!(selector(signature).0, *expected);
    }
}

#[test]
fn empty_facet_has_zero_interface_id() {
    assert!(<Nothing as IEmpty>::SELECTORS.is_empty());
    assert_eq!(<Nothing as IEmpty>::INTERFACE_ID, 0);
}
