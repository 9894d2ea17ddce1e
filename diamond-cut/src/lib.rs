/*!
# Diamond Cut

Upgrade planning for [EIP-2535] diamonds: a proxy that routes every function
selector to one of many independently deployed facets.

This crate answers two questions every diamond upgrade has to answer:

- Which `Add`, `Replace` and `Remove` cuts move each facet from the selectors
  it exposed before to the ones it exposes now? See [`planner`] and
  [`batch`].
- What is the public interface of the diamond, once the declarations every
  facet shares are merged and the ones that really clash are rejected? See
  [`overlap`].

```
use alloy_primitives::Address;
use diamond_cut::{
    batch::UpgradeBatch,
    diamond::DiamondState,
    interface::{Declaration, Facet},
    planner::FacetChange,
};

let origin = "contracts/facets/GreeterFacet.sol:GreeterFacet";
let greet = Declaration::function("greet", &["string"], origin)?;
let facet = Facet::new("GreeterFacet", Address::repeat_byte(0x11), vec![greet]);

let mut batch = UpgradeBatch::new(DiamondState::new(), []);
batch.collect(FacetChange::Upsert(facet))?;
batch.validate()?;
assert_eq!(batch.cuts().len(), 1);
# Ok::<(), diamond_cut::Error>(())
```

[EIP-2535]: https://eips.ethereum.org/EIPS/eip-2535
*/

#![allow(clippy::module_name_repetitions)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod abi;
pub mod artifact;
pub mod batch;
pub mod cut;
pub mod diamond;
mod error;
pub mod interface;
pub mod overlap;
pub mod planner;
pub mod signature;

pub use error::{Collision, CollisionKind, Error, Result};
