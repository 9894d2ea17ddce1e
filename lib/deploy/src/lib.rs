/*!
# Diamond Deploy

Deployment and upgrade orchestration for [EIP-2535] diamonds, driven by a
`diamond.toml` settings file.

- [`settings`] and [`context`] describe the project: the network, where
  packages live, how the combined interface is built and which facets make up
  each deployment group.
- [`artifacts`] discovers the compiled contracts and [`export`] merges their
  declarations into the combined interface.
- [`orchestrator`] deploys every group to a [`chain::Chain`], plans the cuts
  with [`diamond_cut::batch::UpgradeBatch`] and writes the
  [`record::DeploymentRecords`] the next upgrade starts from.
- [`devnet`] is an in-memory chain for simulations and tests.

[EIP-2535]: https://eips.ethereum.org/EIPS/eip-2535
*/

#![allow(clippy::module_name_repetitions)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod artifacts;
pub mod chain;
/// Project layout and settings shared by every command.
pub mod context;
pub mod devnet;
pub mod export;
pub mod orchestrator;
pub mod record;
pub mod settings;
