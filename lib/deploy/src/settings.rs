//! The `diamond.toml` settings file.
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::U256;
use diamond_cut::{
    interface::Declaration,
    overlap::{ExcludeSignatures, IncludePatterns, OverlapResolver},
    signature,
};
use eyre::{bail, Context};
use serde::{Deserialize, Deserializer};

/// Networks whose accounts are funded by the node itself.
const DEVELOPMENT_NETWORKS: &[&str] = &["hardhat", "localhost"];

/// Parsed contents of `diamond.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Network to deploy to.
    pub network: NetworkSettings,
    /// Locations of workspace packages, by name.
    #[serde(default = "default_packages")]
    pub packages: BTreeMap<String, PathBuf>,
    /// How to build the combined interface.
    pub interface: InterfaceSettings,
    /// Deployment groups, by name. Each group is one diamond.
    #[serde(default)]
    pub deployments: BTreeMap<String, DeploymentSettings>,
}

/// The `[network]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkSettings {
    /// Network name, e.g. `localhost`.
    pub name: String,
    /// Expected chain id.
    pub chain_id: u64,
    /// Minimum deployer balance, in wei. Only checked outside development
    /// networks.
    #[serde(default = "default_required_balance", deserialize_with = "wei")]
    pub required_balance: U256,
}

impl NetworkSettings {
    /// Whether this is a local development network.
    #[must_use]
    pub fn is_development(&self) -> bool {
        DEVELOPMENT_NETWORKS.contains(&self.name.as_str())
    }
}

/// The `[interface]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct InterfaceSettings {
    /// Name of the combined interface artifact.
    pub name: String,
    /// Patterns selecting the artifacts merged into the interface.
    #[serde(default = "default_include")]
    pub include: Vec<String>,
    /// Whether illegitimate collisions abort the build.
    #[serde(default = "default_strict")]
    pub strict: bool,
    /// Signatures left out of the interface.
    #[serde(default)]
    pub exclude: Vec<Exclusion>,
    /// Contracts whose ABI is published next to the combined interface.
    /// Defaults to the diamond and initializer of every deployment group.
    pub export: Option<Vec<String>>,
}

/// A signature excluded from the combined interface.
#[derive(Debug, Clone, Deserialize)]
pub struct Exclusion {
    /// Function signature.
    pub signature: String,
    /// Keep the function for origins matching this pattern.
    pub unless: Option<String>,
}

impl InterfaceSettings {
    /// Patterns of the artifacts merged into the interface.
    ///
    /// # Errors
    ///
    /// * If a pattern is not a valid regular expression.
    pub fn include_patterns(&self) -> eyre::Result<IncludePatterns> {
        IncludePatterns::new(&self.include)
            .wrap_err("invalid `interface.include` pattern")
    }

    /// A resolver configured with this table's policy and exclusions.
    ///
    /// # Errors
    ///
    /// * If an exclusion has an invalid signature or pattern.
    pub fn resolver(&self) -> eyre::Result<OverlapResolver> {
        let mut exclude = ExcludeSignatures::new();
        for exclusion in &self.exclude {
            exclude = match &exclusion.unless {
                Some(unless) => {
                    exclude.exclude_unless(&exclusion.signature, unless)
                }
                None => exclude.exclude(&exclusion.signature),
            }
            .wrap_err_with(|| {
                format!(
                    "invalid `interface.exclude` entry `{}`",
                    exclusion.signature
                )
            })?;
        }

        Ok(OverlapResolver::new().strict(self.strict).with_filter(exclude))
    }
}

/// A `[deployments.<group>]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentSettings {
    /// Contract name of the diamond proxy.
    pub diamond: String,
    /// Contract name of the initializer.
    pub initializer: String,
    /// Signature of the initialization function.
    #[serde(default = "default_init")]
    pub init: String,
    /// Arguments of the initialization function, one per parameter, written
    /// the way Solidity literals are, e.g. `"42"`, `"0x…"` or `"[1,2]"`.
    #[serde(default)]
    pub init_args: Vec<String>,
    /// Facets cut into the diamond, in deployment order.
    pub facets: Vec<FacetSettings>,
}

impl DeploymentSettings {
    /// Calldata calling the initialization function with `init_args`.
    ///
    /// # Errors
    ///
    /// * If `init` is not a valid signature.
    /// * If the number of arguments doesn't match its parameters, or an
    ///   argument can't be read as its parameter type.
    pub fn init_calldata(&self) -> eyre::Result<Vec<u8>> {
        let init = signature::canonical_signature(&self.init)
            .wrap_err_with(|| {
                format!("invalid init signature `{}`", self.init)
            })?;
        let (_, params) = signature::parse_signature(&init)?;
        if params.len() != self.init_args.len() {
            bail!(
                "init function `{init}` takes {} arguments, got {}",
                params.len(),
                self.init_args.len()
            );
        }

        let args = params
            .iter()
            .zip(&self.init_args)
            .map(|(ty, arg)| {
                DynSolType::parse(ty)
                    .and_then(|ty| ty.coerce_str(arg))
                    .wrap_err_with(|| {
                        format!("invalid `{ty}` argument `{arg}` for `{init}`")
                    })
            })
            .collect::<eyre::Result<Vec<_>>>()?;

        let mut calldata = signature::selector(&init).to_vec();
        calldata.extend(DynSolValue::Tuple(args).abi_encode_params());
        Ok(calldata)
    }
}

/// A facet of a deployment group.
#[derive(Debug, Clone, Deserialize)]
pub struct FacetSettings {
    /// Contract name of the facet.
    pub name: String,
    /// Which of its functions are cut into the diamond.
    #[serde(default)]
    pub selectors: SelectorFilter,
}

/// Functions of a facet that are cut into the diamond.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawSelectorFilter")]
pub enum SelectorFilter {
    /// Every function, written `"*"`.
    #[default]
    All,
    /// Only these signatures.
    Only(Vec<String>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSelectorFilter {
    Wildcard(String),
    List(Vec<String>),
}

impl TryFrom<RawSelectorFilter> for SelectorFilter {
    type Error = String;

    fn try_from(raw: RawSelectorFilter) -> Result<Self, Self::Error> {
        match raw {
            RawSelectorFilter::Wildcard(s) if s == "*" => {
                Ok(SelectorFilter::All)
            }
            RawSelectorFilter::Wildcard(s) => Err(format!(
                "expected \"*\" or a list of signatures, got \"{s}\""
            )),
            RawSelectorFilter::List(list) => Ok(SelectorFilter::Only(list)),
        }
    }
}

impl SelectorFilter {
    /// Keeps the functions this filter selects. Events and errors are always
    /// kept.
    ///
    /// # Errors
    ///
    /// * If a listed signature is invalid or is not a function of the facet.
    pub fn apply(
        &self,
        declarations: Vec<Declaration>,
    ) -> eyre::Result<Vec<Declaration>> {
        let SelectorFilter::Only(signatures) = self else {
            return Ok(declarations);
        };

        let wanted = signatures
            .iter()
            .map(|s| signature::canonical_signature(s))
            .collect::<Result<Vec<_>, _>>()
            .wrap_err("invalid facet selector")?;
        for signature in &wanted {
            let found = declarations
                .iter()
                .any(|d| d.is_function() && d.signature() == signature);
            if !found {
                bail!("facet has no function `{signature}`");
            }
        }

        Ok(declarations
            .into_iter()
            .filter(|d| {
                !d.is_function() || wanted.iter().any(|s| s == d.signature())
            })
            .collect())
    }
}

impl Settings {
    /// Contracts exported next to the combined interface, without
    /// repetitions.
    #[must_use]
    pub fn exported_contracts(&self) -> Vec<String> {
        let names = match &self.interface.export {
            Some(names) => names.clone(),
            None => self
                .deployments
                .values()
                .flat_map(|d| [d.diamond.clone(), d.initializer.clone()])
                .collect(),
        };

        let mut exported = Vec::with_capacity(names.len());
        for name in names {
            if !exported.contains(&name) {
                exported.push(name);
            }
        }
        exported
    }

    /// Reads and parses a settings file.
    ///
    /// # Errors
    ///
    /// * If the file can't be read or is not valid settings.
    pub fn load(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read {}", path.display()))?;
        contents
            .parse()
            .wrap_err_with(|| format!("failed to parse {}", path.display()))
    }
}

impl FromStr for Settings {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(s)?)
    }
}

fn wei<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
    let value = String::deserialize(deserializer)?;
    U256::from_str(&value).map_err(serde::de::Error::custom)
}

/// 2.1 ether.
fn default_required_balance() -> U256 {
    U256::from(2_100_000_000_000_000_000_u128)
}

fn default_packages() -> BTreeMap<String, PathBuf> {
    BTreeMap::from([(
        "contracts".to_string(),
        PathBuf::from("packages/contracts"),
    )])
}

fn default_include() -> Vec<String> {
    vec!["Facet$".to_string(), ":Diamond$".to_string()]
}

fn default_strict() -> bool {
    true
}

fn default_init() -> String {
    "init()".to_string()
}
