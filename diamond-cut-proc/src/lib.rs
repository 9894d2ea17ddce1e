//! Procedural macros for diamond facets.
extern crate proc_macro;
use proc_macro::TokenStream;

/// Shorthand to print nice errors.
macro_rules! error {
    ($tokens:expr, $($msg:expr),+ $(,)?) => {{
        let error = syn::Error::new(syn::spanned::Spanned::span(&$tokens), format!($($msg),+));
        return error.to_compile_error().into();
    }};
    (@ $tokens:expr, $($msg:expr),+ $(,)?) => {{
        return Err(syn::Error::new(syn::spanned::Spanned::span(&$tokens), format!($($msg),+)))
    }};
}

mod facet;

/// Computes the Solidity selectors of a facet trait at compile time.
///
/// Every method of the trait becomes a Solidity function. Its name is the
/// camel-cased method name unless overridden with
/// `#[selector(name = "...")]`, and its parameter types are mapped from Rust:
///
/// | Rust                                  | Solidity        |
/// |---------------------------------------|-----------------|
/// | `bool`                                | `bool`          |
/// | `u8` .. `u128`, `U8` .. `U256`        | `uint8` .. `uint256` |
/// | `i8` .. `i128`, `I8` .. `I256`        | `int8` .. `int256`   |
/// | `Address`                             | `address`       |
/// | `FixedBytes<N>`, `B256`, `Selector`   | `bytesN`        |
/// | `Bytes`                               | `bytes`         |
/// | `String`, `&str`                      | `string`        |
/// | `Vec<T>`, `&[T]`                      | `T[]`           |
/// | `[T; N]`                              | `T[N]`          |
/// | `(A, B)`                              | `(A,B)`         |
///
/// `self` receivers are skipped.
///
/// The trait gains three associated constants:
///
/// * `SIGNATURES: &[&str]` - canonical signatures, in declaration order.
/// * `SELECTORS: &[[u8; 4]]` - matching selectors.
/// * `INTERFACE_ID: u32` - XOR of every selector.
///
/// # Examples
///
/// ```rust,ignore
/// #[facet]
/// pub trait IOwnership {
///     fn owner(&self) -> Address;
///
///     #[selector(name = "transferOwnership")]
///     fn set_owner(&mut self, owner: Address);
/// }
///
/// struct Ownership;
///
/// impl IOwnership for Ownership {
///     // ...
/// }
///
/// assert_eq!(<Ownership as IOwnership>::SELECTORS[0], [0x8d, 0xa5, 0xcb, 0x5b]);
/// ```
#[proc_macro_attribute]
pub fn facet(attr: TokenStream, input: TokenStream) -> TokenStream {
    facet::facet(&attr, input)
}
