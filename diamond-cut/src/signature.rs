//! Canonical signatures and selectors, as defined by the [Solidity ABI].
//!
//! A signature is `name(type1,type2,...)` with every type written in its
//! canonical form (`uint` becomes `uint256`, tuples are inlined, no
//! whitespace). Function and error selectors are the first four bytes of the
//! keccak-256 hash of the signature; event topics use the whole hash.
//!
//! [Solidity ABI]: https://docs.soliditylang.org/en/latest/abi-spec.html
use alloy_primitives::{keccak256, Selector, B256};

use crate::error::{Error, Result};

/// Returns the canonical form of the ABI type `ty`.
///
/// # Arguments
///
/// * `ty` - The type as written in source or in a compiled ABI, e.g.
///   `uint`, `address payable`, `(uint,bool)[2]`.
///
/// # Errors
///
/// * [`Error::InvalidType`] if `ty` is not a valid ABI type.
///
/// # Examples
///
/// ```
/// use diamond_cut::signature::canonical_type;
///
/// assert_eq!(canonical_type("uint").unwrap(), "uint256");
/// assert_eq!(canonical_type("(int, byte)[]").unwrap(), "(int256,bytes1)[]");
/// ```
pub fn canonical_type(ty: &str) -> Result<String> {
    let trimmed = ty.trim();
    if trimmed.is_empty() {
        return Err(invalid(ty, "empty type"));
    }

    let (base, dims) = split_array_suffix(ty, trimmed)?;
    let base = if base.starts_with('(') {
        canonical_tuple(ty, base)?
    } else {
        canonical_elementary(ty, base)?
    };

    Ok(base + &dims)
}

/// Builds the canonical signature `name(type1,type2,...)`.
///
/// # Errors
///
/// * [`Error::InvalidName`] if `name` is not an identifier.
/// * [`Error::InvalidType`] if any of `params` is not a valid ABI type.
pub fn signature<S: AsRef<str>>(name: &str, params: &[S]) -> Result<String> {
    let name = name.trim();
    if !is_identifier(name) {
        return Err(Error::InvalidName(name.to_string()));
    }
    let params = params
        .iter()
        .map(|p| canonical_type(p.as_ref()))
        .collect::<Result<Vec<_>>>()?;
    Ok(format!("{name}({})", params.join(",")))
}

/// Splits a human-written signature such as `transfer(address, uint)` into
/// its name and canonical parameter types.
///
/// # Errors
///
/// * [`Error::InvalidSignature`] if `sig` is not of the form `name(...)`.
/// * [`Error::InvalidName`] and [`Error::InvalidType`] as [`signature`].
pub fn parse_signature(sig: &str) -> Result<(String, Vec<String>)> {
    let sig = sig.trim();
    let Some(open) = sig.find('(') else {
        return Err(Error::InvalidSignature(sig.to_string()));
    };
    let name = sig[..open].trim();
    if !is_identifier(name) {
        return Err(Error::InvalidName(name.to_string()));
    }
    let params = &sig[open..];
    if !params.ends_with(')') {
        return Err(Error::InvalidSignature(sig.to_string()));
    }
    let params = split_components(sig, &params[1..params.len() - 1])?
        .into_iter()
        .map(canonical_type)
        .collect::<Result<Vec<_>>>()?;
    Ok((name.to_string(), params))
}

/// Normalizes a human-written signature to its canonical form.
///
/// # Errors
///
/// * See [`parse_signature`].
pub fn canonical_signature(sig: &str) -> Result<String> {
    let (name, params) = parse_signature(sig)?;
    signature(&name, &params)
}

/// Computes the 4-byte selector of a canonical signature.
///
/// The input is hashed as is, so it should come out of [`signature`].
///
/// # Examples
///
/// ```
/// use diamond_cut::signature::selector;
///
/// let selector = selector("transfer(address,uint256)");
/// assert_eq!(selector.as_slice(), &[0xa9, 0x05, 0x9c, 0xbb]);
/// ```
#[must_use]
pub fn selector(signature: &str) -> Selector {
    Selector::from_slice(&keccak256(signature.as_bytes())[..4])
}

/// Computes the 32-byte hash of a canonical signature (an event topic).
#[must_use]
pub fn signature_hash(signature: &str) -> B256 {
    keccak256(signature.as_bytes())
}

fn invalid(ty: &str, reason: &'static str) -> Error {
    Error::InvalidType { ty: ty.to_string(), reason }
}

/// Returns the part of `ty` before any array suffix, and the canonical
/// suffix itself (e.g. `[2][]`).
fn split_array_suffix<'a>(
    original: &str,
    mut ty: &'a str,
) -> Result<(&'a str, String)> {
    let mut dims = Vec::new();
    while let Some(rest) = ty.strip_suffix(']') {
        let Some(open) = rest.rfind('[') else {
            return Err(invalid(original, "unbalanced brackets"));
        };
        let len = rest[open + 1..].trim();
        if !len.is_empty() {
            match parse_decimal(len) {
                Some(n) if n > 0 => {}
                _ => return Err(invalid(original, "invalid array length")),
            }
        }
        dims.push(format!("[{len}]"));
        ty = rest[..open].trim_end();
    }
    if ty.is_empty() {
        return Err(invalid(original, "array of nothing"));
    }
    dims.reverse();
    Ok((ty, dims.concat()))
}

fn canonical_tuple(original: &str, ty: &str) -> Result<String> {
    let Some(inner) = ty.strip_prefix('(').and_then(|t| t.strip_suffix(')'))
    else {
        return Err(invalid(original, "unbalanced parentheses"));
    };
    let components = split_components(original, inner)?
        .into_iter()
        .map(canonical_type)
        .collect::<Result<Vec<_>>>()?;
    Ok(format!("({})", components.join(",")))
}

/// Splits a comma separated list at depth zero.
fn split_components<'a>(original: &str, list: &'a str) -> Result<Vec<&'a str>> {
    if list.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in list.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    invalid(original, "unbalanced parentheses")
                })?;
            }
            ',' if depth == 0 => {
                parts.push(&list[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(invalid(original, "unbalanced parentheses"));
    }
    parts.push(&list[start..]);
    Ok(parts)
}

fn canonical_elementary(original: &str, ty: &str) -> Result<String> {
    // `address payable` is the only elementary type spelled with a space.
    let words: Vec<&str> = ty.split_whitespace().collect();
    let ty = match words.as_slice() {
        ["address", "payable"] => return Ok("address".to_string()),
        [single] => *single,
        _ => return Err(invalid(original, "unexpected whitespace")),
    };

    let canonical = match ty {
        "uint" => "uint256".to_string(),
        "int" => "int256".to_string(),
        "byte" => "bytes1".to_string(),
        "fixed" => "fixed128x18".to_string(),
        "ufixed" => "ufixed128x18".to_string(),
        "bool" | "address" | "string" | "bytes" | "function" => ty.to_string(),
        _ => {
            if let Some(bits) =
                ty.strip_prefix("uint").or_else(|| ty.strip_prefix("int"))
            {
                check_bits(original, bits)?;
            } else if let Some(len) = ty.strip_prefix("bytes") {
                match parse_decimal(len) {
                    Some(1..=32) => {}
                    _ => {
                        return Err(invalid(original, "bytesN needs 1 <= N <= 32"))
                    }
                }
            } else if let Some(spec) =
                ty.strip_prefix("ufixed").or_else(|| ty.strip_prefix("fixed"))
            {
                let Some((bits, decimals)) = spec.split_once('x') else {
                    return Err(invalid(original, "fixed point type needs MxN"));
                };
                check_bits(original, bits)?;
                match parse_decimal(decimals) {
                    Some(0..=80) => {}
                    _ => {
                        return Err(invalid(
                            original,
                            "fixed point decimals must be at most 80",
                        ))
                    }
                }
            } else {
                return Err(invalid(original, "unknown type"));
            }
            ty.to_string()
        }
    };

    Ok(canonical)
}

fn check_bits(original: &str, bits: &str) -> Result<()> {
    match parse_decimal(bits) {
        Some(n) if (8..=256).contains(&n) && n % 8 == 0 => Ok(()),
        _ => Err(invalid(
            original,
            "bit size must be a multiple of 8 in 8..=256",
        )),
    }
}

/// Parses a plain decimal without sign or leading zeros.
fn parse_decimal(s: &str) -> Option<usize> {
    if s.is_empty()
        || !s.bytes().all(|b| b.is_ascii_digit())
        || (s.len() > 1 && s.starts_with('0'))
    {
        return None;
    }
    s.parse().ok()
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}
