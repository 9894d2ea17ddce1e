//! Defines the `#[facet]` procedural macro.

use std::mem;

use convert_case::{Case, Casing};
use proc_macro::TokenStream;
use proc_macro2::Ident;
use quote::quote;
use syn::{
    parse::{Parse, ParseStream},
    parse_macro_input, parse_quote, Expr, ExprLit, FnArg, GenericArgument,
    ItemTrait, Lit, LitStr, PathArguments, Result, Token, TraitItem, Type,
    TypePath,
};

/// Adds the signatures, selectors and interface id of the trait's functions
/// as associated constants.
pub(crate) fn facet(_attr: &TokenStream, input: TokenStream) -> TokenStream {
    let mut input = parse_macro_input!(input as ItemTrait);

    let mut signatures = Vec::new();
    let mut selectors: Vec<[u8; 4]> = Vec::new();
    for item in &mut input.items {
        let TraitItem::Fn(func) = item else {
            continue;
        };

        let mut override_fn_name = None;
        for attr in mem::take(&mut func.attrs) {
            if attr.path().is_ident("selector") {
                if override_fn_name.is_some() {
                    error!(attr.path(), "more than one selector attribute");
                }
                let args: SelectorArgs = match attr.parse_args() {
                    Ok(args) => args,
                    Err(error) => error!(attr.path(), "{}", error),
                };
                override_fn_name = Some(args.name);
            } else {
                // Put back any other attributes.
                func.attrs.push(attr);
            }
        }

        let solidity_fn_name = override_fn_name.unwrap_or_else(|| {
            let rust_fn_name = func.sig.ident.to_string();
            rust_fn_name.to_case(Case::Camel)
        });

        let mut arg_types = Vec::new();
        for arg in &func.sig.inputs {
            // Opt out any `self` arguments.
            let FnArg::Typed(t) = arg else {
                continue;
            };
            match solidity_type(&t.ty) {
                Ok(ty) => arg_types.push(ty),
                Err(error) => return error.to_compile_error().into(),
            }
        }

        let signature = diamond_cut::signature::signature(
            &solidity_fn_name,
            &arg_types,
        );
        let signature = match signature {
            Ok(signature) => signature,
            Err(error) => error!(func.sig, "{}", error),
        };
        let selector = diamond_cut::signature::selector(&signature).0;
        if let Some(i) = selectors.iter().position(|s| *s == selector) {
            error!(
                func.sig,
                "`{}` collides with `{}` on selector 0x{}",
                signature,
                signatures[i],
                selector.iter().map(|b| format!("{b:02x}")).collect::<String>()
            );
        }

        signatures.push(signature);
        selectors.push(selector);
    }

    let interface_id = selectors
        .iter()
        .map(|s| u32::from_be_bytes(*s))
        .fold(0, |id, s| id ^ s);
    let selectors =
        selectors.iter().map(|[a, b, c, d]| quote! { [#a, #b, #c, #d] });
    let name = &input.ident;

    input.items.push(parse_quote! {
        #[doc = concat!(
            "Solidity signatures of the ",
            stringify!(#name),
            " functions, in declaration order."
        )]
        const SIGNATURES: &'static [&'static str] = &[#(#signatures),*];
    });
    input.items.push(parse_quote! {
        #[doc = "Selectors matching [`Self::SIGNATURES`]."]
        const SELECTORS: &'static [[u8; 4]] = &[#(#selectors),*];
    });
    input.items.push(parse_quote! {
        #[doc = concat!(
            "Solidity interface id associated with ",
            stringify!(#name),
            " trait."
        )]
        #[doc = "Computed as a XOR of selectors for each function in the trait."]
        const INTERFACE_ID: u32 = #interface_id;
    });

    quote! { #input }.into()
}

/// Maps a Rust parameter type to its Solidity ABI type.
fn solidity_type(ty: &Type) -> Result<String> {
    match ty {
        Type::Reference(reference) => match &*reference.elem {
            Type::Path(path) if path.path.is_ident("str") => {
                Ok("string".to_string())
            }
            Type::Slice(slice) => {
                Ok(format!("{}[]", solidity_type(&slice.elem)?))
            }
            elem => solidity_type(elem),
        },
        Type::Array(array) => {
            let len = int_literal(&array.len)?;
            Ok(format!("{}[{len}]", solidity_type(&array.elem)?))
        }
        Type::Tuple(tuple) => {
            if tuple.elems.is_empty() {
                error!(@ty, "unit is not a valid parameter type");
            }
            let elems = tuple
                .elems
                .iter()
                .map(solidity_type)
                .collect::<Result<Vec<_>>>()?;
            Ok(format!("({})", elems.join(",")))
        }
        Type::Paren(paren) => solidity_type(&paren.elem),
        Type::Group(group) => solidity_type(&group.elem),
        Type::Path(path) => path_type(path),
        _ => error!(@ty, "unsupported parameter type"),
    }
}

fn path_type(path: &TypePath) -> Result<String> {
    let Some(segment) = path.path.segments.last() else {
        error!(@path, "empty type path");
    };
    let name = segment.ident.to_string();

    let ty = match name.as_str() {
        "bool" => "bool".to_string(),
        "Address" => "address".to_string(),
        "String" => "string".to_string(),
        "Bytes" => "bytes".to_string(),
        "B256" => "bytes32".to_string(),
        "Selector" => "bytes4".to_string(),
        "FixedBytes" => format!("bytes{}", int_literal(first_const(path)?)?),
        "Uint" => format!("uint{}", int_literal(first_const(path)?)?),
        "Signed" => format!("int{}", int_literal(first_const(path)?)?),
        "Vec" => {
            let PathArguments::AngleBracketed(args) = &segment.arguments else {
                error!(@segment, "expected `Vec<T>`");
            };
            let Some(GenericArgument::Type(elem)) = args.args.first() else {
                error!(@args, "expected `Vec<T>`");
            };
            format!("{}[]", solidity_type(elem)?)
        }
        _ => match integer_type(&name) {
            Some(ty) => ty,
            None => error!(@path, "unsupported parameter type `{}`", name),
        },
    };
    Ok(ty)
}

/// Maps primitive integers and `alloy` integer aliases, e.g. `u64` or `U256`.
fn integer_type(name: &str) -> Option<String> {
    let (prefix, bits, primitive) = if let Some(bits) = name.strip_prefix('u') {
        ("uint", bits, true)
    } else if let Some(bits) = name.strip_prefix('i') {
        ("int", bits, true)
    } else if let Some(bits) = name.strip_prefix('U') {
        ("uint", bits, false)
    } else if let Some(bits) = name.strip_prefix('I') {
        ("int", bits, false)
    } else {
        return None;
    };

    let bits: u16 = bits.parse().ok()?;
    let valid = if primitive {
        matches!(bits, 8 | 16 | 32 | 64 | 128)
    } else {
        bits % 8 == 0 && (8..=256).contains(&bits)
    };
    valid.then(|| format!("{prefix}{bits}"))
}

fn first_const(path: &TypePath) -> Result<&Expr> {
    let segment = path.path.segments.last();
    let arguments = segment.map(|s| &s.arguments);
    if let Some(PathArguments::AngleBracketed(args)) = arguments {
        if let Some(GenericArgument::Const(expr)) = args.args.first() {
            return Ok(expr);
        }
    }
    error!(@path, "expected a literal size argument")
}

fn int_literal(expr: &Expr) -> Result<usize> {
    match expr {
        Expr::Lit(ExprLit { lit: Lit::Int(int), .. }) => int.base10_parse(),
        _ => error!(@expr, "expected an integer literal"),
    }
}

/// Contains arguments of the `#[selector(..)]` attribute.
struct SelectorArgs {
    name: String,
}

impl Parse for SelectorArgs {
    fn parse(input: ParseStream) -> Result<Self> {
        let ident: Ident = input.parse()?;

        if ident == "name" {
            let _: Token![=] = input.parse()?;
            let lit: LitStr = input.parse()?;
            Ok(SelectorArgs { name: lit.value() })
        } else {
            error!(@ident, "expected identifier 'name'")
        }
    }
}
