//! Proc macros for threadprobe.
//!
//! This crate provides the `#[probed]` attribute macro, which times a whole
//! function body with a probe on the calling thread's stack.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::parse::Parser;
use syn::{ItemFn, LitStr};

/// Time a function with a probe nested on the calling thread's stack.
///
/// The probe is ended and reported on every exit path, including early
/// returns and panics.
///
/// # Example
///
/// ```rust,ignore
/// use threadprobe::probed;
///
/// #[probed]
/// fn load_config(path: &str) -> String {
///     std::fs::read_to_string(path).unwrap_or_default()
/// }
/// ```
///
/// # Attributes
///
/// - `#[probed]` - Marker is the function name
/// - `#[probed(name = "custom")]` - Use a custom marker
/// - `#[probed(begin)]` - Clear the thread's stack and start a new root probe
#[proc_macro_attribute]
pub fn probed(attr: TokenStream, item: TokenStream) -> TokenStream {
    expand(attr.into(), item.into())
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Options accepted inside `#[probed(...)]`.
#[derive(Debug, Default)]
struct ProbedArgs {
    name: Option<LitStr>,
    begin: bool,
}

fn parse_args(attr: TokenStream2) -> syn::Result<ProbedArgs> {
    let mut args = ProbedArgs::default();
    let parser = syn::meta::parser(|meta| {
        if meta.path.is_ident("name") {
            if args.name.is_some() {
                return Err(meta.error("duplicate `name`"));
            }
            args.name = Some(meta.value()?.parse()?);
            Ok(())
        } else if meta.path.is_ident("begin") {
            args.begin = true;
            Ok(())
        } else {
            Err(meta.error("unsupported #[probed] option, expected `name = \"..\"` or `begin`"))
        }
    });
    parser.parse2(attr)?;
    Ok(args)
}

fn expand(attr: TokenStream2, item: TokenStream2) -> syn::Result<TokenStream2> {
    let args = parse_args(attr)?;
    let ItemFn {
        attrs,
        vis,
        sig,
        block,
    } = syn::parse2(item)?;

    if sig.asyncness.is_some() {
        return Err(syn::Error::new_spanned(
            sig.fn_token,
            "#[probed] cannot time async functions; probes are bound to a thread",
        ));
    }

    let marker = args
        .name
        .unwrap_or_else(|| LitStr::new(&sig.ident.to_string(), sig.ident.span()));
    if marker.value().is_empty() {
        return Err(syn::Error::new_spanned(
            &marker,
            "#[probed] marker must not be empty",
        ));
    }
    let begin = args.begin;

    Ok(quote! {
        #(#attrs)*
        #vis #sig {
            let __threadprobe_guard = ::threadprobe::__private::enter(#marker, #begin);
            #block
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_default_to_no_options_when_attr_empty() {
        let args = parse_args(TokenStream2::new()).unwrap();
        assert!(args.name.is_none());
        assert!(!args.begin);
    }

    #[test]
    fn should_read_name_and_begin_when_both_given() {
        let args = parse_args(quote!(begin, name = "custom")).unwrap();
        assert_eq!(args.name.unwrap().value(), "custom");
        assert!(args.begin);
    }

    #[test]
    fn should_reject_unknown_option_when_name_is_only_a_suffix() {
        let err = parse_args(quote!(begin, rename = "x")).unwrap_err();
        assert!(err.to_string().contains("unsupported"));
    }

    #[test]
    fn should_reject_duplicate_name() {
        assert!(parse_args(quote!(name = "a", name = "b")).is_err());
    }

    #[test]
    fn should_reject_empty_marker_when_expanding() {
        let err = expand(quote!(name = ""), quote!(fn f() {})).unwrap_err();
        assert!(err.to_string().contains("must not be empty"));
    }

    #[test]
    fn should_reject_async_fn_when_expanding() {
        assert!(expand(TokenStream2::new(), quote!(async fn f() {})).is_err());
    }

    #[test]
    fn should_wrap_body_with_guard_when_expanding() {
        let out = expand(quote!(name = "load"), quote!(fn f() -> u8 { 1 }))
            .unwrap()
            .to_string();
        assert!(out.contains("__threadprobe_guard"));
        assert!(out.contains("\"load\""));
        assert!(out.contains("false"));
    }
}
