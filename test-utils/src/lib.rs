#![allow(clippy::test_attr_in_doctest)]
use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, ItemFn};

/// Attribute macro for integration tests that run the client against
/// in-process doubles (simulated engine, mock JSON-RPC node).
/// It sets `RUN_MODE=integration` once per test binary, which selects the
/// integration logging filter and configuration files.
///
/// Works for both sync and async test functions, the signature is kept
/// as written so it composes with `#[tokio::test]` and `#[test_context]`.
///
/// Example:
/// ```
/// # use test_utils::integration_test;
/// #[tokio::test]
/// #[integration_test]
/// async fn my_test() {
///     // test code
/// }
/// ```
#[proc_macro_attribute]
pub fn integration_test(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input_fn = parse_macro_input!(item as ItemFn);
    let fn_sig = &input_fn.sig;
    let fn_block = &input_fn.block;
    let fn_vis = &input_fn.vis;
    let fn_attrs = &input_fn.attrs;

    let output = quote! {
        #(#fn_attrs)*
        #fn_vis #fn_sig {
            static INIT: std::sync::Once = std::sync::Once::new();
            INIT.call_once(|| {
                std::env::set_var("RUN_MODE", "integration");
            });
            #fn_block
        }
    };

    output.into()
}
