use proc_macro::TokenStream;
use quote::quote;
use syn::{DeriveInput, parse_macro_input};

/// Emits `impl ::ecs_core::component::Component for #struct_name {}`.
///
/// Works both inside `ecs_core` itself (via `extern crate self as ecs_core;` in
/// its `lib.rs`) and in downstream crates, where `::ecs_core` resolves to the
/// dependency normally.
pub fn derive_component(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    let struct_name = &ast.ident;

    TokenStream::from(quote! {
        impl ::ecs_core::component::Component for #struct_name {}
    })
}
