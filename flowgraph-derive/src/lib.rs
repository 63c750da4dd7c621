//! Derive macro for `flowgraph` blocks.
//!
//! `#[derive(Block)]` wires up the plumbing every `Block` implementation
//! needs — `base()`/`base_mut()` accessors over a `BlockBase` field,
//! forwarding `prepare()`/`execute()`/`describe_args()` to the block's
//! `BlockLogic` impl — so block authors only have to write the hooks
//! that actually vary between blocks, the same split the teacher's own
//! `derive` crate draws between plumbing and a task's `Action`.
//!
//! The struct must contain exactly one field named `base` of type
//! `BlockBase`, and a separate `impl BlockLogic for Name { ... }` for
//! whichever of `prepare`/`execute`/`describe_args` it overrides; this
//! mirrors the way `dagrs`'s own `derive` crate expects a task struct
//! to carry the fields its generated impl depends on.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields};

#[proc_macro_derive(Block, attributes(block))]
pub fn derive_block(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    let has_base_field = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => named.named.iter().any(|f| {
                f.ident.as_ref().map(|i| i == "base").unwrap_or(false)
            }),
            _ => false,
        },
        _ => false,
    };

    if !has_base_field {
        let msg = format!(
            "#[derive(Block)] requires a named field `base: BlockBase` on `{}`",
            name
        );
        return syn::Error::new_spanned(&input.ident, msg)
            .to_compile_error()
            .into();
    }

    let expanded = quote! {
        impl ::flowgraph::block::Block for #name {
            fn base(&self) -> &::flowgraph::block::BlockBase {
                &self.base
            }

            fn base_mut(&mut self) -> &mut ::flowgraph::block::BlockBase {
                &mut self.base
            }

            fn prepare(&mut self) -> ::flowgraph::error::FlowResult<()> {
                <Self as ::flowgraph::block::BlockLogic>::prepare(self)
            }

            fn execute(&mut self) -> ::flowgraph::error::FlowResult<()> {
                <Self as ::flowgraph::block::BlockLogic>::execute(self)
            }

            fn describe_args(&self) -> ::std::collections::BTreeMap<::std::string::String, ::flowgraph::value::Value> {
                <Self as ::flowgraph::block::BlockLogic>::describe_args(self)
            }
        }
    };

    expanded.into()
}
