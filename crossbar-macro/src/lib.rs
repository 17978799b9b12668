/*
 * Copyright (c) 2024. Govcraft
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */
#![forbid(unsafe_code)]

//! Crossbar Macro Library
//!
//! Procedural macros for the crossbar component messaging runtime.

use proc_macro::TokenStream;

use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields};

/// Derives the `Interface` trait for a struct of `IfSyncQuery` /
/// `IfAsyncQuery` fields.
///
/// The generated `bind` rebinds every field to the calling component,
/// producing the sender-local proxy; the generated `attach` wires every
/// field to the publishing component. The interface's diagnostic name is the
/// struct name.
///
/// ```ignore
/// #[derive(Interface)]
/// struct Calculator {
///     sum: IfAsyncQuery<Sum>,
///     magnitude: IfSyncQuery<Magnitude>,
/// }
/// ```
#[proc_macro_derive(Interface)]
pub fn derive_interface(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return syn::Error::new_spanned(
                    name,
                    "#[derive(Interface)] requires named fields",
                )
                .to_compile_error()
                .into();
            }
        },
        _ => {
            return syn::Error::new_spanned(name, "#[derive(Interface)] requires a struct")
                .to_compile_error()
                .into();
        }
    };

    let idents: Vec<_> = fields
        .iter()
        .map(|field| field.ident.as_ref().expect("named field"))
        .collect();

    let expanded = quote! {
        impl ::crossbar::interface::Interface for #name {
            const NAME: &'static str = stringify!(#name);

            fn bind(&self, ctx: &::crossbar::interface::BindContext) -> Self {
                Self {
                    #( #idents: ::crossbar::interface::InterfaceField::bind_field(&self.#idents, ctx), )*
                }
            }

            fn attach(&self, ctx: &::crossbar::interface::AttachContext) {
                #( ::crossbar::interface::InterfaceField::attach_field(&self.#idents, ctx); )*
            }
        }
    };

    TokenStream::from(expanded)
}
