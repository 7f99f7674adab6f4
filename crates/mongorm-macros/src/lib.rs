//! `#[derive(Document)]`: generates the `mongorm_core::Document` and
//! `mongorm_core::DocumentFields` impls for a user struct.
//!
//! The source this is rewritten from retrofits its document contract onto
//! user classes with compile-time attribute weaving. Rust has no
//! equivalent mechanism that can modify field storage after the fact, so
//! the contract here is: the user declares the storage fields themselves,
//! behind interior mutability (`parking_lot::RwLock<T>` for scalar/complex
//! fields and the identity, a bare `ChangeNotifier` for the change slot),
//! and this derive emits trait impls that read and write through them.
//!
//! ```ignore
//! use mongorm_core::{ChangeNotifier, NavigationMap};
//! use mongorm_macros::Document;
//! use parking_lot::RwLock;
//! use bson::oid::ObjectId;
//!
//! #[derive(Document)]
//! #[mongorm(collection = "accounts", single_reference = "owner", collection_reference = "tags")]
//! struct Account {
//!     #[mongorm(id)]
//!     id: RwLock<ObjectId>,
//!     #[mongorm(nav)]
//!     nav: RwLock<NavigationMap>,
//!     #[mongorm(notifier)]
//!     notifier: ChangeNotifier,
//!     #[mongorm(tracked)]
//!     name: RwLock<String>,
//!     #[mongorm(tracked)]
//!     balance: RwLock<i64>,
//! }
//! ```

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::punctuated::Punctuated;
use syn::{parse_macro_input, Data, DeriveInput, Fields, Meta, Token};

/// Derives `Document` and `DocumentFields` for a struct whose storage
/// fields are marked with `#[mongorm(id)]`, `#[mongorm(nav)]`,
/// `#[mongorm(notifier)]`, and `#[mongorm(tracked)]`, and whose navigation
/// property names are declared on the container with
/// `#[mongorm(single_reference = "...")]` / `#[mongorm(collection_reference = "...")]`.
#[proc_macro_derive(Document, attributes(mongorm))]
pub fn derive_document(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(input).unwrap_or_else(|err| err.to_compile_error()).into()
}

struct ContainerAttrs {
    collection: String,
    single_references: Vec<String>,
    collection_references: Vec<String>,
}

fn parse_container_attrs(input: &DeriveInput) -> syn::Result<ContainerAttrs> {
    let mut collection = None;
    let mut single_references = Vec::new();
    let mut collection_references = Vec::new();

    for attr in &input.attrs {
        if !attr.path().is_ident("mongorm") {
            continue;
        }
        let metas = attr.parse_args_with(Punctuated::<Meta, Token![,]>::parse_terminated)?;
        for meta in metas {
            match &meta {
                Meta::NameValue(nv) if nv.path.is_ident("collection") => {
                    collection = Some(lit_str(&nv.value)?);
                }
                Meta::NameValue(nv) if nv.path.is_ident("single_reference") => {
                    single_references.push(lit_str(&nv.value)?);
                }
                Meta::NameValue(nv) if nv.path.is_ident("collection_reference") => {
                    collection_references.push(lit_str(&nv.value)?);
                }
                _ => {}
            }
        }
    }

    let collection = collection.ok_or_else(|| {
        syn::Error::new_spanned(input, "#[derive(Document)] requires #[mongorm(collection = \"...\")]")
    })?;

    Ok(ContainerAttrs {
        collection,
        single_references,
        collection_references,
    })
}

fn lit_str(expr: &syn::Expr) -> syn::Result<String> {
    match expr {
        syn::Expr::Lit(syn::ExprLit {
            lit: syn::Lit::Str(s), ..
        }) => Ok(s.value()),
        other => Err(syn::Error::new_spanned(other, "expected a string literal")),
    }
}

fn has_marker(attrs: &[syn::Attribute], marker: &str) -> bool {
    attrs.iter().any(|attr| {
        if !attr.path().is_ident("mongorm") {
            return false;
        }
        attr.parse_args_with(Punctuated::<Meta, Token![,]>::parse_terminated)
            .map(|metas| metas.iter().any(|m| m.path().is_ident(marker)))
            .unwrap_or(false)
    })
}

fn expand(input: DeriveInput) -> syn::Result<TokenStream2> {
    let attrs = parse_container_attrs(&input)?;
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(&input, "#[derive(Document)] only supports structs"));
    };
    let Fields::Named(fields) = &data.fields else {
        return Err(syn::Error::new_spanned(&input, "#[derive(Document)] requires named fields"));
    };

    let mut id_field = None;
    let mut nav_field = None;
    let mut notifier_field = None;
    let mut tracked_fields = Vec::new();

    for field in &fields.named {
        let ident = field.ident.as_ref().expect("named field");
        if has_marker(&field.attrs, "id") {
            id_field = Some(ident.clone());
        }
        if has_marker(&field.attrs, "nav") {
            nav_field = Some(ident.clone());
        }
        if has_marker(&field.attrs, "notifier") {
            notifier_field = Some(ident.clone());
        }
        if has_marker(&field.attrs, "tracked") {
            tracked_fields.push(ident.clone());
        }
    }

    let id_field = id_field
        .ok_or_else(|| syn::Error::new_spanned(&input, "exactly one field must be marked #[mongorm(id)]"))?;
    let nav_field = nav_field
        .ok_or_else(|| syn::Error::new_spanned(&input, "exactly one field must be marked #[mongorm(nav)]"))?;
    let notifier_field = notifier_field
        .ok_or_else(|| syn::Error::new_spanned(&input, "exactly one field must be marked #[mongorm(notifier)]"))?;

    let collection_name = &attrs.collection;
    let single_refs = &attrs.single_references;
    let collection_refs = &attrs.collection_references;
    let tracked_names: Vec<String> = tracked_fields.iter().map(ToString::to_string).collect();

    let set_field_arms = tracked_fields.iter().zip(tracked_names.iter()).map(|(field, name)| {
        quote! {
            #name => {
                let decoded = ::bson::from_bson(value)
                    .map_err(|e| ::mongorm_core::CoreError::ArgumentError(e.to_string()))?;
                *self.#field.write() = decoded;
                self.#notifier_field.notify(#name);
                Ok(())
            }
        }
    });

    let get_field_arms = tracked_fields.iter().zip(tracked_names.iter()).map(|(field, name)| {
        quote! {
            #name => ::bson::to_bson(&*self.#field.read()).ok(),
        }
    });

    let document_impl = quote! {
        impl #impl_generics ::mongorm_core::Document for #name #ty_generics #where_clause {
            fn collection_name() -> &'static str {
                #collection_name
            }

            fn id(&self) -> ::bson::oid::ObjectId {
                *self.#id_field.read()
            }

            fn set_id(&self, id: ::bson::oid::ObjectId) {
                *self.#id_field.write() = id;
            }

            fn navigation(&self) -> ::mongorm_core::NavigationMap {
                self.#nav_field.read().clone()
            }

            fn set_single_reference(&self, field: &'static str, id: ::bson::oid::ObjectId) {
                self.#nav_field.write().set_single(field, id);
            }

            fn set_collection_reference(&self, field: &'static str, ids: ::std::vec::Vec<::bson::oid::ObjectId>) {
                self.#nav_field.write().set_collection(field, ids);
            }

            fn change_notifier(&self) -> &::mongorm_core::ChangeNotifier {
                &self.#notifier_field
            }
        }
    };

    let fields_impl = quote! {
        impl #impl_generics ::mongorm_core::DocumentFields for #name #ty_generics #where_clause {
            fn set_field_bson(&self, name: &str, value: ::bson::Bson) -> ::std::result::Result<(), ::mongorm_core::CoreError> {
                match name {
                    #(#set_field_arms)*
                    other => Err(::mongorm_core::CoreError::ArgumentError(
                        ::std::format!("unknown tracked field {other}")
                    )),
                }
            }

            fn get_field_bson(&self, name: &str) -> ::std::option::Option<::bson::Bson> {
                match name {
                    #(#get_field_arms)*
                    _ => None,
                }
            }

            fn field_names() -> &'static [&'static str] {
                &[#(#tracked_names),*]
            }

            fn single_reference_names() -> &'static [&'static str] {
                &[#(#single_refs),*]
            }

            fn collection_reference_names() -> &'static [&'static str] {
                &[#(#collection_refs),*]
            }
        }
    };

    Ok(quote! {
        #document_impl
        #fields_impl
    })
}
