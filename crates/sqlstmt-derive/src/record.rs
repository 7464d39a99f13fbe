//! Record derive macro implementation

use proc_macro2::TokenStream;
use quote::quote;
use syn::{DeriveInput, Result};

use crate::attrs::{column_tag, named_fields, table_name};

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let fields = named_fields(&input, "Record")?;

    let table = match table_name(&input) {
        Some(table) => quote! { ::core::option::Option::Some(#table) },
        None => quote! { ::core::option::Option::None },
    };

    let mut field_defs = Vec::with_capacity(fields.named.len());
    let mut visits = Vec::with_capacity(fields.named.len());
    for field in &fields.named {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let ident_str = ident.to_string();
        let column = match column_tag(field) {
            Some(tag) => quote! { ::core::option::Option::Some(#tag) },
            None => quote! { ::core::option::Option::None },
        };

        field_defs.push(quote! {
            ::sqlstmt::Field::new(#ident_str, #column)
        });
        visits.push(quote! {
            f(::sqlstmt::ToValue::to_value(&self.#ident));
        });
    }

    Ok(quote! {
        impl #impl_generics ::sqlstmt::Record for #name #ty_generics #where_clause {
            const TABLE: ::core::option::Option<&'static str> = #table;
            const FIELDS: &'static [::sqlstmt::Field] = &[#(#field_defs),*];

            fn visit_values(&self, f: &mut dyn FnMut(::sqlstmt::Value)) {
                #(#visits)*
            }
        }
    })
}
