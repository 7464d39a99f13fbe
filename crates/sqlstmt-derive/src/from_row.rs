//! FromRow derive macro implementation

use proc_macro2::TokenStream;
use quote::quote;
use syn::{DeriveInput, Result};

use crate::attrs::{column_name, named_fields};

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let fields = named_fields(&input, "FromRow")?;

    let field_extracts: Vec<_> = fields
        .named
        .iter()
        .filter_map(|field| {
            let field_name = field.ident.as_ref()?;
            let column_name = column_name(field);

            Some(quote! {
                #field_name: ::sqlstmt::RowSource::try_get_column(row, #column_name)?
            })
        })
        .collect();

    Ok(quote! {
        impl #impl_generics ::sqlstmt::FromRow for #name #ty_generics #where_clause {
            fn from_row<R: ::sqlstmt::RowSource>(row: &R) -> ::sqlstmt::SqlResult<Self> {
                ::core::result::Result::Ok(Self {
                    #(#field_extracts),*
                })
            }
        }
    })
}
