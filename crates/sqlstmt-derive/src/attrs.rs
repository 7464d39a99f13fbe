//! `#[orm(...)]` attribute parsing shared by the derives.

use syn::{Data, DeriveInput, Fields, FieldsNamed, Result};

/// Read the string value of `#[orm(<key> = "...")]` from `attrs`.
fn orm_str(attrs: &[syn::Attribute], key: &str) -> Option<String> {
    for attr in attrs {
        if attr.path().is_ident("orm") {
            if let Ok(nested) = attr.parse_args::<syn::MetaNameValue>() {
                if nested.path.is_ident(key) {
                    if let syn::Expr::Lit(syn::ExprLit {
                        lit: syn::Lit::Str(lit),
                        ..
                    }) = &nested.value
                    {
                        return Some(lit.value());
                    }
                }
            }
        }
    }
    None
}

pub(crate) fn table_name(input: &DeriveInput) -> Option<String> {
    orm_str(&input.attrs, "table")
}

/// The explicit column tag of a field, if any.
pub(crate) fn column_tag(field: &syn::Field) -> Option<String> {
    orm_str(&field.attrs, "column")
}

/// The column a field maps to: its non-empty tag, otherwise its name.
pub(crate) fn column_name(field: &syn::Field) -> String {
    match column_tag(field) {
        Some(tag) if !tag.is_empty() => tag,
        _ => field
            .ident
            .as_ref()
            .map(|ident| ident.to_string())
            .unwrap_or_default(),
    }
}

pub(crate) fn named_fields<'a>(input: &'a DeriveInput, derive: &str) -> Result<&'a FieldsNamed> {
    match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => Ok(fields),
            _ => Err(syn::Error::new_spanned(
                input,
                format!("{derive} can only be derived for structs with named fields"),
            )),
        },
        _ => Err(syn::Error::new_spanned(
            input,
            format!("{derive} can only be derived for structs"),
        )),
    }
}
