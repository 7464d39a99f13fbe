//! Derive macros for sqlstmt
//!
//! Provides `#[derive(Record)]` and `#[derive(FromRow)]` macros.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod attrs;
mod from_row;
mod record;

/// Derive `Record` for a struct with named fields.
///
/// # Example
///
/// ```ignore
/// use sqlstmt::Record;
///
/// #[derive(Record)]
/// #[orm(table = "student")]
/// struct Student {
///     uid: i64,
///     username: String,
///     #[orm(column = "nick")]
///     nickname: String,
/// }
/// ```
///
/// # Generated
///
/// - `TABLE` - the table name, or `None` without a table attribute
/// - `FIELDS` - one `Field` per struct field, in declaration order
/// - `visit_values` - each field converted with `ToValue`
///
/// # Attributes
///
/// - `#[orm(table = "name")]` - Table used when the record is a statement target
/// - `#[orm(column = "name")]` - Map field to a different column name
#[proc_macro_derive(Record, attributes(orm))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    record::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Derive `FromRow` trait for a struct.
///
/// # Example
///
/// ```ignore
/// use sqlstmt::FromRow;
///
/// #[derive(FromRow)]
/// struct User {
///     id: i64,
///     username: String,
///     #[orm(column = "email_address")]
///     email: Option<String>,
/// }
/// ```
///
/// # Attributes
///
/// - `#[orm(column = "name")]` - Map field to a different column name
#[proc_macro_derive(FromRow, attributes(orm))]
pub fn derive_from_row(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    from_row::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
