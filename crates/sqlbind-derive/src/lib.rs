//! Derive macros for sqlbind host types.
//!
//! This crate provides `#[derive(Record)]` and `#[derive(Sequence)]`,
//! which implement `sqlbind_core::typeinfo::HostType` by generating a
//! static schema plus per-field accessor shims.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, Data, DeriveInput, Fields, GenericArgument, LitStr, PathArguments, Type,
};

/// Derives a record host type from a struct with named fields.
///
/// # Field Attributes
///
/// - `#[db("column")]` - Binds the field to the tag `column`. Fields
///   without a `db` attribute are invisible to the binder.
/// - `#[db("column,omitempty")]` - Additionally records the `omitempty`
///   tag option.
///
/// The tag string itself is validated at runtime by the type-info
/// registry, so a malformed tag surfaces as an error from `bind_types`
/// rather than at expansion time.
///
/// # Requirements
///
/// Every tagged field's type must implement `Clone`,
/// `sqlbind_core::value::ToSqlValue` and
/// `sqlbind_core::value::FromSqlValue`.
///
/// # Generated Items
///
/// For a struct `Address`, this macro generates an implementation of
/// `sqlbind_core::typeinfo::HostType` backed by a static
/// `RecordSchema` with one `RawField` (raw tag string, field path,
/// value kind, get/set shims over `&dyn Any`) per tagged field.
#[proc_macro_derive(Record, attributes(db))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    derive_record_impl(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

fn derive_record_impl(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Record derive does not support generic types",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Record derive only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Record derive only supports structs",
            ));
        }
    };

    let mut shims: Vec<TokenStream2> = Vec::new();
    let mut raw_fields: Vec<TokenStream2> = Vec::new();
    for field in fields {
        let Some(tag) = get_db_tag(&field.attrs)? else {
            continue;
        };
        let field_ident = field.ident.as_ref().expect("named field");
        let field_ty = &field.ty;
        let get_fn = format_ident!("get_{}", field_ident);
        let set_fn = format_ident!("set_{}", field_ident);

        shims.push(quote! {
            fn #get_fn(value: &dyn ::core::any::Any) -> ::sqlbind_core::value::SqlValue {
                let value = value
                    .downcast_ref::<#struct_name>()
                    .expect("internal error: host value type mismatch");
                ::sqlbind_core::value::ToSqlValue::to_sql_value(
                    ::core::clone::Clone::clone(&value.#field_ident),
                )
            }

            fn #set_fn(
                value: &mut dyn ::core::any::Any,
                v: ::sqlbind_core::value::SqlValue,
            ) -> ::core::result::Result<(), ::sqlbind_core::value::ValueError> {
                let value = value
                    .downcast_mut::<#struct_name>()
                    .expect("internal error: host value type mismatch");
                value.#field_ident = ::sqlbind_core::value::FromSqlValue::from_sql_value(v)?;
                ::core::result::Result::Ok(())
            }
        });

        let path = format!("{struct_name}.{field_ident}");
        raw_fields.push(quote! {
            ::sqlbind_core::typeinfo::RawField {
                tag: #tag,
                path: #path,
                kind: <#field_ty as ::sqlbind_core::value::FromSqlValue>::KIND,
                get: #get_fn,
                set: #set_fn,
            }
        });
    }

    let type_name = struct_name.to_string();
    Ok(quote! {
        const _: () = {
            #(#shims)*

            static FIELDS: &[::sqlbind_core::typeinfo::RawField] = &[
                #(#raw_fields),*
            ];

            static SCHEMA: ::sqlbind_core::typeinfo::Schema =
                ::sqlbind_core::typeinfo::Schema::Record(
                    ::sqlbind_core::typeinfo::RecordSchema {
                        type_name: #type_name,
                        module_path: ::core::module_path!(),
                        fields: FIELDS,
                    },
                );

            impl ::sqlbind_core::typeinfo::HostType for #struct_name {
                fn schema(&self) -> &'static ::sqlbind_core::typeinfo::Schema {
                    &SCHEMA
                }

                fn as_any(&self) -> &dyn ::core::any::Any {
                    self
                }

                fn as_any_mut(&mut self) -> &mut dyn ::core::any::Any {
                    self
                }
            }
        };
    })
}

/// Derives a sequence host type from a tuple struct wrapping a `Vec`.
///
/// Sequence types are referenced with slice syntax: `$Ids[:]` on a
/// `struct Ids(Vec<i64>)` expands to one placeholder per element.
///
/// # Generated Items
///
/// An implementation of `sqlbind_core::typeinfo::HostType` backed by a
/// static `SliceSchema` whose `elements` shim clones each element of the
/// wrapped `Vec` into a `SqlValue`.
#[proc_macro_derive(Sequence)]
pub fn derive_sequence(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    derive_sequence_impl(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

fn derive_sequence_impl(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Sequence derive does not support generic types",
        ));
    }

    let field = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Unnamed(fields) if fields.unnamed.len() == 1 => &fields.unnamed[0],
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Sequence derive requires a tuple struct with a single Vec<T> field",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Sequence derive only supports structs",
            ));
        }
    };

    let elem_ty = vec_element_type(&field.ty).ok_or_else(|| {
        syn::Error::new_spanned(&field.ty, "Sequence derive requires a Vec<T> field")
    })?;

    let type_name = struct_name.to_string();
    Ok(quote! {
        const _: () = {
            fn elements(
                value: &dyn ::core::any::Any,
            ) -> ::std::vec::Vec<::sqlbind_core::value::SqlValue> {
                let value = value
                    .downcast_ref::<#struct_name>()
                    .expect("internal error: host value type mismatch");
                value
                    .0
                    .iter()
                    .map(|element| {
                        ::sqlbind_core::value::ToSqlValue::to_sql_value(
                            ::core::clone::Clone::clone(element),
                        )
                    })
                    .collect()
            }

            static SCHEMA: ::sqlbind_core::typeinfo::Schema =
                ::sqlbind_core::typeinfo::Schema::Slice(
                    ::sqlbind_core::typeinfo::SliceSchema {
                        type_name: #type_name,
                        module_path: ::core::module_path!(),
                        elem_kind: <#elem_ty as ::sqlbind_core::value::FromSqlValue>::KIND,
                        elements,
                    },
                );

            impl ::sqlbind_core::typeinfo::HostType for #struct_name {
                fn schema(&self) -> &'static ::sqlbind_core::typeinfo::Schema {
                    &SCHEMA
                }

                fn as_any(&self) -> &dyn ::core::any::Any {
                    self
                }

                fn as_any_mut(&mut self) -> &mut dyn ::core::any::Any {
                    self
                }
            }
        };
    })
}

fn get_db_tag(attrs: &[syn::Attribute]) -> syn::Result<Option<String>> {
    for attr in attrs {
        if attr.path().is_ident("db") {
            let lit: LitStr = attr.parse_args()?;
            return Ok(Some(lit.value()));
        }
    }
    Ok(None)
}

fn vec_element_type(ty: &Type) -> Option<&Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != "Vec" {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    if args.args.len() != 1 {
        return None;
    }
    match args.args.first()? {
        GenericArgument::Type(t) => Some(t),
        _ => None,
    }
}
