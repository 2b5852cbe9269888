//! Procedural macros for typed tool inputs.
//!
//! `#[derive(ToolRecord)]` turns a struct with named fields into a record the
//! runtime can describe, bind and validate. Field metadata is read from
//! `#[tool(...)]` attributes and from the `rename`, `rename_all` and `skip`
//! keys of `#[serde(...)]`, so wire names match serde's.

use std::collections::HashMap;

use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::quote;
use syn::ext::IdentExt as _;
use syn::meta::ParseNestedMeta;
use syn::{Attribute, Data, DeriveInput, Expr, Fields, LitStr, Token, Type, parse_macro_input};

/// Derives `ToolRecord` and `FieldValue` for a struct with named fields.
///
/// Field attributes:
///
/// - `#[tool("required,minLength=1,description=...")]` or
///   `#[tool(directive = "...")]` sets the constraint directive.
/// - `#[tool(rename = "...")]` overrides the wire name.
/// - `#[tool(skip)]` or `#[serde(skip)]` excludes the field; it is filled with
///   `Default::default()` when binding.
///
/// Container attributes: `#[serde(rename_all = "...")]` or
/// `#[tool(rename_all = "...")]`.
#[proc_macro_derive(ToolRecord, attributes(tool, serde))]
pub fn derive_tool_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

struct RecordField {
    ident: syn::Ident,
    ty: Type,
    name: String,
    wire_name: String,
    directive: String,
    skip: bool,
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "ToolRecord cannot be derived for generic types",
        ));
    }

    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new(
            Span::call_site(),
            "ToolRecord can only be derived for structs",
        ));
    };
    let Fields::Named(named) = &data.fields else {
        return Err(syn::Error::new_spanned(
            &data.fields,
            "ToolRecord requires a struct with named fields",
        ));
    };

    let rename_all = container_rename_all(&input.attrs)?;
    let mut fields = Vec::with_capacity(named.named.len());
    let mut seen: HashMap<String, Span> = HashMap::new();
    let mut errors: Option<syn::Error> = None;

    for field in &named.named {
        let Some(ident) = field.ident.clone() else {
            continue;
        };
        let record_field = parse_field(ident, field.ty.clone(), &field.attrs, rename_all.as_ref())?;
        if !record_field.skip {
            if let Some(first) = seen.get(&record_field.wire_name) {
                let mut err = syn::Error::new_spanned(
                    &record_field.ident,
                    format!("duplicate wire name `{}`", record_field.wire_name),
                );
                err.combine(syn::Error::new(*first, "first used here"));
                match errors.as_mut() {
                    Some(existing) => existing.combine(err),
                    None => errors = Some(err),
                }
            } else {
                seen.insert(record_field.wire_name.clone(), record_field.ident.span());
            }
        }
        fields.push(record_field);
    }

    if let Some(err) = errors {
        return Err(err);
    }

    Ok(generate(&input.ident, &fields))
}

fn generate(ident: &syn::Ident, fields: &[RecordField]) -> TokenStream2 {
    let record_name = ident.unraw().to_string();
    let active: Vec<&RecordField> = fields.iter().filter(|field| !field.skip).collect();

    let descriptors = active.iter().map(|field| {
        let RecordField {
            ty,
            name,
            wire_name,
            directive,
            ..
        } = field;
        quote! {
            ::tool_runtime::FieldDescriptor::new(
                #name,
                #wire_name,
                <#ty as ::tool_runtime::FieldValue>::field_type(),
                #directive,
            )
        }
    });

    let bind_fields = fields.iter().map(|field| {
        let RecordField {
            ident,
            ty,
            wire_name,
            skip,
            ..
        } = field;
        if *skip {
            quote! { #ident: ::core::default::Default::default() }
        } else {
            quote! {
                #ident: match object.get(#wire_name) {
                    ::core::option::Option::Some(value) if !value.is_null() => {
                        <#ty as ::tool_runtime::FieldValue>::bind(value)
                            .map_err(|err| err.within_field(#wire_name))?
                    }
                    _ => <#ty as ::tool_runtime::FieldValue>::zero(),
                }
            }
        }
    });

    let zero_fields = fields.iter().map(|field| {
        let RecordField { ident, ty, skip, .. } = field;
        if *skip {
            quote! { #ident: ::core::default::Default::default() }
        } else {
            quote! { #ident: <#ty as ::tool_runtime::FieldValue>::zero() }
        }
    });

    let value_refs = active.iter().map(|field| {
        let ident = &field.ident;
        quote! { &self.#ident as &dyn ::tool_runtime::FieldValue }
    });

    quote! {
        impl ::tool_runtime::ToolRecord for #ident {
            fn record_name() -> &'static str {
                #record_name
            }

            fn descriptors() -> &'static [::tool_runtime::FieldDescriptor] {
                static DESCRIPTORS: ::tool_runtime::__private::OnceLock<
                    ::std::vec::Vec<::tool_runtime::FieldDescriptor>,
                > = ::tool_runtime::__private::OnceLock::new();
                DESCRIPTORS.get_or_init(|| ::std::vec![#(#descriptors),*])
            }

            fn bind_object(
                object: &::tool_runtime::__private::Map<
                    ::std::string::String,
                    ::tool_runtime::__private::Value,
                >,
            ) -> ::core::result::Result<Self, ::tool_runtime::BindError> {
                ::core::result::Result::Ok(Self {
                    #(#bind_fields),*
                })
            }

            fn field_values(&self) -> ::std::vec::Vec<&dyn ::tool_runtime::FieldValue> {
                ::std::vec![#(#value_refs),*]
            }
        }

        impl ::tool_runtime::FieldValue for #ident {
            fn field_type() -> ::tool_runtime::FieldType {
                ::tool_runtime::FieldType::Record(::tool_runtime::RecordRef::of::<Self>())
            }

            fn zero() -> Self {
                Self {
                    #(#zero_fields),*
                }
            }

            fn bind(
                value: &::tool_runtime::__private::Value,
            ) -> ::core::result::Result<Self, ::tool_runtime::BindError> {
                ::tool_runtime::bind_record::<Self>(value)
            }

            fn view(&self) -> ::tool_runtime::FieldView<'_> {
                ::tool_runtime::FieldView::Record(self)
            }
        }
    }
}

fn parse_field(
    ident: syn::Ident,
    ty: Type,
    attrs: &[Attribute],
    rename_all: Option<&RenameRule>,
) -> syn::Result<RecordField> {
    let name = ident.unraw().to_string();
    let mut serde_rename = None;
    let mut tool_rename = None;
    let mut directive = String::new();
    let mut skip = false;

    for attr in attrs {
        if attr.path().is_ident("serde") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename") && meta.input.peek(Token![=]) {
                    serde_rename = Some(meta.value()?.parse::<LitStr>()?.value());
                } else if meta.path.is_ident("skip") || meta.path.is_ident("skip_deserializing") {
                    skip = true;
                } else {
                    skip_meta(&meta)?;
                }
                Ok(())
            })?;
        } else if attr.path().is_ident("tool") {
            if let Ok(lit) = attr.parse_args::<LitStr>() {
                directive = lit.value();
                continue;
            }
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("directive") {
                    directive = meta.value()?.parse::<LitStr>()?.value();
                } else if meta.path.is_ident("rename") {
                    tool_rename = Some(meta.value()?.parse::<LitStr>()?.value());
                } else if meta.path.is_ident("skip") {
                    skip = true;
                } else {
                    return Err(meta.error("expected `directive`, `rename` or `skip`"));
                }
                Ok(())
            })?;
        }
    }

    let wire_name = tool_rename
        .or(serde_rename)
        .unwrap_or_else(|| rename_all.map_or_else(|| name.clone(), |rule| rule.apply(&name)));

    Ok(RecordField {
        ident,
        ty,
        name,
        wire_name,
        directive,
        skip,
    })
}

fn container_rename_all(attrs: &[Attribute]) -> syn::Result<Option<RenameRule>> {
    let mut rule = None;
    for attr in attrs {
        let is_tool = attr.path().is_ident("tool");
        if !is_tool && !attr.path().is_ident("serde") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename_all") && meta.input.peek(Token![=]) {
                let lit = meta.value()?.parse::<LitStr>()?;
                let parsed = RenameRule::parse(&lit.value())
                    .ok_or_else(|| syn::Error::new_spanned(&lit, "unsupported rename_all rule"))?;
                // The tool attribute wins over serde's.
                if is_tool || rule.is_none() {
                    rule = Some(parsed);
                }
            } else if is_tool {
                return Err(meta.error("expected `rename_all`"));
            } else {
                skip_meta(&meta)?;
            }
            Ok(())
        })?;
    }
    Ok(rule)
}

fn skip_meta(meta: &ParseNestedMeta<'_>) -> syn::Result<()> {
    if meta.input.peek(Token![=]) {
        meta.value()?.parse::<Expr>()?;
    } else if meta.input.peek(syn::token::Paren) {
        let content;
        syn::parenthesized!(content in meta.input);
        content.parse::<TokenStream2>()?;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RenameRule {
    Lower,
    Upper,
    Pascal,
    Camel,
    Snake,
    ScreamingSnake,
    Kebab,
    ScreamingKebab,
}

impl RenameRule {
    fn parse(rule: &str) -> Option<Self> {
        Some(match rule {
            "lowercase" => Self::Lower,
            "UPPERCASE" => Self::Upper,
            "PascalCase" => Self::Pascal,
            "camelCase" => Self::Camel,
            "snake_case" => Self::Snake,
            "SCREAMING_SNAKE_CASE" => Self::ScreamingSnake,
            "kebab-case" => Self::Kebab,
            "SCREAMING-KEBAB-CASE" => Self::ScreamingKebab,
            _ => return None,
        })
    }

    /// Renames a snake_case field identifier.
    fn apply(self, field: &str) -> String {
        match self {
            Self::Lower | Self::Snake => field.to_ascii_lowercase(),
            Self::Upper | Self::ScreamingSnake => field.to_ascii_uppercase(),
            Self::Pascal => pascal(field),
            Self::Camel => {
                let pascal = pascal(field);
                let mut chars = pascal.chars();
                chars.next().map_or_else(String::new, |first| {
                    first.to_ascii_lowercase().to_string() + chars.as_str()
                })
            }
            Self::Kebab => field.replace('_', "-"),
            Self::ScreamingKebab => field.to_ascii_uppercase().replace('_', "-"),
        }
    }
}

fn pascal(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut capitalize = true;
    for ch in field.chars() {
        if ch == '_' {
            capitalize = true;
        } else if capitalize {
            out.push(ch.to_ascii_uppercase());
            capitalize = false;
        } else {
            out.push(ch);
        }
    }
    out
}
