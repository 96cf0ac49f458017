//! Parsing of `#[validate(...)]` rule lists into `Rule` constructor tokens.
//!
//! Supported rules:
//! - `required`
//! - `length(min = N, max = M)`
//! - `amount`
//! - `digits = N`
//! - `date`
//! - `min_items = N`
//! - `one_of("a", "b", ...)`
//!
//! `nested` is not a rule; it marks a field whose value is itself `Validate`.

use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    meta::ParseNestedMeta, parenthesized, punctuated::Punctuated, Attribute, LitInt, LitStr,
    Token,
};

/// Rules and flags collected from the `#[validate]` attributes of one field.
#[derive(Default)]
pub(crate) struct FieldRules {
    pub(crate) rules: Vec<TokenStream2>,
    pub(crate) nested: bool,
}

pub(crate) fn parse_field_rules(attrs: &[Attribute]) -> syn::Result<FieldRules> {
    let mut out = FieldRules::default();
    for attr in attrs.iter().filter(|a| a.path().is_ident("validate")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("nested") {
                out.nested = true;
                return Ok(());
            }
            out.rules.push(dispatch(&meta)?);
            Ok(())
        })?;
    }
    Ok(out)
}

fn rule_path() -> TokenStream2 {
    quote! { ::comprobantes_core::document::validation::Rule }
}

fn dispatch(meta: &ParseNestedMeta<'_>) -> syn::Result<TokenStream2> {
    let rule = rule_path();
    let Some(ident) = meta.path.get_ident() else {
        return Err(meta.error("expected a rule name"));
    };

    match ident.to_string().as_str() {
        "required" => Ok(quote! { #rule::Required }),
        "amount" => Ok(quote! { #rule::Amount }),
        "date" => Ok(quote! { #rule::Date }),
        "digits" => {
            let width: usize = meta.value()?.parse::<LitInt>()?.base10_parse()?;
            Ok(quote! { #rule::Digits(#width) })
        }
        "min_items" => {
            let min: usize = meta.value()?.parse::<LitInt>()?.base10_parse()?;
            Ok(quote! { #rule::MinItems(#min) })
        }
        "length" => {
            let mut min: Option<usize> = None;
            let mut max: Option<usize> = None;
            meta.parse_nested_meta(|bound| {
                let value: usize = bound.value()?.parse::<LitInt>()?.base10_parse()?;
                if bound.path.is_ident("min") {
                    min = Some(value);
                } else if bound.path.is_ident("max") {
                    max = Some(value);
                } else {
                    return Err(bound.error("expected `min` or `max`"));
                }
                Ok(())
            })?;
            let min = min.unwrap_or(0);
            let Some(max) = max else {
                return Err(meta.error("length requires `max`"));
            };
            if min > max {
                return Err(meta.error("length `min` must not exceed `max`"));
            }
            Ok(quote! { #rule::Length { min: #min, max: #max } })
        }
        "one_of" => {
            let content;
            parenthesized!(content in meta.input);
            let values = Punctuated::<LitStr, Token![,]>::parse_terminated(&content)?;
            if values.is_empty() {
                return Err(meta.error("one_of requires at least one value"));
            }
            let values = values.iter();
            Ok(quote! { #rule::OneOf(&[#(#values),*]) })
        }
        other => Err(meta.error(format!("unknown validation rule `{other}`"))),
    }
}

/// Wire name of a field: the `#[serde(rename = "...")]` value when present.
pub(crate) fn wire_name(attrs: &[Attribute]) -> syn::Result<Option<String>> {
    let mut name = None;
    for attr in attrs.iter().filter(|a| a.path().is_ident("serde")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                name = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.input.peek(Token![=]) {
                let _: syn::Expr = meta.value()?.parse()?;
            } else if meta.input.peek(syn::token::Paren) {
                let content;
                parenthesized!(content in meta.input);
                let _: TokenStream2 = content.parse()?;
            }
            Ok(())
        })?;
    }
    Ok(name)
}
