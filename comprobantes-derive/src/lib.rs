use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, GenericArgument, PathArguments, Type};

mod rules;

/// How a field holds its value, used to walk `nested` fields.
enum Shape {
    Direct,
    Optional,
    List,
    OptionalList,
}

fn last_segment(ty: &Type) -> Option<&syn::PathSegment> {
    match ty {
        Type::Path(p) if p.qself.is_none() => p.path.segments.last(),
        _ => None,
    }
}

fn first_generic(segment: &syn::PathSegment) -> Option<&Type> {
    match &segment.arguments {
        PathArguments::AngleBracketed(args) => args.args.iter().find_map(|arg| match arg {
            GenericArgument::Type(ty) => Some(ty),
            _ => None,
        }),
        _ => None,
    }
}

fn shape(ty: &Type) -> Shape {
    let Some(segment) = last_segment(ty) else {
        return Shape::Direct;
    };
    if segment.ident == "Vec" {
        return Shape::List;
    }
    if segment.ident == "Option" {
        if let Some(inner) = first_generic(segment) {
            if last_segment(inner).is_some_and(|s| s.ident == "Vec") {
                return Shape::OptionalList;
            }
        }
        return Shape::Optional;
    }
    Shape::Direct
}

fn nested_walk(ident: &syn::Ident, name: &str, ty: &Type) -> TokenStream2 {
    let validate = quote! { ::comprobantes_core::document::validation::Validate };
    match shape(ty) {
        Shape::Direct => quote! {
            #validate::validate_at(&self.#ident, &path.child(#name), errors);
        },
        Shape::Optional => quote! {
            if let Some(value) = &self.#ident {
                #validate::validate_at(value, &path.child(#name), errors);
            }
        },
        Shape::List => quote! {
            for (index, item) in self.#ident.iter().enumerate() {
                #validate::validate_at(item, &path.child(#name).index(index), errors);
            }
        },
        Shape::OptionalList => quote! {
            if let Some(items) = &self.#ident {
                for (index, item) in items.iter().enumerate() {
                    #validate::validate_at(item, &path.child(#name).index(index), errors);
                }
            }
        },
    }
}

/// Derives `comprobantes_core::document::validation::Validate`.
///
/// Every field carrying `#[validate(...)]` rules becomes one row of the
/// generated `CONSTRAINTS` table, named after its `#[serde(rename)]` wire name.
/// Fields marked `nested` are walked recursively (`Vec` and `Option` aware).
#[proc_macro_derive(Validate, attributes(validate))]
pub fn derive_validate(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    match expand(ast) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(ast: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &ast.ident;
    let (impl_generics, ty_generics, where_clause) = ast.generics.split_for_impl();

    let fields = match &ast.data {
        Data::Struct(s) => match &s.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    struct_name,
                    "Validate supports named structs only",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                struct_name,
                "Validate can only be used on structs",
            ))
        }
    };

    let validation = quote! { ::comprobantes_core::document::validation };
    let mut table = vec![];
    let mut accessors = vec![];
    let mut walks = vec![];

    for field in fields {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let field_rules = rules::parse_field_rules(&field.attrs)?;
        let name = rules::wire_name(&field.attrs)?.unwrap_or_else(|| ident.to_string());

        if !field_rules.rules.is_empty() {
            let index = table.len();
            let rule_tokens = &field_rules.rules;
            table.push(quote! {
                #validation::FieldConstraint {
                    field: #name,
                    rules: &[#(#rule_tokens),*],
                }
            });
            accessors.push(quote! {
                #index => #validation::AsFieldValue::as_field_value(&self.#ident),
            });
        }

        if field_rules.nested {
            walks.push(nested_walk(ident, &name, &field.ty));
        }
    }

    Ok(quote! {
        impl #impl_generics #validation::Validate for #struct_name #ty_generics #where_clause {
            const CONSTRAINTS: &'static [#validation::FieldConstraint] = &[
                #(#table),*
            ];

            fn field_value(&self, index: usize) -> #validation::FieldValue<'_> {
                match index {
                    #(#accessors)*
                    _ => #validation::FieldValue::Absent,
                }
            }

            #[allow(unused_variables)]
            fn validate_nested(
                &self,
                path: &#validation::FieldPath,
                errors: &mut ::std::vec::Vec<#validation::FieldError>,
            ) {
                #(#walks)*
            }
        }
    })
}
