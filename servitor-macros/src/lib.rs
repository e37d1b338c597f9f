//! Procedural macros for Servitor.
//!
//! `#[derive(Injectable)]` reads a struct's fields and writes the
//! parameter list and constructor the container autowires from.
//!
//! Field rules:
//! - `Arc<dyn Trait>` is an interface parameter, looked up as `dyn Trait`.
//! - `Arc<T>` is a service parameter, looked up as `T` and built directly
//!   when unregistered. `#[inject(no_autowire)]` turns off direct building,
//!   which also lifts the `T: Injectable` requirement.
//! - Any other type is a value parameter, filled from overrides or defaults.
//! - `Option<_>` around any of the above makes the parameter optional.
//!
//! Field attributes:
//! - `#[inject(id = "name")]` looks the parameter up under a custom id.
//! - `#[inject(default)]` or `#[inject(default = "expr")]` supplies a default.
//!
//! The struct attribute `#[injectable(crate_path = "...")]` changes the
//! path generated code refers to (`::servitor` unless set).

use darling::ast::{Data, Style};
use darling::util::{Flag, Override};
use darling::{FromDeriveInput, FromField};
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::ext::IdentExt;
use syn::{parse_macro_input, DeriveInput, GenericArgument, PathArguments, Type};

#[derive(FromDeriveInput)]
#[darling(attributes(injectable), supports(struct_named, struct_unit))]
struct InjectableInput {
    ident: syn::Ident,
    generics: syn::Generics,
    data: Data<(), InjectField>,
    crate_path: Option<syn::Path>,
}

#[derive(FromField)]
#[darling(attributes(inject))]
struct InjectField {
    ident: Option<syn::Ident>,
    ty: Type,
    id: Option<String>,
    default: Option<Override<syn::Expr>>,
    no_autowire: Flag,
}

/// How a field's type maps onto a parameter.
#[derive(Clone, Copy)]
enum Shape<'a> {
    /// `Arc<dyn Trait>`: the handle itself is the stored value.
    Interface { handle: &'a Type, object: &'a Type },
    /// `Arc<T>`: the instance is the `Arc<T>`.
    Service { inner: &'a Type },
    /// Anything else, cloned out of its instance.
    Value { ty: &'a Type },
}

#[proc_macro_derive(Injectable, attributes(inject, injectable))]
pub fn derive_injectable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let parsed = match InjectableInput::from_derive_input(&input) {
        Ok(parsed) => parsed,
        Err(err) => return err.write_errors().into(),
    };

    match expand(parsed) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.write_errors().into(),
    }
}

fn expand(input: InjectableInput) -> darling::Result<TokenStream2> {
    let krate = input
        .crate_path
        .clone()
        .unwrap_or_else(|| syn::parse_quote!(::servitor));
    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match input.data {
        Data::Struct(fields) => fields,
        Data::Enum(_) => return Err(darling::Error::unsupported_shape("enum")),
    };

    let mut errors = darling::Error::accumulator();
    let mut parameters = Vec::new();
    let mut initializers = Vec::new();

    for field in &fields.fields {
        let Some(field_ident) = &field.ident else {
            continue;
        };
        if let Some((parameter, initializer)) = errors.handle(expand_field(&krate, field_ident, field)) {
            parameters.push(parameter);
            initializers.push(initializer);
        }
    }
    errors.finish()?;

    let body = match fields.style {
        Style::Unit => quote! { ::core::result::Result::Ok(Self) },
        _ => quote! { ::core::result::Result::Ok(Self { #(#initializers,)* }) },
    };

    Ok(quote! {
        impl #impl_generics #krate::Injectable for #ident #ty_generics #where_clause {
            fn parameters() -> ::std::vec::Vec<#krate::Parameter> {
                ::std::vec![#(#parameters),*]
            }

            #[allow(unused_variables)]
            fn construct(args: &#krate::Arguments) -> #krate::Result<Self> {
                #body
            }
        }
    })
}

fn expand_field(
    krate: &syn::Path,
    field_ident: &syn::Ident,
    field: &InjectField,
) -> darling::Result<(TokenStream2, TokenStream2)> {
    let name = field_ident.unraw().to_string();
    let (ty, optional) = match generic_argument(&field.ty, "Option") {
        Some(inner) => (inner, true),
        None => (&field.ty, false),
    };

    if optional && field.default.is_some() {
        return Err(darling::Error::custom("an `Option` field cannot also declare a default")
            .with_span(&field.ty));
    }

    let shape = shape_of(ty);

    let mut parameter = match shape {
        Shape::Interface { object, .. } => quote! { #krate::Parameter::interface::<#object>(#name) },
        Shape::Service { inner } if field.no_autowire.is_present() => {
            quote! { #krate::Parameter::lookup(#name, #krate::ServiceId::of::<#inner>()) }
        }
        Shape::Service { inner } => quote! { #krate::Parameter::service::<#inner>(#name) },
        Shape::Value { ty } => quote! { #krate::Parameter::value::<#ty>(#name) },
    };

    if let Some(id) = &field.id {
        parameter = quote! { #parameter.with_id(#id) };
    }

    if let Some(default) = &field.default {
        let expr = match default {
            Override::Inherit => quote! { ::core::default::Default::default() },
            Override::Explicit(expr) => quote! { #expr },
        };
        parameter = match shape {
            Shape::Service { inner } => quote! {
                #parameter.with_default_shared(|| -> ::std::sync::Arc<#inner> { #expr })
            },
            Shape::Interface { handle, .. } => quote! {
                #parameter.with_default(|| -> #handle { #expr })
            },
            Shape::Value { ty } => quote! {
                #parameter.with_default(|| -> #ty { #expr })
            },
        };
    }

    if optional {
        parameter = quote! { #parameter.optional() };
    }

    let read = match (shape, optional) {
        (Shape::Service { inner }, false) => quote! { args.shared::<#inner>(#name)? },
        (Shape::Service { inner }, true) => quote! { args.optional_shared::<#inner>(#name)? },
        (Shape::Interface { handle, .. }, false) => quote! { args.cloned::<#handle>(#name)? },
        (Shape::Interface { handle, .. }, true) => quote! { args.optional_cloned::<#handle>(#name)? },
        (Shape::Value { ty }, false) => quote! { args.cloned::<#ty>(#name)? },
        (Shape::Value { ty }, true) => quote! { args.optional_cloned::<#ty>(#name)? },
    };

    Ok((parameter, quote! { #field_ident: #read }))
}

fn shape_of(ty: &Type) -> Shape<'_> {
    match generic_argument(ty, "Arc") {
        Some(object) if matches!(object, Type::TraitObject(_)) => Shape::Interface { handle: ty, object },
        Some(inner) => Shape::Service { inner },
        None => Shape::Value { ty },
    }
}

/// The single type argument of `ty` when its last path segment is `wrapper`.
fn generic_argument<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    if path.qself.is_some() {
        return None;
    }
    let segment = path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    let PathArguments::AngleBracketed(arguments) = &segment.arguments else {
        return None;
    };
    if arguments.args.len() != 1 {
        return None;
    }
    match arguments.args.first()? {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}
