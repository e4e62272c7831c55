//! Proc macros for `model-versioning`.
//!
//! Provides **`#[versioned_model]`**, an attribute macro that implements
//! `VersionedModel` for a struct from a list of settings, and recognizes the
//! **`#[serialize_to_version]`** marker on the field holding a per-instance
//! output version.

use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{
    parse_macro_input, punctuated::Punctuated, token::Comma, Attribute, Expr, Fields, ItemStruct,
    Lit, Meta, Type,
};

/// Attribute macro that implements `model_versioning::VersionedModel`.
///
/// Place it **above** `#[derive(Serialize, Deserialize)]` so the field
/// markers are removed before serde sees them.
///
/// # Attributes
///
/// - `current_version = "2.0"` — **Required.** Version the struct represents.
/// - `property_name = "v"` — JSON property holding the tag (default `modelVersion`).
/// - `default_deserialize_version = "1.0"` — Version assumed when the tag is missing.
/// - `default_serialize_version = "1.0"` — Version written when no override applies.
/// - `suppress_version = "2.0"` — Version written without a tag.
/// - `always_convert` — Run converters even when versions match.
/// - `to_current = path::Type` — Converter for reads; must implement `Default`.
/// - `to_target = path::Type` — Converter for writes; must implement `Default`.
/// - `converter = path::Type` — One converter for both directions.
///
/// # Field marker
///
/// `#[serialize_to_version]` marks a `String` or `Option<String>` field as
/// the override property. Options: `default_to_source` (fill it with the
/// version a document was read from) and `name = "json"` (its JSON name
/// when it differs from what serde renaming gives). Marking more than one
/// field, or a non-string field, fails when the model is registered.
///
/// # Example
///
/// ```ignore
/// use model_versioning::versioned_model;
/// use serde::{Deserialize, Serialize};
///
/// #[versioned_model(current_version = "2.0", to_current = PersonUpgrade)]
/// #[derive(Debug, Serialize, Deserialize)]
/// #[serde(rename_all = "camelCase")]
/// struct Person {
///     full_name: String,
///     #[serialize_to_version(default_to_source)]
///     #[serde(default, skip_serializing_if = "Option::is_none")]
///     target_version: Option<String>,
/// }
/// ```
#[proc_macro_attribute]
pub fn versioned_model(attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut input = parse_macro_input!(item as ItemStruct);
    let args = parse_macro_input!(attr with Punctuated::<Meta, Comma>::parse_terminated);

    let settings = match ModelArgs::parse(&args) {
        Ok(s) => s,
        Err(e) => return e.to_compile_error().into(),
    };

    let rename_all = serde_rename_all(&input.attrs);

    let fields = match &mut input.fields {
        Fields::Named(named) => &mut named.named,
        _ => {
            return syn::Error::new_spanned(
                &input.ident,
                "versioned_model requires a struct with named fields",
            )
            .to_compile_error()
            .into();
        }
    };

    let mut markers = Vec::new();
    for field in fields.iter_mut() {
        let Some(index) = field
            .attrs
            .iter()
            .position(|a| a.path().is_ident("serialize_to_version"))
        else {
            continue;
        };
        let attr = field.attrs.remove(index);
        let options = match MarkerOptions::parse(&attr) {
            Ok(o) => o,
            Err(e) => return e.to_compile_error().into(),
        };

        let ident = match &field.ident {
            Some(ident) => ident.clone(),
            None => continue,
        };
        let rust_name = ident.to_string().trim_start_matches("r#").to_string();
        let json_name = options
            .name
            .or_else(|| serde_rename(&field.attrs))
            .unwrap_or_else(|| apply_rename_all(&rust_name, rename_all.as_deref()));

        markers.push(Marker {
            ident,
            json_name,
            kind: classify(&field.ty),
            default_to_source: options.default_to_source,
        });
    }

    let struct_name = &input.ident;
    let model_name = struct_name.to_string();
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let current = &settings.current_version;
    let mut calls = Vec::new();
    if let Some(v) = &settings.property_name {
        calls.push(quote! { .property_name(#v) });
    }
    if let Some(v) = &settings.default_deserialize_version {
        calls.push(quote! { .default_deserialize_version(#v) });
    }
    if let Some(v) = &settings.default_serialize_version {
        calls.push(quote! { .default_serialize_version(#v) });
    }
    if let Some(v) = &settings.suppress_version {
        calls.push(quote! { .suppress_version(#v) });
    }
    if settings.always_convert {
        calls.push(quote! { .always_convert(true) });
    }
    if let Some(ty) = &settings.to_current {
        calls.push(converter_call(quote! { to_current_with }, ty));
    }
    if let Some(ty) = &settings.to_target {
        calls.push(converter_call(quote! { to_target_with }, ty));
    }

    for marker in &markers {
        let name = &marker.json_name;
        let kind = marker.kind.tokens();
        let default_to_source = marker.default_to_source;
        calls.push(quote! {
            .property(
                ::model_versioning::PropertyDescriptor::field(#name, #kind)
                    .serialize_to_version()
                    .default_to_source(#default_to_source)
            )
        });
    }

    // Only a single string-typed marker gets an accessor; anything else is
    // reported by the validator at registration.
    let accessors = match markers.as_slice() {
        [marker] => marker.accessors(),
        _ => quote! {},
    };

    let expanded = quote! {
        #input

        impl #impl_generics ::model_versioning::VersionedModel for #struct_name #ty_generics #where_clause {
            fn versioning() -> ::model_versioning::ModelVersioningBuilder {
                ::model_versioning::ModelVersioningBuilder::new(#current)
                    .model(#model_name)
                    #(#calls)*
            }

            #accessors
        }
    };

    expanded.into()
}

/// Settings given to `#[versioned_model(...)]`.
#[derive(Default)]
struct ModelArgs {
    current_version: String,
    property_name: Option<String>,
    default_deserialize_version: Option<String>,
    default_serialize_version: Option<String>,
    suppress_version: Option<String>,
    always_convert: bool,
    to_current: Option<syn::Path>,
    to_target: Option<syn::Path>,
}

impl ModelArgs {
    fn parse(args: &Punctuated<Meta, Comma>) -> syn::Result<Self> {
        let mut out = ModelArgs::default();
        let mut current_version = None;

        for meta in args {
            match meta {
                Meta::Path(path) if path.is_ident("always_convert") => out.always_convert = true,
                Meta::NameValue(nv) => {
                    let key = nv
                        .path
                        .get_ident()
                        .map(|i| i.to_string())
                        .unwrap_or_default();
                    match key.as_str() {
                        "current_version" => current_version = Some(string_value(&nv.value)?),
                        "property_name" => out.property_name = Some(string_value(&nv.value)?),
                        "default_deserialize_version" => {
                            out.default_deserialize_version = Some(string_value(&nv.value)?)
                        }
                        "default_serialize_version" => {
                            out.default_serialize_version = Some(string_value(&nv.value)?)
                        }
                        "suppress_version" => out.suppress_version = Some(string_value(&nv.value)?),
                        "always_convert" => out.always_convert = bool_value(&nv.value)?,
                        "to_current" => out.to_current = Some(path_value(&nv.value)?),
                        "to_target" => out.to_target = Some(path_value(&nv.value)?),
                        "converter" => {
                            let path = path_value(&nv.value)?;
                            out.to_current = Some(path.clone());
                            out.to_target = Some(path);
                        }
                        _ => {
                            return Err(syn::Error::new_spanned(
                                &nv.path,
                                format!("unknown attribute `{key}`"),
                            ));
                        }
                    }
                }
                other => return Err(syn::Error::new_spanned(other, "unsupported attribute")),
            }
        }

        out.current_version = match current_version {
            Some(v) if !v.is_empty() => v,
            Some(_) => {
                return Err(syn::Error::new(
                    Span::call_site(),
                    "`current_version` must not be empty",
                ))
            }
            None => {
                return Err(syn::Error::new(
                    Span::call_site(),
                    "missing required attribute `current_version`",
                ))
            }
        };

        Ok(out)
    }
}

/// Options given to `#[serialize_to_version(...)]`.
#[derive(Default)]
struct MarkerOptions {
    name: Option<String>,
    default_to_source: bool,
}

impl MarkerOptions {
    fn parse(attr: &Attribute) -> syn::Result<Self> {
        let mut out = MarkerOptions::default();
        if let Meta::Path(_) = attr.meta {
            return Ok(out);
        }

        let nested = attr.parse_args_with(Punctuated::<Meta, Comma>::parse_terminated)?;
        for meta in &nested {
            match meta {
                Meta::Path(path) if path.is_ident("default_to_source") => out.default_to_source = true,
                Meta::NameValue(nv) if nv.path.is_ident("default_to_source") => {
                    out.default_to_source = bool_value(&nv.value)?
                }
                Meta::NameValue(nv) if nv.path.is_ident("name") => out.name = Some(string_value(&nv.value)?),
                other => {
                    return Err(syn::Error::new_spanned(
                        other,
                        "expected `default_to_source` or `name = \"...\"`",
                    ))
                }
            }
        }
        Ok(out)
    }
}

struct Marker {
    ident: syn::Ident,
    json_name: String,
    kind: FieldKind,
    default_to_source: bool,
}

impl Marker {
    fn accessors(&self) -> proc_macro2::TokenStream {
        let ident = &self.ident;
        match self.kind {
            FieldKind::String => quote! {
                fn serialize_to_version(&self) -> ::core::option::Option<&str> {
                    ::core::option::Option::Some(self.#ident.as_str())
                }

                fn set_serialize_to_version(&mut self, version: ::core::option::Option<::std::string::String>) {
                    self.#ident = version.unwrap_or_default();
                }
            },
            FieldKind::OptionalString => quote! {
                fn serialize_to_version(&self) -> ::core::option::Option<&str> {
                    self.#ident.as_deref()
                }

                fn set_serialize_to_version(&mut self, version: ::core::option::Option<::std::string::String>) {
                    self.#ident = version;
                }
            },
            FieldKind::Other(_) => quote! {},
        }
    }
}

enum FieldKind {
    String,
    OptionalString,
    Other(String),
}

impl FieldKind {
    fn tokens(&self) -> proc_macro2::TokenStream {
        match self {
            Self::String => quote! { ::model_versioning::PropertyType::String },
            Self::OptionalString => quote! { ::model_versioning::PropertyType::OptionalString },
            Self::Other(name) => quote! {
                ::model_versioning::PropertyType::Other(::std::string::String::from(#name))
            },
        }
    }
}

fn classify(ty: &Type) -> FieldKind {
    if is_string(ty) {
        return FieldKind::String;
    }
    if let Type::Path(tp) = ty {
        if let Some(last) = tp.path.segments.last() {
            if last.ident == "Option" {
                if let syn::PathArguments::AngleBracketed(args) = &last.arguments {
                    if let Some(syn::GenericArgument::Type(inner)) = args.args.first() {
                        if args.args.len() == 1 && is_string(inner) {
                            return FieldKind::OptionalString;
                        }
                    }
                }
            }
        }
    }
    FieldKind::Other(quote!(#ty).to_string().replace(' ', ""))
}

fn is_string(ty: &Type) -> bool {
    match ty {
        Type::Path(tp) if tp.qself.is_none() => tp
            .path
            .segments
            .last()
            .map(|s| s.ident == "String" && s.arguments.is_empty())
            .unwrap_or(false),
        _ => false,
    }
}

fn converter_call(method: proc_macro2::TokenStream, ty: &syn::Path) -> proc_macro2::TokenStream {
    let name = quote!(#ty).to_string().replace(' ', "");
    quote! {
        .#method(#name, || {
            ::core::result::Result::Ok(
                ::std::sync::Arc::new(<#ty as ::core::default::Default>::default())
                    as ::std::sync::Arc<dyn ::model_versioning::ModelConverter>,
            )
        })
    }
}

fn string_value(expr: &Expr) -> syn::Result<String> {
    match expr {
        Expr::Lit(syn::ExprLit {
            lit: Lit::Str(lit), ..
        }) => Ok(lit.value()),
        other => Err(syn::Error::new_spanned(other, "expected a string literal")),
    }
}

fn bool_value(expr: &Expr) -> syn::Result<bool> {
    match expr {
        Expr::Lit(syn::ExprLit {
            lit: Lit::Bool(lit), ..
        }) => Ok(lit.value),
        other => Err(syn::Error::new_spanned(other, "expected `true` or `false`")),
    }
}

fn path_value(expr: &Expr) -> syn::Result<syn::Path> {
    match expr {
        Expr::Path(p) if p.qself.is_none() => Ok(p.path.clone()),
        other => Err(syn::Error::new_spanned(other, "expected a type path")),
    }
}

/// `#[serde(...)]` contents, or nothing when they are not plain metas.
fn serde_metas(attrs: &[Attribute]) -> Vec<Meta> {
    attrs
        .iter()
        .filter(|a| a.path().is_ident("serde"))
        .filter_map(|a| {
            a.parse_args_with(Punctuated::<Meta, Comma>::parse_terminated)
                .ok()
        })
        .flatten()
        .collect()
}

fn serde_name_value(attrs: &[Attribute], key: &str) -> Option<String> {
    serde_metas(attrs).into_iter().find_map(|meta| match meta {
        Meta::NameValue(nv) if nv.path.is_ident(key) => string_value(&nv.value).ok(),
        _ => None,
    })
}

fn serde_rename(attrs: &[Attribute]) -> Option<String> {
    serde_name_value(attrs, "rename")
}

fn serde_rename_all(attrs: &[Attribute]) -> Option<String> {
    serde_name_value(attrs, "rename_all")
}

/// Rename a snake_case field the way serde's `rename_all` does.
fn apply_rename_all(field: &str, rule: Option<&str>) -> String {
    let pascal = || -> String {
        field
            .split('_')
            .map(|part| {
                let mut chars = part.chars();
                match chars.next() {
                    Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
                    None => String::new(),
                }
            })
            .collect()
    };

    match rule {
        Some("lowercase") => field.to_ascii_lowercase(),
        Some("UPPERCASE") | Some("SCREAMING_SNAKE_CASE") => field.to_ascii_uppercase(),
        Some("PascalCase") => pascal(),
        Some("camelCase") => {
            let p = pascal();
            let mut chars = p.chars();
            match chars.next() {
                Some(c) => c.to_lowercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        }
        Some("kebab-case") => field.replace('_', "-"),
        Some("SCREAMING-KEBAB-CASE") => field.to_ascii_uppercase().replace('_', "-"),
        _ => field.to_string(),
    }
}
