use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    parse_macro_input, Data, DeriveInput, Field, Fields, GenericArgument, Lit, LitStr,
    PathArguments, Type,
};

/// Derive `PayloadShape` for a struct, declaring one captured field per named
/// struct field.
///
/// The ambient Rust type of each field supplies its declared type unless a
/// `#[field(kind = "...")]` override is present: `String` maps to the String
/// marker, integer and float primitives to Number, `bool` to Boolean,
/// `Vec<T>` to an array of the mapped `T`, `Option<T>` to the mapped `T`
/// with `required = false`, `serde_json::Value` to the opaque Object
/// fallback, and any other path type to a nested payload reference (which
/// must itself implement `PayloadShape`).
///
/// Struct-level `#[payload(name = "...", capture = "always")]` overrides the
/// declared class name and capture policy. Field-level `#[field(...)]` keys:
/// `name`, `destination`, `source`, `kind`, `required`, `maximum`,
/// `minimum`, `max_length`, `pattern`, `template`, `initial`.
#[proc_macro_derive(Payload, attributes(payload, field))]
pub fn derive_payload(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let ident = &input.ident;
    let mut name = ident.to_string();
    let mut capture_always = false;

    for attr in &input.attrs {
        if !attr.path().is_ident("payload") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                name = meta.value()?.parse::<LitStr>()?.value();
                Ok(())
            } else if meta.path.is_ident("capture") {
                match meta.value()?.parse::<LitStr>()?.value().as_str() {
                    "always" => {
                        capture_always = true;
                        Ok(())
                    }
                    "build" => {
                        capture_always = false;
                        Ok(())
                    }
                    _ => Err(meta.error("expected \"build\" or \"always\"")),
                }
            } else {
                Err(meta.error("unsupported payload attribute"))
            }
        })?;
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    ident,
                    "Payload requires a struct with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                ident,
                "Payload can only be derived for structs",
            ))
        }
    };

    let mut field_calls = Vec::with_capacity(fields.len());
    for field in fields {
        field_calls.push(expand_field(field)?);
    }

    let capture = if capture_always {
        quote!(::velomap::schema::CapturePolicy::Always)
    } else {
        quote!(::velomap::schema::CapturePolicy::BuildPhase)
    };

    Ok(quote! {
        impl ::velomap::schema::PayloadShape for #ident {
            const NAME: &'static str = #name;
            const CAPTURE: ::velomap::schema::CapturePolicy = #capture;

            fn declare(reg: &mut ::velomap::schema::PayloadRegistrar) {
                #(#field_calls)*
            }
        }
    })
}

fn expand_field(field: &Field) -> syn::Result<TokenStream2> {
    let ident = field
        .ident
        .as_ref()
        .ok_or_else(|| syn::Error::new_spanned(field, "expected a named field"))?;
    let rust_name = ident.to_string().trim_start_matches("r#").to_string();

    let (base_ty, ambient_optional) = match option_inner(&field.ty) {
        Some(inner) => (inner, true),
        None => (&field.ty, false),
    };

    let mut wire_name = rust_name;
    let mut ty_tokens = declared_type_tokens(base_ty);
    let mut required = !ambient_optional;
    let mut extras: Vec<TokenStream2> = Vec::new();

    for attr in &field.attrs {
        if !attr.path().is_ident("field") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                wire_name = meta.value()?.parse::<LitStr>()?.value();
            } else if meta.path.is_ident("destination") {
                let dest = meta.value()?.parse::<LitStr>()?;
                extras.push(quote!(decl.destination_name = Some(#dest.to_string());));
            } else if meta.path.is_ident("source") {
                let lit = meta.value()?.parse::<LitStr>()?;
                let source = source_tokens(&lit)?;
                extras.push(quote!(decl.source = Some(#source);));
            } else if meta.path.is_ident("kind") {
                let lit = meta.value()?.parse::<LitStr>()?;
                ty_tokens = explicit_type_tokens(&lit)?;
            } else if meta.path.is_ident("required") {
                required = if meta.input.peek(syn::Token![=]) {
                    meta.value()?.parse::<syn::LitBool>()?.value()
                } else {
                    true
                };
            } else if meta.path.is_ident("maximum") {
                let value = numeric_lit(&meta.value()?.parse::<Lit>()?)?;
                extras.push(quote!(decl.validation.maximum = Some(#value);));
            } else if meta.path.is_ident("minimum") {
                let value = numeric_lit(&meta.value()?.parse::<Lit>()?)?;
                extras.push(quote!(decl.validation.minimum = Some(#value);));
            } else if meta.path.is_ident("max_length") {
                let lit = meta.value()?.parse::<syn::LitInt>()?;
                let value = lit.base10_parse::<usize>()?;
                extras.push(quote!(decl.validation.max_length = Some(#value);));
            } else if meta.path.is_ident("pattern") {
                let lit = meta.value()?.parse::<LitStr>()?;
                extras.push(quote!(decl.validation.pattern = Some(#lit.to_string());));
            } else if meta.path.is_ident("template") {
                let lit = meta.value()?.parse::<LitStr>()?;
                extras.push(quote!(decl.direct_template_value = Some(#lit.to_string());));
            } else if meta.path.is_ident("initial") {
                let lit = meta.value()?.parse::<Lit>()?;
                let value = initial_value_tokens(&lit)?;
                extras.push(quote!(decl.initial_value = Some(#value);));
            } else {
                return Err(meta.error("unsupported field attribute"));
            }
            Ok(())
        })?;
    }

    Ok(quote! {
        reg.field(#wire_name, {
            let mut decl = ::velomap::schema::FieldDecl::default();
            decl.ty = Some(#ty_tokens);
            decl.validation.required = #required;
            #(#extras)*
            decl
        });
    })
}

fn option_inner(ty: &Type) -> Option<&Type> {
    generic_inner(ty, "Option")
}

fn vec_inner(ty: &Type) -> Option<&Type> {
    generic_inner(ty, "Vec")
}

fn generic_inner<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    if let Type::Path(p) = ty {
        let seg = p.path.segments.last()?;
        if seg.ident == wrapper {
            if let PathArguments::AngleBracketed(args) = &seg.arguments {
                if let Some(GenericArgument::Type(inner)) = args.args.first() {
                    return Some(inner);
                }
            }
        }
    }
    None
}

fn declared_type_tokens(ty: &Type) -> TokenStream2 {
    if let Some(inner) = vec_inner(ty) {
        let element = declared_type_tokens(inner);
        return quote!(::velomap::schema::DeclaredType::array(#element));
    }
    if let Type::Path(p) = ty {
        if let Some(seg) = p.path.segments.last() {
            return match seg.ident.to_string().as_str() {
                "String" | "str" => quote!(::velomap::schema::DeclaredType::String),
                "i8" | "i16" | "i32" | "i64" | "i128" | "isize" | "u8" | "u16" | "u32"
                | "u64" | "u128" | "usize" | "f32" | "f64" => {
                    quote!(::velomap::schema::DeclaredType::Number)
                }
                "bool" => quote!(::velomap::schema::DeclaredType::Boolean),
                "Value" => quote!(::velomap::schema::DeclaredType::Object),
                _ => quote!(::velomap::schema::DeclaredType::Payload(
                    ::velomap::schema::PayloadRef::of::<#ty>()
                )),
            };
        }
    }
    quote!(::velomap::schema::DeclaredType::Object)
}

fn explicit_type_tokens(lit: &LitStr) -> syn::Result<TokenStream2> {
    match lit.value().as_str() {
        "string" => Ok(quote!(::velomap::schema::DeclaredType::String)),
        "number" => Ok(quote!(::velomap::schema::DeclaredType::Number)),
        "boolean" => Ok(quote!(::velomap::schema::DeclaredType::Boolean)),
        "object" => Ok(quote!(::velomap::schema::DeclaredType::Object)),
        other => Err(syn::Error::new_spanned(
            lit,
            format!(
                "unknown kind override '{}' (expected string, number, boolean, or object)",
                other
            ),
        )),
    }
}

fn source_tokens(lit: &LitStr) -> syn::Result<TokenStream2> {
    match lit.value().as_str() {
        "body" => Ok(quote!(::velomap::schema::FieldSource::Body)),
        "path" => Ok(quote!(::velomap::schema::FieldSource::Path)),
        "query" => Ok(quote!(::velomap::schema::FieldSource::Query)),
        "header" => Ok(quote!(::velomap::schema::FieldSource::Header)),
        "context" => Ok(quote!(::velomap::schema::FieldSource::Context)),
        other => Err(syn::Error::new_spanned(
            lit,
            format!("unknown field source '{}'", other),
        )),
    }
}

fn numeric_lit(lit: &Lit) -> syn::Result<f64> {
    match lit {
        Lit::Int(i) => i.base10_parse::<f64>(),
        Lit::Float(f) => f.base10_parse::<f64>(),
        other => Err(syn::Error::new_spanned(other, "expected a numeric literal")),
    }
}

fn initial_value_tokens(lit: &Lit) -> syn::Result<TokenStream2> {
    match lit {
        Lit::Str(s) => Ok(quote!(::velomap::serde_json::Value::from(#s))),
        Lit::Int(i) => {
            let v = i.base10_parse::<i64>()?;
            Ok(quote!(::velomap::serde_json::Value::from(#v)))
        }
        Lit::Float(f) => {
            let v = f.base10_parse::<f64>()?;
            Ok(quote!(::velomap::serde_json::Value::from(#v)))
        }
        Lit::Bool(b) => Ok(quote!(::velomap::serde_json::Value::from(#b))),
        other => Err(syn::Error::new_spanned(
            other,
            "expected a string, numeric, or boolean literal",
        )),
    }
}
