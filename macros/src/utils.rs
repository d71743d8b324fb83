use convert_case::{Case, Casing};
use proc_macro::TokenStream;
use quote::ToTokens;
use std::fmt::Display;
use syn::punctuated::Punctuated;
use syn::token::Comma;
use syn::{Attribute, FnArg, GenericArgument, Ident, LitStr, Pat, PathArguments, ReturnType, Type};

pub fn error(tokens: impl ToTokens, message: impl Display) -> TokenStream {
    syn::Error::new_spanned(tokens, message)
        .to_compile_error()
        .into()
}

pub fn has_name(attribute: &Attribute, name: &str) -> bool {
    let path = attribute.path();
    path.segments.len() == 1 && path.segments[0].ident == name
}

pub fn extract_error_type(return_type: &ReturnType) -> Option<&Type> {
    if let ReturnType::Type(_, return_type) = return_type {
        if let Type::Path(path) = return_type.as_ref() {
            if let Some(last_segment) = path.path.segments.last() {
                if last_segment.ident == "Result" {
                    if let PathArguments::AngleBracketed(bracketed) = &last_segment.arguments {
                        if bracketed.args.len() == 2 {
                            if let GenericArgument::Type(error) = &bracketed.args[1] {
                                return Some(error);
                            }
                        }
                    }
                }
            }
        }
    }
    None
}

pub struct HandlerInput<'a> {
    pub parameter: &'a Pat,
    pub message_type: &'a Type,
    pub cancellation: Option<&'a Pat>,
}

/// Matches `(message: &M)` or `(message: &M, cancellation: _)`.
pub fn extract_input(inputs: &Punctuated<FnArg, Comma>) -> Option<HandlerInput<'_>> {
    let (parameter, cancellation) = match (inputs.len(), inputs.first()?) {
        (1, FnArg::Typed(parameter)) => (parameter, None),
        (2, FnArg::Typed(parameter)) => match &inputs[1] {
            FnArg::Typed(cancellation) => (parameter, Some(cancellation.pat.as_ref())),
            _ => return None,
        },
        _ => return None,
    };
    Some(HandlerInput {
        parameter: parameter.pat.as_ref(),
        message_type: extract_referenced_type(parameter.ty.as_ref())?,
        cancellation,
    })
}

pub fn extract_referenced_type(reference_type: &Type) -> Option<&Type> {
    match reference_type {
        Type::Reference(reference) if reference.mutability.is_none() => {
            Some(reference.elem.as_ref())
        }
        _ => None,
    }
}

pub fn create_str_literal_from_ident(type_name: &Ident) -> LitStr {
    LitStr::new(
        &type_name.to_string().to_case(Case::Kebab),
        type_name.span(),
    )
}

pub fn field_name(ident: &Ident) -> String {
    let name = ident.to_string();
    name.strip_prefix("r#").map(str::to_string).unwrap_or(name)
}
