use proc_macro::TokenStream;
use quote::quote;
use syn::parse::{Parse, ParseStream};
use syn::{parse_macro_input, Attribute, Ident, Item, LitStr, Token, Type};

use crate::utils::{create_str_literal_from_ident, error, has_name};
use crate::validation::validate_method;

#[derive(Clone, Copy)]
pub enum RequestKind {
    Command,
    Query,
}

pub fn derive_request(request: TokenStream, kind: RequestKind) -> TokenStream {
    let item = parse_macro_input!(request as Item);

    let RequestInfo {
        type_name,
        request_name,
        response,
    } = match RequestInfo::try_from(&item, kind) {
        Ok(info) => info,
        Err(error) => return error,
    };

    let validate = match validate_method(&item) {
        Ok(validate) => validate,
        Err(error) => return error.into_compile_error().into(),
    };

    let (kind, kind_trait) = match kind {
        RequestKind::Command => (quote! { Command }, quote! { entremise::Command }),
        RequestKind::Query => (quote! { Query }, quote! { entremise::Query }),
    };

    TokenStream::from(quote! {
        impl entremise::Request for #type_name {
            type Response = #response;
            const NAME: &'static str = #request_name;
            const KIND: entremise::RequestKind = entremise::RequestKind::#kind;

            #validate
        }

        impl #kind_trait for #type_name {}
    })
}

struct RequestInfo {
    type_name: Ident,
    request_name: LitStr,
    response: Type,
}

impl RequestInfo {
    fn try_from(item: &Item, kind: RequestKind) -> Result<Self, TokenStream> {
        let (type_name, attributes) = match item {
            Item::Struct(item) => (&item.ident, &item.attrs),
            Item::Enum(item) => (&item.ident, &item.attrs),
            _ => {
                return Err(error(
                    item,
                    "Command and Query can only be derived for a struct or an enum",
                ))
            }
        };

        let arguments = DeriveRequestArguments::try_from(attributes.as_slice())
            .map_err(syn::Error::into_compile_error)?;

        let response = match (arguments.response, kind) {
            (Some(response), _) => response,
            (None, RequestKind::Command) => syn::parse_quote! { () },
            (None, RequestKind::Query) => return Err(error(type_name, MISSING_RESPONSE_TYPE)),
        };

        Ok(RequestInfo {
            type_name: type_name.clone(),
            request_name: arguments
                .request_name
                .unwrap_or_else(|| create_str_literal_from_ident(type_name)),
            response,
        })
    }
}

#[derive(Default)]
struct DeriveRequestArguments {
    request_name: Option<LitStr>,
    response: Option<Type>,
}

impl Parse for DeriveRequestArguments {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut arguments = DeriveRequestArguments::default();

        while !input.is_empty() {
            let argument = input.parse::<Ident>()?;
            input.parse::<Token![=]>()?;
            match argument.to_string().as_str() {
                "name" => arguments.request_name = Some(input.parse()?),
                "response" => arguments.response = Some(input.parse()?),
                _ => return Err(syn::Error::new_spanned(argument, "unexpected argument")),
            }
            if input.peek(Token![,]) {
                input.parse::<Token![,]>()?;
            }
        }

        Ok(arguments)
    }
}

impl TryFrom<&[Attribute]> for DeriveRequestArguments {
    type Error = syn::Error;

    fn try_from(attributes: &[Attribute]) -> Result<Self, Self::Error> {
        for attribute in attributes {
            if has_name(attribute, "entremise") {
                return attribute.parse_args();
            }
        }
        Ok(DeriveRequestArguments::default())
    }
}

const MISSING_RESPONSE_TYPE: &str = r"Cannot find the response type.

Help: a query must declare its response with `#[entremise(response = <type>)]`";
