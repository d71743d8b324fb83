use proc_macro::TokenStream;
use quote::quote;
use syn::parse::{Parse, ParseStream};
use syn::{parse_macro_input, Generics, Ident, ItemFn, Signature, Token, Type};

use crate::utils::{error, extract_error_type, extract_input, HandlerInput};

pub fn request_handler(arguments: TokenStream, handler: TokenStream) -> TokenStream {
    let arguments = parse_macro_input!(arguments as RequestHandlerArguments);
    let ItemFn {
        vis,
        sig,
        block,
        attrs,
        ..
    } = parse_macro_input!(handler as ItemFn);

    let Signature {
        asyncness,
        ident: handler_name,
        inputs,
        output,
        generics: Generics {
            params,
            where_clause,
            ..
        },
        ..
    } = sig;

    if asyncness.is_none() {
        return error(handler_name, "A request handler must be async");
    }

    let HandlerInput {
        parameter,
        message_type,
        cancellation,
    } = match extract_input(&inputs) {
        Some(result) => result,
        None => {
            return error(
                inputs,
                r#"arguments of a request handler should match "(request: &R)" or "(request: &R, cancellation: &CancellationToken)""#,
            )
        }
    };

    let error_type = match arguments
        .error
        .as_ref()
        .or_else(|| extract_error_type(&output))
    {
        Some(error_type) => error_type,
        None => return error(handler_name, MISSING_ERROR_TYPE),
    };

    let cancellation = match cancellation {
        Some(cancellation) => quote! { #cancellation },
        None => quote! { _ },
    };
    let out_of_band = arguments.out_of_band;

    TokenStream::from(quote! {
        #(#attrs)*
        #[allow(non_camel_case_types)]
        #vis struct #handler_name;

        #[entremise::async_trait]
        impl<#params> entremise::RequestHandler<#message_type, #error_type> for #handler_name #where_clause {
            fn out_of_band(&self) -> bool {
                #out_of_band
            }

            async fn handle(
                &self,
                #parameter: &#message_type,
                #cancellation: &entremise::CancellationToken,
            ) #output #block
        }
    })
}

#[derive(Default)]
struct RequestHandlerArguments {
    error: Option<Type>,
    out_of_band: bool,
}

impl Parse for RequestHandlerArguments {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut arguments = RequestHandlerArguments::default();

        while !input.is_empty() {
            let ident = input.parse::<Ident>()?;
            match ident.to_string().as_str() {
                "error" => {
                    input.parse::<Token![=]>()?;
                    arguments.error = Some(input.parse()?);
                }
                "out_of_band" => arguments.out_of_band = true,
                _ => return Err(syn::Error::new_spanned(ident, "unknown argument")),
            }
            if input.peek(Token![,]) {
                input.parse::<Token![,]>()?;
            }
        }

        Ok(arguments)
    }
}

const MISSING_ERROR_TYPE: &str = r"Cannot find the error type.

Help: specify the error type with `#[request_handler(error = <path>)] or by detailing the result type in the function signature (`Result<Response, Error>`)";
