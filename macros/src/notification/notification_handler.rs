use proc_macro::TokenStream;
use quote::quote;
use syn::parse::{Parse, ParseStream};
use syn::{parse_macro_input, Generics, Ident, ItemFn, Signature, Token, Type};

use crate::utils::{error, extract_error_type, extract_input, HandlerInput};

pub fn notification_handler(arguments: TokenStream, handler: TokenStream) -> TokenStream {
    let arguments = parse_macro_input!(arguments as NotificationHandlerArguments);
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
        return error(handler_name, "a notification handler must be async");
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
                r#"arguments of a notification handler should match "(notification: &N)" or "(notification: &N, cancellation: &CancellationToken)""#,
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

    TokenStream::from(quote! {
        #(#attrs)*
        #[allow(non_camel_case_types)]
        #vis struct #handler_name;

        #[entremise::async_trait]
        impl<#params> entremise::NotificationHandler<#message_type, #error_type> for #handler_name #where_clause {
            async fn handle(
                &self,
                #parameter: &#message_type,
                #cancellation: &entremise::CancellationToken,
            ) #output #block
        }
    })
}

#[derive(Default)]
struct NotificationHandlerArguments {
    error: Option<Type>,
}

impl Parse for NotificationHandlerArguments {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        if input.is_empty() {
            Ok(Default::default())
        } else {
            let argument = input.parse::<Ident>()?;
            if argument != "error" {
                Err(syn::Error::new_spanned(argument, "unexpected argument"))
            } else {
                input.parse::<Token![=]>()?;
                Ok(NotificationHandlerArguments {
                    error: Some(input.parse()?),
                })
            }
        }
    }
}

const MISSING_ERROR_TYPE: &str = r"Cannot find the error type.

Help: specify the error type with `#[notification_handler(error = <path>)] or by detailing the result type in the function signature (`Result<(), Error>`)";
