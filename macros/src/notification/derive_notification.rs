use proc_macro::TokenStream;
use quote::quote;
use syn::parse::{Parse, ParseStream};
use syn::{parse_macro_input, Attribute, Ident, Item, LitStr, Token};

use crate::utils::{create_str_literal_from_ident, error, has_name};

pub fn derive_notification(notification: TokenStream) -> TokenStream {
    let item = parse_macro_input!(notification as Item);

    let NotificationInfo {
        type_name,
        notification_name,
    } = match item.try_into() {
        Ok(info) => info,
        Err(error) => return error,
    };

    TokenStream::from(quote! {
        impl entremise::Notification for #type_name {
            const NAME: &'static str = #notification_name;
        }
    })
}

struct NotificationInfo {
    type_name: Ident,
    notification_name: LitStr,
}

impl NotificationInfo {
    fn try_from(type_name: Ident, attributes: &[Attribute]) -> Result<Self, TokenStream> {
        let arguments = DeriveNotificationArguments::try_from(attributes)
            .map_err(syn::Error::into_compile_error)?;
        let notification_name = arguments
            .notification_name
            .unwrap_or_else(|| create_str_literal_from_ident(&type_name));
        Ok(NotificationInfo {
            type_name,
            notification_name,
        })
    }
}

impl TryFrom<Item> for NotificationInfo {
    type Error = TokenStream;

    fn try_from(item: Item) -> Result<Self, Self::Error> {
        match item {
            Item::Struct(item) => NotificationInfo::try_from(item.ident, &item.attrs),
            Item::Enum(item) => NotificationInfo::try_from(item.ident, &item.attrs),
            _ => Err(error(
                item,
                "Notification can only be derived for a struct or an enum",
            )),
        }
    }
}

#[derive(Default)]
struct DeriveNotificationArguments {
    notification_name: Option<LitStr>,
}

impl Parse for DeriveNotificationArguments {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        if input.is_empty() {
            Ok(DeriveNotificationArguments::default())
        } else {
            let argument = input.parse::<Ident>()?;
            if argument != "name" {
                Err(syn::Error::new_spanned(argument, "unexpected argument"))
            } else {
                input.parse::<Token![=]>()?;
                Ok(DeriveNotificationArguments {
                    notification_name: Some(input.parse()?),
                })
            }
        }
    }
}

impl TryFrom<&[Attribute]> for DeriveNotificationArguments {
    type Error = syn::Error;

    fn try_from(attributes: &[Attribute]) -> Result<Self, Self::Error> {
        for attribute in attributes {
            if has_name(attribute, "entremise") {
                return attribute.parse_args();
            }
        }
        Ok(DeriveNotificationArguments::default())
    }
}
