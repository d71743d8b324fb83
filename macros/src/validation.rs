use proc_macro2::TokenStream;
use quote::{format_ident, quote, ToTokens};
use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::{parenthesized, Expr, Fields, Ident, Index, Item, LitStr, Member, Token};

use crate::utils::{field_name, has_name};

/// Generates `Request::validate` from the `#[validate(...)]` attributes of the fields, or nothing
/// if no field has one. Enum variants are checked through a `match` on `self`.
pub fn validate_method(item: &Item) -> syn::Result<Option<TokenStream>> {
    let body = match item {
        Item::Struct(item) => {
            let checks = validated_fields(&item.fields)?
                .into_iter()
                .flat_map(|field| {
                    let member = &field.member;
                    field.checks(quote! { &self.#member })
                })
                .collect::<Vec<_>>();
            if checks.is_empty() {
                return Ok(None);
            }
            quote! { #(#checks)* }
        }
        Item::Enum(item) => {
            let mut arms = Vec::new();
            for variant in &item.variants {
                let fields = validated_fields(&variant.fields)?;
                if fields.is_empty() {
                    continue;
                }
                let variant = &variant.ident;
                let members = fields.iter().map(|field| &field.member);
                let bindings = fields.iter().map(ValidatedField::binding).collect::<Vec<_>>();
                let checks = fields
                    .iter()
                    .zip(&bindings)
                    .flat_map(|(field, binding)| field.checks(quote! { #binding }));
                arms.push(quote! {
                    Self::#variant { #(#members: #bindings,)* .. } => {
                        #(#checks)*
                    }
                });
            }
            if arms.is_empty() {
                return Ok(None);
            }
            if arms.len() < item.variants.len() {
                arms.push(quote! { _ => {} });
            }
            quote! {
                match self {
                    #(#arms)*
                }
            }
        }
        _ => return Ok(None),
    };

    Ok(Some(quote! {
        fn validate(&self) -> entremise::ValidationErrors {
            let mut errors = entremise::ValidationErrors::new();
            #body
            errors
        }
    }))
}

struct ValidatedField {
    member: Member,
    name: String,
    rules: Vec<ValidateAttribute>,
}

impl ValidatedField {
    fn binding(&self) -> Ident {
        format_ident!("__entremise_{}", self.name)
    }

    fn checks(&self, value: TokenStream) -> Vec<TokenStream> {
        self.rules
            .iter()
            .map(|rule| rule.check(&value, &self.name))
            .collect()
    }
}

fn validated_fields(fields: &Fields) -> syn::Result<Vec<ValidatedField>> {
    let mut validated = Vec::new();

    for (index, field) in fields.iter().enumerate() {
        let (member, name) = match &field.ident {
            Some(ident) => (Member::Named(ident.clone()), field_name(ident)),
            None => (Member::Unnamed(Index::from(index)), index.to_string()),
        };
        let rules = field
            .attrs
            .iter()
            .filter(|attribute| has_name(attribute, "validate"))
            .map(|attribute| attribute.parse_args::<ValidateAttribute>())
            .collect::<syn::Result<Vec<_>>>()?;
        if !rules.is_empty() {
            validated.push(ValidatedField {
                member,
                name,
                rules,
            });
        }
    }

    Ok(validated)
}

struct ValidateAttribute {
    rule: Rule,
    message: Option<LitStr>,
}

enum Rule {
    Required,
    Email,
    Length(Bounds),
    Range(Bounds),
}

#[derive(Default)]
struct Bounds {
    min: Option<Expr>,
    max: Option<Expr>,
}

impl ValidateAttribute {
    fn check(&self, value: &TokenStream, name: &str) -> TokenStream {
        let rules = quote! { entremise::validation::rules };
        let condition = match &self.rule {
            Rule::Required => quote! { #rules::required(#value) },
            Rule::Email => quote! { #rules::email(#value) },
            Rule::Length(bounds) => {
                let (min, max) = bounds.to_options();
                quote! { #rules::length(#value, #min, #max) }
            }
            Rule::Range(bounds) => {
                let (min, max) = bounds.to_options();
                quote! { #rules::range(#value, #min, #max) }
            }
        };
        let message = match &self.message {
            Some(message) => message.value(),
            None => self.rule.default_message(name),
        };
        quote! {
            if !#condition {
                errors.add(#name, #message);
            }
        }
    }
}

impl Rule {
    fn default_message(&self, name: &str) -> String {
        match self {
            Rule::Required => format!("The {name} field is required."),
            Rule::Email => format!("The {name} field is not a valid e-mail address."),
            Rule::Length(bounds) => match bounds.describe("of ") {
                Some(limits) => format!("The {name} field must have a length {limits}."),
                None => format!("The {name} field has an invalid length."),
            },
            Rule::Range(bounds) => match bounds.describe("") {
                Some(limits) => format!("The {name} field must be {limits}."),
                None => format!("The {name} field is out of range."),
            },
        }
    }
}

impl Bounds {
    fn to_options(&self) -> (TokenStream, TokenStream) {
        let option = |bound: &Option<Expr>| match bound {
            Some(bound) => quote! { ::core::option::Option::Some(#bound) },
            None => quote! { ::core::option::Option::None },
        };
        (option(&self.min), option(&self.max))
    }

    fn describe(&self, single_bound_prefix: &str) -> Option<String> {
        let text = |bound: &Expr| bound.to_token_stream().to_string();
        match (&self.min, &self.max) {
            (Some(min), Some(max)) => Some(format!("between {} and {}", text(min), text(max))),
            (Some(min), None) => Some(format!("{single_bound_prefix}at least {}", text(min))),
            (None, Some(max)) => Some(format!("{single_bound_prefix}at most {}", text(max))),
            (None, None) => None,
        }
    }
}

impl Parse for ValidateAttribute {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let ident = input.parse::<Ident>()?;
        let rule = match ident.to_string().as_str() {
            "required" => Rule::Required,
            "email" => Rule::Email,
            "length" => Rule::Length(input.parse()?),
            "range" => Rule::Range(input.parse()?),
            _ => return Err(syn::Error::new_spanned(ident, "unknown validation rule")),
        };

        let mut message = None;
        if input.peek(Token![,]) {
            input.parse::<Token![,]>()?;
            let argument = input.parse::<Ident>()?;
            if argument != "message" {
                return Err(syn::Error::new_spanned(argument, "unexpected argument"));
            }
            input.parse::<Token![=]>()?;
            message = Some(input.parse()?);
        }

        Ok(ValidateAttribute { rule, message })
    }
}

impl Parse for Bounds {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let content;
        parenthesized!(content in input);

        let mut bounds = Bounds::default();
        for bound in Punctuated::<Bound, Token![,]>::parse_terminated(&content)? {
            match bound.name.to_string().as_str() {
                "min" => bounds.min = Some(bound.value),
                "max" => bounds.max = Some(bound.value),
                _ => return Err(syn::Error::new_spanned(bound.name, "expected min or max")),
            }
        }
        if bounds.min.is_none() && bounds.max.is_none() {
            return Err(content.error("expected at least one of min or max"));
        }
        Ok(bounds)
    }
}

struct Bound {
    name: Ident,
    value: Expr,
}

impl Parse for Bound {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let name = input.parse()?;
        input.parse::<Token![=]>()?;
        Ok(Bound {
            name,
            value: input.parse()?,
        })
    }
}
