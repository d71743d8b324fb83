//! Validation of requests before they reach their handler.
//!
//! The [ValidationBehavior] is a [pipeline behavior](PipelineBehavior) that asks a [Validator]
//! for the errors of the request being dispatched. If there are any, the dispatch fails with
//! [Error::RequestValidation] and the inner stages, including the handler, are never run.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use crate::{BoxedResponse, Error, Next, PipelineBehavior, RequestRef};

/// Validation errors, indexed by field name. Each field holds its messages in the order the rules
/// were evaluated. An empty value means the request is valid.
///
/// Serializes as a plain map from field names to lists of messages.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    /// Creates an empty [ValidationErrors].
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a message to a field.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    /// Appends all the messages of `other`, after the messages already present.
    pub fn merge(&mut self, other: ValidationErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    /// Returns `true` if there is no error.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The number of fields in error.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// The messages of a field, if it is in error.
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// The names of the fields in error.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Iterates over the fields in error and their messages.
    pub fn iter(&self) -> btree_map::Iter<'_, String, Vec<String>> {
        self.0.iter()
    }
}

impl Display for ValidationErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (index, (field, messages)) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {}", messages.join(", "))?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = (&'a String, &'a Vec<String>);
    type IntoIter = btree_map::Iter<'a, String, Vec<String>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for ValidationErrors {
    type Item = (String, Vec<String>);
    type IntoIter = btree_map::IntoIter<String, Vec<String>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<F, M> FromIterator<(F, M)> for ValidationErrors
where
    F: Into<String>,
    M: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (F, M)>>(iter: T) -> Self {
        let mut errors = ValidationErrors::new();
        for (field, message) in iter {
            errors.add(field, message);
        }
        errors
    }
}

/// Evaluates the validation rules of a request.
#[async_trait]
pub trait Validator: Send + Sync {
    /// Returns the errors of the request, empty if it is valid.
    async fn validate(&self, request: RequestRef<'_>) -> ValidationErrors;
}

/// Evaluates the rules declared by the request type itself, through
/// [Request::validate](crate::Request::validate). With the `derive` feature, those rules come from
/// the `#[validate(...)]` field attributes.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttributeValidator;

#[async_trait]
impl Validator for AttributeValidator {
    async fn validate(&self, request: RequestRef<'_>) -> ValidationErrors {
        request.validate()
    }
}

/// A [Validator] backed by a closure.
pub struct FnValidator<F>(pub F);

#[async_trait]
impl<F> Validator for FnValidator<F>
where
    F: for<'a> Fn(RequestRef<'a>) -> ValidationErrors + Send + Sync,
{
    async fn validate(&self, request: RequestRef<'_>) -> ValidationErrors {
        (self.0)(request)
    }
}

/// A [PipelineBehavior] that stops the dispatch of invalid requests.
///
/// Defaults to the [AttributeValidator].
#[derive(Clone)]
pub struct ValidationBehavior {
    validator: Arc<dyn Validator>,
}

impl ValidationBehavior {
    /// Creates a validation behavior using the given validator.
    pub fn new(validator: impl Validator + 'static) -> Self {
        Self {
            validator: Arc::new(validator),
        }
    }
}

impl Default for ValidationBehavior {
    fn default() -> Self {
        Self::new(AttributeValidator)
    }
}

#[async_trait]
impl<E> PipelineBehavior<E> for ValidationBehavior
where
    E: From<Error> + Send + 'static,
{
    async fn handle(&self, request: RequestRef<'_>, next: Next<'_, E>) -> Result<BoxedResponse, E> {
        let errors = self.validator.validate(request).await;
        if errors.is_empty() {
            next.run(request).await
        } else {
            log::debug!(
                "Request {} is invalid, {} field(s) in error",
                request.name(),
                errors.len(),
            );
            Err(Error::RequestValidation(errors).into())
        }
    }
}

/// The rules behind the `#[validate(...)]` attributes. Each rule returns `true` if the value is
/// valid.
///
/// Absent optional values are only rejected by [required]: the other rules accept them.
pub mod rules {
    /// A value that can be missing.
    pub trait Required {
        /// Returns `true` if the value is present.
        fn is_present(&self) -> bool;
    }

    impl Required for str {
        fn is_present(&self) -> bool {
            !self.trim().is_empty()
        }
    }

    impl Required for String {
        fn is_present(&self) -> bool {
            self.as_str().is_present()
        }
    }

    impl<T> Required for Vec<T> {
        fn is_present(&self) -> bool {
            !self.is_empty()
        }
    }

    impl<T> Required for Option<T> {
        fn is_present(&self) -> bool {
            self.is_some()
        }
    }

    impl<T: Required + ?Sized> Required for &T {
        fn is_present(&self) -> bool {
            (**self).is_present()
        }
    }

    /// A value with a length.
    pub trait HasLength {
        /// The length of the value, `None` if the value is absent.
        fn length(&self) -> Option<usize>;
    }

    impl HasLength for str {
        fn length(&self) -> Option<usize> {
            Some(self.chars().count())
        }
    }

    impl HasLength for String {
        fn length(&self) -> Option<usize> {
            self.as_str().length()
        }
    }

    impl<T> HasLength for Vec<T> {
        fn length(&self) -> Option<usize> {
            Some(self.len())
        }
    }

    impl<T: HasLength> HasLength for Option<T> {
        fn length(&self) -> Option<usize> {
            self.as_ref().and_then(HasLength::length)
        }
    }

    impl<T: HasLength + ?Sized> HasLength for &T {
        fn length(&self) -> Option<usize> {
            (**self).length()
        }
    }

    /// A value that can be compared to bounds.
    pub trait Bounded {
        /// The type of the bounds.
        type Value: PartialOrd;

        /// The value to compare, `None` if the value is absent.
        fn bounded(&self) -> Option<&Self::Value>;
    }

    macro_rules! bounded {
        ($($number:ty),*) => {
            $(
                impl Bounded for $number {
                    type Value = $number;

                    fn bounded(&self) -> Option<&$number> {
                        Some(self)
                    }
                }
            )*
        };
    }

    bounded!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64);

    impl<T: Bounded> Bounded for Option<T> {
        type Value = T::Value;

        fn bounded(&self) -> Option<&T::Value> {
            self.as_ref().and_then(Bounded::bounded)
        }
    }

    impl<T: Bounded + ?Sized> Bounded for &T {
        type Value = T::Value;

        fn bounded(&self) -> Option<&T::Value> {
            (**self).bounded()
        }
    }

    /// A value that may be text.
    pub trait AsText {
        /// The text, `None` if the value is absent.
        fn as_text(&self) -> Option<&str>;
    }

    impl AsText for str {
        fn as_text(&self) -> Option<&str> {
            Some(self)
        }
    }

    impl AsText for String {
        fn as_text(&self) -> Option<&str> {
            Some(self)
        }
    }

    impl<T: AsText> AsText for Option<T> {
        fn as_text(&self) -> Option<&str> {
            self.as_ref().and_then(AsText::as_text)
        }
    }

    impl<T: AsText + ?Sized> AsText for &T {
        fn as_text(&self) -> Option<&str> {
            (**self).as_text()
        }
    }

    /// The value must be present, and not blank for text.
    pub fn required<T: Required + ?Sized>(value: &T) -> bool {
        value.is_present()
    }

    /// The length must be within the bounds, both inclusive.
    pub fn length<T: HasLength + ?Sized>(
        value: &T,
        min: Option<usize>,
        max: Option<usize>,
    ) -> bool {
        match value.length() {
            Some(length) => {
                min.map_or(true, |min| length >= min) && max.map_or(true, |max| length <= max)
            }
            None => true,
        }
    }

    /// The value must be within the bounds, both inclusive.
    pub fn range<T: Bounded + ?Sized>(
        value: &T,
        min: Option<T::Value>,
        max: Option<T::Value>,
    ) -> bool {
        match value.bounded() {
            Some(value) => {
                min.map_or(true, |min| *value >= min) && max.map_or(true, |max| *value <= max)
            }
            None => true,
        }
    }

    /// The text must look like an e-mail address: a local part, a single `@`, and a domain with
    /// at least one inner dot.
    pub fn email<T: AsText + ?Sized>(value: &T) -> bool {
        let Some(text) = value.as_text() else {
            return true;
        };
        let mut parts = text.split('@');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(local), Some(domain), None) => {
                !local.is_empty()
                    && !text.chars().any(char::is_whitespace)
                    && domain.contains('.')
                    && domain.split('.').all(|label| !label.is_empty())
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::rules::*;
    use super::*;

    #[test]
    fn messages_keep_their_order_per_field() {
        let mut errors = ValidationErrors::new();
        errors.add("name", "is required");
        errors.add("age", "is too low");
        errors.add("name", "is too short");

        assert_eq!(errors.len(), 2);
        assert_eq!(
            errors.get("name").unwrap(),
            &["is required".to_string(), "is too short".to_string()]
        );
        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["age", "name"]);
    }

    #[test]
    fn merge_appends_messages() {
        let mut errors: ValidationErrors = [("name", "is required")].into_iter().collect();
        errors.merge([("name", "is too short"), ("email", "is invalid")].into_iter().collect());

        assert_eq!(errors.len(), 2);
        assert_eq!(errors.get("name").unwrap().len(), 2);
    }

    #[test]
    fn serializes_as_a_plain_map() {
        let errors: ValidationErrors = [("name", "is required"), ("age", "is too low")]
            .into_iter()
            .collect();

        assert_eq!(
            serde_json::to_value(&errors).unwrap(),
            serde_json::json!({ "age": ["is too low"], "name": ["is required"] })
        );
    }

    #[test]
    fn displays_every_field() {
        let errors: ValidationErrors = [("a", "x"), ("a", "y"), ("b", "z")].into_iter().collect();

        assert_eq!(errors.to_string(), "a: x, y; b: z");
    }

    #[test]
    fn required_rejects_missing_and_blank_values() {
        assert!(required("alice"));
        assert!(!required("  "));
        assert!(!required(&None::<u8>));
        assert!(required(&Some(0)));
        assert!(!required(&Vec::<u8>::new()));
    }

    #[test]
    fn length_bounds_are_inclusive() {
        assert!(length("abc", Some(3), Some(3)));
        assert!(!length("ab", Some(3), None));
        assert!(!length(&vec![1, 2, 3, 4], None, Some(3)));
        assert!(length(&None::<String>, Some(1), None));
        assert!(!length(&"a", Some(2), None));
    }

    #[test]
    fn range_bounds_are_inclusive() {
        assert!(range(&18u8, Some(18), Some(130)));
        assert!(!range(&17u8, Some(18), None));
        assert!(!range(&2.5f64, None, Some(2.0)));
        assert!(!range(&Some(17u32), Some(18), None));
        assert!(range(&None::<u32>, Some(18), None));
    }

    #[test]
    fn email_requires_a_domain() {
        assert!(email("alice@example.com"));
        assert!(!email("alice"));
        assert!(!email("alice@localhost"));
        assert!(!email("a@b@example.com"));
        assert!(!email("@example.com"));
        assert!(!email("alice@example..com"));
        assert!(email(&None::<String>));
    }
}
