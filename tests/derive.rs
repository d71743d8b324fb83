use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use entremise::{
    notification_handler, request_handler, CancellationToken, Command, Configuration, Error,
    Lifetime, Mediator, Notification, Query, Request, RequestKind, ValidationBehavior,
};

#[derive(Debug, Command)]
#[entremise(response = i32)]
struct AddSomething(i32);

#[request_handler]
async fn add_something(AddSomething(value): &AddSomething) -> Result<i32, Error> {
    Ok(value + 42)
}

#[derive(Debug, Query)]
#[entremise(name = "find-user-by-name", response = Option<String>)]
struct FindUser {
    #[validate(required)]
    #[validate(length(min = 3, max = 16))]
    name: String,
}

#[request_handler]
async fn find_user(
    query: &FindUser,
    cancellation: &CancellationToken,
) -> Result<Option<String>, Error> {
    if cancellation.is_cancelled() {
        return Err(Error::Cancelled);
    }
    Ok((query.name == "alice").then(|| "Alice Liddell".to_string()))
}

#[derive(Debug, Command)]
struct RegisterUser {
    #[validate(required, message = "Tell us who you are.")]
    name: String,
    #[validate(email)]
    email: Option<String>,
    #[validate(range(min = 18, max = 130))]
    age: u32,
}

#[request_handler]
async fn register_user(_: &RegisterUser) -> Result<(), Error> {
    Ok(())
}

#[derive(Debug, Command)]
struct InviteUser {
    #[validate(length(min = 2))]
    nickname: &'static str,
    #[validate(range(min = 18))]
    age: Option<u32>,
}

#[derive(Debug, Command)]
enum Rename {
    User {
        #[validate(required)]
        name: String,
    },
    Group(#[validate(length(max = 8))] String),
    Nobody,
}

#[derive(Debug, Command)]
#[entremise(name = "send-welcome-mail")]
struct SendWelcomeMail(String);

#[request_handler(out_of_band)]
async fn send_welcome_mail(_: &SendWelcomeMail) -> Result<(), Error> {
    Ok(())
}

#[derive(Default)]
struct OnboardingState {
    free_trial_started: AtomicBool,
    user_welcomed: AtomicBool,
}

#[derive(Notification)]
struct UserRegistered {
    #[allow(dead_code)]
    name: String,
    state: Arc<OnboardingState>,
}

#[notification_handler]
async fn start_free_trial(event: &UserRegistered) -> Result<(), Error> {
    event.state.free_trial_started.store(true, Ordering::SeqCst);
    Ok(())
}

#[notification_handler(error = Error)]
async fn welcome_user(
    event: &UserRegistered,
    _cancellation: &CancellationToken,
) -> Result<(), Error> {
    event.state.user_welcomed.store(true, Ordering::SeqCst);
    Ok(())
}

#[derive(Debug, Command)]
#[entremise(name = "add-something")]
struct AddSomethingElse;

fn mediator() -> Mediator<Error> {
    Mediator::new(
        Configuration::new()
            .behavior(ValidationBehavior::default())
            .request_handler(add_something)
            .request_handler(find_user)
            .request_handler_factory(Lifetime::PerCall, || register_user)
            .request_handler(send_welcome_mail)
            .notification_handler(start_free_trial)
            .notification_handler(welcome_user),
    )
    .unwrap()
}

#[test]
fn derived_names_are_kebab_case_unless_overridden() {
    assert_eq!(AddSomething::NAME, "add-something");
    assert_eq!(RegisterUser::NAME, "register-user");
    assert_eq!(FindUser::NAME, "find-user-by-name");
    assert_eq!(UserRegistered::NAME, "user-registered");
    assert_eq!(AddSomething::KIND, RequestKind::Command);
    assert_eq!(FindUser::KIND, RequestKind::Query);
}

#[test]
fn derived_names_must_be_unique() {
    let result = Mediator::<Error>::new(
        Configuration::new()
            .request_handler(add_something)
            .require::<AddSomethingElse>(),
    );

    assert!(matches!(result, Err(Error::DuplicateName("add-something"))));
}

#[tokio::test]
async fn derived_command_is_dispatched_to_its_handler() {
    let response = mediator()
        .send(AddSomething(3), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(response, 45);
}

#[tokio::test]
async fn derived_query_is_dispatched_to_its_handler() {
    let mediator = mediator();

    let alice = mediator
        .send(
            FindUser {
                name: "alice".into(),
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    let bob = mediator
        .send(FindUser { name: "bob".into() }, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(alice.as_deref(), Some("Alice Liddell"));
    assert_eq!(bob, None);
}

#[test]
fn field_attributes_accumulate_messages() {
    let errors = FindUser { name: "".into() }.validate();

    assert_eq!(
        errors.get("name").unwrap(),
        &[
            "The name field is required.".to_string(),
            "The name field must have a length between 3 and 16.".to_string(),
        ]
    );
}

#[test]
fn valid_requests_have_no_errors() {
    let request = RegisterUser {
        name: "alice".into(),
        email: None,
        age: 30,
    };

    assert!(request.validate().is_empty());
    assert!(AddSomething(1).validate().is_empty());
}

#[tokio::test]
async fn invalid_derived_request_is_rejected() {
    let result = mediator()
        .send(
            RegisterUser {
                name: "".into(),
                email: Some("alice".into()),
                age: 30,
            },
            &CancellationToken::new(),
        )
        .await;

    let Err(Error::RequestValidation(errors)) = result else {
        panic!("expected a validation error");
    };
    assert_eq!(errors.len(), 2);
    assert_eq!(errors.get("name").unwrap(), &["Tell us who you are.".to_string()]);
    assert_eq!(
        errors.get("email").unwrap(),
        &["The email field is not a valid e-mail address.".to_string()]
    );
}

#[test]
fn range_messages_describe_the_bounds() {
    let errors = RegisterUser {
        name: "alice".into(),
        email: None,
        age: 12,
    }
    .validate();

    assert_eq!(
        errors.get("age").unwrap(),
        &["The age field must be between 18 and 130.".to_string()]
    );
}

#[test]
fn optional_and_borrowed_fields_are_validated() {
    let errors = InviteUser {
        nickname: "a",
        age: Some(12),
    }
    .validate();

    assert_eq!(
        errors.get("nickname").unwrap(),
        &["The nickname field must have a length of at least 2.".to_string()]
    );
    assert_eq!(
        errors.get("age").unwrap(),
        &["The age field must be at least 18.".to_string()]
    );
    assert!(InviteUser {
        nickname: "al",
        age: None,
    }
    .validate()
    .is_empty());
}

#[test]
fn enum_variants_are_validated() {
    let user = Rename::User {
        name: " ".into(),
    }
    .validate();
    let group = Rename::Group("administrators".into()).validate();

    assert_eq!(
        user.get("name").unwrap(),
        &["The name field is required.".to_string()]
    );
    assert_eq!(
        group.get("0").unwrap(),
        &["The 0 field must have a length of at most 8.".to_string()]
    );
    assert!(Rename::Group("admins".into()).validate().is_empty());
    assert!(Rename::Nobody.validate().is_empty());
}

#[test]
fn out_of_band_attribute_flags_the_handler() {
    let mediator = mediator();
    let registry = mediator.registry();

    let out_of_band = registry
        .out_of_band_handlers()
        .into_iter()
        .map(|handler| handler.request().name())
        .collect::<Vec<_>>();

    assert_eq!(out_of_band, vec!["send-welcome-mail"]);
    assert_eq!(
        registry.handler::<RegisterUser>().unwrap().lifetime(),
        Lifetime::PerCall
    );
}

#[tokio::test]
async fn derived_notification_reaches_every_handler() {
    let state = Arc::new(OnboardingState::default());

    mediator()
        .publish(
            UserRegistered {
                name: "alice".into(),
                state: state.clone(),
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(state.free_trial_started.load(Ordering::SeqCst));
    assert!(state.user_welcomed.load(Ordering::SeqCst));
}
