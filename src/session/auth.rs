//! Login and signup forms, and the calls that turn them into a session.

use tracing::{info, warn};

use super::{Role, Session, SessionStore};
use crate::api::{IncidentApi, LoginRequest, SignupRequest};
use crate::error::ClientError;
use crate::validation::{self, FieldErrors};

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        let mut errors = FieldErrors::new();
        errors
            .check("email", validation::validate_email(&self.email))
            .check("password", validation::validate_required(&self.password, "Password"));
        errors.finish()
    }

    fn to_request(&self) -> LoginRequest {
        LoginRequest {
            email: normalize_email(&self.email),
            password: self.password.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SignupForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub phone_number: String,
}

impl SignupForm {
    pub fn validate(&self) -> Result<(), ClientError> {
        let mut errors = FieldErrors::new();
        errors
            .check("first_name", validation::validate_required(&self.first_name, "First name"))
            .check("last_name", validation::validate_required(&self.last_name, "Last name"))
            .check("email", validation::validate_email(&self.email))
            .check("password", validation::validate_password(&self.password))
            .check("phone_number", validation::validate_phone(&self.phone_number));
        errors.finish()
    }

    fn to_request(&self) -> SignupRequest {
        SignupRequest {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email: normalize_email(&self.email),
            password: self.password.clone(),
            phone_number: self.phone_number.trim().to_string(),
            role: Role::User.as_str().to_string(),
        }
    }
}

/// What a successful signup left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignupResult {
    /// The server returned tokens; the new user is logged in.
    LoggedIn(Session),
    /// The account exists but the user still has to log in.
    Registered { message: Option<String> },
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validate the form, log in, and store the resulting session.
pub async fn login(
    sessions: &mut SessionStore,
    api: &dyn IncidentApi,
    form: &LoginForm,
) -> Result<Session, ClientError> {
    form.validate()?;

    let auth = api.login(&form.to_request()).await.map_err(|e| {
        warn!(error = %e, "Login failed");
        e
    })?;

    let session = Session::from_auth(&auth).ok_or_else(|| {
        ClientError::api(None, "Login response was missing an access token")
    })?;
    sessions.login(session.clone())?;
    Ok(session)
}

/// Validate the form and register a new user. Tokens are stored only when
/// the server sends them.
pub async fn signup(
    sessions: &mut SessionStore,
    api: &dyn IncidentApi,
    form: &SignupForm,
) -> Result<SignupResult, ClientError> {
    form.validate()?;

    let outcome = api.signup(&form.to_request()).await?;

    match outcome.auth.as_ref().and_then(Session::from_auth) {
        Some(session) => {
            sessions.login(session.clone())?;
            Ok(SignupResult::LoggedIn(session))
        }
        None => {
            info!("Signup accepted without tokens");
            Ok(SignupResult::Registered {
                message: outcome.message,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{sample_auth, Call, FakeApi};
    use tokio_test::{assert_err, assert_ok};

    fn signup_form() -> SignupForm {
        SignupForm {
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            email: " Jane@Example.com ".to_string(),
            password: "Secret123".to_string(),
            phone_number: "0712345678".to_string(),
        }
    }

    #[tokio::test]
    async fn test_login_normalises_email_and_stores_session() {
        let mut api = FakeApi::new();
        api.auth = Some(sample_auth("42", "admin"));
        let mut sessions = SessionStore::in_memory();

        let session = assert_ok!(
            login(&mut sessions, &api, &LoginForm::new("  Jane@Example.COM ", "pw")).await
        );

        assert_eq!(session.role, Role::Admin);
        assert!(sessions.is_admin());
        assert_eq!(
            api.calls(),
            vec![Call::Login(LoginRequest {
                email: "jane@example.com".to_string(),
                password: "pw".to_string(),
            })]
        );
    }

    #[tokio::test]
    async fn test_login_failure_leaves_logged_out() {
        let api = FakeApi::new();
        let mut sessions = SessionStore::in_memory();

        let err = assert_err!(
            login(&mut sessions, &api, &LoginForm::new("jane@example.com", "pw")).await
        );

        assert_eq!(err.banner(), "Invalid email or password");
        assert!(!sessions.is_authenticated());
    }

    #[tokio::test]
    async fn test_login_invalid_email_sends_nothing() {
        let api = FakeApi::new();
        let mut sessions = SessionStore::in_memory();

        let err = assert_err!(login(&mut sessions, &api, &LoginForm::new("jane", "")).await);

        match err {
            ClientError::Validation(errors) => {
                assert_eq!(errors.get("email"), Some("Invalid email address"));
                assert_eq!(errors.get("password"), Some("Password is required"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_signup_with_tokens_logs_in() {
        let mut api = FakeApi::new();
        api.auth = Some(sample_auth("9", "user"));
        let mut sessions = SessionStore::in_memory();

        let result = assert_ok!(signup(&mut sessions, &api, &signup_form()).await);

        assert!(matches!(result, SignupResult::LoggedIn(_)));
        assert_eq!(sessions.user_id(), Some("9"));
        match &api.calls()[0] {
            Call::Signup(req) => {
                assert_eq!(req.email, "jane@example.com");
                assert_eq!(req.role, "user");
            }
            other => panic!("unexpected call: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_signup_without_tokens_stays_logged_out() {
        let api = FakeApi::new();
        let mut sessions = SessionStore::in_memory();

        let result = assert_ok!(signup(&mut sessions, &api, &signup_form()).await);

        assert_eq!(
            result,
            SignupResult::Registered {
                message: Some("Signup successful".to_string())
            }
        );
        assert!(!sessions.is_authenticated());
    }

    #[tokio::test]
    async fn test_signup_rules() {
        let api = FakeApi::new();
        let mut sessions = SessionStore::in_memory();
        let form = SignupForm {
            password: "secret".to_string(),
            phone_number: "12345".to_string(),
            ..signup_form()
        };

        let err = assert_err!(signup(&mut sessions, &api, &form).await);
        match err {
            ClientError::Validation(errors) => {
                assert_eq!(errors.len(), 2);
                assert_eq!(
                    errors.get("password"),
                    Some("Password must be at least 8 characters")
                );
                assert_eq!(errors.get("phone_number"), Some("Phone number must be 10 digits"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
        assert!(api.calls().is_empty());
    }
}
