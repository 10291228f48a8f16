//! Email signup and confirmation-code exchange.
//!
//! A (username, email) pair moves from unknown to pending when a code is
//! mailed, and to confirmed when that code is traded for an access token.
//! The code itself is never stored; the user row keeps its argon2 hash, which
//! a re-issue overwrites and a successful exchange clears.

use validator::Validate;

use crate::{
    config::Config,
    db::Store,
    dtos::{SignupDto, SignupResponseDto, TokenRequestDto, TokenResponseDto},
    error::{ErrorMessage, FieldErrors, ServiceError},
    extract::Payload,
    mail::{Mailer, mails::send_confirmation_code},
    models::{NewUser, User, UserRole},
    utils::{secret, token},
};

/// Field errors for a username/email already bound to someone else.
///
/// `user_id` excludes the user being edited, if any.
pub async fn check_identity_available(
    store: &dyn Store,
    user_id: Option<uuid::Uuid>,
    username: Option<&str>,
    email: Option<&str>,
) -> Result<FieldErrors, ServiceError> {
    let mut errors = FieldErrors::new();

    if let Some(email) = email {
        if let Some(owner) = store.get_user(None, None, Some(email)).await? {
            if Some(owner.id) != user_id {
                errors.add("email", ErrorMessage::DuplicateEmail.to_string());
            }
        }
    }
    if let Some(username) = username {
        if let Some(owner) = store.get_user(None, Some(username), None).await? {
            if Some(owner.id) != user_id {
                errors.add("username", ErrorMessage::DuplicateUsername.to_string());
            }
        }
    }

    Ok(errors)
}

/// Map a store uniqueness violation to the same message the pre-check gives
pub fn identity_conflict(error: ServiceError) -> ServiceError {
    match error {
        ServiceError::Conflict { field, .. } if field == "email" => ServiceError::Validation(
            FieldErrors::single("email", ErrorMessage::DuplicateEmail.to_string()),
        ),
        ServiceError::Conflict { field, .. } if field == "username" => ServiceError::Validation(
            FieldErrors::single("username", ErrorMessage::DuplicateUsername.to_string()),
        ),
        e => e,
    }
}

/// Generate a fresh code, store its hash (invalidating any previous code)
/// and mail it.
async fn issue_code(store: &dyn Store, mailer: &dyn Mailer, user: &User) -> Result<(), ServiceError> {
    let code = secret::generate_code();
    let hashed = secret::hash(code.as_str()).map_err(|e| ServiceError::Hashing(e.to_string()))?;

    store.set_confirmation_code(user.id, &hashed).await?;

    send_confirmation_code(mailer, &user.email, &user.username, &code)
        .await
        .map_err(|e| ServiceError::Mail(e.to_string()))?;

    tracing::info!(username = %user.username, "confirmation code issued");
    Ok(())
}

/// Register a (username, email) pair, or re-issue a code for a known pair
pub async fn request_signup(
    store: &dyn Store,
    mailer: &dyn Mailer,
    body: impl Into<Payload<SignupDto>>,
) -> Result<SignupResponseDto, ServiceError> {
    let body: Payload<SignupDto> = body.into();
    let body = body.into_inner()?;
    body.validate()?;
    let username = body.username.unwrap_or_default();
    let email = body.email.unwrap_or_default();

    let by_email = store.get_user(None, None, Some(&email)).await?;
    let by_username = store.get_user(None, Some(&username), None).await?;

    let user = match (by_email, by_username) {
        (Some(a), Some(b)) if a.id == b.id => a,
        (None, None) => {
            let new_user = NewUser {
                username: username.clone(),
                email: email.clone(),
                role: UserRole::User,
                ..Default::default()
            };
            let user = store
                .save_user(new_user)
                .await
                .map_err(|e| identity_conflict(e.into()))?;
            tracing::info!(username = %user.username, "user signed up");
            user
        }
        (by_email, by_username) => {
            let mut errors = FieldErrors::new();
            if by_email.is_some() {
                errors.add("email", ErrorMessage::DuplicateEmail.to_string());
            }
            if by_username.is_some() {
                errors.add("username", ErrorMessage::DuplicateUsername.to_string());
            }
            return Err(ServiceError::Validation(errors));
        }
    };

    issue_code(store, mailer, &user).await?;

    Ok(SignupResponseDto { email, username })
}

/// Exchange a confirmation code for an access token.
///
/// The stored hash is cleared with a compare-and-clear, so of two concurrent
/// exchanges of one code only one gets a token.
pub async fn obtain_token(
    store: &dyn Store,
    config: &Config,
    body: impl Into<Payload<TokenRequestDto>>,
) -> Result<TokenResponseDto, ServiceError> {
    let body: Payload<TokenRequestDto> = body.into();
    let body = body.into_inner()?;
    body.validate()?;
    let username = body.username.unwrap_or_default();
    let code = body.confirmation_code.unwrap_or_default();

    let user = store
        .get_user(None, Some(&username), None)
        .await?
        .ok_or(ServiceError::NotFound("user"))?;

    let stored = user
        .confirmation_code
        .as_deref()
        .ok_or(ServiceError::Authentication)?;

    // An unusable code (too long, etc.) is just a wrong code
    let matched = secret::compare(&code, stored).unwrap_or(false);
    if !matched {
        tracing::warn!(username = %user.username, "confirmation code mismatch");
        return Err(ServiceError::Authentication);
    }

    if !store.consume_confirmation_code(user.id, stored).await? {
        return Err(ServiceError::Authentication);
    }

    let token = token::create_token(
        &user.id.to_string(),
        config.jwt_secret.as_bytes(),
        config.jwt_maxage,
    )
    .map_err(|e| ServiceError::Token(e.to_string()))?;

    tracing::info!(username = %user.username, "access token issued");
    Ok(TokenResponseDto { token })
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        database_url: "postgres://localhost/yamdb_test".to_string(),
        jwt_secret: "test-secret".to_string(),
        jwt_maxage: 3600,
        port: 8000,
        frontend_url: "http://localhost:3000".to_string(),
        smtp: None,
        default_from_email: "noreply@example.com".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{UserExt, memory::MemoryStore};
    use crate::mail::mailer::RecordingMailer;

    fn signup(username: &str, email: &str) -> SignupDto {
        SignupDto {
            username: Some(username.to_string()),
            email: Some(email.to_string()),
        }
    }

    fn exchange(username: &str, code: &str) -> TokenRequestDto {
        TokenRequestDto {
            username: Some(username.to_string()),
            confirmation_code: Some(code.to_string()),
        }
    }

    fn field_errors(err: ServiceError) -> FieldErrors {
        match err {
            ServiceError::Validation(errors) => errors,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn signup_creates_pending_user_and_mails_code() {
        let store = MemoryStore::new();
        let mailer = RecordingMailer::new();

        let response = request_signup(&store, &mailer, signup("bob", "a@b.com"))
            .await
            .unwrap();
        assert_eq!(
            response,
            SignupResponseDto {
                email: "a@b.com".to_string(),
                username: "bob".to_string()
            }
        );

        let user = store.get_user(None, Some("bob"), None).await.unwrap().unwrap();
        assert_eq!(user.role, UserRole::User);
        let code = mailer.last_code_for("a@b.com").unwrap();
        // only the hash is stored
        assert_ne!(user.confirmation_code.as_deref(), Some(code.as_str()));
        assert!(secret::compare(&code, user.confirmation_code.as_deref().unwrap()).unwrap());
    }

    #[tokio::test]
    async fn email_taken_by_another_username_is_rejected() {
        let store = MemoryStore::new();
        let mailer = RecordingMailer::new();
        request_signup(&store, &mailer, signup("bob", "a@b.com"))
            .await
            .unwrap();

        let errors = field_errors(
            request_signup(&store, &mailer, signup("alice", "A@B.com"))
                .await
                .unwrap_err(),
        );
        assert_eq!(
            errors.get("email"),
            Some(&vec![ErrorMessage::DuplicateEmail.to_string()])
        );
        assert!(errors.get("username").is_none());

        let errors = field_errors(
            request_signup(&store, &mailer, signup("bob", "other@b.com"))
                .await
                .unwrap_err(),
        );
        assert_eq!(
            errors.get("username"),
            Some(&vec![ErrorMessage::DuplicateUsername.to_string()])
        );
        assert_eq!(store.get_user_count(None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn crossed_pair_reports_both_fields() {
        let store = MemoryStore::new();
        let mailer = RecordingMailer::new();
        request_signup(&store, &mailer, signup("bob", "bob@b.com"))
            .await
            .unwrap();
        request_signup(&store, &mailer, signup("ann", "ann@b.com"))
            .await
            .unwrap();

        let errors = field_errors(
            request_signup(&store, &mailer, signup("bob", "ann@b.com"))
                .await
                .unwrap_err(),
        );
        assert!(errors.get("email").is_some());
        assert!(errors.get("username").is_some());
    }

    #[tokio::test]
    async fn reserved_username_is_rejected() {
        let store = MemoryStore::new();
        let mailer = RecordingMailer::new();

        let errors = field_errors(
            request_signup(&store, &mailer, signup("me", "me@b.com"))
                .await
                .unwrap_err(),
        );
        assert_eq!(
            errors.get("username"),
            Some(&vec![ErrorMessage::ReservedUsername.to_string()])
        );
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn repeated_signup_reissues_and_invalidates_old_code() {
        let store = MemoryStore::new();
        let mailer = RecordingMailer::new();
        let config = test_config();

        request_signup(&store, &mailer, signup("bob", "a@b.com"))
            .await
            .unwrap();
        let old_code = mailer.last_code_for("a@b.com").unwrap();

        request_signup(&store, &mailer, signup("bob", "a@b.com"))
            .await
            .unwrap();
        let new_code = mailer.last_code_for("a@b.com").unwrap();
        assert_ne!(old_code, new_code);
        assert_eq!(store.get_user_count(None).await.unwrap(), 1);

        let err = obtain_token(&store, &config, exchange("bob", &old_code))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Authentication));

        obtain_token(&store, &config, exchange("bob", &new_code))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn code_is_single_use() {
        let store = MemoryStore::new();
        let mailer = RecordingMailer::new();
        let config = test_config();

        request_signup(&store, &mailer, signup("bob", "a@b.com"))
            .await
            .unwrap();
        let code = mailer.last_code_for("a@b.com").unwrap();

        let wrong = obtain_token(&store, &config, exchange("bob", "not-the-code"))
            .await
            .unwrap_err();
        assert!(matches!(wrong, ServiceError::Authentication));

        let response = obtain_token(&store, &config, exchange("bob", &code))
            .await
            .unwrap();
        let user = store.get_user(None, Some("bob"), None).await.unwrap().unwrap();
        assert_eq!(
            token::decode_token(response.token, config.jwt_secret.as_bytes()).unwrap(),
            user.id.to_string()
        );

        let reused = obtain_token(&store, &config, exchange("bob", &code))
            .await
            .unwrap_err();
        assert!(matches!(reused, ServiceError::Authentication));
    }

    #[tokio::test]
    async fn unknown_user_and_missing_fields() {
        let store = MemoryStore::new();
        let config = test_config();

        let err = obtain_token(&store, &config, exchange("ghost", "abc"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound("user")));

        let errors = field_errors(
            obtain_token(&store, &config, TokenRequestDto::default())
                .await
                .unwrap_err(),
        );
        assert!(errors.get("username").is_some());
        assert!(errors.get("confirmation_code").is_some());
    }

    #[tokio::test]
    async fn mail_failure_fails_request_but_keeps_pending_user() {
        let store = MemoryStore::new();
        let broken = RecordingMailer::failing();

        let err = request_signup(&store, &broken, signup("bob", "a@b.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Mail(_)));
        assert!(store.get_user(None, Some("bob"), None).await.unwrap().is_some());

        // a retry with a working mailer re-issues for the same row
        let mailer = RecordingMailer::new();
        request_signup(&store, &mailer, signup("bob", "a@b.com"))
            .await
            .unwrap();
        assert!(mailer.last_code_for("a@b.com").is_some());
    }
}
