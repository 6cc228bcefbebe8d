//! End-to-end account flows: registration, login, logout, provider login.

mod common;

use auth_core::services::{AuthError, SentMail};
use auth_core::store::Store;
use common::{context, pw, TestHarness};

#[tokio::test]
async fn test_register_verify_login_logout_flow() {
    let harness = TestHarness::new();

    let principal = harness
        .auth
        .register("alice@example.com", &pw("correct horse"), Some("Alice".to_string()))
        .await
        .unwrap();
    assert!(!principal.verified);

    let token = harness.last_verification_token().expect("verification email");
    harness.auth.verify_email(&token).await.unwrap();

    let pair = harness
        .auth
        .login("alice@example.com", &pw("correct horse"), None, &context())
        .await
        .unwrap();
    assert_eq!(pair.token_type, "Bearer");

    let claims = harness.auth.verify_access(&pair.access_token).await.unwrap();
    assert_eq!(claims.sub, principal.principal_id.to_string());
    assert_eq!(claims.email, "alice@example.com");

    harness.auth.logout(&pair.access_token, &pair.refresh_token).await.unwrap();

    let err = harness.auth.verify_access(&pair.access_token).await.unwrap_err();
    assert!(matches!(err, AuthError::Blacklisted));
    let err = harness.auth.refresh(&pair.refresh_token, &context()).await.unwrap_err();
    assert!(matches!(err, AuthError::Revoked));
    assert!(harness
        .auth
        .list_sessions(principal.principal_id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_login_failures_are_uniform() {
    let harness = TestHarness::new();
    harness.register_verified("bob@example.com", "correct horse").await;

    let wrong_password = harness
        .auth
        .login("bob@example.com", &pw("battery staple"), None, &context())
        .await
        .unwrap_err();
    assert!(matches!(wrong_password, AuthError::Unauthorized));

    let unknown_email = harness
        .auth
        .login("nobody@example.com", &pw("correct horse"), None, &context())
        .await
        .unwrap_err();
    assert!(matches!(unknown_email, AuthError::Unauthorized));
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let harness = TestHarness::new();
    harness
        .auth
        .register("carol@example.com", &pw("correct horse"), None)
        .await
        .unwrap();

    let err = harness
        .auth
        .register("carol@example.com", &pw("battery staple"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Conflict(_)));
}

#[tokio::test]
async fn test_disabled_account_cannot_login() {
    let harness = TestHarness::new();
    let (principal, _) = harness.login_fixture("dave@example.com", "correct horse").await;

    harness.auth.disable_account(principal.principal_id).await.unwrap();

    let err = harness
        .auth
        .login("dave@example.com", &pw("correct horse"), None, &context())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Unauthorized));
}

#[tokio::test]
async fn test_oauth_login_resolves_or_creates() {
    let harness = TestHarness::new();

    let first = harness
        .auth
        .oauth_login("google", "sub-123", "eve@example.com", Some("Eve".to_string()), &context())
        .await
        .unwrap();
    let again = harness
        .auth
        .oauth_login("google", "sub-123", "eve@example.com", Some("Eve".to_string()), &context())
        .await
        .unwrap();

    let first_claims = harness.auth.verify_access(&first.access_token).await.unwrap();
    let again_claims = harness.auth.verify_access(&again.access_token).await.unwrap();
    assert_eq!(first_claims.sub, again_claims.sub);

    let principal = harness
        .store
        .find_principal_by_provider("google", "sub-123")
        .await
        .unwrap()
        .expect("provider principal exists");
    // Provider accounts arrive verified and passwordless.
    assert!(principal.is_verified());
    assert!(principal.password_hash.is_none());
}

#[tokio::test]
async fn test_oauth_login_conflicts_with_password_account() {
    let harness = TestHarness::new();
    harness.register_verified("frank@example.com", "correct horse").await;

    let err = harness
        .auth
        .oauth_login("google", "sub-456", "frank@example.com", None, &context())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Conflict(_)));
}

#[tokio::test]
async fn test_logout_tolerates_invalid_access_credential() {
    let harness = TestHarness::new();
    let (principal, pair) = harness.login_fixture("grace@example.com", "correct horse").await;

    harness.auth.logout("not-a-credential", &pair.refresh_token).await.unwrap();

    assert!(harness
        .auth
        .list_sessions(principal.principal_id)
        .await
        .unwrap()
        .is_empty());
    // Nothing decodable, nothing blacklisted; signature checks already
    // reject the garbage value.
    let err = harness.auth.verify_access("not-a-credential").await.unwrap_err();
    assert!(matches!(err, AuthError::Malformed));
}

#[tokio::test]
async fn test_verification_token_is_single_use() {
    let harness = TestHarness::new();
    harness
        .auth
        .register("heidi@example.com", &pw("correct horse"), None)
        .await
        .unwrap();
    let token = harness.last_verification_token().unwrap();

    harness.auth.verify_email(&token).await.unwrap();
    let err = harness.auth.verify_email(&token).await.unwrap_err();
    assert!(matches!(err, AuthError::NotFound));
}

#[tokio::test]
async fn test_resend_supersedes_previous_verification_token() {
    let harness = TestHarness::new();
    harness
        .auth
        .register("ivan@example.com", &pw("correct horse"), None)
        .await
        .unwrap();
    let original = harness.last_verification_token().unwrap();

    harness.auth.request_email_verification("ivan@example.com").await.unwrap();
    let resent = harness.last_verification_token().unwrap();
    assert_ne!(original, resent);

    let err = harness.auth.verify_email(&original).await.unwrap_err();
    assert!(matches!(err, AuthError::NotFound));
    harness.auth.verify_email(&resent).await.unwrap();

    // Further resends for a verified address are a quiet no-op.
    let mails_before = harness.dispatcher.sent_mail().len();
    harness.auth.request_email_verification("ivan@example.com").await.unwrap();
    assert_eq!(harness.dispatcher.sent_mail().len(), mails_before);
}

#[tokio::test]
async fn test_login_sends_alert() {
    let harness = TestHarness::new();
    harness.login_fixture("judy@example.com", "correct horse").await;

    let alerts = harness
        .dispatcher
        .sent_mail()
        .into_iter()
        .filter(|m| matches!(m, SentMail::LoginAlert { .. }))
        .count();
    assert_eq!(alerts, 1);
}
