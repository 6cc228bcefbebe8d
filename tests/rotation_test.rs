//! Refresh credential rotation: single-use exchange, concurrency, reuse.

mod common;

use auth_core::models::RefreshSession;
use auth_core::services::{AuthError, TokenService};
use auth_core::store::Store;
use chrono::{Duration, Utc};
use common::{context, TestHarness};
use uuid::Uuid;

#[tokio::test]
async fn test_rotation_exchanges_credential_once() {
    let harness = TestHarness::new();
    let (_, pair) = harness.login_fixture("alice@example.com", "correct horse").await;

    let rotated = harness
        .auth
        .refresh(&pair.refresh_token, &context())
        .await
        .expect("first rotation should succeed");
    assert_ne!(rotated.refresh_token, pair.refresh_token);
    assert_ne!(rotated.access_token, pair.access_token);

    // The old credential is spent.
    let err = harness
        .auth
        .refresh(&pair.refresh_token, &context())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Revoked));

    // The replacement still works.
    harness
        .auth
        .refresh(&rotated.refresh_token, &context())
        .await
        .expect("replacement credential should rotate");
}

#[tokio::test]
async fn test_concurrent_rotation_has_one_winner() {
    let harness = TestHarness::new();
    let (_, pair) = harness.login_fixture("bob@example.com", "correct horse").await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let auth = harness.auth.clone();
        let token = pair.refresh_token.clone();
        handles.push(tokio::spawn(
            async move { auth.refresh(&token, &context()).await },
        ));
    }

    let mut winners = 0;
    let mut losers = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => winners += 1,
            Err(AuthError::Revoked) => losers += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(winners, 1);
    assert_eq!(losers, 7);
}

#[tokio::test]
async fn test_expired_session_fails_expired() {
    let harness = TestHarness::new();
    let principal = harness.register_verified("carol@example.com", "correct horse").await;

    // Seed a session whose backing row is already past expiry.
    let tokens = TokenService::new(&common::test_config().tokens);
    let session_id = Uuid::new_v4();
    let refresh_token = tokens.issue_refresh(principal.principal_id, session_id).unwrap();
    let mut session = RefreshSession::new(
        session_id,
        principal.principal_id,
        TokenService::hash(&refresh_token),
        7,
        &context(),
        None,
    );
    session.expiry_utc = Utc::now() - Duration::seconds(1);
    harness.store.insert_session(&session).await.unwrap();

    let err = harness
        .auth
        .refresh(&refresh_token, &context())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Expired));
}

#[tokio::test]
async fn test_unknown_credential_fails_not_found() {
    let harness = TestHarness::new();
    let principal = harness.register_verified("dave@example.com", "correct horse").await;

    // Validly signed, but no session row backs it.
    let tokens = TokenService::new(&common::test_config().tokens);
    let forged = tokens
        .issue_refresh(principal.principal_id, Uuid::new_v4())
        .unwrap();

    let err = harness.auth.refresh(&forged, &context()).await.unwrap_err();
    assert!(matches!(err, AuthError::NotFound));
}

#[tokio::test]
async fn test_reuse_revokes_descendant_chain() {
    let harness = TestHarness::new();
    let (principal, first) = harness.login_fixture("eve@example.com", "correct horse").await;

    let second = harness.auth.refresh(&first.refresh_token, &context()).await.unwrap();
    let third = harness.auth.refresh(&second.refresh_token, &context()).await.unwrap();

    // Presenting the spent first credential trips the reuse response.
    let err = harness
        .auth
        .refresh(&first.refresh_token, &context())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Revoked));

    // The whole chain is dead, the still-live tail included.
    let err = harness
        .auth
        .refresh(&third.refresh_token, &context())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Revoked));
    assert!(harness
        .auth
        .list_sessions(principal.principal_id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_reuse_without_cascade_leaves_tail_alive() {
    let mut config = common::test_config();
    config.revoke_on_reuse = false;
    let harness = TestHarness::with_config(config);
    let (_, first) = harness.login_fixture("frank@example.com", "correct horse").await;

    let second = harness.auth.refresh(&first.refresh_token, &context()).await.unwrap();

    let err = harness
        .auth
        .refresh(&first.refresh_token, &context())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Revoked));

    harness
        .auth
        .refresh(&second.refresh_token, &context())
        .await
        .expect("tail should survive when cascade is off");
}

#[tokio::test]
async fn test_rotation_fails_for_disabled_principal() {
    let harness = TestHarness::new();
    let (principal, pair) = harness.login_fixture("grace@example.com", "correct horse").await;

    harness.auth.disable_account(principal.principal_id).await.unwrap();

    let err = harness
        .auth
        .refresh(&pair.refresh_token, &context())
        .await
        .unwrap_err();
    // disable_account revoked the session before the credential arrived.
    assert!(matches!(err, AuthError::Revoked));
}
