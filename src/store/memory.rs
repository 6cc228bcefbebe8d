//! In-memory store for tests and embedded use.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{BlacklistEntry, OneTimeToken, Principal, RefreshSession, TokenPurpose};
use crate::store::{Store, StoreError};

#[derive(Default)]
struct State {
    principals: HashMap<Uuid, Principal>,
    sessions: HashMap<Uuid, RefreshSession>,
    blacklist: HashMap<String, BlacklistEntry>,
    one_time_tokens: HashMap<Uuid, OneTimeToken>,
}

/// All four relations behind a single mutex, so the conditional revoke is
/// atomic with respect to every other operation.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // Mutex poisoning only happens after a panic in another test thread;
        // propagating it would just mask the original failure.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_principal(&self, principal: &Principal) -> Result<(), StoreError> {
        let mut state = self.lock();
        if state.principals.values().any(|p| p.email == principal.email) {
            return Err(StoreError::Duplicate("email"));
        }
        if let (Some(provider), Some(provider_id)) =
            (&principal.provider, &principal.provider_id)
        {
            if state.principals.values().any(|p| {
                p.provider.as_deref() == Some(provider)
                    && p.provider_id.as_deref() == Some(provider_id)
            }) {
                return Err(StoreError::Duplicate("provider identity"));
            }
        }
        state
            .principals
            .insert(principal.principal_id, principal.clone());
        Ok(())
    }

    async fn find_principal(&self, principal_id: Uuid) -> Result<Option<Principal>, StoreError> {
        Ok(self.lock().principals.get(&principal_id).cloned())
    }

    async fn find_principal_by_email(&self, email: &str) -> Result<Option<Principal>, StoreError> {
        Ok(self
            .lock()
            .principals
            .values()
            .find(|p| p.email == email)
            .cloned())
    }

    async fn find_principal_by_provider(
        &self,
        provider: &str,
        provider_id: &str,
    ) -> Result<Option<Principal>, StoreError> {
        Ok(self
            .lock()
            .principals
            .values()
            .find(|p| {
                p.provider.as_deref() == Some(provider)
                    && p.provider_id.as_deref() == Some(provider_id)
            })
            .cloned())
    }

    async fn set_password_hash(&self, principal_id: Uuid, hash: &str) -> Result<(), StoreError> {
        if let Some(p) = self.lock().principals.get_mut(&principal_id) {
            p.password_hash = Some(hash.to_string());
        }
        Ok(())
    }

    async fn set_verified(
        &self,
        principal_id: Uuid,
        when: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if let Some(p) = self.lock().principals.get_mut(&principal_id) {
            p.verified_utc = Some(when);
        }
        Ok(())
    }

    async fn set_disabled(
        &self,
        principal_id: Uuid,
        when: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if let Some(p) = self.lock().principals.get_mut(&principal_id) {
            p.disabled_utc = Some(when);
        }
        Ok(())
    }

    async fn set_second_factor(
        &self,
        principal_id: Uuid,
        secret: Option<&str>,
        enabled_utc: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        if let Some(p) = self.lock().principals.get_mut(&principal_id) {
            p.second_factor = crate::models::SecondFactor::from_columns(
                secret.map(String::from),
                enabled_utc,
            );
        }
        Ok(())
    }

    async fn insert_session(&self, session: &RefreshSession) -> Result<(), StoreError> {
        let mut state = self.lock();
        if state
            .sessions
            .values()
            .any(|s| s.token_hash == session.token_hash)
        {
            return Err(StoreError::Duplicate("token_hash"));
        }
        state.sessions.insert(session.session_id, session.clone());
        Ok(())
    }

    async fn find_session(&self, session_id: Uuid) -> Result<Option<RefreshSession>, StoreError> {
        Ok(self.lock().sessions.get(&session_id).cloned())
    }

    async fn find_session_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshSession>, StoreError> {
        Ok(self
            .lock()
            .sessions
            .values()
            .find(|s| s.token_hash == token_hash)
            .cloned())
    }

    async fn find_successor(
        &self,
        session_id: Uuid,
    ) -> Result<Option<RefreshSession>, StoreError> {
        Ok(self
            .lock()
            .sessions
            .values()
            .find(|s| s.predecessor_id == Some(session_id))
            .cloned())
    }

    async fn list_active_sessions(
        &self,
        principal_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<RefreshSession>, StoreError> {
        let mut sessions: Vec<RefreshSession> = self
            .lock()
            .sessions
            .values()
            .filter(|s| {
                s.principal_id == principal_id && s.revoked_utc.is_none() && s.expiry_utc > now
            })
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.issued_utc.cmp(&a.issued_utc));
        Ok(sessions)
    }

    async fn revoke_session_if_active(
        &self,
        session_id: Uuid,
        now: DateTime<Utc>,
        reason: &str,
    ) -> Result<bool, StoreError> {
        let mut state = self.lock();
        match state.sessions.get_mut(&session_id) {
            Some(s) if s.revoked_utc.is_none() => {
                s.revoked_utc = Some(now);
                s.revoked_reason = Some(reason.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_owned_session(
        &self,
        principal_id: Uuid,
        session_id: Uuid,
        now: DateTime<Utc>,
        reason: &str,
    ) -> Result<bool, StoreError> {
        let mut state = self.lock();
        match state.sessions.get_mut(&session_id) {
            Some(s) if s.principal_id == principal_id => {
                if s.revoked_utc.is_none() {
                    s.revoked_utc = Some(now);
                    s.revoked_reason = Some(reason.to_string());
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_sessions(
        &self,
        principal_id: Uuid,
        exclude_hash: Option<&str>,
        now: DateTime<Utc>,
        reason: &str,
    ) -> Result<u64, StoreError> {
        let mut state = self.lock();
        let mut count = 0;
        for s in state.sessions.values_mut() {
            if s.principal_id == principal_id
                && s.revoked_utc.is_none()
                && s.expiry_utc > now
                && exclude_hash != Some(s.token_hash.as_str())
            {
                s.revoked_utc = Some(now);
                s.revoked_reason = Some(reason.to_string());
                count += 1;
            }
        }
        Ok(count)
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut state = self.lock();
        let before = state.sessions.len();
        state.sessions.retain(|_, s| s.expiry_utc > now);
        Ok((before - state.sessions.len()) as u64)
    }

    async fn insert_blacklist_entry(&self, entry: &BlacklistEntry) -> Result<(), StoreError> {
        self.lock()
            .blacklist
            .entry(entry.token_hash.clone())
            .or_insert_with(|| entry.clone());
        Ok(())
    }

    async fn blacklist_contains(&self, token_hash: &str) -> Result<bool, StoreError> {
        Ok(self.lock().blacklist.contains_key(token_hash))
    }

    async fn delete_expired_blacklist(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut state = self.lock();
        let before = state.blacklist.len();
        state.blacklist.retain(|_, e| e.expiry_utc > now);
        Ok((before - state.blacklist.len()) as u64)
    }

    async fn delete_live_one_time_tokens(
        &self,
        principal_id: Uuid,
        purpose: TokenPurpose,
    ) -> Result<(), StoreError> {
        self.lock().one_time_tokens.retain(|_, t| {
            !(t.principal_id == principal_id && t.purpose_code == purpose.as_str())
        });
        Ok(())
    }

    async fn insert_one_time_token(&self, token: &OneTimeToken) -> Result<(), StoreError> {
        let mut state = self.lock();
        if state
            .one_time_tokens
            .values()
            .any(|t| t.token_value == token.token_value)
        {
            return Err(StoreError::Duplicate("token_value"));
        }
        state.one_time_tokens.insert(token.token_id, token.clone());
        Ok(())
    }

    async fn find_one_time_token(
        &self,
        purpose: TokenPurpose,
        token_value: &str,
    ) -> Result<Option<OneTimeToken>, StoreError> {
        Ok(self
            .lock()
            .one_time_tokens
            .values()
            .find(|t| t.purpose_code == purpose.as_str() && t.token_value == token_value)
            .cloned())
    }

    async fn delete_one_time_token(&self, token_id: Uuid) -> Result<bool, StoreError> {
        Ok(self.lock().one_time_tokens.remove(&token_id).is_some())
    }

    async fn delete_expired_one_time_tokens(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut state = self.lock();
        let before = state.one_time_tokens.len();
        state.one_time_tokens.retain(|_, t| t.expiry_utc > now);
        Ok((before - state.one_time_tokens.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SessionContext;

    fn session(principal_id: Uuid) -> RefreshSession {
        RefreshSession::new(
            Uuid::new_v4(),
            principal_id,
            Uuid::new_v4().to_string(),
            7,
            &SessionContext::default(),
            None,
        )
    }

    #[tokio::test]
    async fn test_revoke_if_active_is_single_shot() {
        let store = MemoryStore::new();
        let s = session(Uuid::new_v4());
        store.insert_session(&s).await.unwrap();

        let now = Utc::now();
        assert!(store
            .revoke_session_if_active(s.session_id, now, "rotated")
            .await
            .unwrap());
        assert!(!store
            .revoke_session_if_active(s.session_id, now, "rotated")
            .await
            .unwrap());

        let stored = store.find_session(s.session_id).await.unwrap().unwrap();
        assert_eq!(stored.revoked_utc, Some(now));
        assert_eq!(stored.revoked_reason.as_deref(), Some("rotated"));
    }

    #[tokio::test]
    async fn test_blacklist_insert_is_idempotent() {
        let store = MemoryStore::new();
        let entry = BlacklistEntry::new(
            "digest".to_string(),
            Uuid::new_v4(),
            Utc::now() + chrono::Duration::minutes(15),
            "logout".to_string(),
        );
        store.insert_blacklist_entry(&entry).await.unwrap();
        store.insert_blacklist_entry(&entry).await.unwrap();
        assert!(store.blacklist_contains("digest").await.unwrap());
        assert_eq!(store.delete_expired_blacklist(Utc::now()).await.unwrap(), 0);
    }
}
