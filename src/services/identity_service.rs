//! Identity reconciliation: maps a verified identity-provider subject to the
//! local user record, creating it on first sight. This is the only place
//! that writes `auth0Id`.

use mongodb::bson::{oid::ObjectId, DateTime as BsonDateTime};

use crate::database::Store;
use crate::models::User;
use crate::services::token_service::IdentityClaims;
use crate::utils::{AppError, AppResult};

const FALLBACK_EMAIL_DOMAIN: &str = "users.noreply.local";
const FALLBACK_USERNAME: &str = "User";

/// Builds the record inserted for a subject seen for the first time.
pub fn new_user_from_claims(claims: &IdentityClaims) -> User {
    let email = claims
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(str::to_lowercase)
        .unwrap_or_else(|| fallback_email(&claims.sub));

    let username = [claims.nickname.as_deref(), claims.name.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|n| !n.is_empty())
        .map(str::to_string)
        .or_else(|| {
            claims
                .email
                .as_deref()
                .and_then(|e| e.trim().split('@').next())
                .filter(|local| !local.is_empty())
                .map(str::to_lowercase)
        })
        .or_else(|| readable_subject(&claims.sub))
        .unwrap_or_else(|| FALLBACK_USERNAME.to_string());

    User {
        id: ObjectId::new(),
        auth0_id: claims.sub.clone(),
        email,
        username,
        picture: claims.picture.clone().filter(|p| !p.trim().is_empty()),
        saved_recipes: Vec::new(),
        created_at: BsonDateTime::now(),
    }
}

/// Placeholder email for tokens without an email claim. The local part is
/// the hex of the subject bytes, so distinct subjects never share one.
fn fallback_email(subject: &str) -> String {
    format!("{}@{}", hex::encode(subject.as_bytes()), FALLBACK_EMAIL_DOMAIN)
}

/// Display name derived from the subject; not unique.
fn readable_subject(subject: &str) -> Option<String> {
    let name: String = subject
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    Some(name.trim_matches('-').to_string()).filter(|n| !n.is_empty())
}

pub async fn reconcile(store: &dyn Store, claims: &IdentityClaims) -> AppResult<User> {
    if let Some(user) = store.find_user_by_subject(&claims.sub).await? {
        return Ok(user);
    }
    create_or_refetch(store, claims).await
}

/// Inserts the user for `claims`. Losing a concurrent insert for the same
/// subject is not an error: the winner's record is returned.
pub async fn create_or_refetch(store: &dyn Store, claims: &IdentityClaims) -> AppResult<User> {
    let user = new_user_from_claims(claims);

    match store.insert_user(&user).await {
        Ok(()) => {
            log::info!("✅ Created local user {} for subject {}", user.id.to_hex(), claims.sub);
            Ok(user)
        }
        Err(AppError::Conflict(_)) => {
            log::info!("ℹ️  Subject {} already linked, re-fetching", claims.sub);
            store.find_user_by_subject(&claims.sub).await?.ok_or_else(|| {
                log::warn!("⚠️ Email {} belongs to another account", user.email);
                AppError::Conflict("Email is already linked to another account".to_string())
            })
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use std::sync::Arc;

    fn claims(sub: &str, email: Option<&str>) -> IdentityClaims {
        let mut claims = IdentityClaims::new(sub, chrono::Duration::minutes(5));
        claims.email = email.map(str::to_string);
        claims
    }

    #[test]
    fn username_falls_back_to_email_local_part() {
        let user = new_user_from_claims(&claims("auth0|1", Some("Chef.Ana@Example.com")));
        assert_eq!(user.email, "chef.ana@example.com");
        assert_eq!(user.username, "chef.ana");
    }

    #[test]
    fn nickname_wins_over_email() {
        let mut c = claims("auth0|1", Some("ana@example.com"));
        c.nickname = Some("Ana".into());
        assert_eq!(new_user_from_claims(&c).username, "Ana");
    }

    #[test]
    fn missing_email_gets_unique_placeholder() {
        let user = new_user_from_claims(&claims("google-oauth2|1234", None));
        assert_eq!(user.email, "676f6f676c652d6f61757468327c31323334@users.noreply.local");
        assert_eq!(user.username, "google-oauth2-1234");
    }

    #[tokio::test]
    async fn subjects_differing_in_case_or_punctuation_get_separate_users() {
        let store = MemoryStore::new();
        let subjects = ["oidc|AbC", "oidc|abc", "auth0|a.b", "auth0|a_b"];

        let mut ids = std::collections::HashSet::new();
        for sub in subjects {
            let user = reconcile(&store, &claims(sub, None)).await.unwrap();
            assert_eq!(user.auth0_id, sub);
            ids.insert(user.id);
        }

        assert_eq!(ids.len(), 4);
        assert_eq!(store.user_count(), 4);
    }

    #[tokio::test]
    async fn first_sight_creates_then_reuses() {
        let store = MemoryStore::new();
        let c = claims("auth0|1", Some("a@example.com"));

        let first = reconcile(&store, &c).await.unwrap();
        let second = reconcile(&store, &c).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.user_count(), 1);
    }

    #[tokio::test]
    async fn losing_insert_returns_existing_record() {
        let store = MemoryStore::new();
        let c = claims("auth0|1", Some("a@example.com"));
        let winner = reconcile(&store, &c).await.unwrap();

        // Simulates the request that checked before the winner inserted.
        let loser = create_or_refetch(&store, &c).await.unwrap();

        assert_eq!(loser.id, winner.id);
        assert_eq!(store.user_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_first_requests_create_exactly_one_user() {
        let store = Arc::new(MemoryStore::new());
        let c = claims("auth0|race", Some("race@example.com"));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let c = c.clone();
                tokio::spawn(async move { reconcile(store.as_ref(), &c).await })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().id);
        }

        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(store.user_count(), 1);
    }

    #[tokio::test]
    async fn email_owned_by_other_subject_is_conflict() {
        let store = MemoryStore::new();
        reconcile(&store, &claims("auth0|1", Some("a@example.com"))).await.unwrap();

        let err = reconcile(&store, &claims("auth0|2", Some("a@example.com"))).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(store.user_count(), 1);
    }
}
