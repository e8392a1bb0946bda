//! Password hashing and credential verification.

use std::sync::LazyLock;

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use examboard_core::{
  identity::{Identity, IdentityKey},
  store::SchoolStore,
};
use rand_core::OsRng;
use thiserror::Error;

use crate::error::ApiError;

#[derive(Debug, Error)]
pub enum AuthError<E> {
  /// No leader or member holds the key.
  #[error("no such identity")]
  NotFound,

  #[error("secret does not match")]
  InvalidSecret,

  #[error("store error: {0}")]
  Store(#[source] E),
}

/// Hash `secret` into an argon2 PHC string with a fresh salt.
pub fn hash_secret(secret: &str) -> Result<String, ApiError> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(secret.as_bytes(), &salt)
    .map(|h| h.to_string())
    .map_err(|e| ApiError::Internal(format!("argon2 error: {e}")))
}

/// Checked against when the identifier is unknown, so that a miss costs the
/// same argon2 run as a wrong secret.
static DECOY_HASH: LazyLock<Option<String>> = LazyLock::new(|| hash_secret("decoy").ok());

fn burn_decoy(secret: &str) {
  if let Some(parsed) = DECOY_HASH.as_deref().and_then(|h| PasswordHash::new(h).ok()) {
    let _ = Argon2::default().verify_password(secret.as_bytes(), &parsed);
  }
}

/// Check `secret` against the stored hash of the identity named by
/// `identifier`. The identifier is trimmed and uppercased first.
pub async fn verify<S>(
  store: &S,
  identifier: &str,
  secret: &str,
) -> Result<Identity, AuthError<S::Error>>
where
  S: SchoolStore,
{
  let key = IdentityKey::normalize(identifier);
  let Some(credential) = store.find_credential(key).await.map_err(AuthError::Store)? else {
    burn_decoy(secret);
    return Err(AuthError::NotFound);
  };

  let parsed = PasswordHash::new(&credential.secret_hash).map_err(|_| AuthError::InvalidSecret)?;
  Argon2::default()
    .verify_password(secret.as_bytes(), &parsed)
    .map_err(|_| AuthError::InvalidSecret)?;

  Ok(credential.identity)
}

#[cfg(test)]
mod tests {
  use examboard_core::identity::{
    Admin, Gender, IdentityKey, LeaderDraft, MemberDraft, Person, Role, Stream,
  };
  use std::time::Instant;

  use examboard_store_sqlite::SqliteStore;

  use super::*;

  fn person(first: &str) -> Person {
    Person {
      first_name: first.into(),
      last_name:  "Silva".into(),
      email:      Some(format!("{}@example.com", first.to_lowercase())),
      phone:      "0771234567".into(),
      address:    None,
      gender:     Gender::Female,
    }
  }

  async fn seeded(hash: &str) -> SqliteStore {
    let store = SqliteStore::open_in_memory().await.unwrap();
    store
      .create_leader(LeaderDraft {
        key:         IdentityKey::normalize("A001"),
        username:    "amaya".into(),
        person:      person("Amaya"),
        school:      "Visakha".into(),
        stream:      Stream::Maths,
        role:        None,
        subject_ids: vec![],
        secret_hash: hash.into(),
      })
      .await
      .unwrap();
    store
      .create_member(MemberDraft {
        key:         IdentityKey::normalize("S200"),
        person:      person("Sahan"),
        leader_key:  IdentityKey::normalize("A001"),
        stream:      Stream::Maths,
        role:        None,
        subject_ids: vec![],
        secret_hash: hash.into(),
      })
      .await
      .unwrap();
    store
      .create_admin(Admin { key: IdentityKey::normalize("ADM1"), username: "root".into() })
      .await
      .unwrap();
    store
  }

  #[tokio::test]
  async fn identifier_case_does_not_matter() {
    let hash = hash_secret("Password1").unwrap();
    let store = seeded(&hash).await;

    let lower = verify(&store, "a001", "Password1").await.unwrap();
    let upper = verify(&store, "A001", "Password1").await.unwrap();
    assert_eq!(lower, upper);
    assert_eq!(lower.role(), Role::Leader);

    let padded = verify(&store, "  a001 ", "Password1").await.unwrap();
    assert_eq!(padded.key().as_str(), "A001");
  }

  #[tokio::test]
  async fn member_role_is_derived_from_variant() {
    let hash = hash_secret("Password1").unwrap();
    let store = seeded(&hash).await;
    let member = verify(&store, "s200", "Password1").await.unwrap();
    assert_eq!(member.role(), Role::Member);
  }

  #[tokio::test]
  async fn wrong_secret_and_unknown_key() {
    let hash = hash_secret("Password1").unwrap();
    let store = seeded(&hash).await;

    assert!(matches!(
      verify(&store, "A001", "password1").await.unwrap_err(),
      AuthError::InvalidSecret
    ));
    assert!(matches!(verify(&store, "Z999", "Password1").await.unwrap_err(), AuthError::NotFound));
  }

  #[test]
  fn decoy_hash_runs_a_full_verification() {
    let parsed = PasswordHash::new(DECOY_HASH.as_deref().unwrap()).unwrap();
    let err = Argon2::default().verify_password(b"Password1", &parsed).unwrap_err();
    assert!(matches!(err, argon2::password_hash::Error::Password));
  }

  #[tokio::test]
  async fn unknown_key_costs_about_as_much_as_a_wrong_secret() {
    let hash = hash_secret("Password1").unwrap();
    let store = seeded(&hash).await;
    // Warm the decoy so its one-off hashing is not measured.
    burn_decoy("warm-up");

    let started = Instant::now();
    for _ in 0..3 {
      assert!(matches!(verify(&store, "Z999", "x").await.unwrap_err(), AuthError::NotFound));
    }
    let unknown = started.elapsed();

    let started = Instant::now();
    for _ in 0..3 {
      assert!(matches!(verify(&store, "A001", "x").await.unwrap_err(), AuthError::InvalidSecret));
    }
    let known = started.elapsed();

    assert!(unknown * 4 >= known, "unknown {unknown:?} vs known {known:?}");
  }

  #[tokio::test]
  async fn admins_cannot_log_in_with_a_secret() {
    let hash = hash_secret("Password1").unwrap();
    let store = seeded(&hash).await;
    assert!(matches!(verify(&store, "ADM1", "Password1").await.unwrap_err(), AuthError::NotFound));
  }

  #[tokio::test]
  async fn malformed_stored_hash_is_a_mismatch() {
    let store = seeded("not-a-phc-string").await;
    assert!(matches!(
      verify(&store, "A001", "Password1").await.unwrap_err(),
      AuthError::InvalidSecret
    ));
  }
}
