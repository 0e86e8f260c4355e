//! Restaurant registration and login.
//!
//! Passwords are stored as PBKDF2-HMAC-SHA256 with a per-user random salt,
//! `hex(salt) + '$' + hex(hash)`. Login failures are reported uniformly so
//! the response never reveals whether an email is registered.

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Json as AxumJson},
};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;

use crate::db;
use crate::AppState;

const PBKDF2_ROUNDS: u32 = 100_000;
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub location: String,
    pub email: String,
    pub contact: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> impl IntoResponse {
    match db::restaurant_email_exists(&state.db, &req.email).await {
        Ok(true) => return (StatusCode::CONFLICT, "Email already registered").into_response(),
        Ok(false) => {}
        Err(e) => {
            tracing::error!("Registration lookup error: {e}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    }

    let hash = hash_password(&req.password);
    match db::create_restaurant(&state.db, &req.name, &req.location, &req.email, &req.contact, &hash)
        .await
    {
        Ok(id) => (
            StatusCode::CREATED,
            AxumJson(json!({
                "id": id,
                "name": req.name,
                "location": req.location,
                "email": req.email,
                "contact": req.contact,
                "role": "restaurant",
            })),
        )
            .into_response(),
        Err(e) => {
            // The existence check above races with concurrent registrations;
            // the UNIQUE constraint is the authority.
            if is_unique_violation(&e) {
                return (StatusCode::CONFLICT, "Email already registered").into_response();
            }
            tracing::error!("Registration insert error: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> impl IntoResponse {
    let found = match db::find_restaurant_by_email(&state.db, &req.email).await {
        Ok(found) => found,
        Err(e) => {
            tracing::error!("Login lookup error: {e}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };

    let Some((restaurant, stored_hash)) = found else {
        return (StatusCode::UNAUTHORIZED, "Invalid email or password").into_response();
    };
    if !verify_password(&req.password, &stored_hash) {
        return (StatusCode::UNAUTHORIZED, "Invalid email or password").into_response();
    }

    AxumJson(json!({
        "id": restaurant.id,
        "name": restaurant.name,
        "location": restaurant.location,
        "email": restaurant.email,
        "contact": restaurant.contact,
        "role": "restaurant",
    }))
    .into_response()
}

fn is_unique_violation(e: &anyhow::Error) -> bool {
    e.downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .is_some_and(|db_err| db_err.is_unique_violation())
}

pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);

    let mut hash = [0u8; HASH_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, PBKDF2_ROUNDS, &mut hash);

    format!("{}${}", hex::encode(salt), hex::encode(hash))
}

/// Fails closed on any malformed stored value.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt_hex, hash_hex)) = stored.split_once('$') else {
        return false;
    };
    let Ok(salt) = hex::decode(salt_hex) else {
        return false;
    };
    let Ok(expected) = hex::decode(hash_hex) else {
        return false;
    };
    if salt.len() != SALT_LEN || expected.len() != HASH_LEN {
        return false;
    }

    let mut hash = [0u8; HASH_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, PBKDF2_ROUNDS, &mut hash);
    hash[..] == expected[..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_plaintext_verifies() {
        let stored = hash_password("hunter2");
        assert!(verify_password("hunter2", &stored));
        assert!(!verify_password("hunter3", &stored));
    }

    #[test]
    fn salts_are_unique_per_hash() {
        let a = hash_password("same");
        let b = hash_password("same");
        assert_ne!(a, b);
        assert!(verify_password("same", &a));
        assert!(verify_password("same", &b));
    }

    #[test]
    fn mutated_hash_or_salt_fails() {
        let stored = hash_password("hunter2");
        let (salt, hash) = stored.split_once('$').expect("separator");

        let flip = |s: &str| {
            let mut chars: Vec<char> = s.chars().collect();
            chars[0] = if chars[0] == '0' { '1' } else { '0' };
            chars.into_iter().collect::<String>()
        };

        assert!(!verify_password("hunter2", &format!("{}${}", flip(salt), hash)));
        assert!(!verify_password("hunter2", &format!("{}${}", salt, flip(hash))));
    }

    #[test]
    fn malformed_stored_values_fail_closed() {
        assert!(!verify_password("x", ""));
        assert!(!verify_password("x", "$"));
        assert!(!verify_password("x", "nothex$nothex"));
        assert!(!verify_password("x", "abcd$abcd"));
    }
}
