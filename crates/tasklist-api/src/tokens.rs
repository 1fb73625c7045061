use anyhow::Result;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha512};
use uuid::Uuid;

use tasklist_types::api::Claims;

/// A freshly minted refresh token. The plaintext goes to the client as a
/// cookie; only the hash is ever persisted.
pub struct RefreshTokenPair {
    pub plaintext: String,
    pub hashed: String,
    pub expired_at: DateTime<Utc>,
}

/// Short-lived HS256 access token carrying the user id. Stateless — never
/// persisted, verified by signature alone.
pub fn issue_access_token(secret: &str, user_id: Uuid, ttl_seconds: i64) -> Result<String> {
    let claims = Claims {
        sub: user_id,
        exp: (Utc::now() + Duration::seconds(ttl_seconds)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Long-lived random refresh token. Pure; the caller persists the hash and
/// hands the plaintext to the client.
pub fn issue_refresh_token(ttl_seconds: i64) -> RefreshTokenPair {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);

    let plaintext = URL_SAFE_NO_PAD.encode(bytes);
    RefreshTokenPair {
        hashed: hash_refresh_token(&plaintext),
        plaintext,
        expired_at: Utc::now() + Duration::seconds(ttl_seconds),
    }
}

/// One-way digest used both when persisting a new token and when looking up
/// a presented one.
pub fn hash_refresh_token(plaintext: &str) -> String {
    hex::encode(Sha512::digest(plaintext.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{DecodingKey, Validation, decode};

    #[test]
    fn access_token_roundtrip() {
        let user_id = Uuid::new_v4();
        let token = issue_access_token("secret", user_id, 900).unwrap();

        let data = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"secret"),
            &Validation::default(),
        )
        .unwrap();

        assert_eq!(data.claims.sub, user_id);
        assert!(data.claims.exp > Utc::now().timestamp() as usize);
    }

    #[test]
    fn access_token_wrong_secret_rejected() {
        let token = issue_access_token("secret", Uuid::new_v4(), 900).unwrap();

        let result = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"other-secret"),
            &Validation::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn expired_access_token_rejected() {
        // Well past the default leeway
        let token = issue_access_token("secret", Uuid::new_v4(), -3600).unwrap();

        let result = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"secret"),
            &Validation::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn refresh_tokens_are_unique_and_hash_matches() {
        let a = issue_refresh_token(60);
        let b = issue_refresh_token(60);

        assert_ne!(a.plaintext, b.plaintext);
        assert_ne!(a.hashed, b.hashed);
        // 32 random bytes, base64 url-safe without padding
        assert_eq!(a.plaintext.len(), 43);
        assert_eq!(hash_refresh_token(&a.plaintext), a.hashed);
        assert!(a.expired_at > Utc::now());
    }
}
