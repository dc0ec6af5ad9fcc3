use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Token payload. Exactly what the frontend stores: the numeric id, the
/// username, and the admin flag. No expiry claim is issued and none is
/// checked; a token stays valid for as long as the signing secret does.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub id: i32,
    pub username: String,
    /// A payload without this field decodes to `false`.
    #[serde(rename = "isAdmin", default)]
    pub is_admin: bool,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("JWT generation error: {0}")]
    TokenGeneration(String),
}

/// Sign a session token for the given user fields.
pub fn create_token(
    id: i32,
    username: &str,
    is_admin: bool,
    secret: &str,
) -> Result<String, TokenError> {
    let claims = Claims {
        id,
        username: username.to_string(),
        is_admin,
    };

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), &claims, &encoding_key)
        .map_err(|e| TokenError::TokenGeneration(e.to_string()))
}

/// Verify a token's signature and recover its claims. Expiry is not
/// validated: these tokens carry no `exp` claim.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.required_spec_claims.clear();

    decode::<Claims>(token, &decoding_key, &validation).map(|data| data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn token_round_trips() {
        let token = create_token(7, "lilly", true, SECRET).unwrap();
        let claims = verify_token(&token, SECRET).unwrap();
        assert_eq!(claims.id, 7);
        assert_eq!(claims.username, "lilly");
        assert!(claims.is_admin);
    }

    #[test]
    fn missing_admin_flag_decodes_to_false() {
        // A hand-rolled payload without isAdmin, signed with the same secret.
        let payload = serde_json::json!({ "id": 3, "username": "tiger" });
        let token = encode(
            &Header::default(),
            &payload,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        let claims = verify_token(&token, SECRET).unwrap();
        assert_eq!(claims.id, 3);
        assert!(!claims.is_admin);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = create_token(1, "lilly", false, SECRET).unwrap();
        assert!(verify_token(&token, "other-secret").is_err());
    }
}
