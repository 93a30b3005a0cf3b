use std::time::{SystemTime, UNIX_EPOCH};

use crate::models::{Claims, TokenType};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

fn now() -> usize {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as usize
}

pub struct TokenSubject {
    pub user_id: u64,
    pub email: String,
    pub role: u8,
    pub business_id: String,
    pub department: Option<String>,
}

pub fn generate_access_token(subject: &TokenSubject, secret: &str, ttl: usize) -> String {
    let claims = Claims {
        user_id: subject.user_id,
        sub: subject.email.clone(),
        role: subject.role,
        exp: now() + ttl,
        jti: Uuid::new_v4().to_string(),
        token_type: TokenType::Access,
        business_id: subject.business_id.clone(),
        department: subject.department.clone(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

pub fn generate_refresh_token(subject: &TokenSubject, secret: &str, ttl: usize) -> (String, Claims) {
    let claims = Claims {
        user_id: subject.user_id,
        sub: subject.email.clone(),
        role: subject.role,
        exp: now() + ttl,
        jti: Uuid::new_v4().to_string(),
        token_type: TokenType::Refresh,
        business_id: subject.business_id.clone(),
        department: subject.department.clone(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap();

    (token, claims)
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject() -> TokenSubject {
        TokenSubject {
            user_id: 7,
            email: "jane@company.com".to_string(),
            role: 2,
            business_id: "adpa".to_string(),
            department: Some("IT".to_string()),
        }
    }

    #[test]
    fn access_token_round_trips() {
        let token = generate_access_token(&subject(), "test-secret", 900);
        let claims = verify_token(&token, "test-secret").unwrap();
        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.sub, "jane@company.com");
        assert_eq!(claims.token_type, TokenType::Access);
        assert_eq!(claims.business_id, "adpa");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = generate_access_token(&subject(), "test-secret", 900);
        assert!(verify_token(&token, "other-secret").is_err());
    }

    #[test]
    fn refresh_token_carries_unique_jti() {
        let (_, a) = generate_refresh_token(&subject(), "test-secret", 3600);
        let (_, b) = generate_refresh_token(&subject(), "test-secret", 3600);
        assert_ne!(a.jti, b.jti);
        assert_eq!(a.token_type, TokenType::Refresh);
    }
}
