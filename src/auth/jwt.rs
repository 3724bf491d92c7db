use std::path::Path;

use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;

use crate::auth::middleware::Claims;

/// Access token lifetime: 15 minutes. Session refresh lives in the external
/// auth service; a client reconnects its push channel with a fresh token.
const ACCESS_TOKEN_TTL_SECS: i64 = 900;

/// Load or generate a 256-bit random secret stored as raw bytes in
/// data_dir/<file_name>. Used for both the JWT signing key and the
/// meeting entry-token shared secret.
pub fn load_or_generate_secret(
    data_dir: &str,
    file_name: &str,
) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let key_path = Path::new(data_dir).join(file_name);

    if key_path.exists() {
        let key = std::fs::read(&key_path)?;
        if key.len() == 32 {
            tracing::info!("Secret loaded from {}", key_path.display());
            return Ok(key);
        }
        // Invalid key file — regenerate
        tracing::warn!(
            "Key file {} has wrong size ({}), regenerating",
            key_path.display(),
            key.len()
        );
    }

    let key: [u8; 32] = rand::rng().random();
    std::fs::write(&key_path, key)?;
    tracing::info!("Secret generated at {}", key_path.display());
    Ok(key.to_vec())
}

/// Issue an access token. Claims: sub=user_id, name=display name, iat, exp.
/// Session issuance proper belongs to the external auth service; this exists
/// for the in-process test harness and first-party tooling.
pub fn issue_access_token(
    secret: &[u8],
    user_id: &str,
    display_name: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        name: display_name.to_string(),
        iat: now,
        exp: now + ACCESS_TOKEN_TTL_SECS,
    };

    encode(
        &Header::default(), // HS256
        &claims,
        &EncodingKey::from_secret(secret),
    )
}

/// Validate an access token and return its claims.
/// The identity in these claims is the only sender identity the core trusts.
pub fn validate_access_token(
    secret: &[u8],
    token: &str,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let validation = Validation::new(jsonwebtoken::Algorithm::HS256);
    let token_data = decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation)?;
    Ok(token_data.claims)
}
