use jsonwebtoken::{DecodingKey, Validation, decode};

use harmony_types::api::{Claims, CurrentUser};

/// Validate an HS256 token minted by the auth provider and turn its claims
/// into the session user. Expired tokens are rejected.
pub fn verify_token(secret: &str, token: &str) -> Result<CurrentUser, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(CurrentUser::from(token_data.claims))
}
