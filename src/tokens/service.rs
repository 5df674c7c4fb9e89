use chrono::Utc;

use super::TokenError;
use crate::db::{
    models::{Token, TokenPurpose},
    repositories::TokenRepository,
    Database,
};

/// Validate a stored token against the purpose a workflow presents.
///
/// A missing token and a purpose mismatch both yield `NotFound`; the used
/// flag is only consulted once the purpose matched.
fn ensure_redeemable(token: Option<Token>, purpose: TokenPurpose) -> Result<Token, TokenError> {
    let token = token.ok_or(TokenError::NotFound)?;
    if token.purpose != Some(purpose) {
        return Err(TokenError::NotFound);
    }
    if token.is_used {
        return Err(TokenError::AlreadyUsed);
    }
    Ok(token)
}

/// Issues, validates and consumes single-use tokens.
///
/// Nothing is cached: every call reads the token table afresh.
#[derive(Clone)]
pub struct TokenService {
    db: Database,
}

impl TokenService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create an unbound token and return its identifier.
    pub async fn issue(&self) -> Result<String, TokenError> {
        let token = self
            .db
            .execute(|conn| TokenRepository::new(conn).insert(Utc::now()))
            .await?;
        Ok(token.id)
    }

    /// Attach a workflow purpose (and optionally the recipient email) to an
    /// issued token. A consumed token can't be rebound.
    pub async fn bind(
        &self,
        token_id: &str,
        email: Option<&str>,
        purpose: TokenPurpose,
    ) -> Result<Token, TokenError> {
        let token_id = token_id.to_string();
        let email = email.map(str::to_string);
        let token = self
            .db
            .execute(move |conn| {
                let repo = TokenRepository::new(conn);
                let token = repo.find(&token_id)?.ok_or(TokenError::NotFound)?;
                if token.is_used {
                    return Err(TokenError::AlreadyUsed.into());
                }
                repo.bind(&token_id, email.as_deref(), purpose)?;
                repo.find(&token_id)?.ok_or_else(|| TokenError::NotFound.into())
            })
            .await?;
        Ok(token)
    }

    /// Read-only validation. Returns the stored record unchanged.
    pub async fn check(&self, token_id: &str, purpose: TokenPurpose) -> Result<Token, TokenError> {
        let token_id = token_id.to_string();
        let stored = self
            .db
            .execute(move |conn| TokenRepository::new(conn).find(&token_id))
            .await?;
        ensure_redeemable(stored, purpose)
    }

    /// Validate and consume the token, keeping its bound email.
    ///
    /// The used flag only flips on a row that is still unused, so when two
    /// redemptions race exactly one of them succeeds.
    pub async fn redeem(&self, token_id: &str, purpose: TokenPurpose) -> Result<Token, TokenError> {
        let token_id = token_id.to_string();
        let token = self
            .db
            .execute(move |conn| {
                let repo = TokenRepository::new(conn);
                let mut token = ensure_redeemable(repo.find(&token_id)?, purpose)?;

                let used_at = Utc::now();
                if repo.mark_used(&token_id, used_at)? == 0 {
                    return Err(TokenError::AlreadyUsed.into());
                }
                token.is_used = true;
                token.used_at = Some(used_at);
                Ok(token)
            })
            .await?;
        Ok(token)
    }
}
