use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenError {
    /// No such token, or the token belongs to another workflow. The two are
    /// deliberately indistinguishable to the caller.
    #[error("the token is invalid")]
    NotFound,
    #[error("the token has already been used")]
    AlreadyUsed,
    #[error(transparent)]
    Storage(anyhow::Error),
}

impl From<anyhow::Error> for TokenError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<TokenError>() {
            Ok(token_err) => token_err,
            Err(other) => TokenError::Storage(other),
        }
    }
}
