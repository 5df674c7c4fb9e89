//! Single-use token models.

use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Workflow a token was issued for. Stored as a stable kebab-case string.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum TokenPurpose {
    PasswordReset,
    EmailVerification,
    AccountActivation,
}

impl TokenPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::PasswordReset => "password-reset",
            TokenPurpose::EmailVerification => "email-verification",
            TokenPurpose::AccountActivation => "account-activation",
        }
    }
}

impl fmt::Display for TokenPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenPurpose {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "password-reset" => Ok(TokenPurpose::PasswordReset),
            "email-verification" => Ok(TokenPurpose::EmailVerification),
            "account-activation" => Ok(TokenPurpose::AccountActivation),
            other => Err(anyhow!("unknown token purpose '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub id: String,
    pub email: Option<String>,
    /// `None` until a workflow binds the token.
    pub purpose: Option<TokenPurpose>,
    pub is_used: bool,
    pub created_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purpose_strings_are_stable() {
        for purpose in [
            TokenPurpose::PasswordReset,
            TokenPurpose::EmailVerification,
            TokenPurpose::AccountActivation,
        ] {
            assert_eq!(purpose.as_str().parse::<TokenPurpose>().unwrap(), purpose);
            assert_eq!(
                serde_json::to_string(&purpose).unwrap(),
                format!("\"{}\"", purpose.as_str())
            );
        }
    }

    #[test]
    fn unknown_purpose_is_rejected() {
        assert!("password_reset".parse::<TokenPurpose>().is_err());
        assert!("".parse::<TokenPurpose>().is_err());
    }
}
