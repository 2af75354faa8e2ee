//! API token commands.

use shopforge_api::db::ApiTokenRepository;
use shopforge_api::services::tokens;
use shopforge_core::{ApiRole, ApiTokenId};

use super::{CommandError, api_config, connect, database_url};

/// Issue a token and print it once.
///
/// # Errors
///
/// Returns an error for an invalid role, email or validity, or if the
/// token cannot be stored.
pub async fn create(
    email: &str,
    role: &str,
    label: Option<&str>,
    days: Option<i64>,
) -> Result<(), CommandError> {
    let role: ApiRole = role.parse().map_err(CommandError::InvalidArgument)?;

    if !email.contains('@') || !email.contains('.') {
        return Err(CommandError::InvalidArgument(format!("invalid email: {email}")));
    }
    if let Some(days) = days {
        validate_days(days)?;
    }

    let config = api_config()?;
    let pool = connect(&config.database_url).await?;

    let issued = tokens::issue(&pool, &config.token_pepper, email, role, label, days).await?;

    tracing::info!("Token created! ID: {}, Role: {}", issued.token_id, issued.role);
    if let Some(expires_at) = issued.expires_at {
        tracing::info!("  Expires: {expires_at}");
    }
    tracing::warn!("The token is shown once and cannot be recovered.");

    #[allow(clippy::print_stdout)]
    {
        println!("{}", issued.token);
    }
    Ok(())
}

fn validate_days(days: i64) -> Result<(), CommandError> {
    if (1..=tokens::MAX_VALID_DAYS).contains(&days) {
        Ok(())
    } else {
        Err(CommandError::InvalidArgument(format!(
            "--days must be between 1 and {}",
            tokens::MAX_VALID_DAYS
        )))
    }
}

/// Revoke a token.
///
/// # Errors
///
/// Returns an error if no active token has this id.
pub async fn revoke(id: i32) -> Result<(), CommandError> {
    let pool = connect(&database_url()?).await?;

    let revoked = ApiTokenRepository::new(&pool)
        .revoke(ApiTokenId::new(id))
        .await?;
    if !revoked {
        return Err(CommandError::InvalidArgument(format!(
            "no active token with id {id}"
        )));
    }

    tracing::info!("Token {id} revoked");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_days() {
        assert!(validate_days(1).is_ok());
        assert!(validate_days(tokens::MAX_VALID_DAYS).is_ok());
        assert!(validate_days(0).is_err());
        assert!(validate_days(100_000_000).is_err());
    }
}
