//! Username rules shared by the identity gate and the CLI.

use crate::domain::error::DomainError;

pub const USERNAME_MAX_CHARS: usize = 150;

/// Validate a username: 1–150 characters of letters, digits and `@.+-_`.
pub fn validate_username(raw: &str) -> Result<&str, DomainError> {
    let username = raw.trim();
    if username.is_empty() {
        return Err(DomainError::validation("username must not be empty"));
    }
    if username.chars().count() > USERNAME_MAX_CHARS {
        return Err(DomainError::validation(format!(
            "username must be at most {USERNAME_MAX_CHARS} characters"
        )));
    }
    if let Some(bad) = username
        .chars()
        .find(|c| !(c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_')))
    {
        return Err(DomainError::validation(format!(
            "username contains unsupported character `{bad}`"
        )));
    }
    Ok(username)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_common_usernames() {
        assert_eq!(validate_username("  leo.tolstoy+1 ").unwrap(), "leo.tolstoy+1");
        assert!(validate_username("автор").is_ok());
    }

    #[test]
    fn rejects_empty_and_spaced_usernames() {
        assert!(validate_username("   ").is_err());
        assert!(validate_username("two words").is_err());
        assert!(validate_username("slash/name").is_err());
    }

    #[test]
    fn rejects_overlong_usernames() {
        let name = "a".repeat(USERNAME_MAX_CHARS + 1);
        assert!(validate_username(&name).is_err());
    }
}
