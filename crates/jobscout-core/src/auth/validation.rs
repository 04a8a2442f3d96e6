use crate::api::{ApiError, Endpoint};

/// Minimum accepted username length, in characters.
pub const MIN_USERNAME_LENGTH: usize = 3;

/// Minimum accepted password length, in characters.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Pre-checks run before a registration request leaves the client.
pub fn validate_registration(username: &str, password: &str) -> Result<(), ApiError> {
    if username.chars().count() < MIN_USERNAME_LENGTH {
        return Err(ApiError::validation(
            Endpoint::Register,
            format!("Username must be at least {} characters", MIN_USERNAME_LENGTH),
        ));
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::validation(
            Endpoint::Register,
            format!("Password must be at least {} characters", MIN_PASSWORD_LENGTH),
        ));
    }
    Ok(())
}

/// Login only needs both fields filled in; the server judges the rest.
pub fn validate_login(username: &str, password: &str) -> Result<(), ApiError> {
    if username.is_empty() || password.is_empty() {
        return Err(ApiError::validation(
            Endpoint::Login,
            "Username and password required",
        ));
    }
    Ok(())
}
