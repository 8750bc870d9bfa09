use std::str::FromStr;

use thiserror::Error;

/// An environment variable required by the application is not set.
#[derive(Debug, Error)]
#[error("Missing environment variable: {0}")]
pub struct MissingEnvVarError(pub String);

/// An environment variable is set but its value cannot be parsed.
#[derive(Debug, Error)]
#[error("Invalid value {value:?} for environment variable {name}: {message}")]
pub struct InvalidEnvVarError {
    /// Variable name.
    pub name: String,
    /// Raw value as found in the environment.
    pub value: String,
    /// Parser message.
    pub message: String,
}

/// Reads an environment variable, returning a structured error if it's missing.
///
/// This is a thin wrapper around `std::env::var` that provides a more
/// ergonomic and specific error type for missing variables. Empty values are
/// treated as missing.
///
/// # Arguments
/// * `name` - The name of the environment variable to read.
pub fn get_env_var(name: &str) -> Result<String, MissingEnvVarError> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(MissingEnvVarError(name.to_string())),
    }
}

/// Reads an optional environment variable. Unset and empty are both `None`.
pub fn get_env_var_opt(name: &str) -> Option<String> {
    get_env_var(name).ok()
}

/// Reads and parses an environment variable, falling back to `default` when unset.
pub fn parse_env_var_or<T>(name: &str, default: T) -> Result<T, InvalidEnvVarError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get_env_var_opt(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<T>().map_err(|e| InvalidEnvVarError {
            name: name.to_string(),
            value: raw.clone(),
            message: e.to_string(),
        }),
    }
}
