//! Input checks run before anything reaches the store.
use thiserror::Error;

pub const MAX_TITLE_LEN: usize = 128;
pub const MAX_COMMENT_LEN: usize = 512;
pub const MIN_USERNAME_LEN: usize = 3;
pub const MAX_USERNAME_LEN: usize = 32;
pub const MIN_PASSWORD_LEN: usize = 8;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

/// Rejected user input.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

fn required(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }
    Ok(())
}

fn max_len(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.chars().count() > max {
        return Err(ValidationError::new(field, format!("max {max} characters")));
    }
    Ok(())
}

pub fn title(value: &str) -> Result<(), ValidationError> {
    required("title", value)?;
    max_len("title", value, MAX_TITLE_LEN)
}

/// Comments attached to a shared entry may be empty.
pub fn comment(value: &str) -> Result<(), ValidationError> {
    max_len("comment", value, MAX_COMMENT_LEN)
}

pub fn announcement(value: &str) -> Result<(), ValidationError> {
    required("announcement", value)?;
    max_len("announcement", value, MAX_COMMENT_LEN)
}

pub fn username(value: &str) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if !(MIN_USERNAME_LEN..=MAX_USERNAME_LEN).contains(&len) {
        return Err(ValidationError::new(
            "username",
            format!("must be {MIN_USERNAME_LEN} to {MAX_USERNAME_LEN} characters"),
        ));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-')
    {
        return Err(ValidationError::new(
            "username",
            "may only contain letters, digits, '_', '.' and '-'",
        ));
    }
    Ok(())
}

pub fn password(value: &str) -> Result<(), ValidationError> {
    if value.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::new(
            "password",
            format!("must be at least {MIN_PASSWORD_LEN} characters"),
        ));
    }
    Ok(())
}

pub fn feature_description(value: &str) -> Result<(), ValidationError> {
    required("description", value)
}

/// Featured images are referenced by a relative path to an image file.
pub fn image_path(value: &str) -> Result<(), ValidationError> {
    required("image", value)?;

    let path = std::path::Path::new(value);
    if path.is_absolute() || path.components().any(|c| c.as_os_str() == "..") {
        return Err(ValidationError::new("image", "must be a relative path"));
    }

    let is_image = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
    if !is_image {
        return Err(ValidationError::new("image", "uploaded file must be an image"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title() {
        assert!(title("Heat").is_ok());
        assert!(title("   ").is_err());
        assert!(title(&"x".repeat(MAX_TITLE_LEN)).is_ok());
        assert_eq!(
            title(&"x".repeat(MAX_TITLE_LEN + 1)).unwrap_err().to_string(),
            "title: max 128 characters"
        );
    }

    #[test]
    fn test_comment_and_announcement() {
        assert!(comment("").is_ok());
        assert!(comment(&"c".repeat(MAX_COMMENT_LEN + 1)).is_err());
        assert!(announcement("").is_err());
        assert!(announcement("Maintenance tonight").is_ok());
    }

    #[test]
    fn test_credentials() {
        assert!(username("ab").is_err());
        assert!(username("film_fan.42").is_ok());
        assert!(username("no spaces").is_err());
        assert!(password("short").is_err());
        assert!(password("long enough").is_ok());
    }

    #[test]
    fn test_image_path() {
        assert!(image_path("images/uploads/poster.PNG").is_ok());
        assert!(image_path("images/uploads/notes.txt").is_err());
        assert!(image_path("/etc/poster.png").is_err());
        assert!(image_path("../poster.png").is_err());
        assert!(image_path("").is_err());
    }
}
