use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldErrorKind {
    Missing,
    InvalidFormat,
    OutOfRange,
}

/// Boundary validation failure for a single request field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct FieldError {
    pub field: String,
    pub kind: FieldErrorKind,
    pub message: String,
}

impl FieldError {
    pub fn missing(field: &str) -> Self {
        Self {
            field: field.to_string(),
            kind: FieldErrorKind::Missing,
            message: format!("{field} is required"),
        }
    }

    pub fn invalid_format(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            kind: FieldErrorKind::InvalidFormat,
            message: message.into(),
        }
    }

    pub fn out_of_range(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            kind: FieldErrorKind::OutOfRange,
            message: message.into(),
        }
    }
}

pub fn validate_http_url(field: &str, value: &str, max_len: usize) -> Result<url::Url, FieldError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(FieldError::missing(field));
    }
    if trimmed.len() > max_len {
        return Err(FieldError::out_of_range(
            field,
            format!("{field} must be at most {max_len} characters"),
        ));
    }

    let parsed = url::Url::parse(trimmed)
        .map_err(|_| FieldError::invalid_format(field, format!("{field} must be a valid URL")))?;

    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(FieldError::invalid_format(
            field,
            format!("{field} must be an http(s) URL with a host"),
        ));
    }

    Ok(parsed)
}

pub fn validate_hex_color(field: &str, value: &str) -> Result<(), FieldError> {
    let digits = value.strip_prefix('#').unwrap_or("");
    if digits.len() == 6 && digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Ok(());
    }
    Err(FieldError::invalid_format(
        field,
        format!("{field} must be a #RRGGBB color"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_urls_need_scheme_and_host() {
        assert!(validate_http_url("url", "https://a.com", 2048).is_ok());
        assert_eq!(
            validate_http_url("url", "  ", 2048).unwrap_err().kind,
            FieldErrorKind::Missing
        );
        assert_eq!(
            validate_http_url("url", "ftp://a.com", 2048).unwrap_err().kind,
            FieldErrorKind::InvalidFormat
        );
        assert_eq!(
            validate_http_url("url", "not a url", 2048).unwrap_err().kind,
            FieldErrorKind::InvalidFormat
        );
        assert_eq!(
            validate_http_url("url", "https://a.com/very-long", 10).unwrap_err().kind,
            FieldErrorKind::OutOfRange
        );
    }

    #[test]
    fn colors_must_be_six_hex_digits() {
        assert!(validate_hex_color("foregroundColor", "#00ffAA").is_ok());
        assert!(validate_hex_color("foregroundColor", "00ffAA").is_err());
        assert!(validate_hex_color("foregroundColor", "#00ffA").is_err());
        assert!(validate_hex_color("foregroundColor", "#00ffAZ").is_err());
    }
}
