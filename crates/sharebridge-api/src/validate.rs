//! Request-body field checks. Each returns the cleaned (trimmed) value.

use crate::error::ApiError;

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_NAME_LEN: usize = 100;
pub const MAX_TITLE_LEN: usize = 120;
pub const MAX_DESCRIPTION_LEN: usize = 2000;
pub const MAX_MESSAGE_LEN: usize = 2000;
pub const MAX_SHORT_TEXT_LEN: usize = 500;

pub fn email(raw: &str) -> Result<String, ApiError> {
    let email = raw.trim().to_lowercase();
    let valid = email.len() <= 254
        && !email.contains(char::is_whitespace)
        && email
            .split_once('@')
            .is_some_and(|(local, domain)| {
                !local.is_empty()
                    && domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
                    && !domain.contains('@')
            });
    if valid {
        Ok(email)
    } else {
        Err(ApiError::bad_request("invalid email address"))
    }
}

pub fn password(raw: &str) -> Result<(), ApiError> {
    if raw.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

pub fn name(raw: &str) -> Result<String, ApiError> {
    required("name", raw, MAX_NAME_LEN)
}

pub fn title(raw: &str) -> Result<String, ApiError> {
    required("title", raw, MAX_TITLE_LEN)
}

pub fn description(raw: &str) -> Result<String, ApiError> {
    let description = raw.trim();
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(ApiError::bad_request(format!(
            "description must be at most {MAX_DESCRIPTION_LEN} characters"
        )));
    }
    Ok(description.to_string())
}

pub fn message_content(raw: &str) -> Result<String, ApiError> {
    required("content", raw, MAX_MESSAGE_LEN)
}

pub fn quantity(quantity: Option<u32>) -> Result<Option<u32>, ApiError> {
    match quantity {
        Some(0) => Err(ApiError::bad_request("quantity must be at least 1")),
        other => Ok(other),
    }
}

/// Optional free text (phone, address, image URL). Blank means "none".
pub fn optional(field: &str, raw: Option<String>) -> Result<Option<String>, ApiError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let value = raw.trim();
    if value.is_empty() {
        return Ok(None);
    }
    if value.chars().count() > MAX_SHORT_TEXT_LEN {
        return Err(ApiError::bad_request(format!(
            "{field} must be at most {MAX_SHORT_TEXT_LEN} characters"
        )));
    }
    Ok(Some(value.to_string()))
}

fn required(field: &str, raw: &str, max: usize) -> Result<String, ApiError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(ApiError::bad_request(format!("{field} is required")));
    }
    if value.chars().count() > max {
        return Err(ApiError::bad_request(format!("{field} must be at most {max} characters")));
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails() {
        assert_eq!(email("  Jane.Doe@Example.ORG ").unwrap(), "jane.doe@example.org");
        for bad in ["", "jane", "jane@", "@example.org", "jane@example", "ja ne@example.org", "a@b@c.org", "a@.org"] {
            assert!(email(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn passwords_need_eight_chars() {
        assert!(password("short").is_err());
        assert!(password("long enough").is_ok());
    }

    #[test]
    fn required_fields_are_trimmed_and_bounded() {
        assert_eq!(title("  Sofa ").unwrap(), "Sofa");
        assert!(title("   ").is_err());
        assert!(title(&"x".repeat(MAX_TITLE_LEN + 1)).is_err());
        assert!(message_content(&"y".repeat(MAX_MESSAGE_LEN)).is_ok());
    }

    #[test]
    fn optional_blank_is_none() {
        assert_eq!(optional("phone", Some("   ".into())).unwrap(), None);
        assert_eq!(optional("phone", None).unwrap(), None);
        assert_eq!(optional("phone", Some(" 555 ".into())).unwrap(), Some("555".into()));
    }

    #[test]
    fn zero_quantity_rejected() {
        assert!(quantity(Some(0)).is_err());
        assert_eq!(quantity(Some(3)).unwrap(), Some(3));
        assert_eq!(quantity(None).unwrap(), None);
    }
}
