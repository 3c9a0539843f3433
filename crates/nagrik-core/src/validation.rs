//! Input validation shared by the client components.
//!
//! Validation failures are rejected before any backend request is issued.

use thiserror::Error;

const MAX_MESSAGE_LEN: usize = 4000;
const MAX_DOCUMENT_TYPE_LEN: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Message body is empty")]
    EmptyMessage,

    #[error("Message body exceeds {MAX_MESSAGE_LEN} characters")]
    MessageTooLong,

    #[error("Invalid document type: {0}")]
    InvalidDocumentType(String),
}

/// Trim an outgoing message body and reject it if nothing remains.
pub fn normalize_message_body(body: &str) -> Result<String, ValidationError> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyMessage);
    }
    if trimmed.chars().count() > MAX_MESSAGE_LEN {
        return Err(ValidationError::MessageTooLong);
    }
    Ok(trimmed.to_string())
}

/// Document types come from the caller and end up in storage paths, so only
/// a conservative charset is accepted.
pub fn validate_document_type(document_type: &str) -> Result<(), ValidationError> {
    if document_type.is_empty()
        || document_type.len() > MAX_DOCUMENT_TYPE_LEN
        || !document_type
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidDocumentType(
            document_type.to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_message_body_trims() {
        assert_eq!(normalize_message_body("  hello  ").unwrap(), "hello");
    }

    #[test]
    fn test_normalize_message_body_rejects_empty() {
        assert_eq!(
            normalize_message_body(""),
            Err(ValidationError::EmptyMessage)
        );
        assert_eq!(
            normalize_message_body("   "),
            Err(ValidationError::EmptyMessage)
        );
        assert_eq!(
            normalize_message_body("\n\t "),
            Err(ValidationError::EmptyMessage)
        );
    }

    #[test]
    fn test_normalize_message_body_rejects_oversized() {
        let long = "x".repeat(MAX_MESSAGE_LEN + 1);
        assert_eq!(
            normalize_message_body(&long),
            Err(ValidationError::MessageTooLong)
        );
    }

    #[test]
    fn test_validate_document_type() {
        assert!(validate_document_type("identity").is_ok());
        assert!(validate_document_type("income_proof").is_ok());
        assert!(validate_document_type("ration-card").is_ok());
        assert!(validate_document_type("").is_err());
        assert!(validate_document_type("../etc").is_err());
        assert!(validate_document_type("a b").is_err());
        assert!(validate_document_type(&"x".repeat(65)).is_err());
    }
}
