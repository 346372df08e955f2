use serde::{Deserialize, Serialize};
use std::fmt;

/// One submission from the UI shell. Lives for the duration of a single run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub email: String,
    /// Trimmed sector label.
    pub sector: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    InvalidEmail,
    MissingSector,
}

impl ValidationError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ValidationError::InvalidEmail => "❌ Please enter a valid email address.",
            ValidationError::MissingSector => "❌ Please enter an investment sector.",
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::InvalidEmail => write!(f, "email address must contain '@'"),
            ValidationError::MissingSector => write!(f, "sector must be non-empty"),
        }
    }
}

impl std::error::Error for ValidationError {}

impl AnalysisRequest {
    pub fn validate(email: &str, sector: &str) -> Result<Self, ValidationError> {
        if email.is_empty() || !email.contains('@') {
            return Err(ValidationError::InvalidEmail);
        }

        let sector = sector.trim();
        if sector.is_empty() {
            return Err(ValidationError::MissingSector);
        }

        Ok(Self {
            email: email.to_string(),
            sector: sector.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_sector() {
        let req = AnalysisRequest::validate("a@b.com", "  Technology \n").unwrap();
        assert_eq!(req.sector, "Technology");
        assert_eq!(req.email, "a@b.com");
    }

    #[test]
    fn rejects_email_without_at() {
        for email in ["", "someone", "someone.example.com"] {
            assert_eq!(
                AnalysisRequest::validate(email, "Energy"),
                Err(ValidationError::InvalidEmail)
            );
        }
    }

    #[test]
    fn rejects_blank_sector() {
        for sector in ["", "   ", "\t\n"] {
            assert_eq!(
                AnalysisRequest::validate("a@b.com", sector),
                Err(ValidationError::MissingSector)
            );
        }
    }

    #[test]
    fn email_is_checked_before_sector() {
        assert_eq!(
            AnalysisRequest::validate("nope", ""),
            Err(ValidationError::InvalidEmail)
        );
    }
}
