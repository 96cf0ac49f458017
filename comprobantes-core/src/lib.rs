//! Electronic tax documents for the SRI (Ecuador): access keys, document
//! validation, canonical XML and the sign/submit/authorize workflow.
//!
//! # Examples
//! ```rust
//! use comprobantes_core::access_key::{generate, AccessKeyInput};
//! use chrono::NaiveDate;
//!
//! let input = AccessKeyInput {
//!     issue_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
//!     document_type: "01",
//!     ruc: "1790012345001",
//!     environment: "1",
//!     establishment_point: "001001",
//!     sequential: "1",
//!     numeric_code: "12345678",
//!     emission_type: "1",
//! };
//! let key = generate(&input).unwrap();
//! assert_eq!(key.as_str(), "0101202401179001234500110010010000000011234567819");
//! ```
extern crate self as comprobantes_core;

pub mod access_key;
pub mod api;
pub mod config;
pub mod document;
pub mod report;
pub mod store;
pub mod workflow;

use thiserror::Error;

/// Top-level error wrapper for core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Document(#[from] document::DocumentError),
    #[error(transparent)]
    Key(#[from] access_key::KeyGenerationError),
    #[error(transparent)]
    Xml(#[from] document::xml::DocumentXmlError),
    #[error(transparent)]
    Signing(#[from] document::sign::SigningError),
    #[error(transparent)]
    Transport(#[from] api::TransportError),
    #[error(transparent)]
    Authorization(#[from] api::AuthorizationError),
    #[error(transparent)]
    Artifact(#[from] store::ArtifactError),
    #[error(transparent)]
    Request(#[from] document::RequestParseError),
    #[error(transparent)]
    Environment(#[from] config::EnvironmentParseError),
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Workflow(#[from] workflow::WorkflowError),
}

#[cfg(test)]
mod tests {
    use super::Error;
    use crate::access_key::KeyGenerationError;
    use crate::api::{AuthorizationError, TransportError};
    use crate::config::{ConfigError, EnvironmentParseError};
    use crate::document::sign::SigningError;
    use crate::document::xml::DocumentXmlError;
    use crate::document::{DocumentError, DocumentKind, RequestParseError, ValidationError};
    use crate::store::ArtifactError;
    use crate::workflow::WorkflowError;
    use quick_xml::se::SeError;
    use std::time::Duration;

    #[test]
    fn error_conversions_cover_variants() {
        let err: Error = DocumentError::Validation(ValidationError::new(
            DocumentKind::Invoice,
            vec![],
        ))
        .into();
        assert!(matches!(err, Error::Document(_)));

        let err: Error = KeyGenerationError::InvalidKey {
            reason: "short".into(),
        }
        .into();
        assert!(matches!(err, Error::Key(_)));

        let err: Error = DocumentXmlError::Serialize {
            source: SeError::Custom("xml".into()),
        }
        .into();
        assert!(matches!(err, Error::Xml(_)));

        let err: Error = SigningError::Rejected("sign".into()).into();
        assert!(matches!(err, Error::Signing(_)));

        let err: Error = TransportError::Timeout(Duration::from_secs(1)).into();
        assert!(matches!(err, Error::Transport(_)));

        let err: Error = AuthorizationError::NotReceived("none".into()).into();
        assert!(matches!(err, Error::Authorization(_)));

        let err: Error = ArtifactError::Timeout(Duration::from_secs(1)).into();
        assert!(matches!(err, Error::Artifact(_)));

        let err: Error = RequestParseError::MissingSection {
            section: "infoFactura",
        }
        .into();
        assert!(matches!(err, Error::Request(_)));

        let err: Error = EnvironmentParseError::Invalid {
            input: "pruebas2".into(),
        }
        .into();
        assert!(matches!(err, Error::Environment(_)));

        let err: Error = ConfigError::from(EnvironmentParseError::Invalid {
            input: "3".into(),
        })
        .into();
        assert!(matches!(err, Error::Config(_)));

        let err: Error = WorkflowError::Internal {
            message: "boom".into(),
            cause: "null".into(),
        }
        .into();
        assert!(matches!(err, Error::Workflow(_)));
    }
}
