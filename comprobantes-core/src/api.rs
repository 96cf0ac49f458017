//! Reception and authorization collaborators.
//!
//! Transport bindings (SOAP over HTTP) live outside this crate; they implement
//! [`ReceptionClient`] and [`AuthorizationClient`] and map their answers into
//! the response types below.
use crate::access_key::AccessKey;
use async_trait::async_trait;
use base64ct::{Base64, Encoding};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub const RECEIVED: &str = "RECIBIDA";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("endpoint unreachable: {0}")]
    Unreachable(String),
    #[error("no answer within {0:?}")]
    Timeout(Duration),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Error)]
pub enum AuthorizationError {
    /// The authority has no authorization for the key.
    #[error("authorization not received: {0}")]
    NotReceived(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Message attached by the authority to a document or authorization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorityMessage {
    #[serde(rename = "identificador")]
    pub identifier: String,
    #[serde(rename = "mensaje")]
    pub message: String,
    #[serde(rename = "informacionAdicional", default)]
    pub additional_info: Option<String>,
    #[serde(rename = "tipo")]
    pub kind: String,
}

impl AuthorityMessage {
    /// `43`/`45`: the key already has an authorization on file.
    pub fn is_already_authorized(&self) -> bool {
        matches!(self.identifier.trim(), "43" | "45")
    }
}

/// Per-document section of a reception answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedDocument {
    #[serde(rename = "claveAcceso")]
    pub access_key: String,
    #[serde(rename = "mensajes", default)]
    pub messages: Vec<AuthorityMessage>,
}

/// Answer of the reception endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceptionResponse {
    pub estado: String,
    #[serde(default)]
    pub comprobantes: Vec<ReceivedDocument>,
}

impl ReceptionResponse {
    pub fn received() -> Self {
        Self {
            estado: RECEIVED.to_string(),
            comprobantes: Vec::new(),
        }
    }

    pub fn is_received(&self) -> bool {
        self.estado.trim() == RECEIVED
    }

    /// Every message across all documents, in answer order.
    pub fn messages(&self) -> impl Iterator<Item = &AuthorityMessage> {
        self.comprobantes.iter().flat_map(|doc| doc.messages.iter())
    }
}

/// One authorization issued (or refused) for an access key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRecord {
    pub estado: String,
    #[serde(rename = "numeroAutorizacion")]
    pub authorization_number: String,
    #[serde(rename = "fechaAutorizacion")]
    pub authorized_at: String,
    #[serde(default)]
    pub ambiente: Option<String>,
    pub comprobante: String,
    #[serde(rename = "mensajes", default)]
    pub messages: Vec<AuthorityMessage>,
}

/// Answer of the authorization endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationResponse {
    #[serde(rename = "claveAccesoConsultada")]
    pub queried_key: String,
    #[serde(rename = "numeroComprobantes")]
    pub document_count: String,
    #[serde(rename = "autorizaciones", default)]
    pub authorizations: Vec<AuthorizationRecord>,
}

#[async_trait]
pub trait ReceptionClient: Send + Sync {
    async fn submit(&self, signed: &[u8]) -> Result<ReceptionResponse, TransportError>;
}

#[async_trait]
pub trait AuthorizationClient: Send + Sync {
    async fn authorize(&self, key: &AccessKey) -> Result<AuthorizationResponse, AuthorizationError>;
}

/// Base64 form of signed bytes, as carried in the reception request body.
pub fn encode_signed_payload(signed: &[u8]) -> String {
    Base64::encode_string(signed)
}
