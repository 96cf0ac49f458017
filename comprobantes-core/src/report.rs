//! Structured reports for terminal submission outcomes.
//!
//! Reports keep the authority's Spanish keys (`mensaje`, `error`, `data`) and
//! are encoded with `serde_json`, so quoting is always handled by the encoder.
use crate::api::{AuthorityMessage, AuthorizationRecord, RECEIVED};
use crate::document::validation::FieldError;
use crate::workflow::{Authorization, Outcome, Rejection, WorkflowError};
use serde::Serialize;

pub const AUTHORIZED_MESSAGE: &str = "Se recibieron autorizaciones";
pub const REJECTED_MESSAGE: &str = "Estado diferente a recibido";
pub const XML_ERROR_MESSAGE: &str = "Error creando archivo XML.";
pub const SIGNING_ERROR_MESSAGE: &str = "Error firmando archivo.";
pub const SIGNED_FILE_ERROR_MESSAGE: &str = "Error convirtiendo archivo a bytes.";
pub const TRANSPORT_ERROR_MESSAGE: &str =
    "Error en respuesta de solicitud. Puede ser error del servidor del SRI intentelo de nuevo. Revise los logs.";
pub const NOT_RECEIVED_MESSAGE: &str = "Respuesta solicitud NO recibida.";
pub const SERVER_ERROR_MESSAGE: &str = "Error del servidor.";
pub const ENVIRONMENT_MISMATCH_MESSAGE: &str =
    "Ambiente del comprobante no coincide con el ambiente configurado.";

/// `{mensaje, error, data}` answer for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    #[serde(rename = "mensaje")]
    pub message: String,
    /// HTTP-like code; `null` on success.
    #[serde(rename = "error")]
    pub code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ReportData>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ReportData {
    ValidationErrors {
        #[serde(rename = "errores")]
        errors: Vec<FieldError>,
    },
    ParseFailure {
        message: String,
        cause: String,
    },
    Authorized(AuthorizedData),
    Rejected(RejectedData),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizedData {
    #[serde(rename = "estadoSolicitud")]
    pub request_status: String,
    #[serde(rename = "claveAccesoConsultada")]
    pub queried_key: String,
    #[serde(rename = "numeroComprobantes")]
    pub document_count: String,
    #[serde(rename = "autorizaciones")]
    pub authorizations: Vec<AuthorizationEntry>,
    #[serde(rename = "claveAcceso")]
    pub access_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizationEntry {
    #[serde(rename = "numeroAutorizacion")]
    pub authorization_number: String,
    pub comprobante: String,
    pub estado: String,
    #[serde(rename = "fechaAutorizacion")]
    pub authorized_at: String,
    #[serde(rename = "xmlCompleto")]
    pub full_xml: String,
    #[serde(rename = "mensajes")]
    pub messages: Vec<MessageEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedData {
    pub comprobante: String,
    #[serde(rename = "estadoSolicitud")]
    pub request_status: String,
    #[serde(rename = "mensajes")]
    pub messages: Vec<MessageEntry>,
}

/// Authority message as echoed in reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageEntry {
    #[serde(rename = "tipo")]
    pub kind: String,
    #[serde(rename = "identificador")]
    pub identifier: String,
    #[serde(rename = "informacionAdicional")]
    pub additional_info: Option<String>,
    #[serde(rename = "mensaje")]
    pub message: String,
    #[serde(rename = "xmlCompleto", skip_serializing_if = "Option::is_none")]
    pub full_xml: Option<String>,
}

impl MessageEntry {
    fn new(message: &AuthorityMessage, full_xml: Option<&str>) -> Self {
        Self {
            kind: message.kind.clone(),
            identifier: message.identifier.clone(),
            additional_info: message.additional_info.as_deref().map(sanitize),
            message: sanitize(&message.message),
            full_xml: full_xml.map(sanitize),
        }
    }
}

/// Drops raw carriage returns and newlines from text embedded in a report.
pub fn sanitize(text: &str) -> String {
    text.chars().filter(|c| !matches!(c, '\r' | '\n')).collect()
}

impl Report {
    fn plain(message: &str, code: u16) -> Self {
        Self {
            message: message.to_string(),
            code: Some(code),
            data: None,
        }
    }

    /// Maps a terminal failure to its report.
    pub fn from_error(error: &WorkflowError) -> Self {
        let code = error.code();
        match error {
            WorkflowError::Parse { kind, source } => Self {
                message: parse_message(kind.label()),
                code: Some(code),
                data: Some(ReportData::ParseFailure {
                    message: sanitize(&source.message()),
                    cause: sanitize(&source.cause()),
                }),
            },
            WorkflowError::Validation(validation) => Self {
                message: parse_message(validation.kind.label()),
                code: Some(code),
                data: Some(ReportData::ValidationErrors {
                    errors: validation
                        .errors
                        .iter()
                        .map(|e| FieldError::new(e.field.clone(), sanitize(&e.message)))
                        .collect(),
                }),
            },
            WorkflowError::EnvironmentMismatch {
                document,
                configured,
            } => Self {
                message: ENVIRONMENT_MISMATCH_MESSAGE.to_string(),
                code: Some(code),
                data: Some(ReportData::ValidationErrors {
                    errors: vec![FieldError::new(
                        "infoTributario.ambiente",
                        format!("ambiente {document} no coincide con {configured}"),
                    )],
                }),
            },
            WorkflowError::Xml(_) | WorkflowError::StoreXml(_) => {
                Self::plain(XML_ERROR_MESSAGE, code)
            }
            WorkflowError::Signing(_) => Self::plain(SIGNING_ERROR_MESSAGE, code),
            WorkflowError::StoreSigned(_) | WorkflowError::ReadSigned(_) => {
                Self::plain(SIGNED_FILE_ERROR_MESSAGE, code)
            }
            WorkflowError::Transport(_) => Self::plain(TRANSPORT_ERROR_MESSAGE, code),
            WorkflowError::AuthorizationNotReceived(_) => Self::plain(NOT_RECEIVED_MESSAGE, code),
            WorkflowError::Internal { message, cause } => Self {
                message: SERVER_ERROR_MESSAGE.to_string(),
                code: Some(code),
                data: Some(ReportData::ParseFailure {
                    message: sanitize(message),
                    cause: sanitize(cause),
                }),
            },
        }
    }

    pub fn authorized(authorization: &Authorization) -> Self {
        let response = &authorization.response;
        let authorizations = response
            .authorizations
            .iter()
            .zip(&authorization.envelopes)
            .map(|(record, envelope)| authorization_entry(record, envelope))
            .collect();
        Self {
            message: AUTHORIZED_MESSAGE.to_string(),
            code: None,
            data: Some(ReportData::Authorized(AuthorizedData {
                request_status: RECEIVED.to_string(),
                queried_key: response.queried_key.clone(),
                document_count: response.document_count.clone(),
                authorizations,
                access_key: authorization.access_key.to_string(),
            })),
        }
    }

    pub fn rejected(rejection: &Rejection) -> Self {
        Self {
            message: REJECTED_MESSAGE.to_string(),
            code: Some(400),
            data: Some(ReportData::Rejected(RejectedData {
                comprobante: sanitize(&rejection.comprobante),
                request_status: rejection.status.clone(),
                messages: rejection
                    .messages
                    .iter()
                    .map(|m| MessageEntry::new(&m.message, m.full_xml.as_deref()))
                    .collect(),
            })),
        }
    }

    pub fn from_outcome(outcome: &Outcome) -> Self {
        match outcome {
            Outcome::Authorized { authorization, .. } => Self::authorized(authorization),
            Outcome::Rejected { rejection, .. } => Self::rejected(rejection),
            Outcome::Failed { error, .. } => Self::from_error(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.code.is_some()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

fn parse_message(label: &str) -> String {
    format!("Errores en parseo de {label}.")
}

fn authorization_entry(record: &AuthorizationRecord, envelope: &str) -> AuthorizationEntry {
    AuthorizationEntry {
        authorization_number: record.authorization_number.clone(),
        comprobante: sanitize(&record.comprobante),
        estado: record.estado.clone(),
        authorized_at: record.authorized_at.clone(),
        full_xml: sanitize(envelope),
        messages: record
            .messages
            .iter()
            .map(|m| MessageEntry::new(m, None))
            .collect(),
    }
}
