//! Serialize, sign, submit and authorize a document.
//!
//! One [`SubmissionWorkflow`] run drives a single finalized document through
//! the stages below, awaiting every collaborator call before moving on:
//!
//! `Built -> Serialized -> Signed -> Submitted -> Received(status) -> AuthorizationRequested`
//!
//! and ends in an [`Outcome`]. Nothing is retried; a retry is a fresh run with
//! the same document, which keeps its access key.
use crate::access_key::AccessKey;
use crate::api::{
    AuthorityMessage, AuthorizationClient, AuthorizationError, AuthorizationResponse,
    ReceptionClient, TransportError,
};
use crate::config::Config;
use crate::document::sign::{sign_within, SignerCredential, SigningError, SigningGateway};
use crate::document::validation::FieldError;
use crate::document::xml::envelope::{authorization_timestamp, authorized_envelope, Envelope};
use crate::document::xml::{DocumentXmlError, ToXml};
use crate::document::{
    Document, DocumentError, DocumentKind, FinalizedDocument, RequestParseError, ValidationError,
};
use crate::report::Report;
use crate::store::{ArtifactError, ArtifactLocation, ArtifactStore};
use chrono::{Local, NaiveDateTime};
use serde::Deserialize;
use serde_json::Value;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

/// Non-terminal states a run passes through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Built,
    Serialized,
    Signed,
    Submitted,
    /// Status token returned by reception, or the transport failure reason
    /// when no answer arrived.
    Received(String),
    AuthorizationRequested,
}

/// Why a run ended without an authority verdict.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{kind} request could not be decoded: {source}")]
    Parse {
        kind: DocumentKind,
        source: RequestParseError,
    },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("document environment {document} does not match configured environment {configured}")]
    EnvironmentMismatch { document: String, configured: String },
    #[error(transparent)]
    Xml(#[from] DocumentXmlError),
    #[error("failed to store generated XML: {0}")]
    StoreXml(#[source] ArtifactError),
    #[error(transparent)]
    Signing(#[from] SigningError),
    #[error("failed to store signed XML: {0}")]
    StoreSigned(#[source] ArtifactError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("authorization not received: {0}")]
    AuthorizationNotReceived(String),
    #[error("failed to read signed XML: {0}")]
    ReadSigned(#[source] ArtifactError),
    /// Server-side fault; `cause` is the underlying error, or `null` when there is none.
    #[error("unexpected failure: {message}")]
    Internal { message: String, cause: String },
}

impl WorkflowError {
    /// Report code: 400 for caller mistakes, 500 otherwise.
    pub fn code(&self) -> u16 {
        match self {
            WorkflowError::Parse { .. }
            | WorkflowError::Validation(_)
            | WorkflowError::EnvironmentMismatch { .. } => 400,
            _ => 500,
        }
    }

    /// Wraps an unexpected error, keeping its source as the cause.
    pub fn internal(err: &(dyn std::error::Error + 'static)) -> Self {
        WorkflowError::Internal {
            message: err.to_string(),
            cause: err
                .source()
                .map_or_else(|| "null".to_string(), |source| source.to_string()),
        }
    }

    /// Only a supplied `claveAcceso` is the caller's fault; a key that cannot
    /// be generated from a validated document points at the configuration.
    fn from_document(kind: DocumentKind, err: DocumentError) -> Self {
        match err {
            DocumentError::Validation(validation) => WorkflowError::Validation(validation),
            supplied @ (DocumentError::SuppliedKey(_) | DocumentError::KeyMismatch { .. }) => {
                WorkflowError::Validation(ValidationError::new(
                    kind,
                    vec![FieldError::new(
                        "infoTributario.claveAcceso",
                        format!("claveAcceso invalida: {supplied}"),
                    )],
                ))
            }
            DocumentError::Key(key) => WorkflowError::internal(&key),
        }
    }
}

impl From<AuthorizationError> for WorkflowError {
    fn from(err: AuthorizationError) -> Self {
        match err {
            AuthorizationError::NotReceived(reason) => WorkflowError::AuthorizationNotReceived(reason),
            AuthorizationError::Transport(transport) => WorkflowError::Transport(transport),
        }
    }
}

/// Reception refused the document.
#[derive(Debug, Clone)]
pub struct Rejection {
    pub access_key: AccessKey,
    /// Status token returned by reception.
    pub status: String,
    /// Canonical XML of the document as submitted for signing.
    pub comprobante: String,
    pub messages: Vec<RejectedMessage>,
}

#[derive(Debug, Clone)]
pub struct RejectedMessage {
    pub message: AuthorityMessage,
    /// Synthesized authorization envelope when the key is already authorized.
    pub full_xml: Option<String>,
}

/// Authorization answer for an accepted document.
#[derive(Debug, Clone)]
pub struct Authorization {
    pub access_key: AccessKey,
    pub response: AuthorizationResponse,
    /// One `<autorizacion>` envelope per record, same order as the records.
    pub envelopes: Vec<String>,
}

/// Terminal result of one run.
#[derive(Debug)]
pub enum Outcome {
    Authorized {
        authorization: Authorization,
        trail: Vec<Stage>,
    },
    Rejected {
        rejection: Rejection,
        trail: Vec<Stage>,
    },
    Failed {
        error: WorkflowError,
        trail: Vec<Stage>,
    },
}

impl Outcome {
    pub fn trail(&self) -> &[Stage] {
        match self {
            Outcome::Authorized { trail, .. }
            | Outcome::Rejected { trail, .. }
            | Outcome::Failed { trail, .. } => trail,
        }
    }

    pub fn is_authorized(&self) -> bool {
        matches!(self, Outcome::Authorized { .. })
    }

    pub fn error(&self) -> Option<&WorkflowError> {
        match self {
            Outcome::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Per-request settings: artifact locations and signer credential.
#[derive(Debug, Clone)]
pub struct SubmissionOptions {
    pub location: ArtifactLocation,
    pub credential: SignerCredential,
}

#[derive(Deserialize)]
struct RawOptions {
    #[serde(flatten)]
    location: ArtifactLocation,
    #[serde(rename = "clave", default)]
    password: String,
    #[serde(rename = "directorioYNombreArchivoRegistroCivilP12", default)]
    keystore: PathBuf,
}

impl SubmissionOptions {
    pub fn new(location: ArtifactLocation, credential: SignerCredential) -> Self {
        Self {
            location,
            credential,
        }
    }

    /// Reads the option keys of an inbound request.
    pub fn from_value(value: &Value) -> Result<Self, RequestParseError> {
        let raw = RawOptions::deserialize(value)?;
        Ok(Self {
            location: raw.location,
            credential: SignerCredential::new(raw.keystore, raw.password),
        })
    }
}

/// Drives documents through signing, reception and authorization.
///
/// Collaborators are shared read-only; independent runs may execute
/// concurrently on clones of the same workflow.
#[derive(Clone)]
pub struct SubmissionWorkflow {
    config: Arc<Config>,
    signer: Arc<dyn SigningGateway>,
    reception: Arc<dyn ReceptionClient>,
    authorization: Arc<dyn AuthorizationClient>,
    store: Arc<dyn ArtifactStore>,
}

impl SubmissionWorkflow {
    pub fn new(
        config: Config,
        signer: Arc<dyn SigningGateway>,
        reception: Arc<dyn ReceptionClient>,
        authorization: Arc<dyn AuthorizationClient>,
        store: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            signer,
            reception,
            authorization,
            store,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Decodes an inbound JSON request and submits it.
    pub async fn submit_json(&self, kind: DocumentKind, json: &str) -> Report {
        let parsed = serde_json::from_str::<Value>(json)
            .map_err(RequestParseError::from)
            .and_then(|value| {
                let document = Document::from_value(kind, &value)?;
                let options = SubmissionOptions::from_value(&value)?;
                Ok((document, options))
            });
        match parsed {
            Ok((document, options)) => self.submit(document, options).await,
            Err(source) => {
                let error = WorkflowError::Parse { kind, source };
                warn!(error = %error, "request rejected before validation");
                Report::from_error(&error)
            }
        }
    }

    /// Finalizes and runs `document`, mapping the outcome into a report.
    ///
    /// The run executes on its own task so that a panic inside a collaborator
    /// surfaces as a generic server error.
    pub async fn submit(&self, document: Document, options: SubmissionOptions) -> Report {
        let workflow = self.clone();
        let handle = tokio::spawn(async move {
            let kind = document.kind();
            match document.finalize(&workflow.config) {
                Ok(finalized) => workflow.run(finalized, &options).await,
                Err(err) => {
                    let error = WorkflowError::from_document(kind, err);
                    if error.code() == 400 {
                        warn!(kind = %kind, error = %error, "document rejected by validation");
                    } else {
                        error!(kind = %kind, error = %error, "document could not be finalized");
                    }
                    Outcome::Failed {
                        error,
                        trail: vec![Stage::Built],
                    }
                }
            }
        });
        match handle.await {
            Ok(outcome) => Report::from_outcome(&outcome),
            Err(join_error) => {
                error!(error = %join_error, "submission task failed");
                Report::from_error(&WorkflowError::internal(&join_error))
            }
        }
    }

    /// Runs a finalized document to a terminal outcome.
    #[instrument(
        name = "submission",
        skip(self, document, options),
        fields(kind = %document.kind(), access_key = %document.access_key())
    )]
    pub async fn run(&self, document: FinalizedDocument, options: &SubmissionOptions) -> Outcome {
        let mut trail = vec![Stage::Built];
        match self.drive(document, options, &mut trail).await {
            Ok(Verdict::Authorized(authorization)) => {
                info!(records = authorization.response.authorizations.len(), "authorized");
                Outcome::Authorized {
                    authorization,
                    trail,
                }
            }
            Ok(Verdict::Rejected(rejection)) => {
                warn!(status = %rejection.status, messages = rejection.messages.len(), "rejected");
                Outcome::Rejected { rejection, trail }
            }
            Err(error) => {
                match &error {
                    WorkflowError::Signing(_) | WorkflowError::Internal { .. } => {
                        error!(error = %error, "submission failed")
                    }
                    _ => warn!(error = %error, "submission failed"),
                }
                Outcome::Failed { error, trail }
            }
        }
    }

    fn ensure_env(&self, document: &Document) -> Result<(), WorkflowError> {
        let configured = self.config.env().code();
        let declared = document.tax_info.environment.trim();
        if declared != configured {
            return Err(WorkflowError::EnvironmentMismatch {
                document: declared.to_string(),
                configured: configured.to_string(),
            });
        }
        Ok(())
    }

    async fn bounded<F, T, E>(&self, call: F, on_timeout: impl FnOnce(Duration) -> E) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
    {
        let deadline = self.config.call_timeout();
        match tokio::time::timeout(deadline, call).await {
            Ok(result) => result,
            Err(_) => Err(on_timeout(deadline)),
        }
    }

    async fn drive(
        &self,
        document: FinalizedDocument,
        options: &SubmissionOptions,
        trail: &mut Vec<Stage>,
    ) -> Result<Verdict, WorkflowError> {
        self.ensure_env(document.document())?;
        let key = document.access_key().clone();
        let location = &options.location;

        let xml = document.to_xml()?;
        self.bounded(
            self.store.write_xml(location, key.as_str(), &xml),
            ArtifactError::Timeout,
        )
        .await
        .map_err(WorkflowError::StoreXml)?;
        trail.push(Stage::Serialized);
        info!(stage = "serialized", bytes = xml.len());

        let signed = sign_within(
            self.signer.as_ref(),
            xml.as_bytes(),
            &options.credential,
            self.config.call_timeout(),
        )
        .await?;
        self.bounded(
            self.store.write_signed(location, key.as_str(), &signed),
            ArtifactError::Timeout,
        )
        .await
        .map_err(WorkflowError::StoreSigned)?;
        let signed = document.into_signed(xml, signed);
        trail.push(Stage::Signed);
        info!(stage = "signed", bytes = signed.signed_bytes().len());

        trail.push(Stage::Submitted);
        let reception = match self
            .bounded(
                self.reception.submit(signed.signed_bytes()),
                TransportError::Timeout,
            )
            .await
        {
            Ok(reception) => reception,
            Err(err) => {
                trail.push(Stage::Received(err.to_string()));
                return Err(err.into());
            }
        };
        trail.push(Stage::Received(reception.estado.clone()));
        info!(stage = "received", status = %reception.estado);

        if !reception.is_received() {
            let mut messages = Vec::new();
            for message in reception.messages() {
                let full_xml = if message.is_already_authorized() {
                    Some(self.already_authorized_envelope(location, &key).await?)
                } else {
                    None
                };
                messages.push(RejectedMessage {
                    message: message.clone(),
                    full_xml,
                });
            }
            return Ok(Verdict::Rejected(Rejection {
                access_key: key,
                status: reception.estado,
                comprobante: signed.xml().to_string(),
                messages,
            }));
        }

        trail.push(Stage::AuthorizationRequested);
        info!(stage = "authorization_requested");
        let response = self
            .bounded(self.authorization.authorize(&key), |deadline| {
                AuthorizationError::Transport(TransportError::Timeout(deadline))
            })
            .await?;
        if response.authorizations.is_empty() {
            return Err(WorkflowError::AuthorizationNotReceived(format!(
                "no authorization records for {key}"
            )));
        }

        let now = now();
        let timestamp = authorization_timestamp(now);
        let envelopes = response
            .authorizations
            .iter()
            .map(|record| {
                Envelope {
                    status: &record.estado,
                    authorization_number: &record.authorization_number,
                    authorized_at: &timestamp,
                    comprobante: &record.comprobante,
                }
                .to_xml()
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| WorkflowError::internal(&err))?;

        Ok(Verdict::Authorized(Authorization {
            access_key: key,
            response,
            envelopes,
        }))
    }

    async fn already_authorized_envelope(
        &self,
        location: &ArtifactLocation,
        key: &AccessKey,
    ) -> Result<String, WorkflowError> {
        let stored = self
            .bounded(
                self.store.read_signed(location, key.as_str()),
                ArtifactError::Timeout,
            )
            .await
            .map_err(WorkflowError::ReadSigned)?;
        let stored = String::from_utf8_lossy(&stored);
        authorized_envelope(key.as_str(), &stored, now())
            .map_err(|err| WorkflowError::internal(&err))
    }
}

enum Verdict {
    Authorized(Authorization),
    Rejected(Rejection),
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}
