use async_trait::async_trait;
use comprobantes_core::access_key::AccessKey;
use comprobantes_core::api::{
    AuthorityMessage, AuthorizationClient, AuthorizationError, AuthorizationRecord,
    AuthorizationResponse, ReceivedDocument, ReceptionClient, ReceptionResponse, TransportError,
};
use comprobantes_core::config::{Config, Environment};
use comprobantes_core::document::sign::{SignerCredential, SigningError, SigningGateway};
use comprobantes_core::document::{Document, DocumentKind};
use comprobantes_core::store::{ArtifactError, ArtifactLocation, ArtifactStore};
use comprobantes_core::workflow::{SubmissionOptions, SubmissionWorkflow};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const INVOICE_KEY: &str = "0101202401179001234500110010010000000011234567819";

#[allow(dead_code)]
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

#[allow(dead_code)]
pub fn invoice_request() -> Value {
    json!({
        "infoTributario": {
            "ambiente": "1",
            "tipoEmision": "1",
            "razonSocial": "Distribuidora Andina S.A.",
            "nombreComercial": "Andina",
            "ruc": "1790012345001",
            "codDoc": "01",
            "estab": "001",
            "ptoEmision": "001",
            "secuencial": "000000001",
            "dirMatriz": "Av. Amazonas N34-451, Quito"
        },
        "infoFactura": {
            "fechaEmision": "01/01/2024",
            "dirEstablecimiento": "Av. Amazonas N34-451",
            "obligadoContabilidad": "SI",
            "tipoIdentificacionComprador": "05",
            "razonSocialComprador": "Ana Torres",
            "identificacionComprador": "1712345678",
            "totalSinImpuestos": "10.00",
            "totalDescuento": "0.00",
            "totalConImpuestos": [
                {"codigo": "2", "codigoPorcentaje": "4", "baseImponible": "10.00", "valor": "1.50"}
            ],
            "propina": "0.00",
            "importeTotal": "11.50",
            "moneda": "DOLAR",
            "pagos": [{"formaPago": "01", "total": "11.50", "plazo": "0", "unidadTiempo": "dias"}]
        },
        "detalles": [{
            "codigoPrincipal": "SRV-01",
            "descripcion": "Servicio de mantenimiento",
            "cantidad": "1",
            "precioUnitario": "10.00",
            "descuento": "0.00",
            "precioTotalSinImpuesto": "10.00",
            "impuestos": [
                {"codigo": "2", "codigoPorcentaje": "4", "tarifa": "15", "baseImponible": "10.00", "valor": "1.50"}
            ]
        }],
        "infoAdicional": [{"nombre": "Email", "valor": "ana@example.com"}],
        "directorioGuardarXML": "",
        "nombreArchivoXML": "",
        "directorioGuardarXMLFirmados": "",
        "nombreArchivoXMLFirmado": "",
        "clave": "secret",
        "directorioYNombreArchivoRegistroCivilP12": "/keys/firma.p12"
    })
}

#[allow(dead_code)]
pub fn credit_note_request() -> Value {
    json!({
        "infoTributario": {
            "ambiente": "1",
            "tipoEmision": "1",
            "razonSocial": "Distribuidora Andina S.A.",
            "ruc": "1790012345001",
            "codDoc": "04",
            "estab": "001",
            "ptoEmision": "001",
            "secuencial": "000000001",
            "dirMatriz": "Av. Amazonas N34-451, Quito"
        },
        "infoNotaCredito": {
            "fechaEmision": "01/01/2024",
            "tipoIdentificacionComprador": "05",
            "razonSocialComprador": "Ana Torres",
            "identificacionComprador": "1712345678",
            "codDocModificado": "01",
            "numDocModificado": "001-001-000000001",
            "fechaEmisionDocSustento": "01/01/2024",
            "totalSinImpuestos": "10.00",
            "valorModificacion": "11.50",
            "moneda": "DOLAR",
            "totalConImpuesto": [
                {"codigo": "2", "codigoPorcentaje": "4", "baseImponible": "10.00", "valor": "1.50"}
            ],
            "motivo": "Devolucion"
        },
        "detalles": [{
            "codigoInterno": "SRV-01",
            "descripcion": "Servicio de mantenimiento",
            "cantidad": "1",
            "precioUnitario": "10.00",
            "descuento": "0.00",
            "precioTotalSinImpuesto": "10.00",
            "impuestos": [
                {"codigo": "2", "codigoPorcentaje": "4", "tarifa": "15", "baseImponible": "10.00", "valor": "1.50"}
            ]
        }]
    })
}

#[allow(dead_code)]
pub fn invoice() -> Document {
    Document::from_value(DocumentKind::Invoice, &invoice_request()).expect("invoice fixture")
}

#[allow(dead_code)]
pub fn credit_note() -> Document {
    Document::from_value(DocumentKind::CreditNote, &credit_note_request())
        .expect("credit note fixture")
}

#[allow(dead_code)]
pub fn options() -> SubmissionOptions {
    SubmissionOptions::new(
        ArtifactLocation::new("generados", "", "firmados", ""),
        SignerCredential::new("/keys/firma.p12", "secret"),
    )
}

/// Wraps the document in a fake signature element.
#[allow(dead_code)]
#[derive(Default)]
pub struct MockSigner {
    pub fail: bool,
    pub delay: Option<Duration>,
}

#[async_trait]
impl SigningGateway for MockSigner {
    async fn sign(
        &self,
        xml: &[u8],
        credential: &SignerCredential,
    ) -> Result<Vec<u8>, SigningError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail || credential.password().is_empty() {
            return Err(SigningError::Rejected("keystore could not be opened".into()));
        }
        let text = String::from_utf8_lossy(xml);
        Ok(text
            .replacen("</factura>", "<ds:Signature/></factura>", 1)
            .into_bytes())
    }
}

#[allow(dead_code)]
pub enum MockReception {
    Answer(ReceptionResponse),
    Unreachable,
    Hang,
}

#[async_trait]
impl ReceptionClient for MockReception {
    async fn submit(&self, signed: &[u8]) -> Result<ReceptionResponse, TransportError> {
        assert!(!signed.is_empty());
        match self {
            MockReception::Answer(response) => Ok(response.clone()),
            MockReception::Unreachable => Err(TransportError::Unreachable("connection refused".into())),
            MockReception::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(ReceptionResponse::received())
            }
        }
    }
}

#[allow(dead_code)]
pub fn rejected_with(identifier: &str, message: &str) -> MockReception {
    MockReception::Answer(ReceptionResponse {
        estado: "DEVUELTA".into(),
        comprobantes: vec![ReceivedDocument {
            access_key: INVOICE_KEY.into(),
            messages: vec![AuthorityMessage {
                identifier: identifier.into(),
                message: message.into(),
                additional_info: Some("La clave de acceso ya fue registrada".into()),
                kind: "ERROR".into(),
            }],
        }],
    })
}

#[allow(dead_code)]
pub enum MockAuthorization {
    Records(Vec<AuthorizationRecord>),
    NotReceived,
}

#[async_trait]
impl AuthorizationClient for MockAuthorization {
    async fn authorize(
        &self,
        key: &AccessKey,
    ) -> Result<AuthorizationResponse, AuthorizationError> {
        match self {
            MockAuthorization::Records(records) => Ok(AuthorizationResponse {
                queried_key: key.to_string(),
                document_count: records.len().to_string(),
                authorizations: records.clone(),
            }),
            MockAuthorization::NotReceived => Err(AuthorizationError::NotReceived(
                "autorizacion no disponible".into(),
            )),
        }
    }
}

#[allow(dead_code)]
pub fn authorized_record(key: &str) -> AuthorizationRecord {
    AuthorizationRecord {
        estado: "AUTORIZADO".into(),
        authorization_number: key.into(),
        authorized_at: "2024-01-01T10:00:00-05:00".into(),
        ambiente: Some("PRUEBAS".into()),
        comprobante: "<?xml version=\"1.0\"?>\n<factura id=\"comprobante\"></factura>".into(),
        messages: vec![],
    }
}

/// In-memory artifact store keyed by resolved path.
#[allow(dead_code)]
#[derive(Default)]
pub struct MemoryStore {
    files: Mutex<HashMap<PathBuf, Vec<u8>>>,
}

#[allow(dead_code)]
impl MemoryStore {
    pub fn get(&self, path: impl Into<PathBuf>) -> Option<Vec<u8>> {
        self.files.lock().expect("lock").get(&path.into()).cloned()
    }

    pub fn len(&self) -> usize {
        self.files.lock().expect("lock").len()
    }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    async fn write_xml(
        &self,
        location: &ArtifactLocation,
        access_key: &str,
        xml: &str,
    ) -> Result<PathBuf, ArtifactError> {
        let path = location.xml_path(access_key);
        self.files
            .lock()
            .expect("lock")
            .insert(path.clone(), xml.as_bytes().to_vec());
        Ok(path)
    }

    async fn write_signed(
        &self,
        location: &ArtifactLocation,
        access_key: &str,
        signed: &[u8],
    ) -> Result<PathBuf, ArtifactError> {
        let path = location.signed_path(access_key);
        self.files
            .lock()
            .expect("lock")
            .insert(path.clone(), signed.to_vec());
        Ok(path)
    }

    async fn read_signed(
        &self,
        location: &ArtifactLocation,
        access_key: &str,
    ) -> Result<Vec<u8>, ArtifactError> {
        let path = location.signed_path(access_key);
        self.get(path.clone()).ok_or_else(|| ArtifactError::Io {
            path,
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        })
    }
}

#[allow(dead_code)]
pub fn test_config() -> Config {
    Config::new(Environment::Test).with_call_timeout(Duration::from_millis(200))
}

#[allow(dead_code)]
pub fn workflow(
    signer: MockSigner,
    reception: MockReception,
    authorization: MockAuthorization,
    store: Arc<MemoryStore>,
) -> SubmissionWorkflow {
    SubmissionWorkflow::new(
        test_config(),
        Arc::new(signer),
        Arc::new(reception),
        Arc::new(authorization),
        store,
    )
}
