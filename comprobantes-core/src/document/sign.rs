//! Signing gateway consumed from an external XAdES signer.
use super::xml::{DocumentXmlError, ToXml};
use super::{FinalizedDocument, SignedDocument};
use async_trait::async_trait;
use std::{fmt, path::PathBuf, time::Duration};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SigningError {
    #[error("signer rejected the document: {0}")]
    Rejected(String),
    #[error("signer did not answer within {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Xml(#[from] DocumentXmlError),
}

/// Keystore reference and password handed to the signer.
#[derive(Clone)]
pub struct SignerCredential {
    keystore: PathBuf,
    password: String,
}

impl SignerCredential {
    pub fn new(keystore: impl Into<PathBuf>, password: impl Into<String>) -> Self {
        Self {
            keystore: keystore.into(),
            password: password.into(),
        }
    }

    pub fn keystore(&self) -> &std::path::Path {
        &self.keystore
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for SignerCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignerCredential")
            .field("keystore", &self.keystore)
            .field("password", &"***")
            .finish()
    }
}

/// Produces signed bytes for canonical document XML.
#[async_trait]
pub trait SigningGateway: Send + Sync {
    async fn sign(&self, xml: &[u8], credential: &SignerCredential)
        -> Result<Vec<u8>, SigningError>;
}

/// Calls `gateway` bounded by `deadline`; empty output counts as a rejection.
pub async fn sign_within(
    gateway: &dyn SigningGateway,
    xml: &[u8],
    credential: &SignerCredential,
    deadline: Duration,
) -> Result<Vec<u8>, SigningError> {
    let signed = tokio::time::timeout(deadline, gateway.sign(xml, credential))
        .await
        .map_err(|_| SigningError::Timeout(deadline))??;
    if signed.is_empty() {
        return Err(SigningError::Rejected("signer returned no data".into()));
    }
    Ok(signed)
}

impl FinalizedDocument {
    /// Renders the canonical XML and signs it in one step.
    pub async fn sign(
        self,
        gateway: &dyn SigningGateway,
        credential: &SignerCredential,
        deadline: Duration,
    ) -> Result<SignedDocument, SigningError> {
        let xml = self.to_xml()?;
        let signed = sign_within(gateway, xml.as_bytes(), credential, deadline).await?;
        Ok(self.into_signed(xml, signed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::document::{Document, DocumentKind};

    struct Echo;

    #[async_trait]
    impl SigningGateway for Echo {
        async fn sign(
            &self,
            xml: &[u8],
            credential: &SignerCredential,
        ) -> Result<Vec<u8>, SigningError> {
            if credential.password() != "secret" {
                return Err(SigningError::Rejected("bad password".into()));
            }
            Ok(xml.to_vec())
        }
    }

    struct Slow;

    #[async_trait]
    impl SigningGateway for Slow {
        async fn sign(&self, _: &[u8], _: &SignerCredential) -> Result<Vec<u8>, SigningError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(vec![1])
        }
    }

    fn finalized() -> FinalizedDocument {
        let json = r#"{
            "infoTributario": {"ambiente": "1", "tipoEmision": "1", "razonSocial": "Andina",
                "ruc": "1790012345001", "codDoc": "01", "estab": "001", "ptoEmision": "001",
                "secuencial": "000000001", "dirMatriz": "Quito"},
            "infoFactura": {"fechaEmision": "01/01/2024", "tipoIdentificacionComprador": "05",
                "razonSocialComprador": "Ana", "identificacionComprador": "1712345678",
                "totalSinImpuestos": "10.00", "totalDescuento": "0.00",
                "totalConImpuestos": [{"codigo": "2", "codigoPorcentaje": "4", "baseImponible": "10.00", "valor": "1.50"}],
                "propina": "0.00", "importeTotal": "11.50", "moneda": "DOLAR",
                "pagos": [{"formaPago": "01", "total": "11.50"}]},
            "detalles": [{"descripcion": "Servicio", "cantidad": "1", "precioUnitario": "10.00",
                "descuento": "0.00", "precioTotalSinImpuesto": "10.00",
                "impuestos": [{"codigo": "2", "codigoPorcentaje": "4", "tarifa": "15", "baseImponible": "10.00", "valor": "1.50"}]}]
        }"#;
        Document::from_json(DocumentKind::Invoice, json)
            .expect("document")
            .finalize(&Config::default())
            .expect("finalize")
    }

    #[test]
    fn credential_debug_hides_password() {
        let credential = SignerCredential::new("/keys/firma.p12", "secret");
        let debug = format!("{credential:?}");
        assert!(debug.contains("firma.p12"));
        assert!(!debug.contains("secret"));
    }

    #[tokio::test]
    async fn finalized_document_signs_canonical_xml() {
        let credential = SignerCredential::new("/keys/firma.p12", "secret");
        let signed = finalized()
            .sign(&Echo, &credential, Duration::from_secs(1))
            .await
            .expect("signed");
        assert_eq!(signed.signed_bytes(), signed.xml().as_bytes());
        assert!(signed.xml().contains(signed.access_key().as_str()));
    }

    #[tokio::test]
    async fn signer_rejection_is_propagated() {
        let credential = SignerCredential::new("/keys/firma.p12", "wrong");
        let err = finalized()
            .sign(&Echo, &credential, Duration::from_secs(1))
            .await
            .expect_err("rejected");
        assert!(matches!(err, SigningError::Rejected(_)));
    }

    #[tokio::test]
    async fn slow_signer_times_out() {
        let credential = SignerCredential::new("/keys/firma.p12", "secret");
        let err = sign_within(&Slow, b"<a/>", &credential, Duration::from_millis(10))
            .await
            .expect_err("timeout");
        assert!(matches!(err, SigningError::Timeout(_)));
    }
}
