use super::{
    validation::{parse_date, Validate},
    AdditionalField, Document, DocumentError, DocumentHeader, DocumentKind, LineItem,
    TaxpayerInfo, ValidationError,
};
use crate::access_key::{generate, AccessKey, AccessKeyInput, KeyGenerationError};
use crate::config::Config;

/// Validated document with its access key assigned.
#[derive(Debug, Clone)]
pub struct FinalizedDocument {
    document: Document,
    access_key: AccessKey,
}

/// Finalized document plus its canonical XML and the signer's output.
#[derive(Debug, Clone)]
pub struct SignedDocument {
    finalized: FinalizedDocument,
    xml: String,
    signed: Vec<u8>,
}

/// Programmatic construction of a [`Document`].
///
/// # Examples
/// ```rust
/// use comprobantes_core::document::{DocumentBuilder, InvoiceInfo, TaxpayerInfo};
///
/// let document = DocumentBuilder::new(TaxpayerInfo::default(), InvoiceInfo::default())
///     .additional_field("email", "ana@example.com")
///     .build();
/// assert_eq!(document.additional_info.as_ref().map(Vec::len), Some(1));
/// ```
pub struct DocumentBuilder {
    document: Document,
}

impl DocumentBuilder {
    pub fn new(tax_info: TaxpayerInfo, header: impl Into<DocumentHeader>) -> Self {
        Self {
            document: Document {
                tax_info,
                header: header.into(),
                lines: Vec::new(),
                additional_info: None,
            },
        }
    }

    pub fn line(mut self, line: LineItem) -> Self {
        self.document.lines.push(line);
        self
    }

    pub fn lines(mut self, lines: impl IntoIterator<Item = LineItem>) -> Self {
        self.document.lines.extend(lines);
        self
    }

    pub fn additional_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.document
            .additional_info
            .get_or_insert_with(Vec::new)
            .push(AdditionalField {
                name: name.into(),
                value: value.into(),
            });
        self
    }

    /// Reuses a key issued on an earlier attempt for the same document.
    pub fn access_key(mut self, key: &AccessKey) -> Self {
        self.document.tax_info.access_key = Some(key.to_string());
        self
    }

    pub fn build(self) -> Document {
        self.document
    }

    pub fn finalize(self, config: &Config) -> Result<FinalizedDocument, DocumentError> {
        self.document.finalize(config)
    }
}

impl Document {
    /// Validates the document and assigns its access key.
    ///
    /// A `claveAcceso` already present is parsed and must agree with the
    /// document fields; otherwise a new key is generated with the configured
    /// numeric code. The key is never regenerated once present.
    pub fn finalize(mut self, config: &Config) -> Result<FinalizedDocument, DocumentError> {
        let errors = self.validate();
        if !errors.is_empty() {
            return Err(ValidationError::new(self.kind(), errors).into());
        }

        let issue_date = parse_date(self.header.issue_date()).ok_or_else(|| {
            KeyGenerationError::InvalidInput {
                field: "fechaEmision",
                reason: format!("invalid date {:?}", self.header.issue_date()),
            }
        })?;
        let info = &self.tax_info;
        let establishment_point = format!("{}{}", info.establishment, info.emission_point);
        let input = AccessKeyInput {
            issue_date,
            document_type: &info.document_type,
            ruc: &info.ruc,
            environment: &info.environment,
            establishment_point: &establishment_point,
            sequential: &info.sequential,
            numeric_code: config.numeric_code(),
            emission_type: &info.emission_type,
        };

        let access_key = match info.access_key.as_deref().map(str::trim) {
            Some(existing) if !existing.is_empty() => {
                let supplied = AccessKey::parse(existing).map_err(DocumentError::SuppliedKey)?;
                let expected = generate(&AccessKeyInput {
                    numeric_code: supplied.numeric_code(),
                    ..input
                })?;
                if expected != supplied {
                    return Err(DocumentError::KeyMismatch {
                        supplied: supplied.to_string(),
                        expected: expected.to_string(),
                    });
                }
                supplied
            }
            _ => generate(&input)?,
        };

        self.tax_info.access_key = Some(access_key.to_string());
        Ok(FinalizedDocument {
            document: self,
            access_key,
        })
    }
}

impl FinalizedDocument {
    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn kind(&self) -> DocumentKind {
        self.document.kind()
    }

    pub fn access_key(&self) -> &AccessKey {
        &self.access_key
    }

    /// Returns the document for a fresh attempt; it keeps its access key.
    pub fn into_document(self) -> Document {
        self.document
    }

    pub(crate) fn into_signed(self, xml: String, signed: Vec<u8>) -> SignedDocument {
        SignedDocument {
            finalized: self,
            xml,
            signed,
        }
    }
}

impl SignedDocument {
    pub fn document(&self) -> &Document {
        self.finalized.document()
    }

    pub fn access_key(&self) -> &AccessKey {
        self.finalized.access_key()
    }

    /// Canonical XML handed to the signer.
    pub fn xml(&self) -> &str {
        &self.xml
    }

    pub fn signed_bytes(&self) -> &[u8] {
        &self.signed
    }

    pub fn to_base64(&self) -> String {
        crate::api::encode_signed_payload(&self.signed)
    }
}

pub trait DocumentView {
    fn document(&self) -> &Document;
    fn access_key(&self) -> &AccessKey;
}

impl DocumentView for FinalizedDocument {
    fn document(&self) -> &Document {
        self.document()
    }

    fn access_key(&self) -> &AccessKey {
        self.access_key()
    }
}

impl DocumentView for SignedDocument {
    fn document(&self) -> &Document {
        self.document()
    }

    fn access_key(&self) -> &AccessKey {
        self.access_key()
    }
}
