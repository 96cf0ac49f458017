//! Document domain types, validation and lifecycle.
mod builder;
pub mod sign;
pub mod validation;
pub mod xml;
pub use builder::{DocumentBuilder, DocumentView, FinalizedDocument, SignedDocument};

use crate::access_key::KeyGenerationError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use validation::{FieldConstraint, FieldError, FieldPath, FieldValue, Rule, Validate};

/// Document lifecycle errors.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Key(#[from] KeyGenerationError),
    #[error("supplied access key is invalid: {0}")]
    SuppliedKey(#[source] KeyGenerationError),
    #[error("supplied access key {supplied} does not match the document (expected {expected})")]
    KeyMismatch { supplied: String, expected: String },
}

/// Every structural violation found in one document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} validation failed with {} error(s)", .kind.label(), .errors.len())]
pub struct ValidationError {
    pub kind: DocumentKind,
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    pub fn new(kind: DocumentKind, errors: Vec<FieldError>) -> Self {
        Self { kind, errors }
    }
}

/// Inbound request could not be decoded into a document.
#[derive(Debug, Error)]
pub enum RequestParseError {
    #[error("invalid request: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{section} es obligatorio")]
    MissingSection { section: &'static str },
}

impl RequestParseError {
    pub fn message(&self) -> String {
        self.to_string()
    }

    pub fn cause(&self) -> String {
        match self {
            RequestParseError::Json(err) => format!(
                "{:?} error at line {} column {}",
                err.classify(),
                err.line(),
                err.column()
            ),
            RequestParseError::MissingSection { section } => format!("missing {section}"),
        }
    }
}

/// Supported document types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentKind {
    Invoice,
    CreditNote,
}

impl DocumentKind {
    /// `codDoc` value.
    pub fn code(&self) -> &'static str {
        match self {
            DocumentKind::Invoice => "01",
            DocumentKind::CreditNote => "04",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "01" => Some(DocumentKind::Invoice),
            "04" => Some(DocumentKind::CreditNote),
            _ => None,
        }
    }

    pub fn root_tag(&self) -> &'static str {
        match self {
            DocumentKind::Invoice => "factura",
            DocumentKind::CreditNote => "notaCredito",
        }
    }

    pub fn schema_version(&self) -> &'static str {
        match self {
            DocumentKind::Invoice => "1.1.0",
            DocumentKind::CreditNote => "1.0.0",
        }
    }

    pub fn header_tag(&self) -> &'static str {
        match self {
            DocumentKind::Invoice => "infoFactura",
            DocumentKind::CreditNote => "infoNotaCredito",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DocumentKind::Invoice => "Factura",
            DocumentKind::CreditNote => "Nota Credito",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// `infoTributaria`: issuer identity and document numbering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct TaxpayerInfo {
    #[serde(rename = "ambiente")]
    #[validate(required, one_of("1", "2"))]
    pub environment: String,
    #[serde(rename = "tipoEmision")]
    #[validate(required, one_of("1"))]
    pub emission_type: String,
    #[serde(rename = "razonSocial")]
    #[validate(required, length(min = 1, max = 300))]
    pub legal_name: String,
    #[serde(rename = "nombreComercial", skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 300))]
    pub trade_name: Option<String>,
    #[serde(rename = "ruc")]
    #[validate(required, digits = 13)]
    pub ruc: String,
    #[serde(rename = "claveAcceso", skip_serializing_if = "Option::is_none")]
    #[validate(digits = 49)]
    pub access_key: Option<String>,
    #[serde(rename = "codDoc")]
    #[validate(required, digits = 2)]
    pub document_type: String,
    #[serde(rename = "estab")]
    #[validate(required, digits = 3)]
    pub establishment: String,
    #[serde(rename = "ptoEmision", alias = "ptoEmi")]
    #[validate(required, digits = 3)]
    pub emission_point: String,
    #[serde(rename = "secuencial")]
    #[validate(required, digits = 9)]
    pub sequential: String,
    #[serde(rename = "dirMatriz")]
    #[validate(required, length(min = 1, max = 300))]
    pub head_office_address: String,
}

/// `infoFactura`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct InvoiceInfo {
    #[serde(rename = "fechaEmision")]
    #[validate(required, date)]
    pub issue_date: String,
    #[serde(rename = "dirEstablecimiento", skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 300))]
    pub establishment_address: Option<String>,
    #[serde(rename = "contribuyenteEspecial", skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 3, max = 13))]
    pub special_taxpayer: Option<String>,
    #[serde(rename = "obligadoContabilidad", skip_serializing_if = "Option::is_none")]
    #[validate(one_of("SI", "NO"))]
    pub keeps_accounting: Option<String>,
    #[serde(rename = "tipoIdentificacionComprador")]
    #[validate(required, digits = 2)]
    pub buyer_id_type: String,
    #[serde(rename = "razonSocialComprador")]
    #[validate(required, length(min = 1, max = 300))]
    pub buyer_name: String,
    #[serde(rename = "identificacionComprador")]
    #[validate(required, length(min = 1, max = 20))]
    pub buyer_id: String,
    #[serde(rename = "totalSinImpuestos")]
    #[validate(required, amount)]
    pub total_without_taxes: String,
    #[serde(rename = "totalDescuento")]
    #[validate(required, amount)]
    pub total_discount: String,
    #[serde(rename = "totalConImpuestos")]
    #[validate(min_items = 1, nested)]
    pub tax_totals: Vec<TaxTotal>,
    #[serde(rename = "propina")]
    #[validate(required, amount)]
    pub tip: String,
    #[serde(rename = "importeTotal")]
    #[validate(required, amount)]
    pub total_amount: String,
    #[serde(rename = "moneda")]
    #[validate(required, length(min = 1, max = 15))]
    pub currency: String,
    #[serde(rename = "pagos")]
    #[validate(min_items = 1, nested)]
    pub payments: Vec<Payment>,
    #[serde(rename = "valorRetIva", skip_serializing_if = "Option::is_none")]
    #[validate(amount)]
    pub vat_withheld: Option<String>,
    #[serde(rename = "valorRetRenta", skip_serializing_if = "Option::is_none")]
    #[validate(amount)]
    pub income_tax_withheld: Option<String>,
}

/// `infoNotaCredito`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CreditNoteInfo {
    #[serde(rename = "fechaEmision")]
    #[validate(required, date)]
    pub issue_date: String,
    #[serde(rename = "dirEstablecimiento", skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 300))]
    pub establishment_address: Option<String>,
    #[serde(rename = "tipoIdentificacionComprador")]
    #[validate(required, digits = 2)]
    pub buyer_id_type: String,
    #[serde(rename = "razonSocialComprador")]
    #[validate(required, length(min = 1, max = 300))]
    pub buyer_name: String,
    #[serde(rename = "identificacionComprador")]
    #[validate(required, length(min = 1, max = 20))]
    pub buyer_id: String,
    #[serde(rename = "contribuyenteEspecial", skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 3, max = 13))]
    pub special_taxpayer: Option<String>,
    #[serde(rename = "obligadoContabilidad", skip_serializing_if = "Option::is_none")]
    #[validate(one_of("SI", "NO"))]
    pub keeps_accounting: Option<String>,
    #[serde(rename = "rise", skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 40))]
    pub rise: Option<String>,
    #[serde(rename = "codDocModificado")]
    #[validate(required, digits = 2)]
    pub modified_document_type: String,
    #[serde(rename = "numDocModificado")]
    #[validate(required, length(min = 1, max = 17))]
    pub modified_document_number: String,
    #[serde(rename = "fechaEmisionDocSustento")]
    #[validate(required, date)]
    pub modified_document_date: String,
    #[serde(rename = "totalSinImpuestos")]
    #[validate(required, amount)]
    pub total_without_taxes: String,
    #[serde(rename = "valorModificacion")]
    #[validate(required, amount)]
    pub modification_value: String,
    #[serde(rename = "moneda")]
    #[validate(required, length(min = 1, max = 15))]
    pub currency: String,
    #[serde(rename = "totalConImpuestos", alias = "totalConImpuesto")]
    #[validate(min_items = 1, nested)]
    pub tax_totals: Vec<TaxTotal>,
    #[serde(rename = "motivo", skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 300))]
    pub reason: Option<String>,
}

/// `totalImpuesto`: per-tax summary in the document header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct TaxTotal {
    #[serde(rename = "codigo")]
    #[validate(required, one_of("2", "3", "5"))]
    pub code: String,
    #[serde(rename = "codigoPorcentaje")]
    #[validate(required, length(min = 1, max = 4))]
    pub rate_code: String,
    #[serde(rename = "descuentoAdicional", skip_serializing_if = "Option::is_none")]
    #[validate(amount)]
    pub additional_discount: Option<String>,
    #[serde(rename = "tarifa", skip_serializing_if = "Option::is_none")]
    #[validate(amount)]
    pub rate: Option<String>,
    #[serde(rename = "baseImponible")]
    #[validate(required, amount)]
    pub taxable_base: String,
    #[serde(rename = "valor")]
    #[validate(required, amount)]
    pub value: String,
    #[serde(rename = "valorDevolucionIva", skip_serializing_if = "Option::is_none")]
    #[validate(amount)]
    pub vat_refund: Option<String>,
}

/// `pago`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Payment {
    #[serde(rename = "formaPago")]
    #[validate(required, digits = 2)]
    pub method: String,
    #[serde(rename = "total")]
    #[validate(required, amount)]
    pub total: String,
    #[serde(rename = "plazo", skip_serializing_if = "Option::is_none")]
    #[validate(amount)]
    pub term: Option<String>,
    #[serde(rename = "unidadTiempo", skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 10))]
    pub time_unit: Option<String>,
}

/// `detalle`
///
/// Item codes are `codigoPrincipal`/`codigoAuxiliar` on invoices and
/// `codigoInterno`/`codigoAdicional` on credit notes; both spellings are accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LineItem {
    #[serde(
        rename = "codigoPrincipal",
        alias = "codigoInterno",
        skip_serializing_if = "Option::is_none"
    )]
    #[validate(length(min = 1, max = 25))]
    pub main_code: Option<String>,
    #[serde(
        rename = "codigoAuxiliar",
        alias = "codigoAdicional",
        skip_serializing_if = "Option::is_none"
    )]
    #[validate(length(min = 1, max = 25))]
    pub auxiliary_code: Option<String>,
    #[serde(rename = "descripcion")]
    #[validate(required, length(min = 1, max = 300))]
    pub description: String,
    #[serde(rename = "cantidad")]
    #[validate(required, amount)]
    pub quantity: String,
    #[serde(rename = "precioUnitario")]
    #[validate(required, amount)]
    pub unit_price: String,
    #[serde(rename = "descuento")]
    #[validate(required, amount)]
    pub discount: String,
    #[serde(rename = "precioTotalSinImpuesto")]
    #[validate(required, amount)]
    pub total_without_tax: String,
    #[serde(rename = "detallesAdicionales", skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub additional_details: Option<Vec<AdditionalDetail>>,
    #[serde(rename = "impuestos")]
    #[validate(min_items = 1, nested)]
    pub taxes: Vec<LineTax>,
}

/// `impuesto` of a line item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LineTax {
    #[serde(rename = "codigo")]
    #[validate(required, one_of("2", "3", "5"))]
    pub code: String,
    #[serde(rename = "codigoPorcentaje")]
    #[validate(required, length(min = 1, max = 4))]
    pub rate_code: String,
    #[serde(rename = "tarifa")]
    #[validate(required, amount)]
    pub rate: String,
    #[serde(rename = "baseImponible")]
    #[validate(required, amount)]
    pub taxable_base: String,
    #[serde(rename = "valor")]
    #[validate(required, amount)]
    pub value: String,
}

/// `detAdicional` attribute pair of a line item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AdditionalDetail {
    #[serde(rename = "nombre")]
    #[validate(required, length(min = 1, max = 300))]
    pub name: String,
    #[serde(rename = "valor")]
    #[validate(required, length(min = 1, max = 300))]
    pub value: String,
}

/// `campoAdicional`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AdditionalField {
    #[serde(rename = "nombre")]
    #[validate(required, length(min = 1, max = 300))]
    pub name: String,
    #[serde(rename = "valor")]
    #[validate(required, length(min = 1, max = 300))]
    pub value: String,
}

/// Type-specific header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentHeader {
    Invoice(InvoiceInfo),
    CreditNote(CreditNoteInfo),
}

impl DocumentHeader {
    pub fn kind(&self) -> DocumentKind {
        match self {
            DocumentHeader::Invoice(_) => DocumentKind::Invoice,
            DocumentHeader::CreditNote(_) => DocumentKind::CreditNote,
        }
    }

    /// `fechaEmision` as supplied (`dd/mm/yyyy`).
    pub fn issue_date(&self) -> &str {
        match self {
            DocumentHeader::Invoice(info) => &info.issue_date,
            DocumentHeader::CreditNote(info) => &info.issue_date,
        }
    }

    pub fn tax_totals(&self) -> &[TaxTotal] {
        match self {
            DocumentHeader::Invoice(info) => &info.tax_totals,
            DocumentHeader::CreditNote(info) => &info.tax_totals,
        }
    }
}

impl From<InvoiceInfo> for DocumentHeader {
    fn from(info: InvoiceInfo) -> Self {
        DocumentHeader::Invoice(info)
    }
}

impl From<CreditNoteInfo> for DocumentHeader {
    fn from(info: CreditNoteInfo) -> Self {
        DocumentHeader::CreditNote(info)
    }
}

/// A tax document: shared taxpayer section, typed header, lines and extras.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub tax_info: TaxpayerInfo,
    pub header: DocumentHeader,
    pub lines: Vec<LineItem>,
    pub additional_info: Option<Vec<AdditionalField>>,
}

#[derive(Deserialize)]
struct RawDocument {
    #[serde(rename = "infoTributario", alias = "infoTributaria", default)]
    tax_info: TaxpayerInfo,
    #[serde(rename = "infoFactura")]
    invoice: Option<InvoiceInfo>,
    #[serde(rename = "infoNotaCredito")]
    credit_note: Option<CreditNoteInfo>,
    #[serde(rename = "detalles", default)]
    lines: Vec<LineItem>,
    #[serde(rename = "infoAdicional")]
    additional_info: Option<Vec<AdditionalField>>,
}

impl Document {
    pub fn kind(&self) -> DocumentKind {
        self.header.kind()
    }

    /// Decodes a request of the given kind. Keys that do not belong to the
    /// document (file locations, credentials) are ignored.
    pub fn from_json(kind: DocumentKind, json: &str) -> Result<Self, RequestParseError> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(kind, &value)
    }

    pub fn from_value(kind: DocumentKind, value: &Value) -> Result<Self, RequestParseError> {
        let raw = RawDocument::deserialize(value)?;
        let header = match kind {
            DocumentKind::Invoice => raw.invoice.map(DocumentHeader::Invoice),
            DocumentKind::CreditNote => raw.credit_note.map(DocumentHeader::CreditNote),
        }
        .ok_or(RequestParseError::MissingSection {
            section: kind.header_tag(),
        })?;
        Ok(Document {
            tax_info: raw.tax_info,
            header,
            lines: raw.lines,
            additional_info: raw.additional_info,
        })
    }
}

impl Validate for Document {
    const CONSTRAINTS: &'static [FieldConstraint] = &[FieldConstraint {
        field: "detalles",
        rules: &[Rule::MinItems(1)],
    }];

    fn field_value(&self, index: usize) -> FieldValue<'_> {
        match index {
            0 => FieldValue::Items(Some(self.lines.len())),
            _ => FieldValue::Absent,
        }
    }

    fn validate_nested(&self, path: &FieldPath, errors: &mut Vec<FieldError>) {
        let tax_path = path.child("infoTributario");
        self.tax_info.validate_at(&tax_path, errors);

        let kind = self.kind();
        let code = self.tax_info.document_type.trim();
        if !code.is_empty() && code != kind.code() {
            errors.push(FieldError::new(
                tax_path.child("codDoc").as_str(),
                format!("codDoc debe ser {} para {}", kind.code(), kind.label()),
            ));
        }

        let header_path = path.child(kind.header_tag());
        match &self.header {
            DocumentHeader::Invoice(info) => info.validate_at(&header_path, errors),
            DocumentHeader::CreditNote(info) => info.validate_at(&header_path, errors),
        }

        let lines_path = path.child("detalles");
        for (index, line) in self.lines.iter().enumerate() {
            line.validate_at(&lines_path.index(index), errors);
        }

        if let Some(fields) = &self.additional_info {
            let extra_path = path.child("infoAdicional");
            for (index, field) in fields.iter().enumerate() {
                field.validate_at(&extra_path.index(index), errors);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn invoice_json() -> Value {
        json!({
            "infoTributario": {
                "ambiente": "1",
                "tipoEmision": "1",
                "razonSocial": "Comercial Andina S.A.",
                "ruc": "1790012345001",
                "codDoc": "01",
                "estab": "001",
                "ptoEmision": "001",
                "secuencial": "000000001",
                "dirMatriz": "Av. Amazonas N34-12"
            },
            "infoFactura": {
                "fechaEmision": "01/01/2024",
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
                "pagos": [{"formaPago": "01", "total": "11.50"}]
            },
            "detalles": [{
                "codigoPrincipal": "SKU-1",
                "descripcion": "Servicio de soporte",
                "cantidad": "1",
                "precioUnitario": "10.00",
                "descuento": "0.00",
                "precioTotalSinImpuesto": "10.00",
                "impuestos": [
                    {"codigo": "2", "codigoPorcentaje": "4", "tarifa": "15", "baseImponible": "10.00", "valor": "1.50"}
                ]
            }],
            "directorioGuardarXML": "/tmp/xml"
        })
    }

    #[test]
    fn parses_invoice_request_ignoring_options() {
        let document = Document::from_value(DocumentKind::Invoice, &invoice_json()).expect("doc");
        assert_eq!(document.kind(), DocumentKind::Invoice);
        assert_eq!(document.tax_info.emission_point, "001");
        assert_eq!(document.lines[0].main_code.as_deref(), Some("SKU-1"));
        assert!(document.validate().is_empty(), "{:?}", document.validate());
    }

    #[test]
    fn missing_header_section_is_a_parse_error() {
        let err = Document::from_value(DocumentKind::CreditNote, &invoice_json())
            .expect_err("no infoNotaCredito");
        assert!(matches!(
            err,
            RequestParseError::MissingSection { section: "infoNotaCredito" }
        ));
        assert_eq!(err.message(), "infoNotaCredito es obligatorio");
    }

    #[test]
    fn malformed_json_reports_cause() {
        let err = Document::from_json(DocumentKind::Invoice, "{\"infoTributario\": ").expect_err("eof");
        assert!(err.cause().starts_with("Eof"));
    }

    #[test]
    fn credit_note_aliases_are_accepted() {
        let value = json!({
            "infoTributario": invoice_json()["infoTributario"].clone(),
            "infoNotaCredito": {
                "fechaEmision": "02/01/2024",
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
                ]
            },
            "detalles": [{
                "codigoInterno": "SKU-1",
                "codigoAdicional": "AUX",
                "descripcion": "Devolucion",
                "cantidad": "1",
                "precioUnitario": "10.00",
                "descuento": "0.00",
                "precioTotalSinImpuesto": "10.00",
                "impuestos": [
                    {"codigo": "2", "codigoPorcentaje": "4", "tarifa": "15", "baseImponible": "10.00", "valor": "1.50"}
                ]
            }]
        });
        let document = Document::from_value(DocumentKind::CreditNote, &value).expect("doc");
        assert_eq!(document.header.tax_totals().len(), 1);
        assert_eq!(document.lines[0].auxiliary_code.as_deref(), Some("AUX"));

        let errors = document.validate();
        assert_eq!(
            errors,
            vec![FieldError::new(
                "infoTributario.codDoc",
                "codDoc debe ser 04 para Nota Credito"
            )]
        );
    }

    #[test]
    fn nested_paths_reach_line_taxes() {
        let mut value = invoice_json();
        value["detalles"][0]["impuestos"][0]["valor"] = json!("1.1234567");
        value["detalles"][0]["descripcion"] = json!("x".repeat(301));
        let document = Document::from_value(DocumentKind::Invoice, &value).expect("doc");
        let fields: Vec<String> = document.validate().into_iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec!["detalles[0].descripcion", "detalles[0].impuestos[0].valor"]
        );
    }

    #[test]
    fn document_without_lines_fails() {
        let mut value = invoice_json();
        value["detalles"] = json!([]);
        let document = Document::from_value(DocumentKind::Invoice, &value).expect("doc");
        let errors = document.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "detalles");
    }
}
