//! Canonical XML serialization for tax documents.
use super::{
    AdditionalDetail, AdditionalField, CreditNoteInfo, DocumentHeader, DocumentKind,
    DocumentView, FinalizedDocument, InvoiceInfo, LineItem, LineTax, Payment, SignedDocument,
    TaxTotal, TaxpayerInfo,
};
use crate::access_key::AccessKey;

use constants::COMPROBANTE_ID;
use quick_xml::se::{SeError, Serializer as QuickXmlSerializer};
use serde::ser::{Serialize, SerializeStruct, Serializer};
use thiserror::Error;

pub(crate) mod constants;
pub use constants::DOCUMENT_PROLOG;
pub mod envelope;

/// Wrapper for serializing documents to XML.
pub struct DocumentXml<'a, T: DocumentView + ?Sized>(pub &'a T);

/// XML serialization error.
#[derive(Debug, Error)]
pub enum DocumentXmlError {
    #[error("failed to serialize document to XML: {source}")]
    Serialize {
        #[from]
        source: SeError,
    },
}

/// XML formatting options.
#[derive(Debug, Clone, Copy, Default)]
pub enum XmlFormat {
    #[default]
    Compact,
    Pretty {
        indent_char: char,
        indent_size: usize,
    },
}

pub trait ToXml {
    fn to_xml_with_format(&self, format: XmlFormat) -> Result<String, DocumentXmlError>;

    /// Compact rendering; this is the form handed to the signer.
    fn to_xml(&self) -> Result<String, DocumentXmlError> {
        self.to_xml_with_format(XmlFormat::Compact)
    }

    fn to_xml_pretty(&self) -> Result<String, DocumentXmlError> {
        self.to_xml_with_format(XmlFormat::Pretty {
            indent_char: ' ',
            indent_size: 2,
        })
    }
}

impl ToXml for FinalizedDocument {
    fn to_xml_with_format(&self, format: XmlFormat) -> Result<String, DocumentXmlError> {
        to_xml_with_format(self, format)
    }
}

impl ToXml for SignedDocument {
    fn to_xml_with_format(&self, format: XmlFormat) -> Result<String, DocumentXmlError> {
        to_xml_with_format(self, format)
    }
}

fn to_xml_with_format<T: DocumentView + ?Sized>(
    document: &T,
    format: XmlFormat,
) -> Result<String, DocumentXmlError> {
    let mut buffer = String::with_capacity(4096);
    buffer.push_str(DOCUMENT_PROLOG);

    {
        let mut serializer = QuickXmlSerializer::new(&mut buffer);
        if let XmlFormat::Pretty {
            indent_char,
            indent_size,
        } = format
        {
            serializer.indent(indent_char, indent_size);
        }
        DocumentXml(document).serialize(serializer)?;
    }

    Ok(buffer)
}

struct TaxpayerInfoXml<'a> {
    info: &'a TaxpayerInfo,
    access_key: &'a AccessKey,
}

impl<'a> Serialize for TaxpayerInfoXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let info = self.info;
        let mut st = s.serialize_struct("infoTributaria", 11)?;
        st.serialize_field("ambiente", &info.environment)?;
        st.serialize_field("tipoEmision", &info.emission_type)?;
        st.serialize_field("razonSocial", &info.legal_name)?;
        if let Some(name) = &info.trade_name {
            st.serialize_field("nombreComercial", name)?;
        }
        st.serialize_field("ruc", &info.ruc)?;
        st.serialize_field("claveAcceso", self.access_key.as_str())?;
        st.serialize_field("codDoc", &info.document_type)?;
        st.serialize_field("estab", &info.establishment)?;
        st.serialize_field("ptoEmi", &info.emission_point)?;
        st.serialize_field("secuencial", &info.sequential)?;
        st.serialize_field("dirMatriz", &info.head_office_address)?;
        st.end()
    }
}

struct TaxTotalXml<'a>(&'a TaxTotal);

impl<'a> Serialize for TaxTotalXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let total = self.0;
        let mut st = s.serialize_struct("totalImpuesto", 7)?;
        st.serialize_field("codigo", &total.code)?;
        st.serialize_field("codigoPorcentaje", &total.rate_code)?;
        if let Some(discount) = &total.additional_discount {
            st.serialize_field("descuentoAdicional", discount)?;
        }
        if let Some(rate) = &total.rate {
            st.serialize_field("tarifa", rate)?;
        }
        st.serialize_field("baseImponible", &total.taxable_base)?;
        st.serialize_field("valor", &total.value)?;
        if let Some(refund) = &total.vat_refund {
            st.serialize_field("valorDevolucionIva", refund)?;
        }
        st.end()
    }
}

struct TaxTotalsXml<'a>(&'a [TaxTotal]);

impl<'a> Serialize for TaxTotalsXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("totalConImpuestos", self.0.len())?;
        for total in self.0 {
            st.serialize_field("totalImpuesto", &TaxTotalXml(total))?;
        }
        st.end()
    }
}

struct PaymentXml<'a>(&'a Payment);

impl<'a> Serialize for PaymentXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let payment = self.0;
        let mut st = s.serialize_struct("pago", 4)?;
        st.serialize_field("formaPago", &payment.method)?;
        st.serialize_field("total", &payment.total)?;
        if let Some(term) = &payment.term {
            st.serialize_field("plazo", term)?;
        }
        if let Some(unit) = &payment.time_unit {
            st.serialize_field("unidadTiempo", unit)?;
        }
        st.end()
    }
}

struct PaymentsXml<'a>(&'a [Payment]);

impl<'a> Serialize for PaymentsXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("pagos", self.0.len())?;
        for payment in self.0 {
            st.serialize_field("pago", &PaymentXml(payment))?;
        }
        st.end()
    }
}

struct InvoiceInfoXml<'a>(&'a InvoiceInfo);

impl<'a> Serialize for InvoiceInfoXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let info = self.0;
        let mut st = s.serialize_struct("infoFactura", 16)?;
        st.serialize_field("fechaEmision", &info.issue_date)?;
        if let Some(address) = &info.establishment_address {
            st.serialize_field("dirEstablecimiento", address)?;
        }
        if let Some(special) = &info.special_taxpayer {
            st.serialize_field("contribuyenteEspecial", special)?;
        }
        if let Some(accounting) = &info.keeps_accounting {
            st.serialize_field("obligadoContabilidad", accounting)?;
        }
        st.serialize_field("tipoIdentificacionComprador", &info.buyer_id_type)?;
        st.serialize_field("razonSocialComprador", &info.buyer_name)?;
        st.serialize_field("identificacionComprador", &info.buyer_id)?;
        st.serialize_field("totalSinImpuestos", &info.total_without_taxes)?;
        st.serialize_field("totalDescuento", &info.total_discount)?;
        st.serialize_field("totalConImpuestos", &TaxTotalsXml(&info.tax_totals))?;
        st.serialize_field("propina", &info.tip)?;
        st.serialize_field("importeTotal", &info.total_amount)?;
        st.serialize_field("moneda", &info.currency)?;
        st.serialize_field("pagos", &PaymentsXml(&info.payments))?;
        if let Some(value) = &info.vat_withheld {
            st.serialize_field("valorRetIva", value)?;
        }
        if let Some(value) = &info.income_tax_withheld {
            st.serialize_field("valorRetRenta", value)?;
        }
        st.end()
    }
}

struct CreditNoteInfoXml<'a>(&'a CreditNoteInfo);

impl<'a> Serialize for CreditNoteInfoXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let info = self.0;
        let mut st = s.serialize_struct("infoNotaCredito", 16)?;
        st.serialize_field("fechaEmision", &info.issue_date)?;
        if let Some(address) = &info.establishment_address {
            st.serialize_field("dirEstablecimiento", address)?;
        }
        st.serialize_field("tipoIdentificacionComprador", &info.buyer_id_type)?;
        st.serialize_field("razonSocialComprador", &info.buyer_name)?;
        st.serialize_field("identificacionComprador", &info.buyer_id)?;
        if let Some(special) = &info.special_taxpayer {
            st.serialize_field("contribuyenteEspecial", special)?;
        }
        if let Some(accounting) = &info.keeps_accounting {
            st.serialize_field("obligadoContabilidad", accounting)?;
        }
        if let Some(rise) = &info.rise {
            st.serialize_field("rise", rise)?;
        }
        st.serialize_field("codDocModificado", &info.modified_document_type)?;
        st.serialize_field("numDocModificado", &info.modified_document_number)?;
        st.serialize_field("fechaEmisionDocSustento", &info.modified_document_date)?;
        st.serialize_field("totalSinImpuestos", &info.total_without_taxes)?;
        st.serialize_field("valorModificacion", &info.modification_value)?;
        st.serialize_field("moneda", &info.currency)?;
        st.serialize_field("totalConImpuestos", &TaxTotalsXml(&info.tax_totals))?;
        if let Some(reason) = &info.reason {
            st.serialize_field("motivo", reason)?;
        }
        st.end()
    }
}

struct AdditionalDetailXml<'a>(&'a AdditionalDetail);

impl<'a> Serialize for AdditionalDetailXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("detAdicional", 2)?;
        st.serialize_field("@nombre", &self.0.name)?;
        st.serialize_field("@valor", &self.0.value)?;
        st.end()
    }
}

struct AdditionalDetailsXml<'a>(&'a [AdditionalDetail]);

impl<'a> Serialize for AdditionalDetailsXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("detallesAdicionales", self.0.len())?;
        for detail in self.0 {
            st.serialize_field("detAdicional", &AdditionalDetailXml(detail))?;
        }
        st.end()
    }
}

struct LineTaxXml<'a>(&'a LineTax);

impl<'a> Serialize for LineTaxXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let tax = self.0;
        let mut st = s.serialize_struct("impuesto", 5)?;
        st.serialize_field("codigo", &tax.code)?;
        st.serialize_field("codigoPorcentaje", &tax.rate_code)?;
        st.serialize_field("tarifa", &tax.rate)?;
        st.serialize_field("baseImponible", &tax.taxable_base)?;
        st.serialize_field("valor", &tax.value)?;
        st.end()
    }
}

struct LineTaxesXml<'a>(&'a [LineTax]);

impl<'a> Serialize for LineTaxesXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("impuestos", self.0.len())?;
        for tax in self.0 {
            st.serialize_field("impuesto", &LineTaxXml(tax))?;
        }
        st.end()
    }
}

struct LineItemXml<'a> {
    kind: DocumentKind,
    line: &'a LineItem,
}

impl<'a> Serialize for LineItemXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let line = self.line;
        let (main_tag, auxiliary_tag) = match self.kind {
            DocumentKind::Invoice => ("codigoPrincipal", "codigoAuxiliar"),
            DocumentKind::CreditNote => ("codigoInterno", "codigoAdicional"),
        };

        let mut st = s.serialize_struct("detalle", 9)?;
        if let Some(code) = &line.main_code {
            st.serialize_field(main_tag, code)?;
        }
        if let Some(code) = &line.auxiliary_code {
            st.serialize_field(auxiliary_tag, code)?;
        }
        st.serialize_field("descripcion", &line.description)?;
        st.serialize_field("cantidad", &line.quantity)?;
        st.serialize_field("precioUnitario", &line.unit_price)?;
        st.serialize_field("descuento", &line.discount)?;
        st.serialize_field("precioTotalSinImpuesto", &line.total_without_tax)?;
        if let Some(details) = line.additional_details.as_deref().filter(|d| !d.is_empty()) {
            st.serialize_field("detallesAdicionales", &AdditionalDetailsXml(details))?;
        }
        st.serialize_field("impuestos", &LineTaxesXml(&line.taxes))?;
        st.end()
    }
}

struct LineItemsXml<'a> {
    kind: DocumentKind,
    lines: &'a [LineItem],
}

impl<'a> Serialize for LineItemsXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("detalles", self.lines.len())?;
        for line in self.lines {
            st.serialize_field(
                "detalle",
                &LineItemXml {
                    kind: self.kind,
                    line,
                },
            )?;
        }
        st.end()
    }
}

struct AdditionalFieldXml<'a>(&'a AdditionalField);

impl<'a> Serialize for AdditionalFieldXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("campoAdicional", 2)?;
        st.serialize_field("@nombre", &self.0.name)?;
        st.serialize_field("$text", &self.0.value)?;
        st.end()
    }
}

struct AdditionalInfoXml<'a>(&'a [AdditionalField]);

impl<'a> Serialize for AdditionalInfoXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("infoAdicional", self.0.len())?;
        for field in self.0 {
            st.serialize_field("campoAdicional", &AdditionalFieldXml(field))?;
        }
        st.end()
    }
}

impl<'a, T: DocumentView + ?Sized> Serialize for DocumentXml<'a, T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let view = self.0;
        let document = view.document();
        let kind = document.kind();

        let mut root = serializer.serialize_struct(kind.root_tag(), 6)?;
        root.serialize_field("@id", COMPROBANTE_ID)?;
        root.serialize_field("@version", kind.schema_version())?;

        root.serialize_field(
            "infoTributaria",
            &TaxpayerInfoXml {
                info: &document.tax_info,
                access_key: view.access_key(),
            },
        )?;

        match &document.header {
            DocumentHeader::Invoice(info) => {
                root.serialize_field("infoFactura", &InvoiceInfoXml(info))?;
            }
            DocumentHeader::CreditNote(info) => {
                root.serialize_field("infoNotaCredito", &CreditNoteInfoXml(info))?;
            }
        }

        root.serialize_field(
            "detalles",
            &LineItemsXml {
                kind,
                lines: &document.lines,
            },
        )?;

        if let Some(fields) = document.additional_info.as_deref().filter(|f| !f.is_empty()) {
            root.serialize_field("infoAdicional", &AdditionalInfoXml(fields))?;
        }

        root.end()
    }
}
