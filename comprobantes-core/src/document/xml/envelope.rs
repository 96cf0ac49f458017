//! Authorization envelope (`<autorizacion>`) wrapping a signed comprobante.
use super::constants::{AUTHORIZATION_TIMESTAMP_FORMAT, AUTHORIZED, ENVELOPE_DECLARATION};
use super::DocumentXmlError;
use chrono::NaiveDateTime;
use quick_xml::se::Serializer as QuickXmlSerializer;
use serde::ser::{Serialize, SerializeStruct, Serializer};

/// Fields of one authorization envelope.
#[derive(Debug, Clone, Copy)]
pub struct Envelope<'a> {
    pub status: &'a str,
    pub authorization_number: &'a str,
    pub authorized_at: &'a str,
    /// Signed document text; embedded as escaped character data.
    pub comprobante: &'a str,
}

struct AuthorizationDateXml<'a>(&'a str);

impl<'a> Serialize for AuthorizationDateXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("fechaAutorizacion", 2)?;
        st.serialize_field("@class", "fechaAutorizacion")?;
        st.serialize_field("$text", self.0)?;
        st.end()
    }
}

struct EmptyMessages;

impl Serialize for EmptyMessages {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        s.serialize_struct("mensajes", 0)?.end()
    }
}

impl<'a> Serialize for Envelope<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("autorizacion", 5)?;
        st.serialize_field("estado", self.status)?;
        st.serialize_field("numeroAutorizacion", self.authorization_number)?;
        st.serialize_field("fechaAutorizacion", &AuthorizationDateXml(self.authorized_at))?;
        st.serialize_field("comprobante", self.comprobante)?;
        st.serialize_field("mensajes", &EmptyMessages)?;
        st.end()
    }
}

impl<'a> Envelope<'a> {
    pub fn to_xml(&self) -> Result<String, DocumentXmlError> {
        let mut buffer = String::with_capacity(self.comprobante.len() + 512);
        buffer.push_str(ENVELOPE_DECLARATION);
        buffer.push('\n');
        {
            let mut serializer = QuickXmlSerializer::new(&mut buffer);
            serializer.indent(' ', 2);
            self.serialize(serializer)?;
        }
        Ok(buffer)
    }
}

/// Formats a timestamp the way authorization records carry it.
pub fn authorization_timestamp(at: NaiveDateTime) -> String {
    at.format(AUTHORIZATION_TIMESTAMP_FORMAT).to_string()
}

/// Envelope for a document the authority already holds under `access_key`.
///
/// The access key doubles as the authorization number.
pub fn authorized_envelope(
    access_key: &str,
    signed_xml: &str,
    at: NaiveDateTime,
) -> Result<String, DocumentXmlError> {
    let timestamp = authorization_timestamp(at);
    Envelope {
        status: AUTHORIZED,
        authorization_number: access_key,
        authorized_at: &timestamp,
        comprobante: signed_xml,
    }
    .to_xml()
}
