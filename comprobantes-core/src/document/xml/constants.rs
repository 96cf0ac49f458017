/// Declaration plus a single newline; every canonical document starts with it.
pub const DOCUMENT_PROLOG: &str =
    "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n";
pub(crate) const ENVELOPE_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;
pub(crate) const COMPROBANTE_ID: &str = "comprobante";

pub(crate) const AUTHORIZED: &str = "AUTORIZADO";
pub(crate) const AUTHORIZATION_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";
