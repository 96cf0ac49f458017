use comprobantes_core::document::validation::Validate;
use serde::{Deserialize, Serialize};

#[derive(Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AdditionalField {
    #[serde(rename = "nombre")]
    #[validate(required, length(min = 1, max = 300))]
    pub name: String,
    #[serde(rename = "valor", skip_serializing_if = "String::is_empty")]
    #[validate(required)]
    pub value: String,
}

fn main() {
    let names: Vec<&str> = AdditionalField::CONSTRAINTS.iter().map(|c| c.field).collect();
    assert_eq!(names, vec!["nombre", "valor"]);

    let errors = AdditionalField::default().validate();
    assert_eq!(errors[0].field, "nombre");
    assert_eq!(errors[0].message, "nombre es obligatorio");
    assert_eq!(errors.last().map(|e| e.field.as_str()), Some("valor"));
}
