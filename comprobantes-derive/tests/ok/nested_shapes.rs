use comprobantes_core::document::validation::Validate;

#[derive(Default, Validate)]
pub struct Tax {
    #[validate(required, amount)]
    pub value: String,
}

#[derive(Default, Validate)]
pub struct Line {
    #[validate(nested)]
    pub main_tax: Tax,
    #[validate(nested)]
    pub extra_tax: Option<Tax>,
    #[validate(min_items = 1, nested)]
    pub taxes: Vec<Tax>,
    #[validate(nested)]
    pub details: Option<Vec<Tax>>,
}

fn main() {
    let line = Line {
        main_tax: Tax { value: "1.00".into() },
        extra_tax: Some(Tax::default()),
        taxes: vec![Tax { value: "1.00".into() }, Tax { value: "x".into() }],
        details: Some(vec![Tax::default()]),
    };
    let fields: Vec<String> = line.validate().into_iter().map(|e| e.field).collect();
    assert_eq!(
        fields,
        vec![
            "extra_tax.value",
            "extra_tax.value",
            "taxes[1].value",
            "details[0].value",
            "details[0].value",
        ]
    );

    let empty = Line::default();
    let fields: Vec<String> = empty.validate().into_iter().map(|e| e.field).collect();
    assert_eq!(fields, vec!["taxes", "main_tax.value", "main_tax.value"]);
}
