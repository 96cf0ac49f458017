use comprobantes_core::document::validation::{Rule, Validate};

#[derive(Validate)]
pub struct Payment {
    #[validate(required, digits = 2)]
    pub method: String,
    #[validate(required, amount)]
    pub total: String,
    #[validate(length(min = 1, max = 10))]
    pub time_unit: Option<String>,
    #[validate(one_of("SI", "NO"))]
    pub keeps_accounting: Option<String>,
    #[validate(date)]
    pub due: Option<String>,
    pub note: String,
}

fn main() {
    assert_eq!(Payment::CONSTRAINTS.len(), 5);
    assert_eq!(Payment::CONSTRAINTS[0].field, "method");
    assert_eq!(Payment::CONSTRAINTS[0].rules, &[Rule::Required, Rule::Digits(2)]);
    assert_eq!(
        Payment::CONSTRAINTS[2].rules,
        &[Rule::Length { min: 1, max: 10 }]
    );

    let ok = Payment {
        method: "01".into(),
        total: "11.50".into(),
        time_unit: None,
        keeps_accounting: Some("SI".into()),
        due: Some("31/01/2024".into()),
        note: String::new(),
    };
    assert!(ok.validate().is_empty());

    let bad = Payment {
        method: "1".into(),
        total: "".into(),
        time_unit: Some("".into()),
        keeps_accounting: Some("TAL VEZ".into()),
        due: Some("2024-01-31".into()),
        note: String::new(),
    };
    let fields: Vec<String> = bad.validate().into_iter().map(|e| e.field).collect();
    assert_eq!(
        fields,
        vec!["method", "total", "total", "time_unit", "keeps_accounting", "due"]
    );
}
