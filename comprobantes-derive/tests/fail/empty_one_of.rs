#![allow(dead_code)]
use comprobantes_core::document::validation::Validate;

#[derive(Validate)]
struct Taxpayer {
    #[validate(one_of())]
    keeps_accounting: Option<String>,
}

fn main() {}
