#![allow(dead_code)]
use comprobantes_core::document::validation::Validate;

#[derive(Validate)]
struct Payment {
    #[validate(required, positive)]
    total: String,
}

fn main() {}
