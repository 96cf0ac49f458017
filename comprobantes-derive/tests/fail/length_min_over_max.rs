#![allow(dead_code)]
use comprobantes_core::document::validation::Validate;

#[derive(Validate)]
struct Line {
    #[validate(length(min = 5, max = 1))]
    description: String,
}

fn main() {}
