#![allow(dead_code)]
use comprobantes_core::document::validation::Validate;

#[derive(Validate)]
enum Status {
    Pending,
    Authorized,
}

fn main() {}
