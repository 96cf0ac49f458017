#![allow(dead_code)]
use comprobantes_core::document::validation::Validate;

#[derive(Validate)]
struct Amount(String);

fn main() {}
