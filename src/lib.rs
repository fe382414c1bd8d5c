// src/lib.rs
pub mod canonicalization;
pub mod models;
pub mod text_normalizer;
pub mod utils;
