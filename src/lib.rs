//! Migo compiler front-end.
//!
//! Migo is a small Go-like statically typed language extended with
//! unconstrained parametric polymorphism. This crate parses Migo source,
//! type-checks it (building a registry of generic declarations and their
//! concrete instantiations), and elaborates the program into an equivalent
//! parameter-free program by monomorphization.
//!
//! Pipeline: [`parser::parse_file`] → [`check::check_file`] →
//! [`transform::transform_file`] → [`printer::print_file`].

pub mod ast;
pub mod check;
pub mod importer;
pub mod lexer;
pub mod parser;
pub mod printer;
pub mod transform;
pub mod types;
