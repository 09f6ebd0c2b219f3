//! dali-compiler
//!
//! This crate implements:
//!  1) A loader for the register-definition document (json with `//` and
//!     `/* */` comments),
//!  2) A schema validator for oid definitions (required attributes, data
//!     type grammar, recursive bit-pack / packed struct rules),
//!  3) A macro and `$$` reference resolver that rewrites string leaves of
//!     the document in place,
//!  4) A template engine that expands `<%dali ... %>` snippets against the
//!     validated model and mirrors a template directory tree,
//!  5) Error types (`DaliError`).

pub mod error;
pub mod types;
pub mod utils;
pub mod loader;
pub mod validator;
pub mod resolver;
pub mod generator;
pub mod compiler;

pub use compiler::build_model;
pub use compiler::run;
pub use error::DaliError;
