//! Core of the Lamina extensible compiler.
//!
//! A language is a stack of layers over a base language. Each layer can add
//! type variants, node kinds, per-node behavior and passes without touching
//! the layers below it. A stack is assembled once:
//!
//!   layers (innermost first)
//!     -> keywords       (union of the stack)
//!     -> factories      (node + delegate factory chains)
//!     -> type system    (extension chain over one canonical registry)
//!     -> pipeline       (base passes + anchored edits)
//!
//! and then compiles any number of units, in parallel if asked.

// ---------------------------------------------------------------------
// Error handling and diagnostics
// ---------------------------------------------------------------------

pub mod span;
pub mod diagnostic;
pub mod error;

// ---------------------------------------------------------------------
// Front-end: lexing and parsing
// ---------------------------------------------------------------------

pub mod lexer;
pub mod parser;
pub mod ast;

// ---------------------------------------------------------------------
// Extension model: types, delegates, factories
// ---------------------------------------------------------------------

pub mod types;
pub mod delegate;
pub mod factory;

// ---------------------------------------------------------------------
// Passes and their base semantics
// ---------------------------------------------------------------------

pub mod context;
pub mod visit;
pub mod typecheck;
pub mod printer;
pub mod pipeline;

// ---------------------------------------------------------------------
// Layer composition and session driving
// ---------------------------------------------------------------------

pub mod bootstrap;
pub mod layers;
pub mod sources;
pub mod compiler;

// ---------------------------------------------------------------------
// Public API re-exports
// ---------------------------------------------------------------------

pub use bootstrap::{Layer, LayerBootstrap, LayerRegistry};
pub use compiler::{
    CompileOptions, SessionReport, UnitReport, compile_session, compile_source, compile_unit,
};
pub use diagnostic::{Diagnostic, Severity};
pub use error::{CoreError, ErrorClass};
pub use sources::{SourceUnit, load_sources};
