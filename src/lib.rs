//! Static bounds and assertion checking for the Rill compiler.
//!
//! Rill is a memory-safe low-level language for codecs and wire-format
//! plumbing. Before code generation, every numeric expression, array and
//! slice access, and I/O buffer operation must be statically proven in range;
//! the generated code then runs without runtime traps. This crate is that
//! prover: it consumes a fully parsed, type-annotated AST and either installs
//! a tight `[min, max]` interval on every expression or reports the first
//! unprovable obligation.
//!
//! The crate is organized as the checker (`check`) over three small support
//! layers: interned identifiers (`token`), exact big-integer intervals
//! (`interval`), and the typed AST (`ast`).

pub mod ast;
pub mod check;
pub mod interval;
pub mod token;
