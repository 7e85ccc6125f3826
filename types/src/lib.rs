//! Core domain types for the linter.
//!
//! This crate contains pure domain types with no IO and no threads.
//! Everything here can be used from any layer: the settings loader builds
//! [`LinterRule`]s and a [`SquiggleStyle`], the lint engine produces
//! [`Diagnostic`]s, and hosts render them.

mod diagnostic;
mod rule;
mod style;

pub use diagnostic::{DEFAULT_SEVERITY, Diagnostic, ErrorMode};
pub use rule::{LinterRule, VariableDefinition, normalize_extension};
pub use style::{ColorParseError, Rgb, SquiggleStyle};
