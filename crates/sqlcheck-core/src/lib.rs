//! # sqlcheck-core
//!
//! Validates SQL fragments embedded in host source files against a live database,
//! without running them.
//!
//! ## How It Works
//!
//! 1. [`extract`] finds fragments between two literal delimiter tokens
//!    (`` sql` `` and `` ` `` by default).
//! 2. [`hash`] derives each fragment's identity from its whitespace- and
//!    case-normalized text, so identities survive reformatting.
//! 3. [`overrides`] looks up user-declared parameter types and default values by
//!    file and identity.
//! 4. [`rewrite`] turns the fragment into inert check statements:
//!
//! ```sql
//! -- syntax
//! DO $sqlcheck$ BEGIN RETURN;
//! select * from t where id = $1;
//! END $sqlcheck$;
//! -- planning and parameter types
//! EXPLAIN select * from t where id = $1::int4;
//! ```
//!
//! 5. [`validator`] runs the checks concurrently through a [`Database`] and
//!    replaces the document's diagnostics with the failures.

pub mod config;
pub mod database;
pub mod diagnostic;
pub mod document;
pub mod error;
pub mod extract;
pub mod hash;
pub mod overrides;
pub mod rewrite;
pub mod session;
pub mod validator;

pub use config::{DatabaseConfig, SqlCheckConfig};
pub use database::{ConnectionHandle, Database};
pub use diagnostic::{Diagnostic, DiagnosticSink, FragmentOutcome, MemorySink};
pub use document::{Document, TextDocument};
pub use error::{ConfigError, DatabaseError, DatabaseErrorKind, ValidationError};
pub use extract::{Delimiters, Extraction, Position, Span};
pub use hash::FragmentId;
pub use overrides::{OverrideSnapshot, OverrideStore, ParamOverrides};
pub use rewrite::{CheckKind, CheckStatement, CheckStrategy, Param, SyntaxThenExplain};
pub use session::Session;
pub use validator::{PassReport, PassStatus, Validator};
