//! Resource matching and server-side-apply dry-run diffing.
//!
//! Given a desired resource and the live set it might correspond to, this
//! crate locates the live counterpart ([`matcher`]), strips fields that
//! shouldn't factor into the comparison ([`ignore_path`]), and produces a
//! classified unified diff ([`calculator`]).

mod calculator;
mod error;
mod ignore_path;
mod matcher;

pub use calculator::{DiffCalculator, DiffOptions, DEFAULT_FIELD_MANAGER};
pub use error::{DiffError, Result};
pub use ignore_path::{parse as parse_ignore_path, remove as remove_ignore_path};
pub use matcher::{match_by_generate_name, match_by_name, match_resource, MatchOutcome, StableIdentityRegistry};
