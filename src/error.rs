//! Fault types for grammar loading, parsing and generation.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// A fatal fault. Every variant describes a defect in the grammar (or in how
/// it was loaded), never a sentence that simply has no derivation.
#[derive(Debug, Error)]
pub enum Error {
  /// Two sibling fields of one template claim the same right-hand-side
  /// position with different content.
  #[error("merge conflict at position {index}: {existing} vs {incoming}")]
  MergeConflict {
    index: usize,
    existing: String,
    incoming: String,
  },

  /// Two partial records both set the same key.
  #[error("key `{key}` is already set in sparse object")]
  KeyCollision { key: String },

  /// A slot addresses a child the rule does not have.
  #[error("no slot {index} among {len} children")]
  Arity { index: usize, len: usize },

  /// A slot projects an attribute the child value does not carry.
  #[error("no attribute `{attribute}` on {value}")]
  MissingAttribute { attribute: String, value: String },

  /// A list tail produced something that cannot be spliced.
  #[error("list tail is not a list: {value}")]
  NotAList { value: String },

  #[error("no rules for <{symbol}>")]
  UndefinedSymbol { symbol: String },

  /// The ruleset references symbols it never defines.
  #[error("grammar is incomplete, missing rules for: {}", missing.join(", "))]
  Incomplete { missing: Vec<String> },

  #[error("recursion deeper than {limit} while expanding <{symbol}>")]
  DepthExceeded { symbol: String, limit: usize },

  /// A fault raised while applying a specific rule.
  #[error("in rule {rule}: {source}")]
  InRule {
    rule: String,
    #[source]
    source: Box<Error>,
  },

  #[error("line {line}: {message}")]
  Syntax { line: usize, message: String },

  #[error("failed to read '{}': {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

impl Error {
  pub(crate) fn in_rule(self, rule: impl fmt::Display) -> Self {
    Self::InRule {
      rule: rule.to_string(),
      source: Box::new(self),
    }
  }
}

/// A rule's shape does not fit the value being reversed. Recoverable: the
/// caller moves on to the next rule for the same symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
  pub reason: String,
}

impl Mismatch {
  pub fn new(reason: impl Into<String>) -> Self {
    Self {
      reason: reason.into(),
    }
  }
}

impl fmt::Display for Mismatch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.reason)
  }
}

/// Outcome of a failed reverse step: either this alternative does not apply,
/// or the grammar is broken.
#[derive(Debug)]
pub enum Failure {
  Mismatch(Mismatch),
  Fatal(Error),
}

impl From<Mismatch> for Failure {
  fn from(m: Mismatch) -> Self {
    Self::Mismatch(m)
  }
}

impl From<Error> for Failure {
  fn from(e: Error) -> Self {
    Self::Fatal(e)
  }
}
