use std::fmt;
use std::sync::Arc;

use crate::error::Mismatch;
use crate::sparse::Fragment;
use crate::value::{Value, Word};

type TestFn = dyn Fn(&Word) -> bool + Send + Sync;
type ConsumeFn = dyn Fn(&Word) -> Value + Send + Sync;
type ReverseFn = dyn Fn(Option<&Value>) -> Result<Word, Mismatch> + Send + Sync;

/// A caller-defined class of terminals, such as "any text span".
#[derive(Clone)]
pub struct TerminalClass {
  name: String,
  test: Arc<TestFn>,
  consume: Arc<ConsumeFn>,
  reverse: Arc<ReverseFn>,
}

impl TerminalClass {
  pub fn new<T, C, R>(name: impl Into<String>, test: T, consume: C, reverse: R) -> Self
  where
    T: Fn(&Word) -> bool + Send + Sync + 'static,
    C: Fn(&Word) -> Value + Send + Sync + 'static,
    R: Fn(Option<&Value>) -> Result<Word, Mismatch> + Send + Sync + 'static,
  {
    Self {
      name: name.into(),
      test: Arc::new(test),
      consume: Arc::new(consume),
      reverse: Arc::new(reverse),
    }
  }

  /// Matches any `Word::Text` span and yields it unchanged in both directions.
  pub fn text() -> Self {
    Self::new(
      "text",
      Word::is_text,
      |w| Value::Word(w.clone()),
      |v| match v {
        Some(Value::Word(w @ Word::Text(_))) => Ok(w.clone()),
        Some(other) => Err(Mismatch::new(format!("{} is not a text span", other))),
        None => Err(Mismatch::new("no text span to realize")),
      },
    )
  }

  pub fn name(&self) -> &str {
    &self.name
  }
}

impl fmt::Debug for TerminalClass {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TerminalClass").field("name", &self.name).finish()
  }
}

/// A right-hand-side element that matches exactly one token.
#[derive(Debug, Clone)]
pub enum Terminal {
  /// Matches one fixed marker word
  Literal(String),
  Class(TerminalClass),
}

impl Terminal {
  pub fn literal(word: impl Into<String>) -> Self {
    Self::Literal(word.into())
  }

  pub fn text() -> Self {
    Self::Class(TerminalClass::text())
  }

  pub fn test(&self, word: &Word) -> bool {
    match self {
      Self::Literal(s) => word.as_marker() == Some(s.as_str()),
      Self::Class(class) => (class.test)(word),
    }
  }

  pub fn consume(&self, word: &Word) -> Value {
    match self {
      Self::Literal(s) => Value::Word(Word::Marker(s.clone())),
      Self::Class(class) => (class.consume)(word),
    }
  }

  /// Produce the token for this position. `None` means no field of the
  /// template claimed the position.
  pub fn reverse(&self, fragment: Option<&Fragment>) -> Result<Word, Mismatch> {
    let value = match fragment {
      Some(Fragment::Object(o)) => {
        return Err(Mismatch::new(format!("terminal {} cannot realize {}", self, o)));
      }
      Some(Fragment::Value(v)) => Some(v),
      None => None,
    };

    match self {
      Self::Literal(s) => match value {
        None | Some(Value::Null) => Ok(Word::Marker(s.clone())),
        Some(Value::Word(Word::Marker(w))) | Some(Value::Str(w)) if w == s => Ok(Word::Marker(s.clone())),
        Some(other) => Err(Mismatch::new(format!("different literal: {} vs '{}'", other, s))),
      },
      Self::Class(class) => (class.reverse)(value),
    }
  }
}

impl fmt::Display for Terminal {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Literal(s) => write!(f, "'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
      Self::Class(class) => write!(f, "<{}>", class.name),
    }
  }
}
