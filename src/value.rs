use std::collections::BTreeMap;
use std::fmt;

/// An atomic token: either a marker keyword the grammar names literally, or an
/// opaque span of other words the tokenizer packed together.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Word {
  Marker(String),
  Text(Vec<String>),
}

impl Word {
  pub fn marker(s: impl Into<String>) -> Self {
    Self::Marker(s.into())
  }

  pub fn text<I, S>(words: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self::Text(words.into_iter().map(Into::into).collect())
  }

  pub fn is_text(&self) -> bool {
    matches!(self, Self::Text(_))
  }

  pub fn as_marker(&self) -> Option<&str> {
    match self {
      Self::Marker(s) => Some(s),
      _ => None,
    }
  }
}

impl fmt::Display for Word {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Marker(s) => write!(f, "{}", s),
      Self::Text(words) => write!(f, "{}", words.join(" ")),
    }
  }
}

impl From<&str> for Word {
  fn from(s: &str) -> Self {
    Self::marker(s)
  }
}

/// A typed value built by a template: the tag names its type, fields are
/// keyed by name so field order never affects equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Record {
  pub tag: String,
  pub fields: BTreeMap<String, Value>,
}

impl Record {
  pub fn new(tag: impl Into<String>) -> Self {
    Self {
      tag: tag.into(),
      fields: BTreeMap::new(),
    }
  }

  /// Builder-style field setter
  pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
    self.fields.insert(name.into(), value.into());
    self
  }

  pub fn get(&self, name: &str) -> Option<&Value> {
    self.fields.get(name)
  }
}

impl fmt::Display for Record {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.tag)?;
    if self.fields.is_empty() {
      return Ok(());
    }
    write!(f, " {{ ")?;
    for (idx, (name, value)) in self.fields.iter().enumerate() {
      if idx > 0 {
        write!(f, ", ")?;
      }
      write!(f, "{}: {}", name, value)?;
    }
    write!(f, " }}")
  }
}

/// The semantic value of a parse.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
  /// Produced by an empty rule
  Null,
  Str(String),
  Word(Word),
  List(Vec<Value>),
  Record(Record),
}

impl Value {
  pub fn as_list(&self) -> Option<&[Value]> {
    match self {
      Self::List(items) => Some(items),
      _ => None,
    }
  }

  pub fn as_record(&self) -> Option<&Record> {
    match self {
      Self::Record(r) => Some(r),
      _ => None,
    }
  }

  /// Field of a record value, None for anything else
  pub fn field(&self, name: &str) -> Option<&Value> {
    self.as_record().and_then(|r| r.get(name))
  }
}

impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Null => write!(f, "null"),
      Self::Str(s) => write!(f, "{:?}", s),
      Self::Word(Word::Marker(s)) => write!(f, "'{}'", s),
      Self::Word(w) => write!(f, "<{}>", w),
      Self::List(items) => {
        write!(f, "[")?;
        for (idx, item) in items.iter().enumerate() {
          if idx > 0 {
            write!(f, ", ")?;
          }
          write!(f, "{}", item)?;
        }
        write!(f, "]")
      }
      Self::Record(r) => write!(f, "{}", r),
    }
  }
}

impl From<&str> for Value {
  fn from(s: &str) -> Self {
    Self::Str(s.to_string())
  }
}

impl From<String> for Value {
  fn from(s: String) -> Self {
    Self::Str(s)
  }
}

impl From<Word> for Value {
  fn from(w: Word) -> Self {
    Self::Word(w)
  }
}

impl From<Record> for Value {
  fn from(r: Record) -> Self {
    Self::Record(r)
  }
}

impl From<Vec<Value>> for Value {
  fn from(items: Vec<Value>) -> Self {
    Self::List(items)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_record_equality_ignores_field_order() {
    let a = Record::new("Argument").with("claim", "a").with("reasons", Value::List(vec![]));
    let b = Record::new("Argument").with("reasons", Value::List(vec![])).with("claim", "a");
    assert_eq!(a, b);
    assert_ne!(a, Record::new("Warrant").with("claim", "a").with("reasons", Value::List(vec![])));
  }

  #[test]
  fn test_display() {
    let v = Value::from(
      Record::new("Argument")
        .with("claim", Record::new("Claim").with("id", "a"))
        .with(
          "reasons",
          vec![Value::from(Word::marker("B")), Value::from(Word::text(["the", "ball"]))],
        ),
    );
    assert_eq!(
      v.to_string(),
      r#"Argument { claim: Claim { id: "a" }, reasons: ['B', <the ball>] }"#
    );
    assert_eq!(Word::text(["is", "red"]).to_string(), "is red");
  }

  #[test]
  fn test_field_projection() {
    let v = Value::from(Record::new("Claim").with("id", "a"));
    assert_eq!(v.field("id"), Some(&Value::from("a")));
    assert_eq!(v.field("nope"), None);
    assert_eq!(Value::Null.field("id"), None);
  }
}
