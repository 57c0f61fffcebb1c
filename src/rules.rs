use std::fmt;

use crate::combinator::Combinator;
use crate::terminal::Terminal;

/// One element of a rule's right-hand side.
#[derive(Debug, Clone)]
pub enum Element {
  Terminal(Terminal),
  /// Reference to a nonterminal by name
  Symbol(String),
}

impl Element {
  pub fn literal(word: impl Into<String>) -> Self {
    Self::Terminal(Terminal::literal(word))
  }

  pub fn text() -> Self {
    Self::Terminal(Terminal::text())
  }

  pub fn symbol(name: impl Into<String>) -> Self {
    Self::Symbol(name.into())
  }

  pub fn as_symbol(&self) -> Option<&str> {
    match self {
      Self::Symbol(s) => Some(s),
      Self::Terminal(_) => None,
    }
  }
}

impl fmt::Display for Element {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Terminal(t) => write!(f, "{}", t),
      Self::Symbol(s) => write!(f, "{}", s),
    }
  }
}

impl From<&str> for Element {
  fn from(s: &str) -> Self {
    Self::symbol(s)
  }
}

impl From<Terminal> for Element {
  fn from(t: Terminal) -> Self {
    Self::Terminal(t)
  }
}

/// A grammar production. `template` addresses the right-hand side
/// positionally through its slots.
#[derive(Debug, Clone)]
pub struct Rule {
  pub name: String,
  pub rhs: Vec<Element>,
  pub template: Combinator,
}

impl Rule {
  pub fn new(name: impl Into<String>, rhs: Vec<Element>, template: impl Into<Combinator>) -> Self {
    Self {
      name: name.into(),
      rhs,
      template: template.into(),
    }
  }

  pub fn len(&self) -> usize {
    self.rhs.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// The rule together with its template, in grammar notation
  pub fn notation(&self) -> String {
    let mut s = format!("{} ::=", self.name);
    for e in self.rhs.iter() {
      s.push(' ');
      s.push_str(&e.to_string());
    }
    format!("{} => {};", s, self.template)
  }
}

impl fmt::Display for Rule {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "<{} ::=", self.name)?;
    if self.rhs.is_empty() {
      write!(f, " ∅")?;
    }
    for e in self.rhs.iter() {
      write!(f, " {}", e)?;
    }
    write!(f, ">")
  }
}
