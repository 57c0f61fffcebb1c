//! Converters between a rule's matched children and its semantic value.
//!
//! Every combinator works in two directions. `consume` builds a value from the
//! children a rule matched, and `reverse` takes a value apart again into the
//! positional [`SparseList`] the generator needs to produce tokens.

use std::fmt;

use tracing::trace;

use crate::error::{Error, Failure, Mismatch};
use crate::sparse::{Fragment, SparseList, SparseObject};
use crate::value::{Record, Value};

/// A positional reference into a rule's children, optionally projecting one
/// attribute of the child.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
  pub index: usize,
  pub attribute: Option<String>,
}

impl Slot {
  pub fn new(index: usize) -> Self {
    Self {
      index,
      attribute: None,
    }
  }

  pub fn attr(index: usize, attribute: impl Into<String>) -> Self {
    Self {
      index,
      attribute: Some(attribute.into()),
    }
  }

  fn consume(&self, children: &[Value]) -> Result<Value, Error> {
    let child = children.get(self.index).ok_or(Error::Arity {
      index: self.index,
      len: children.len(),
    })?;

    match &self.attribute {
      None => Ok(child.clone()),
      Some(attribute) => child.field(attribute).cloned().ok_or_else(|| Error::MissingAttribute {
        attribute: attribute.clone(),
        value: child.to_string(),
      }),
    }
  }

  fn reverse(&self, fragment: &Fragment, width: usize) -> Result<SparseList, Failure> {
    let placed = match (&self.attribute, fragment) {
      (None, fragment) => fragment.clone(),
      (Some(attribute), Fragment::Value(v)) => SparseObject::single(attribute.clone(), v.clone()).into(),
      (Some(attribute), Fragment::Object(o)) => {
        return Err(Mismatch::new(format!("cannot project .{} out of partial {}", attribute, o)).into());
      }
    };
    Ok(SparseList::with(width, self.index, placed)?)
  }
}

impl fmt::Display for Slot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.attribute {
      Some(attribute) => write!(f, "${}.{}", self.index, attribute),
      None => write!(f, "${}", self.index),
    }
  }
}

/// A template field: either computed from the children, or a fixed value the
/// rule always produces (and that reversal requires).
#[derive(Debug, Clone)]
pub enum Field {
  Combinator(Combinator),
  Fixed(Value),
}

impl fmt::Display for Field {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Combinator(c) => write!(f, "{}", c),
      Self::Fixed(v) => write!(f, "{}", v),
    }
  }
}

impl From<Combinator> for Field {
  fn from(c: Combinator) -> Self {
    Self::Combinator(c)
  }
}

impl From<Slot> for Field {
  fn from(s: Slot) -> Self {
    Self::Combinator(s.into())
  }
}

impl From<Template> for Field {
  fn from(t: Template) -> Self {
    Self::Combinator(t.into())
  }
}

impl From<TList> for Field {
  fn from(t: TList) -> Self {
    Self::Combinator(t.into())
  }
}

impl From<Value> for Field {
  fn from(v: Value) -> Self {
    Self::Fixed(v)
  }
}

impl From<&str> for Field {
  fn from(s: &str) -> Self {
    Self::Fixed(s.into())
  }
}

/// Builds a [`Record`] tagged `tag` out of named fields.
#[derive(Debug, Clone)]
pub struct Template {
  pub tag: String,
  pub fields: Vec<(String, Field)>,
}

impl Template {
  pub fn new(tag: impl Into<String>) -> Self {
    Self {
      tag: tag.into(),
      fields: Vec::new(),
    }
  }

  /// Adds a field. Setting a name twice replaces the earlier field in place,
  /// since a record holds each name once.
  pub fn field(mut self, name: impl Into<String>, field: impl Into<Field>) -> Self {
    let name = name.into();
    let field = field.into();
    match self.fields.iter_mut().find(|(n, _)| *n == name) {
      Some(existing) => existing.1 = field,
      None => self.fields.push((name, field)),
    }
    self
  }

  pub(crate) fn lookup(&self, name: &str) -> Option<&Field> {
    self.fields.iter().find(|(n, _)| n == name).map(|(_, f)| f)
  }

  fn consume(&self, children: &[Value]) -> Result<Value, Error> {
    let mut record = Record::new(self.tag.clone());
    for (name, field) in self.fields.iter() {
      let value = match field {
        Field::Combinator(c) => c.consume(children)?,
        Field::Fixed(v) => v.clone(),
      };
      record.fields.insert(name.clone(), value);
    }
    Ok(Value::Record(record))
  }

  fn reverse_field(
    &self,
    name: &str,
    field: &Field,
    value: &Value,
    width: usize,
  ) -> Result<SparseList, Failure> {
    match field {
      Field::Combinator(c) => c.reverse(&Fragment::Value(value.clone()), width),
      Field::Fixed(expected) if expected == value => Ok(SparseList::new(width)),
      Field::Fixed(expected) => Err(
        Mismatch::new(format!(
          "{}.{} is {} in the value but {} in the template",
          self.tag, name, value, expected
        ))
        .into(),
      ),
    }
  }

  fn reverse(&self, fragment: &Fragment, width: usize) -> Result<SparseList, Failure> {
    let mut flat = SparseList::new(width);

    match fragment {
      Fragment::Value(Value::Record(record)) if record.tag == self.tag => {
        if record.fields.len() != self.fields.len() {
          return Err(Mismatch::new(format!("{} has a different set of fields", record)).into());
        }
        for (name, field) in self.fields.iter() {
          let value = record
            .get(name)
            .ok_or_else(|| Mismatch::new(format!("{} has no field {}", record, name)))?;
          flat = flat.union(self.reverse_field(name, field, value, width)?)?;
        }
      }
      // a partial record only constrains the fields it carries
      Fragment::Object(object) => {
        for (name, value) in object.iter() {
          let field = self
            .lookup(name)
            .ok_or_else(|| Mismatch::new(format!("{} has no field {}", self.tag, name)))?;
          flat = flat.union(self.reverse_field(name, field, value, width)?)?;
        }
      }
      other => {
        return Err(Mismatch::new(format!("{} is not a {}", other, self.tag)).into());
      }
    }

    Ok(flat)
  }
}

impl fmt::Display for Template {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} {{", self.tag)?;
    for (idx, (name, field)) in self.fields.iter().enumerate() {
      if idx > 0 {
        write!(f, ",")?;
      }
      write!(f, " {}: {}", name, field)?;
    }
    write!(f, " }}")
  }
}

/// Builds lists for recursive `A, B and C` rules: the head combinators each
/// contribute one item, the tail combinators each contribute a list that is
/// spliced on the end.
#[derive(Debug, Clone, Default)]
pub struct TList {
  pub head: Vec<Combinator>,
  pub tail: Vec<Combinator>,
}

impl TList {
  pub fn new(head: Vec<Combinator>, tail: Vec<Combinator>) -> Self {
    Self { head, tail }
  }

  fn consume(&self, children: &[Value]) -> Result<Value, Error> {
    let mut items = Vec::with_capacity(self.head.len());
    for c in self.head.iter() {
      items.push(c.consume(children)?);
    }
    for c in self.tail.iter() {
      match c.consume(children)? {
        Value::List(rest) => items.extend(rest),
        other => {
          return Err(Error::NotAList {
            value: other.to_string(),
          });
        }
      }
    }
    Ok(Value::List(items))
  }

  fn reverse(&self, fragment: &Fragment, width: usize) -> Result<SparseList, Failure> {
    let items = match fragment {
      Fragment::Value(Value::List(items)) => items,
      other => return Err(Mismatch::new(format!("{} is not a list", other)).into()),
    };

    if items.len() < self.head.len() {
      return Err(Mismatch::new("head is longer than the list").into());
    }
    if self.tail.is_empty() && items.len() > self.head.len() {
      return Err(Mismatch::new("list is longer than the head and there is no tail").into());
    }
    if !self.tail.is_empty() && items.len() == self.head.len() {
      return Err(Mismatch::new("list ends where the tail should begin").into());
    }

    let mut flat = SparseList::new(width);
    for (c, item) in self.head.iter().zip(items.iter()) {
      flat = flat.union(c.reverse(&Fragment::Value(item.clone()), width)?)?;
    }

    let rest = Fragment::Value(Value::List(items[self.head.len()..].to_vec()));
    for c in self.tail.iter() {
      flat = flat.union(c.reverse(&rest, width)?)?;
    }

    Ok(flat)
  }
}

impl fmt::Display for TList {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let join = |cs: &[Combinator]| cs.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
    write!(f, "[{}", join(&self.head))?;
    if !self.tail.is_empty() {
      write!(f, "; {}", join(&self.tail))?;
    }
    write!(f, "]")
  }
}

/// How a rule builds its value from its children, and takes it apart again.
#[derive(Debug, Clone)]
pub enum Combinator {
  Slot(Slot),
  Template(Template),
  TList(TList),
  /// Nullable placeholder, builds `Value::Null`
  Empty,
}

impl Combinator {
  pub fn slot(index: usize) -> Self {
    Self::Slot(Slot::new(index))
  }

  pub fn slot_attr(index: usize, attribute: impl Into<String>) -> Self {
    Self::Slot(Slot::attr(index, attribute))
  }

  /// Build this combinator's value from a rule's matched children. Failing
  /// here means the grammar itself is wrong.
  pub fn consume(&self, children: &[Value]) -> Result<Value, Error> {
    match self {
      Self::Slot(s) => s.consume(children),
      Self::Template(t) => t.consume(children),
      Self::TList(t) => t.consume(children),
      Self::Empty => Ok(Value::Null),
    }
  }

  /// Decompose `fragment` into the positional contributions of a rule with
  /// `width` right-hand-side elements.
  pub fn reverse(&self, fragment: &Fragment, width: usize) -> Result<SparseList, Failure> {
    let result = match self {
      Self::Slot(s) => s.reverse(fragment, width),
      Self::Template(t) => t.reverse(fragment, width),
      Self::TList(t) => t.reverse(fragment, width),
      Self::Empty => match fragment {
        Fragment::Value(Value::Null) => Ok(SparseList::new(width)),
        other => Err(Mismatch::new(format!("{} is not null", other)).into()),
      },
    };

    if let Err(Failure::Mismatch(m)) = &result {
      trace!(combinator = %self, reason = %m, "mismatch");
    }
    result
  }
}

impl fmt::Display for Combinator {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Slot(s) => write!(f, "{}", s),
      Self::Template(t) => write!(f, "{}", t),
      Self::TList(t) => write!(f, "{}", t),
      Self::Empty => write!(f, "empty"),
    }
  }
}

impl From<Slot> for Combinator {
  fn from(s: Slot) -> Self {
    Self::Slot(s)
  }
}

impl From<Template> for Combinator {
  fn from(t: Template) -> Self {
    Self::Template(t)
  }
}

impl From<TList> for Combinator {
  fn from(t: TList) -> Self {
    Self::TList(t)
  }
}
