//! Partial results assembled while reversing a template.
//!
//! Each field of a template independently says which right-hand-side position
//! its piece of the value belongs to. These contributions are merged with a
//! conflict-checked union into one [`SparseList`] per rule attempt.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::Error;
use crate::value::Value;

/// A keyed partial record, produced by attribute slots (`$0.claim`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseObject(BTreeMap<String, Value>);

impl SparseObject {
  pub fn new() -> Self {
    Default::default()
  }

  pub fn single(key: impl Into<String>, value: Value) -> Self {
    let mut map = BTreeMap::new();
    map.insert(key.into(), value);
    Self(map)
  }

  pub fn get(&self, key: &str) -> Option<&Value> {
    self.0.get(key)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
    self.0.iter()
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  /// Fails on any shared key, even when both sides hold the same value.
  pub fn union(mut self, other: Self) -> Result<Self, Error> {
    for (key, value) in other.0 {
      if self.0.contains_key(&key) {
        return Err(Error::KeyCollision { key });
      }
      self.0.insert(key, value);
    }
    Ok(self)
  }
}

impl fmt::Display for SparseObject {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{{")?;
    for (idx, (key, value)) in self.0.iter().enumerate() {
      if idx > 0 {
        write!(f, ",")?;
      }
      write!(f, " {}: {}", key, value)?;
    }
    write!(f, " }}")
  }
}

/// What a reverse step hands down to one right-hand-side position.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
  Value(Value),
  Object(SparseObject),
}

impl From<Value> for Fragment {
  fn from(v: Value) -> Self {
    Self::Value(v)
  }
}

impl From<SparseObject> for Fragment {
  fn from(o: SparseObject) -> Self {
    Self::Object(o)
  }
}

impl fmt::Display for Fragment {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Value(v) => write!(f, "{}", v),
      Self::Object(o) => write!(f, "{}", o),
    }
  }
}

/// A positional partial assignment, one optional fragment per right-hand-side
/// element. The width is fixed when the list is allocated.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseList {
  slots: Vec<Option<Fragment>>,
}

impl SparseList {
  pub fn new(width: usize) -> Self {
    Self {
      slots: vec![None; width],
    }
  }

  /// A list with a single position set
  pub fn with(width: usize, index: usize, fragment: Fragment) -> Result<Self, Error> {
    let mut list = Self::new(width);
    list.set(index, fragment)?;
    Ok(list)
  }

  pub fn width(&self) -> usize {
    self.slots.len()
  }

  pub fn get(&self, index: usize) -> Option<&Fragment> {
    self.slots.get(index).and_then(Option::as_ref)
  }

  pub fn is_set(&self, index: usize) -> bool {
    self.get(index).is_some()
  }

  /// Number of positions holding a fragment
  pub fn count(&self) -> usize {
    self.slots.iter().filter(|s| s.is_some()).count()
  }

  pub fn into_slots(self) -> Vec<Option<Fragment>> {
    self.slots
  }

  /// Set a position. Equal values may be set twice; two partial records at the
  /// same position are unioned; anything else is a conflict.
  pub fn set(&mut self, index: usize, fragment: Fragment) -> Result<(), Error> {
    let width = self.width();
    let slot = self
      .slots
      .get_mut(index)
      .ok_or(Error::Arity { index, len: width })?;

    let merged = match (slot.take(), fragment) {
      (None, incoming) => incoming,
      (Some(Fragment::Object(a)), Fragment::Object(b)) => Fragment::Object(a.union(b)?),
      (Some(Fragment::Value(a)), Fragment::Value(b)) if a == b => Fragment::Value(a),
      (Some(existing), incoming) => {
        return Err(Error::MergeConflict {
          index,
          existing: existing.to_string(),
          incoming: incoming.to_string(),
        });
      }
    };

    *slot = Some(merged);
    Ok(())
  }

  pub fn union(mut self, other: Self) -> Result<Self, Error> {
    if self.slots.len() < other.slots.len() {
      self.slots.resize(other.slots.len(), None);
    }
    for (index, fragment) in other.slots.into_iter().enumerate() {
      if let Some(fragment) = fragment {
        self.set(index, fragment)?;
      }
    }
    Ok(self)
  }
}

impl fmt::Display for SparseList {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "[")?;
    for (idx, slot) in self.slots.iter().enumerate() {
      if idx > 0 {
        write!(f, ", ")?;
      }
      match slot {
        Some(fragment) => write!(f, "{}", fragment)?,
        None => write!(f, "_")?,
      }
    }
    write!(f, "]")
  }
}

#[cfg(test)]
mod tests {
  use proptest::prelude::*;

  use super::*;

  fn list(slots: &[Option<&str>]) -> SparseList {
    let mut l = SparseList::new(slots.len());
    for (idx, s) in slots.iter().enumerate() {
      if let Some(s) = s {
        l.set(idx, Value::from(*s).into()).unwrap();
      }
    }
    l
  }

  #[test]
  fn test_disjoint_union() {
    let merged = list(&[Some("a"), None, None])
      .union(list(&[None, None, Some("c")]))
      .unwrap();
    assert_eq!(merged, list(&[Some("a"), None, Some("c")]));
    assert_eq!(merged.count(), 2);
    assert_eq!(merged.to_string(), r#"["a", _, "c"]"#);
  }

  #[test]
  fn test_equal_values_at_same_index() {
    let merged = list(&[Some("a"), None]).union(list(&[Some("a"), Some("b")])).unwrap();
    assert_eq!(merged, list(&[Some("a"), Some("b")]));
  }

  #[test]
  fn test_conflicting_values_at_same_index() {
    let err = list(&[Some("a")]).union(list(&[Some("b")])).unwrap_err();
    assert!(matches!(err, Error::MergeConflict { index: 0, .. }));
  }

  #[test]
  fn test_set_beyond_width() {
    let err = SparseList::with(2, 2, Value::Null.into()).unwrap_err();
    assert!(matches!(err, Error::Arity { index: 2, len: 2 }));
  }

  #[test]
  fn test_objects_at_same_index_combine() {
    let a = SparseList::with(1, 0, SparseObject::single("claim", "x".into()).into()).unwrap();
    let b = SparseList::with(1, 0, SparseObject::single("conditions", Value::List(vec![])).into())
      .unwrap();
    let merged = a.union(b).unwrap();
    match merged.get(0) {
      Some(Fragment::Object(o)) => {
        assert_eq!(o.len(), 2);
        assert_eq!(o.get("claim"), Some(&Value::from("x")));
      }
      other => panic!("expected object, got {:?}", other),
    }
  }

  #[test]
  fn test_objects_reject_equal_keys() {
    let a = SparseObject::single("claim", "x".into());
    let err = a.clone().union(a).unwrap_err();
    assert!(matches!(err, Error::KeyCollision { key } if key == "claim"));
  }

  #[test]
  fn test_object_and_value_conflict() {
    let a = SparseList::with(1, 0, SparseObject::single("claim", "x".into()).into()).unwrap();
    let b = SparseList::with(1, 0, Value::from("x").into()).unwrap();
    assert!(matches!(a.union(b), Err(Error::MergeConflict { .. })));
  }

  fn slots() -> impl Strategy<Value = Vec<Option<(bool, u8)>>> {
    prop::collection::vec(prop::option::of((any::<bool>(), 0u8..4)), 0..8)
  }

  fn split(slots: &[Option<(bool, u8)>]) -> (SparseList, SparseList) {
    let mut left = SparseList::new(slots.len());
    let mut right = SparseList::new(slots.len());
    for (idx, slot) in slots.iter().enumerate() {
      if let Some((side, v)) = slot {
        let target = if *side { &mut left } else { &mut right };
        target.set(idx, Value::from(v.to_string()).into()).unwrap();
      }
    }
    (left, right)
  }

  proptest! {
    #[test]
    fn disjoint_union_commutes(slots in slots()) {
      let (a, b) = split(&slots);
      let ab = a.clone().union(b.clone()).unwrap();
      let ba = b.union(a).unwrap();
      prop_assert_eq!(ab, ba);
    }

    #[test]
    fn union_with_self_is_idempotent(slots in slots()) {
      let (a, _) = split(&slots);
      prop_assert_eq!(a.clone().union(a.clone()).unwrap(), a);
    }

    #[test]
    fn differing_values_conflict(width in 1usize..8, v in 0u8..4) {
      let index = width - 1;
      let a = SparseList::with(width, index, Value::from(v.to_string()).into()).unwrap();
      let b = SparseList::with(width, index, Value::from((v + 1).to_string()).into()).unwrap();
      prop_assert!(a.union(b).is_err());
    }

    #[test]
    fn shared_keys_always_collide(key in "[a-z]{1,6}", v in 0u8..4, w in 0u8..4) {
      let a = SparseObject::single(key.clone(), Value::from(v.to_string()));
      let b = SparseObject::single(key, Value::from(w.to_string()));
      prop_assert!(a.union(b).is_err());
    }
  }
}
