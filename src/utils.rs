use std::collections::HashSet;
use std::hash::Hash;

/// Drops repeated successes from a result stream, keeping the first of each.
/// Errors pass through untouched. Lazy, like the streams it wraps.
///
/// ```
/// let v: Vec<Result<u32, ()>> = vec![Ok(1), Ok(2), Ok(1), Err(()), Ok(3), Ok(2)];
///
/// assert_eq!(
///   argrammar::utils::unique(v).collect::<Vec<_>>(),
///   vec![Ok(1), Ok(2), Err(()), Ok(3)],
/// );
/// ```
pub fn unique<I, T, E>(iter: I) -> Unique<I::IntoIter, T>
where
  I: IntoIterator<Item = Result<T, E>>,
  T: Eq + Hash + Clone,
{
  Unique {
    inner: iter.into_iter(),
    seen: HashSet::new(),
  }
}

pub struct Unique<I, T> {
  inner: I,
  seen: HashSet<T>,
}

impl<I, T, E> Iterator for Unique<I, T>
where
  I: Iterator<Item = Result<T, E>>,
  T: Eq + Hash + Clone,
{
  type Item = Result<T, E>;

  fn next(&mut self) -> Option<Self::Item> {
    loop {
      match self.inner.next()? {
        Ok(v) if self.seen.contains(&v) => continue,
        Ok(v) => {
          self.seen.insert(v.clone());
          return Some(Ok(v));
        }
        Err(e) => return Some(Err(e)),
      }
    }
  }
}
