use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::fs;
use std::ops::Add;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::error::Error;
use crate::rules::{Element, Rule};
use crate::terminal::Terminal;

/// Rules grouped by the symbol they define. Construction never validates;
/// call [`Ruleset::validate`] (or build a [`crate::Parser`]) before use.
#[derive(Debug, Clone, Default)]
pub struct Ruleset {
  rules: HashMap<String, Vec<Arc<Rule>>>,
  /// symbol names in the order they were first defined
  order: Vec<String>,
}

impl Ruleset {
  pub fn new<I>(rules: I) -> Self
  where
    I: IntoIterator<Item = Rule>,
  {
    rules.into_iter().collect()
  }

  pub fn push(&mut self, rule: Rule) {
    self.push_shared(Arc::new(rule));
  }

  fn push_shared(&mut self, rule: Arc<Rule>) {
    if !self.rules.contains_key(&rule.name) {
      self.order.push(rule.name.clone());
    }
    self.rules.entry(rule.name.clone()).or_default().push(rule);
  }

  /// All rules defining `name`
  pub fn get(&self, name: &str) -> Option<&[Arc<Rule>]> {
    self.rules.get(name).map(Vec::as_slice)
  }

  pub fn iter(&self) -> impl Iterator<Item = &Arc<Rule>> {
    self
      .order
      .iter()
      .filter_map(|name| self.rules.get(name))
      .flatten()
  }

  pub fn len(&self) -> usize {
    self.rules.values().map(Vec::len).sum()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Symbols with at least one rule
  pub fn lhs(&self) -> BTreeSet<String> {
    self.rules.keys().cloned().collect()
  }

  /// Symbols referenced from some right-hand side
  pub fn rhs(&self) -> BTreeSet<String> {
    self
      .iter()
      .flat_map(|r| r.rhs.iter())
      .filter_map(Element::as_symbol)
      .map(str::to_string)
      .collect()
  }

  pub fn missing(&self) -> BTreeSet<String> {
    self.rhs().difference(&self.lhs()).cloned().collect()
  }

  /// Defined symbols no rule refers to. Start symbols show up here too.
  pub fn unreachable(&self) -> BTreeSet<String> {
    self.lhs().difference(&self.rhs()).cloned().collect()
  }

  /// Every literal word in the grammar, which a tokenizer must keep apart
  pub fn markers(&self) -> BTreeSet<String> {
    self
      .iter()
      .flat_map(|r| r.rhs.iter())
      .filter_map(|e| match e {
        Element::Terminal(Terminal::Literal(word)) => Some(word.clone()),
        _ => None,
      })
      .collect()
  }

  fn rule_is_nullable(nullables: &HashSet<&str>, rule: &Rule) -> bool {
    rule.rhs.iter().all(|e| match e {
      Element::Symbol(s) => nullables.contains(s.as_str()),
      Element::Terminal(_) => false,
    })
  }

  /// Symbols that can derive the empty token sequence
  pub fn nullables(&self) -> BTreeSet<String> {
    let mut nullables: HashSet<&str> = HashSet::new();

    let mut last_length = 1;
    while last_length != nullables.len() {
      last_length = nullables.len();
      for r in self.iter() {
        if !nullables.contains(r.name.as_str()) && Self::rule_is_nullable(&nullables, r) {
          nullables.insert(r.name.as_str());
        }
      }
    }

    nullables.into_iter().map(str::to_string).collect()
  }

  /// Symbols that can expand into themselves without consuming a token. The
  /// parser cannot terminate on these.
  pub fn left_recursive(&self) -> BTreeSet<String> {
    let nullables = self.nullables();

    // edges to every symbol that can start a rule, looking past nullable prefixes
    let mut leading: HashMap<&str, HashSet<&str>> = HashMap::new();
    for r in self.iter() {
      let targets = leading.entry(r.name.as_str()).or_default();
      for e in r.rhs.iter() {
        match e {
          Element::Symbol(s) => {
            targets.insert(s.as_str());
            if !nullables.contains(s) {
              break;
            }
          }
          Element::Terminal(_) => break,
        }
      }
    }

    let mut found = BTreeSet::new();
    for &start in leading.keys() {
      let mut seen: HashSet<&str> = HashSet::new();
      let mut stack: Vec<&str> = leading[start].iter().copied().collect();
      while let Some(symbol) = stack.pop() {
        if symbol == start {
          found.insert(start.to_string());
          break;
        }
        if seen.insert(symbol) {
          if let Some(next) = leading.get(symbol) {
            stack.extend(next.iter().copied());
          }
        }
      }
    }
    found
  }

  /// Rejects a grammar that references undefined symbols.
  pub fn validate(&self) -> Result<(), Error> {
    let missing = self.missing();
    if missing.is_empty() {
      Ok(())
    } else {
      debug!(?missing, "grammar is incomplete");
      Err(Error::Incomplete {
        missing: missing.into_iter().collect(),
      })
    }
  }

  pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
    let path = path.as_ref();
    let src = fs::read_to_string(path).map_err(|source| Error::Io {
      path: path.to_path_buf(),
      source,
    })?;
    let rules: Self = src.parse()?;
    debug!(path = %path.display(), rules = rules.len(), "loaded grammar");
    Ok(rules)
  }
}

impl FromIterator<Rule> for Ruleset {
  fn from_iter<I: IntoIterator<Item = Rule>>(iter: I) -> Self {
    let mut set = Self::default();
    for rule in iter {
      set.push(rule);
    }
    set
  }
}

impl Add for Ruleset {
  type Output = Ruleset;

  fn add(mut self, other: Ruleset) -> Ruleset {
    for rule in other.iter() {
      self.push_shared(rule.clone());
    }
    self
  }
}

impl fmt::Display for Ruleset {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for rule in self.iter() {
      writeln!(f, "{}", rule.notation())?;
    }
    Ok(())
  }
}
