//! Forward (tokens to values) and backward (values to tokens) traversal of a
//! [`Ruleset`].
//!
//! Both directions are exhaustive backtracking searches, expressed as lazy
//! iterators: nothing is explored until the caller asks for the next result,
//! so taking the first few results of a hugely ambiguous sentence stays cheap.

use std::iter;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{debug, trace};

use crate::error::{Error, Failure};
use crate::grammar::Ruleset;
use crate::rules::{Element, Rule};
use crate::sparse::Fragment;
use crate::value::{Value, Word};

/// How many symbols may be expanded inside each other before a traversal
/// gives up with [`Error::DepthExceeded`].
pub const DEFAULT_MAX_DEPTH: usize = 128;

type Stream<'a, T> = Box<dyn Iterator<Item = Result<T, Error>> + 'a>;

fn fault<'a, T: 'a>(err: Error) -> Stream<'a, T> {
  Box::new(iter::once(Err(err)))
}

#[derive(Debug)]
pub struct Parser {
  rules: Ruleset,
  max_depth: usize,
  evaluated: AtomicUsize,
}

impl Parser {
  /// Wraps a ruleset, rejecting it if it references undefined symbols.
  pub fn new(rules: Ruleset) -> Result<Self, Error> {
    rules.validate()?;
    debug!(rules = rules.len(), "parser ready");
    Ok(Self {
      rules,
      max_depth: DEFAULT_MAX_DEPTH,
      evaluated: AtomicUsize::new(0),
    })
  }

  pub fn with_max_depth(mut self, max_depth: usize) -> Self {
    self.max_depth = max_depth;
    self
  }

  pub fn rules(&self) -> &Ruleset {
    &self.rules
  }

  pub fn max_depth(&self) -> usize {
    self.max_depth
  }

  /// Number of rule attempts made so far, over all calls
  pub fn evaluated(&self) -> usize {
    self.evaluated.load(Ordering::Relaxed)
  }

  /// Every value `symbol` derives from exactly `tokens`.
  pub fn parse<'a>(&'a self, symbol: &'a str, tokens: &'a [Word]) -> Parses<'a> {
    Parses {
      inner: self.parse_symbol(symbol, tokens, 0),
      done: false,
    }
  }

  /// Every token sequence that `symbol` could have parsed into `value`.
  pub fn reverse<'a>(&'a self, symbol: &'a str, value: &Value) -> Realizations<'a> {
    Realizations {
      inner: self.reverse_symbol(symbol, Fragment::Value(value.clone()), 0),
      done: false,
    }
  }

  fn guard<'a, T: 'a>(&'a self, symbol: &str, depth: usize) -> Result<&'a [Arc<Rule>], Stream<'a, T>> {
    if depth > self.max_depth {
      debug!(symbol, limit = self.max_depth, "recursion budget exhausted");
      return Err(fault(Error::DepthExceeded {
        symbol: symbol.to_string(),
        limit: self.max_depth,
      }));
    }
    self.rules.get(symbol).ok_or_else(|| {
      fault(Error::UndefinedSymbol {
        symbol: symbol.to_string(),
      })
    })
  }

  /// All `(value, remaining tokens)` pairs for a prefix of `tokens`
  fn parse_symbol<'a>(&'a self, symbol: &'a str, tokens: &'a [Word], depth: usize) -> Stream<'a, (Value, &'a [Word])> {
    let rules = match self.guard(symbol, depth) {
      Ok(rules) => rules,
      Err(stream) => return stream,
    };

    Box::new(rules.iter().flat_map(move |rule| {
      self.evaluated.fetch_add(1, Ordering::Relaxed);
      trace!(rule = %rule, remaining = tokens.len(), "parse");

      self
        .parse_rhs(&rule.rhs, tokens, depth)
        .map(move |r| -> Result<(Value, &'a [Word]), Error> {
          let (children, rest) = r?;
          let value = rule.template.consume(&children).map_err(|e| e.in_rule(rule))?;
          Ok((value, rest))
        })
    }))
  }

  /// All ways to match `rhs` against a prefix of `tokens`, with the children
  /// each match produced
  fn parse_rhs<'a>(&'a self, rhs: &'a [Element], tokens: &'a [Word], depth: usize) -> Stream<'a, (Vec<Value>, &'a [Word])> {
    let (first, rest_rhs) = match rhs.split_first() {
      Some(split) => split,
      None => return Box::new(iter::once(Ok((Vec::new(), tokens)))),
    };

    match first {
      Element::Terminal(terminal) => match tokens.split_first() {
        Some((word, rest)) if terminal.test(word) => {
          let value = terminal.consume(word);
          Box::new(self.parse_rhs(rest_rhs, rest, depth).map(move |r| {
            r.map(|(mut children, rem)| {
              children.insert(0, value.clone());
              (children, rem)
            })
          }))
        }
        _ => Box::new(iter::empty()),
      },
      Element::Symbol(name) => Box::new(self.parse_symbol(name, tokens, depth + 1).flat_map(
        move |r| -> Stream<'a, (Vec<Value>, &'a [Word])> {
          match r {
            Ok((value, rem)) => Box::new(self.parse_rhs(rest_rhs, rem, depth).map(move |r| {
              r.map(|(mut children, rem)| {
                children.insert(0, value.clone());
                (children, rem)
              })
            })),
            Err(e) => fault(e),
          }
        },
      )),
    }
  }

  fn reverse_symbol<'a>(&'a self, symbol: &'a str, fragment: Fragment, depth: usize) -> Stream<'a, Vec<Word>> {
    let rules = match self.guard(symbol, depth) {
      Ok(rules) => rules,
      Err(stream) => return stream,
    };

    Box::new(rules.iter().flat_map(move |rule| -> Stream<'a, Vec<Word>> {
      self.evaluated.fetch_add(1, Ordering::Relaxed);

      match rule.template.reverse(&fragment, rule.len()) {
        Ok(flat) => {
          trace!(rule = %rule, %flat, "reverse");
          self.reverse_rhs(&rule.rhs, Rc::from(flat.into_slots()), 0, depth)
        }
        Err(Failure::Mismatch(m)) => {
          trace!(rule = %rule, reason = %m, "reverse skipped");
          Box::new(iter::empty())
        }
        Err(Failure::Fatal(e)) => fault(e.in_rule(rule)),
      }
    }))
  }

  /// Cartesian product of the realizations of each position from `pos` on
  fn reverse_rhs<'a>(
    &'a self,
    rhs: &'a [Element],
    slots: Rc<[Option<Fragment>]>,
    pos: usize,
    depth: usize,
  ) -> Stream<'a, Vec<Word>> {
    let element = match rhs.get(pos) {
      Some(element) => element,
      None => return Box::new(iter::once(Ok(Vec::new()))),
    };

    match element {
      Element::Terminal(terminal) => match terminal.reverse(slots[pos].as_ref()) {
        Ok(word) => Box::new(self.reverse_rhs(rhs, slots, pos + 1, depth).map(move |r| {
          r.map(|mut words| {
            words.insert(0, word.clone());
            words
          })
        })),
        Err(m) => {
          trace!(%terminal, reason = %m, "cannot realize");
          Box::new(iter::empty())
        }
      },
      Element::Symbol(name) => {
        // positions no field claimed are realized from null, like empty rules
        let fragment = slots[pos].clone().unwrap_or(Fragment::Value(Value::Null));
        Box::new(self.reverse_symbol(name, fragment, depth + 1).flat_map(
          move |r| -> Stream<'a, Vec<Word>> {
            match r {
              Ok(prefix) => Box::new(self.reverse_rhs(rhs, slots.clone(), pos + 1, depth).map(move |r| {
                r.map(|words| {
                  let mut out = prefix.clone();
                  out.extend(words);
                  out
                })
              })),
              Err(e) => fault(e),
            }
          },
        ))
      }
    }
  }
}

/// Lazy stream of the values a sentence parses to. Stops after the first error.
pub struct Parses<'a> {
  inner: Stream<'a, (Value, &'a [Word])>,
  done: bool,
}

impl Iterator for Parses<'_> {
  type Item = Result<Value, Error>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.done {
      return None;
    }
    loop {
      match self.inner.next()? {
        // partial parses leave tokens behind
        Ok((value, rest)) if rest.is_empty() => return Some(Ok(value)),
        Ok(_) => continue,
        Err(e) => {
          self.done = true;
          return Some(Err(e));
        }
      }
    }
  }
}

/// Lazy stream of token sequences realizing a value. Stops after the first error.
pub struct Realizations<'a> {
  inner: Stream<'a, Vec<Word>>,
  done: bool,
}

impl Iterator for Realizations<'_> {
  type Item = Result<Vec<Word>, Error>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.done {
      return None;
    }
    let item = self.inner.next()?;
    if item.is_err() {
      self.done = true;
    }
    Some(item)
  }
}

#[cfg(test)]
mod tests {
  use proptest::prelude::*;

  use super::*;
  use crate::value::Record;

  fn words(s: &str) -> Vec<Word> {
    s.split(' ').filter(|w| !w.is_empty()).map(Word::marker).collect()
  }

  fn parser(src: &str) -> Parser {
    Parser::new(src.parse().unwrap()).unwrap()
  }

  fn parses(p: &Parser, symbol: &str, s: &str) -> Vec<Value> {
    let tokens = words(s);
    p.parse(symbol, &tokens).collect::<Result<Vec<_>, _>>().unwrap()
  }

  fn realizations(p: &Parser, symbol: &str, value: &Value) -> Vec<String> {
    p.reverse(symbol, value)
      .map(|r| {
        r.unwrap()
          .iter()
          .map(ToString::to_string)
          .collect::<Vec<_>>()
          .join(" ")
      })
      .collect()
  }

  fn claim(id: &str) -> Value {
    Record::new("Claim").with("id", id).into()
  }

  const ARGUMENTS: &str = r#"
    argument ::= claim 'because' reasons => Argument { claim: $0, reasons: $2 };
    claim    ::= 'A'                     => Claim { id: "a" };
    reason   ::= 'B'                     => Claim { id: "b" };
    reason   ::= 'C'                     => Claim { id: "c" };
    reasons  ::= reason                  => [$0];
    reasons  ::= reason 'and' reasons    => [$0; $2];
  "#;

  #[test]
  fn test_parse_and_reverse_list() {
    let p = parser(ARGUMENTS);
    let trees = parses(&p, "argument", "A because B and C");

    let expected: Value = Record::new("Argument")
      .with("claim", claim("a"))
      .with("reasons", vec![claim("b"), claim("c")])
      .into();
    assert_eq!(trees, vec![expected.clone()]);

    assert_eq!(realizations(&p, "argument", &expected), vec!["A because B and C"]);
  }

  fn reasons_sentence(reasons: &[bool]) -> String {
    let reasons = reasons
      .iter()
      .map(|&b| if b { "B" } else { "C" })
      .collect::<Vec<_>>();
    format!("A because {}", reasons.join(" and "))
  }

  proptest! {
    #[test]
    fn every_realization_parses_back(reasons in prop::collection::vec(any::<bool>(), 1..7)) {
      let p = parser(ARGUMENTS);
      let sentence = reasons_sentence(&reasons);
      let trees = parses(&p, "argument", &sentence);
      prop_assert_eq!(trees.len(), 1);

      let tree = &trees[0];
      let realized = realizations(&p, "argument", tree);
      prop_assert!(realized.contains(&sentence), "{:?} lacks {}", realized, sentence);
      for s in realized.iter() {
        prop_assert_eq!(&parses(&p, "argument", s), &trees);
      }
    }
  }

  #[test]
  fn test_truncated_input_has_no_parse() {
    let p = parser(ARGUMENTS);
    assert!(parses(&p, "argument", "A because").is_empty());
    assert!(parses(&p, "argument", "").is_empty());
    assert!(parses(&p, "argument", "A because B B").is_empty());
  }

  #[test]
  fn test_incomplete_grammar_rejected() {
    let rules = "argument ::= claim 'because' X => $0; claim ::= 'A' => $0;".parse().unwrap();
    match Parser::new(rules) {
      Err(Error::Incomplete { missing }) => assert_eq!(missing, vec!["X".to_string()]),
      other => panic!("expected incomplete grammar, got {:?}", other.map(|_| ())),
    }
  }

  #[test]
  fn test_undefined_start_symbol() {
    let p = parser(ARGUMENTS);
    let tokens = words("A");
    let mut results = p.parse("nope", &tokens);
    assert!(matches!(results.next(), Some(Err(Error::UndefinedSymbol { .. }))));
    assert!(results.next().is_none());
    assert!(matches!(
      p.reverse("nope", &Value::Null).next(),
      Some(Err(Error::UndefinedSymbol { .. }))
    ));
  }

  #[test]
  fn test_optional_support() {
    let p = parser(
      r#"
      argument ::= claim support        => Argument { claim: $0, support: $1 };
      claim    ::= 'A'                  => Claim { id: "a" };
      claim    ::= 'B'                  => Claim { id: "b" };
      support  ::=                      => empty;
      support  ::= 'because' claim      => $1;
    "#,
    );

    let with: Value = Record::new("Argument")
      .with("claim", claim("a"))
      .with("support", claim("b"))
      .into();
    let without: Value = Record::new("Argument")
      .with("claim", claim("a"))
      .with("support", Value::Null)
      .into();

    assert_eq!(parses(&p, "argument", "A because B"), vec![with.clone()]);
    assert_eq!(parses(&p, "argument", "A"), vec![without.clone()]);
    assert_eq!(realizations(&p, "argument", &with), vec!["A because B"]);
    assert_eq!(realizations(&p, "argument", &without), vec!["A"]);
  }

  #[test]
  fn test_reverse_yields_every_matching_rule() {
    let p = parser(
      r#"
      warrant    ::= claim 'when' claim            => Warrant { claim: $0, condition: $2, exceptions: [] };
      warrant    ::= claim 'when' claim exceptions => Warrant { claim: $0, condition: $2, exceptions: $3 };
      exceptions ::=                               => [];
      exceptions ::= 'unless' claim                => [$1];
      claim      ::= 'A'                           => Claim { id: "a" };
      claim      ::= 'a'                           => Claim { id: "a" };
      claim      ::= 'B'                           => Claim { id: "b" };
    "#,
    );

    let value: Value = Record::new("Warrant")
      .with("claim", claim("a"))
      .with("condition", claim("b"))
      .with("exceptions", Value::List(vec![]))
      .into();

    // both warrant rules, each with both spellings of the claim
    let mut out = realizations(&p, "warrant", &value);
    out.sort();
    assert_eq!(out, vec!["A when B", "A when B", "a when B", "a when B"]);

    let excepted: Value = Record::new("Warrant")
      .with("claim", claim("a"))
      .with("condition", claim("b"))
      .with("exceptions", vec![claim("b")])
      .into();
    let mut out = realizations(&p, "warrant", &excepted);
    out.sort();
    assert_eq!(out, vec!["A when B unless B", "a when B unless B"]);
  }

  #[test]
  fn test_attribute_slots() {
    let p = parser(
      r#"
      warrant ::= special => Warrant { claim: $0.claim, conditions: $0.conditions };
      special ::= 'special' => Warrant { claim: Claim { id: "B" }, conditions: ["B1", "B2"] };
    "#,
    );

    let expected: Value = Record::new("Warrant")
      .with("claim", claim("B"))
      .with("conditions", vec![Value::from("B1"), Value::from("B2")])
      .into();
    assert_eq!(parses(&p, "warrant", "special"), vec![expected.clone()]);
    assert_eq!(realizations(&p, "warrant", &expected), vec!["special"]);

    let other: Value = Record::new("Warrant")
      .with("claim", claim("C"))
      .with("conditions", vec![Value::from("B1"), Value::from("B2")])
      .into();
    assert!(realizations(&p, "warrant", &other).is_empty());
  }

  #[test]
  fn test_repeated_equal_slot_is_allowed() {
    let p = parser("twice ::= claim => Pair { left: $0, right: $0 }; claim ::= 'A' => Claim { id: \"a\" };");
    let pair: Value = Record::new("Pair").with("left", claim("a")).with("right", claim("a")).into();
    assert_eq!(parses(&p, "twice", "A"), vec![pair.clone()]);
    assert_eq!(realizations(&p, "twice", &pair), vec!["A"]);

    let mixed: Value = Record::new("Pair").with("left", claim("a")).with("right", claim("b")).into();
    let err = p.reverse("twice", &mixed).next().unwrap().unwrap_err();
    assert!(matches!(&err, Error::InRule { source, .. } if matches!(**source, Error::MergeConflict { .. })));
  }

  #[test]
  fn test_repeated_attribute_is_fatal() {
    let p = parser(
      r#"
      twice   ::= special => Pair { left: $0.claim, right: $0.claim };
      special ::= 'special' => Warrant { claim: Claim { id: "B" } };
    "#,
    );
    let pair: Value = Record::new("Pair").with("left", claim("B")).with("right", claim("B")).into();
    assert_eq!(parses(&p, "twice", "special"), vec![pair.clone()]);

    let mut out = p.reverse("twice", &pair);
    let err = out.next().unwrap().unwrap_err();
    assert!(err.to_string().contains("<twice ::= special>"), "{}", err);
    assert!(matches!(&err, Error::InRule { source, .. } if matches!(**source, Error::KeyCollision { .. })));
    assert!(out.next().is_none());
  }

  #[test]
  fn test_bad_slot_names_rule() {
    let p = parser("claim ::= 'A' => Claim { id: $3 };");
    let tokens = words("A");
    let err = p.parse("claim", &tokens).next().unwrap().unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("<claim ::= 'A'>"), "{}", msg);
    assert!(msg.contains("no slot 3 among 1 children"), "{}", msg);
  }

  #[test]
  fn test_left_recursion_hits_depth_budget() {
    let p = parser("list ::= list 'x' => [$0]; list ::= 'x' => [$0];").with_max_depth(16);
    let tokens = words("x x");
    let mut results = p.parse("list", &tokens);
    match results.next() {
      Some(Err(Error::DepthExceeded { symbol, limit })) => {
        assert_eq!(symbol, "list");
        assert_eq!(limit, 16);
      }
      other => panic!("expected depth error, got {:?}", other),
    }
    assert!(results.next().is_none());
  }

  #[test]
  fn test_self_embedding_reverse_hits_depth_budget() {
    let p = parser(
      r#"
      a ::= b   => $0;
      b ::= a   => $0;
      a ::= 'x' => Claim { id: "x" };
    "#,
    )
    .with_max_depth(32);
    let mut out = p.reverse("a", &claim("x"));
    assert!(matches!(out.next(), Some(Err(Error::DepthExceeded { .. }))));
    assert!(out.next().is_none());
  }

  #[test]
  fn test_results_are_lazy() {
    // exponentially many derivations of the same list
    let p = parser(
      r#"
      xs ::= 'x'        => [$0];
      xs ::= 'x' xs     => [$0; $1];
      xs ::= 'x' 'x' xs => [$0, $1; $2];
    "#,
    );
    let tokens = words(&vec!["x"; 30].join(" "));
    let first = p.parse("xs", &tokens).take(3).collect::<Result<Vec<_>, _>>().unwrap();
    assert_eq!(first.len(), 3);
    assert_eq!(first[0].as_list().map(<[Value]>::len), Some(30));
    assert!(p.evaluated() < 500, "evaluated {} rules", p.evaluated());
  }

  #[test]
  fn test_round_trip_ambiguous_sentence() {
    let p = parser(
      r#"
      extended_claims ::= extended_claim                           => [$0];
      extended_claims ::= extended_claim 'and' extended_claims     => [$0; $2];
      extended_claim  ::= claim supports attacks => Argument { claim: $0, supports: $1, attacks: $2 };
      claim ::= 'birds' 'can' 'fly'           => Claim { id: "b_can_f" };
      claim ::= 'Tweety' 'can' 'fly'          => Claim { id: "t_can_f" };
      claim ::= 'Tweety' 'is' 'a' 'bird'      => Claim { id: "t_is_b" };
      claim ::= 'Tweety' 'is' 'a' 'penguin'   => Claim { id: "t_is_p" };
      claim ::= 'Tweety' 'is' 'awesome'       => Claim { id: "t_is_a" };
      supports ::=                            => [];
      supports ::= support                    => [$0];
      supports ::= support 'and' supports     => [$0; $2];
      support  ::= 'because' extended_claims  => $1;
      attacks  ::=                            => [];
      attacks  ::= attack                     => [$0];
      attacks  ::= attack 'and' attacks       => [$0; $2];
      attack   ::= attack_marker extended_claims => $1;
      attack_marker ::= 'but'                 => empty;
      attack_marker ::= 'except' 'that'       => empty;
    "#,
    );

    let sentence = "Tweety can fly because Tweety is awesome and because Tweety is a bird \
                    and birds can fly but Tweety is a penguin";
    let trees = parses(&p, "extended_claim", sentence);
    assert!(trees.len() > 1, "expected an ambiguous parse, got {}", trees.len());

    for tree in trees.iter() {
      let round_trips = p.reverse("extended_claim", tree).any(|tokens| {
        let tokens = tokens.unwrap();
        p.parse("extended_claim", &tokens).any(|v| matches!(v, Ok(ref v) if v == tree))
      });
      assert!(round_trips, "no realization of {} parses back", tree);
    }

    // the attack marker is free, so both spellings come back
    let out = realizations(&p, "extended_claim", &trees[0]);
    assert!(out.iter().any(|s| s.contains(" but ")));
    assert!(out.iter().any(|s| s.contains(" except that ")));
  }

  #[test]
  fn test_shared_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Parser>();

    let p = &parser(ARGUMENTS);
    std::thread::scope(|scope| {
      let handles = ["A because B", "A because C and B", "A because B and C and B"]
        .map(|s| scope.spawn(move || parses(p, "argument", s).len()));
      for handle in handles {
        assert_eq!(handle.join().unwrap(), 1);
      }
    });
  }
}
