//! A bidirectional grammar engine for arguments.
//!
//! A [`Ruleset`] pairs every production with a [`Combinator`] template. Parsing
//! runs the templates forward and builds structured [`Value`]s from tokens;
//! reversing runs them backward and recovers every token sequence the grammar
//! could have parsed into a given value.
//!
//! ```
//! use argrammar::{concatenate, tokenize, Parser, Ruleset};
//!
//! let rules: Ruleset = r#"
//!   argument ::= claim 'because' claim => Argument { claim: $0, support: $2 };
//!   claim    ::= <text>                => Claim { text: $0 };
//! "#.parse()?;
//! let parser = Parser::new(rules)?;
//!
//! let tokens = tokenize(&parser.rules().markers(), "the sky is blue because I saw it");
//! let value = parser.parse("argument", &tokens).next().unwrap()?;
//! let words = parser.reverse("argument", &value).next().unwrap()?;
//! assert_eq!(concatenate(&words), "The sky is blue because I saw it");
//! # Ok::<(), argrammar::Error>(())
//! ```

#[macro_use]
extern crate lazy_static;

pub mod combinator;
pub mod error;
pub mod grammar;
pub mod parse_grammar;
pub mod parser;
pub mod rules;
pub mod sparse;
pub mod terminal;
pub mod tokenize;
pub mod utils;
pub mod value;

pub use crate::combinator::{Combinator, Field, Slot, TList, Template};
pub use crate::error::{Error, Failure, Mismatch};
pub use crate::grammar::Ruleset;
pub use crate::parser::{Parser, Parses, Realizations, DEFAULT_MAX_DEPTH};
pub use crate::rules::{Element, Rule};
pub use crate::sparse::{Fragment, SparseList, SparseObject};
pub use crate::terminal::{Terminal, TerminalClass};
pub use crate::tokenize::{concatenate, tokenize};
pub use crate::utils::unique;
pub use crate::value::{Record, Value, Word};

#[test]
fn test_text_spans_round_trip() {
  let rules: Ruleset = r#"
    argument ::= claim 'because' reasons    => Argument { claim: $0, reasons: $2 };
    reasons  ::= claim                      => [$0];
    reasons  ::= claim 'and' reasons        => [$0; $2];
    claim    ::= <text>                     => Claim { text: $0 };
  "#
  .parse()
  .unwrap();
  let parser = Parser::new(rules).unwrap();
  let markers = parser.rules().markers();

  let sentence = "The ball is red because it looks red and I trust my eyes";
  let tokens = tokenize(&markers, sentence);
  assert_eq!(tokens.len(), 5);

  let values = parser.parse("argument", &tokens).collect::<Result<Vec<_>, _>>().unwrap();
  assert_eq!(values.len(), 1);

  let claim = |words: &[&str]| -> Value { Record::new("Claim").with("text", Word::text(words.iter().copied())).into() };
  let expected: Value = Record::new("Argument")
    .with("claim", claim(&["The", "ball", "is", "red"]))
    .with(
      "reasons",
      vec![claim(&["it", "looks", "red"]), claim(&["I", "trust", "my", "eyes"])],
    )
    .into();
  assert_eq!(values[0], expected);

  let sentences = unique(parser.reverse("argument", &values[0]))
    .map(|r| r.map(|words| concatenate(&words)))
    .collect::<Result<Vec<_>, _>>()
    .unwrap();
  assert_eq!(sentences, vec![sentence.to_string()]);
}

#[test]
fn test_programmatic_ruleset() {
  let rules = Ruleset::new(vec![
    Rule::new(
      "argument",
      vec!["claim".into(), Element::literal("because"), "claim".into()],
      Template::new("Argument").field("claim", Slot::new(0)).field("support", Slot::new(2)),
    ),
    Rule::new("claim", vec![Element::literal("A")], Template::new("Claim").field("id", "a")),
    Rule::new("claim", vec![Element::literal("B")], Template::new("Claim").field("id", "b")),
  ]);
  let parser = Parser::new(rules).unwrap();
  let tokens = vec![Word::marker("A"), Word::marker("because"), Word::marker("B")];

  let value = parser.parse("argument", &tokens).next().unwrap().unwrap();
  assert_eq!(value.to_string(), r#"Argument { claim: Claim { id: "a" }, support: Claim { id: "b" } }"#);

  let back = parser.reverse("argument", &value).next().unwrap().unwrap();
  assert_eq!(back, tokens);
  assert!(parser.evaluated() > 0);
}
