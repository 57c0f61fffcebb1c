//! Simple recursive-descent parsing of grammar files
//!
//! ```text
//! argument ::= claim 'because' reasons => Argument { claim: $0, reasons: $2 };
//! reasons  ::= reason                  => [$0];
//! reasons  ::= reason 'and' reasons    => [$0; $2];
//! support  ::=                         => empty;
//! span     ::= <text>                  => $0;
//! ```
use regex::Regex;
use std::str::FromStr;

use crate::combinator::{Combinator, Field, Slot, TList, Template};
use crate::error::Error;
use crate::grammar::Ruleset;
use crate::rules::{Element, Rule};
use crate::value::Value;

impl FromStr for Ruleset {
  type Err = Error;

  /// Parses a ruleset from a string. Errors carry the line they occurred on.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let to_error = |failed: Failed| Error::Syntax {
      line: s[..s.len() - failed.at.len()].matches('\n').count() + 1,
      message: failed.message,
    };

    let (rules, rem) = parse_rules(s).map_err(to_error)?;
    if rules.is_empty() {
      return Err(to_error(Failed {
        message: "empty ruleset".to_string(),
        at: rem,
      }));
    }
    Ok(Ruleset::new(rules))
  }
}

/// Parse failure, pointing at the unconsumed input where it happened
struct Failed<'a> {
  message: String,
  at: &'a str,
}

type Infallible<'a, T> = (T, &'a str);
type ParseResult<'a, T> = Result<(T, &'a str), Failed<'a>>;

fn fail<'a, T>(at: &'a str, message: impl Into<String>) -> ParseResult<'a, T> {
  Err(Failed {
    message: message.into(),
    at,
  })
}

/// helper macro for initializing a regex with lazy_static!
macro_rules! regex_static {
  ($name:ident, $pattern:expr) => {
    lazy_static! {
      static ref $name: Regex = Regex::new($pattern).unwrap();
    }
  };
}

/// Try to consume a regex anchored at the start of `s`
fn optional_re<'a>(re: &'static Regex, s: &'a str) -> Infallible<'a, Option<&'a str>> {
  match re.find(s) {
    Some(m) if m.start() == 0 => (Some(m.as_str()), &s[m.end()..]),
    _ => (None, s),
  }
}

/// Try to consume a regex, failing if it doesn't match
fn needed_re<'a>(re: &'static Regex, s: &'a str, what: &str) -> ParseResult<'a, &'a str> {
  if let (Some(c), rest) = optional_re(re, s) {
    Ok((c, rest))
  } else {
    fail(s, format!("expected {} at {}", what, excerpt(s)))
  }
}

fn optional_str<'a>(lit: &str, s: &'a str) -> Infallible<'a, Option<()>> {
  match s.strip_prefix(lit) {
    Some(rest) => (Some(()), rest),
    None => (None, s),
  }
}

fn needed_str<'a>(lit: &str, s: &'a str) -> ParseResult<'a, ()> {
  match s.strip_prefix(lit) {
    Some(rest) => Ok(((), rest)),
    None => fail(s, format!("expected `{}` at {}", lit, excerpt(s))),
  }
}

/// The rest of the current line, for error messages
fn excerpt(s: &str) -> String {
  let line = s.lines().next().unwrap_or("");
  if line.is_empty() {
    "end of input".to_string()
  } else {
    format!("`{}`", line.trim_end())
  }
}

/// Skips whitespace and // comments
fn skip_whitespace(s: &str) -> &str {
  regex_static!(WHITESPACE_OR_COMMENT, r"^(?:\s|//[^\n]*)*");
  optional_re(&*WHITESPACE_OR_COMMENT, s).1
}

/// Tries to parse a symbol name made of letters, numbers, _, - and ?
fn parse_name(s: &str) -> ParseResult<&str> {
  regex_static!(NAME, r"^[A-Za-z_][A-Za-z0-9_?\-]*");
  needed_re(&*NAME, s, "name")
}

fn parse_element(s: &str) -> ParseResult<Element> {
  regex_static!(LITERAL, r"^'(?:[^'\\\n]|\\.)+'");
  regex_static!(CLASS, r"^<[A-Za-z_]+>");

  if s.starts_with('\'') {
    let (lit, rest) = needed_re(&*LITERAL, s, "literal")?;
    Ok((Element::literal(unescape(&lit[1..lit.len() - 1])), rest))
  } else if s.starts_with('<') {
    let (class, rest) = needed_re(&*CLASS, s, "terminal class")?;
    match &class[1..class.len() - 1] {
      "text" => Ok((Element::text(), rest)),
      other => fail(s, format!("unknown terminal class <{}>", other)),
    }
  } else {
    let (name, rest) = parse_name(s)?;
    Ok((Element::symbol(name), rest))
  }
}

fn parse_slot(s: &str) -> ParseResult<Slot> {
  regex_static!(SLOT, r"^\$([0-9]+)(?:\.([A-Za-z_][A-Za-z0-9_]*))?");

  let caps = match SLOT.captures(s) {
    Some(caps) => caps,
    None => return fail(s, format!("expected slot at {}", excerpt(s))),
  };
  let whole = caps.get(0).map_or("", |m| m.as_str());
  let index = match caps.get(1).map(|m| m.as_str().parse::<usize>()) {
    Some(Ok(index)) => index,
    _ => return fail(s, format!("bad slot index in `{}`", whole)),
  };
  let slot = match caps.get(2) {
    Some(attribute) => Slot::attr(index, attribute.as_str()),
    None => Slot::new(index),
  };
  Ok((slot, &s[whole.len()..]))
}

fn parse_string(s: &str) -> ParseResult<String> {
  regex_static!(STRING, r#"^"(?:[^"\\]|\\.)*""#);

  let (quoted, rest) = needed_re(&*STRING, s, "string")?;
  Ok((unescape(&quoted[1..quoted.len() - 1]), rest))
}

/// Drops the backslash from `\x` escapes
fn unescape(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  let mut chars = s.chars();
  while let Some(c) = chars.next() {
    if c == '\\' {
      out.extend(chars.next());
    } else {
      out.push(c);
    }
  }
  out
}

/// `{ name: expr, ... }`, starting after the tag
fn parse_fields<'a>(tag: &str, s: &'a str) -> ParseResult<'a, Template> {
  let (_, mut rem) = needed_str("{", s)?;
  let mut template = Template::new(tag);
  loop {
    rem = skip_whitespace(rem);
    if let (Some(_), s) = optional_str("}", rem) {
      return Ok((template, s));
    }
    let (name, s) = parse_name(rem)?;
    let s = skip_whitespace(s);
    let (_, s) = needed_str(":", s)?;
    let s = skip_whitespace(s);
    if template.lookup(name).is_some() {
      return fail(rem, format!("field `{}` is set twice in {}", name, tag));
    }
    let (field, s) = parse_expr(s)?;
    template = template.field(name, field);
    let s = skip_whitespace(s);
    rem = match optional_str(",", s) {
      (Some(_), s) => s,
      (None, s) if s.starts_with('}') => s,
      (None, s) => return fail(s, format!("expected `,` or `}}` at {}", excerpt(s))),
    };
  }
}

/// Comma-separated expressions, up to (not including) `;` or `]`
fn parse_items(s: &str) -> ParseResult<Vec<Field>> {
  let mut items = Vec::new();
  let mut rem = skip_whitespace(s);
  while !rem.starts_with(';') && !rem.starts_with(']') {
    let (item, s) = parse_expr(rem)?;
    items.push(item);
    let s = skip_whitespace(s);
    rem = match optional_str(",", s) {
      (Some(_), s) => skip_whitespace(s),
      (None, s) if s.starts_with(';') || s.starts_with(']') => s,
      (None, s) => return fail(s, format!("expected `,`, `;` or `]` at {}", excerpt(s))),
    };
  }
  Ok((items, rem))
}

/// `[heads; tails]` builds a list template, `["a", "b"]` is a fixed list
fn parse_list(s: &str) -> ParseResult<Field> {
  let (_, rem) = needed_str("[", s)?;
  let (head, rem) = parse_items(rem)?;
  let (semicolon, rem) = optional_str(";", rem);
  let (tail, rem) = if semicolon.is_some() {
    parse_items(rem)?
  } else {
    (Vec::new(), rem)
  };
  let (_, rem) = needed_str("]", rem)?;

  let all_fixed = head.iter().all(|f| matches!(f, Field::Fixed(_)));
  if semicolon.is_none() && !head.is_empty() && all_fixed {
    let values = head
      .into_iter()
      .filter_map(|f| match f {
        Field::Fixed(v) => Some(v),
        Field::Combinator(_) => None,
      })
      .collect();
    return Ok((Field::Fixed(Value::List(values)), rem));
  }

  let to_combinators = |fields: Vec<Field>| -> Option<Vec<Combinator>> {
    fields
      .into_iter()
      .map(|f| match f {
        Field::Combinator(c) => Some(c),
        Field::Fixed(_) => None,
      })
      .collect()
  };
  match (to_combinators(head), to_combinators(tail)) {
    (Some(head), Some(tail)) => Ok((TList::new(head, tail).into(), rem)),
    _ => fail(s, "a list template cannot mix fixed values with slots"),
  }
}

fn parse_expr(s: &str) -> ParseResult<Field> {
  if s.starts_with('$') {
    let (slot, rest) = parse_slot(s)?;
    Ok((slot.into(), rest))
  } else if s.starts_with('"') {
    let (string, rest) = parse_string(s)?;
    Ok((Value::Str(string).into(), rest))
  } else if s.starts_with('[') {
    parse_list(s)
  } else {
    let (name, rest) = parse_name(s)?;
    match name {
      "empty" => Ok((Combinator::Empty.into(), rest)),
      "null" => Ok((Value::Null.into(), rest)),
      tag => {
        let (template, rest) = parse_fields(tag, skip_whitespace(rest))?;
        Ok((template.into(), rest))
      }
    }
  }
}

fn parse_template(s: &str) -> ParseResult<Combinator> {
  match parse_expr(s)? {
    (Field::Combinator(c), rest) => Ok((c, rest)),
    (Field::Fixed(v), _) => fail(s, format!("a rule must build its value with a template, found fixed {}", v)),
  }
}

/// Symbol, elements, template, terminated by `;`
fn parse_rule(s: &str) -> ParseResult<Rule> {
  let (name, s) = parse_name(s)?;
  let s = skip_whitespace(s);
  let (_, s) = needed_str("::=", s)?;

  let mut rhs = Vec::new();
  let mut rem = s;
  loop {
    rem = skip_whitespace(rem);
    if let (Some(_), s) = optional_str("=>", rem) {
      rem = s;
      break;
    }
    let (element, s) = parse_element(rem)?;
    rhs.push(element);
    rem = s;
  }

  let (template, s) = parse_template(skip_whitespace(rem))?;
  let (_, s) = needed_str(";", skip_whitespace(s))?;

  Ok((Rule::new(name, rhs, template), s))
}

fn parse_rules(s: &str) -> ParseResult<Vec<Rule>> {
  let mut rules = Vec::new();
  let mut rem = s;
  loop {
    rem = skip_whitespace(rem);
    if rem.is_empty() {
      return Ok((rules, rem));
    }
    let (rule, s) = parse_rule(rem)?;
    rules.push(rule);
    rem = s;
  }
}
