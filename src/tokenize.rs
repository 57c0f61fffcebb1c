//! Turning sentences into [`Word`]s for the parser, and realizations back into
//! sentences.

use std::collections::BTreeSet;

use regex::Regex;

use crate::value::Word;

lazy_static! {
  static ref TOKEN: Regex = Regex::new(r"[\w'/]+|[.,!?;]").unwrap();
}

/// Splits `sentence` into words and punctuation. Tokens listed in `markers`
/// (usually [`crate::Ruleset::markers`]) come out as [`Word::Marker`]; every
/// run of other tokens between them is packed into a single [`Word::Text`].
pub fn tokenize(markers: &BTreeSet<String>, sentence: &str) -> Vec<Word> {
  let mut words = Vec::new();
  let mut unit: Vec<String> = Vec::new();

  for token in TOKEN.find_iter(sentence).map(|m| m.as_str()) {
    if markers.contains(token) {
      if !unit.is_empty() {
        words.push(Word::Text(std::mem::take(&mut unit)));
      }
      words.push(Word::marker(token));
    } else {
      unit.push(token.to_string());
    }
  }
  if !unit.is_empty() {
    words.push(Word::Text(unit));
  }

  words
}

fn is_punctuation(token: &str) -> bool {
  let mut chars = token.chars();
  matches!((chars.next(), chars.next()), (Some(c), None) if !c.is_alphabetic())
}

fn capitalize(token: &str) -> String {
  let mut chars = token.chars();
  match chars.next() {
    Some(c) => c.to_uppercase().chain(chars).collect(),
    None => String::new(),
  }
}

/// Joins a realization into a sentence: single spaces between tokens but none
/// before punctuation, with the first word and every word after a full stop
/// capitalized.
pub fn concatenate(words: &[Word]) -> String {
  let tokens = words.iter().flat_map(|w| match w {
    Word::Marker(m) => std::slice::from_ref(m),
    Word::Text(ws) => ws.as_slice(),
  });

  let mut out = String::new();
  let mut after_stop = true;
  for token in tokens {
    if token.is_empty() {
      continue;
    }
    if !out.is_empty() && !is_punctuation(token) {
      out.push(' ');
    }
    if after_stop {
      out.push_str(&capitalize(token));
    } else {
      out.push_str(token);
    }
    after_stop = token == ".";
  }
  out
}
