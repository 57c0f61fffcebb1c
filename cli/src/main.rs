use std::env;
use std::error::Error;
use std::io;
use std::io::Write;
use std::process;

use argrammar::{concatenate, tokenize, unique, Parser, Ruleset, Value};
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Boxed static error type
type Err = Box<dyn Error + 'static>;

fn usage(prog_name: &str) -> String {
  format!(
    r"Usage: {} FILE [options]

Options:
  -h, --help            Print this message
  -s, --start SYMBOL    Symbol to parse sentences as (defaults to the first rule)
  -n, --no-reverse      Don't print paraphrases of each parse (defaults to printing)
  -l, --limit N         Stop after N parses and N paraphrases per parse (defaults to 10)
  -u, --unique          Skip repeated parses and paraphrases

Set RUST_LOG=trace to watch every rule the parser tries.",
    prog_name
  )
}

fn plural(n: usize) -> &'static str {
  if n == 1 { "" } else { "s" }
}

fn dedup<'a, T>(
  stream: impl Iterator<Item = Result<T, argrammar::Error>> + 'a,
  on: bool,
) -> Box<dyn Iterator<Item = Result<T, argrammar::Error>> + 'a>
where
  T: Eq + std::hash::Hash + Clone + 'a,
{
  if on {
    Box::new(unique(stream))
  } else {
    Box::new(stream)
  }
}

fn paraphrase(parser: &Parser, opts: &Args, value: &Value) -> Result<(), Err> {
  for words in dedup(parser.reverse(&opts.start, value), opts.unique).take(opts.limit) {
    println!("  = {}", concatenate(&words?));
  }
  Ok(())
}

fn parse(parser: &Parser, opts: &Args, sentence: &str) -> Result<(), Err> {
  let tokens = tokenize(&parser.rules().markers(), sentence);
  let before = parser.evaluated();

  let mut count = 0;
  for value in dedup(parser.parse(&opts.start, &tokens), opts.unique).take(opts.limit) {
    let value = value?;
    count += 1;
    println!("{}", value);
    if opts.reverse {
      paraphrase(parser, opts, &value)?;
    }
    println!();
  }

  println!(
    "Parsed {} value{} ({} rules evaluated)",
    count,
    plural(count),
    parser.evaluated() - before
  );

  Ok(())
}

struct Args {
  filename: String,
  start: String,
  reverse: bool,
  limit: usize,
  unique: bool,
}

impl Args {
  fn make_error_message(msg: &str, prog_name: impl AsRef<str>) -> String {
    format!("argument error: {}.\n\n{}", msg, usage(prog_name.as_ref()))
  }

  fn parse(v: Vec<String>) -> Result<Self, String> {
    if v.is_empty() {
      return Err(Self::make_error_message("bad argument vector", "argrammar"));
    }

    let args_len = v.len();
    let mut iter = v.into_iter();
    let prog_name = iter.next().unwrap_or_default();

    if args_len < 2 {
      return Err(Self::make_error_message("not enough arguments", prog_name));
    }

    let mut filename: Option<String> = None;
    let mut start: Option<String> = None; // default to the first defined symbol
    let mut reverse = true;
    let mut limit = 10;
    let mut unique = false;

    while let Some(o) = iter.next() {
      if o == "-h" || o == "--help" {
        println!("{}", usage(&prog_name));
        process::exit(0);
      } else if o == "-n" || o == "--no-reverse" {
        reverse = false;
      } else if o == "-u" || o == "--unique" {
        unique = true;
      } else if o == "-s" || o == "--start" {
        match iter.next() {
          Some(s) => start = Some(s),
          None => return Err(Self::make_error_message("missing start symbol", prog_name)),
        }
      } else if o == "-l" || o == "--limit" {
        match iter.next().and_then(|n| n.parse().ok()) {
          Some(n) => limit = n,
          None => return Err(Self::make_error_message("limit must be a number", prog_name)),
        }
      } else if filename.is_none() {
        filename = Some(o);
      } else {
        return Err(Self::make_error_message("invalid arguments", prog_name));
      }
    }

    if let Some(filename) = filename {
      Ok(Self {
        filename,
        start: start.unwrap_or_default(),
        reverse,
        limit,
        unique,
      })
    } else {
      Err(Self::make_error_message("missing filename", prog_name))
    }
  }
}

fn main() -> Result<(), Err> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
    .with_writer(io::stderr)
    .init();

  let mut opts = match Args::parse(env::args().collect()) {
    Ok(opts) => opts,
    Err(msg) => {
      eprintln!("{}", msg);
      process::exit(255);
    }
  };

  let rules = Ruleset::read_from_file(&opts.filename)?;
  for symbol in rules.left_recursive() {
    warn!(%symbol, "left-recursive symbol, parsing it will exhaust the depth budget");
  }
  if opts.start.is_empty() {
    match rules.iter().next() {
      Some(rule) => opts.start = rule.name.clone(),
      None => return Err("grammar has no rules".into()),
    }
  }
  let parser = Parser::new(rules)?;

  let mut input = String::new();
  loop {
    print!("{}> ", opts.start);
    io::stdout().flush()?;

    match io::stdin().read_line(&mut input) {
      Ok(_) => {
        if input.is_empty() {
          // ctrl+d
          return Ok(());
        }
        if let Err(e) = parse(&parser, &opts, input.trim()) {
          eprintln!("error: {}", e);
        }
        input.clear();
      }
      Err(error) => return Err(error.into()),
    }
  }
}
