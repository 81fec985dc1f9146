//! Template rendering for build commands and environment entries.
//!
//! Templates let configuration strings reference per-target values that are
//! only known once a target has been parsed.
//!
//! # Template Actions
//!
//! - `{{ .Name }}` - a named field (e.g. `Os`, `Arch`, `Binary`, `Version`)
//! - `{{ .Env.NAME }}` - the value of `NAME` in the environment built so far
//!
//! Whitespace inside the braces is optional. Everything outside `{{ }}` is
//! copied verbatim, so shell variables like `$HOME` need no escaping.
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeMap;
//! use crossbuild_lib::template::{render, Scope};
//!
//! let mut fields = BTreeMap::new();
//! fields.insert("Os".to_string(), "linux".to_string());
//! let env = vec!["CC=zig cc".to_string()];
//!
//! let scope = Scope::new(&fields, &env);
//! assert_eq!(render("{{ .Os }}/{{ .Env.CC }}", &scope).unwrap(), "linux/zig cc");
//! ```

use std::collections::BTreeMap;

use thiserror::Error;

/// A reference inside a template action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
  /// `{{ .Name }}`
  Field(String),

  /// `{{ .Env.NAME }}`
  Env(String),
}

/// A segment of parsed template text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  /// Literal text (no actions)
  Literal(String),

  /// A reference to be resolved
  Reference(Reference),
}

/// Errors that can occur during template parsing or rendering.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
  #[error("unclosed template action at position {0}")]
  Unclosed(usize),

  #[error("malformed template action: {0}")]
  Malformed(String),

  #[error("map has no entry for key \"{0}\"")]
  UnknownField(String),

  #[error("environment variable \"{0}\" is not set")]
  MissingEnv(String),
}

/// Resolves references during rendering.
pub trait Resolver {
  /// Resolve a named field.
  fn resolve_field(&self, name: &str) -> Result<&str, TemplateError>;

  /// Resolve an environment variable.
  fn resolve_env(&self, name: &str) -> Result<&str, TemplateError>;
}

/// Parse a template into segments.
///
/// # Errors
///
/// Returns an error if an action is unclosed or is not a `.Name` / `.Env.NAME`
/// reference.
pub fn parse(input: &str) -> Result<Vec<Segment>, TemplateError> {
  let mut segments = Vec::new();
  let mut rest = input;
  let mut offset = 0;

  while let Some(start) = rest.find("{{") {
    if start > 0 {
      segments.push(Segment::Literal(rest[..start].to_string()));
    }

    let body = &rest[start + 2..];
    let end = body.find("}}").ok_or(TemplateError::Unclosed(offset + start))?;
    segments.push(Segment::Reference(parse_reference(body[..end].trim())?));

    let consumed = start + 2 + end + 2;
    offset += consumed;
    rest = &rest[consumed..];
  }

  if !rest.is_empty() {
    segments.push(Segment::Literal(rest.to_string()));
  }

  Ok(segments)
}

fn parse_reference(action: &str) -> Result<Reference, TemplateError> {
  let path = action
    .strip_prefix('.')
    .ok_or_else(|| TemplateError::Malformed(action.to_string()))?;

  if let Some(name) = path.strip_prefix("Env.") {
    if !is_identifier(name) {
      return Err(TemplateError::Malformed(action.to_string()));
    }
    return Ok(Reference::Env(name.to_string()));
  }

  if !is_identifier(path) {
    return Err(TemplateError::Malformed(action.to_string()));
  }

  Ok(Reference::Field(path.to_string()))
}

fn is_identifier(s: &str) -> bool {
  !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Parse and render a template in one step.
pub fn render(input: &str, resolver: &impl Resolver) -> Result<String, TemplateError> {
  let segments = parse(input)?;
  render_segments(&segments, resolver)
}

/// Render pre-parsed segments.
pub fn render_segments(segments: &[Segment], resolver: &impl Resolver) -> Result<String, TemplateError> {
  let mut result = String::new();

  for segment in segments {
    match segment {
      Segment::Literal(s) => result.push_str(s),
      Segment::Reference(Reference::Field(name)) => result.push_str(resolver.resolve_field(name)?),
      Segment::Reference(Reference::Env(name)) => result.push_str(resolver.resolve_env(name)?),
    }
  }

  Ok(result)
}

/// The values visible to a template: named fields plus an environment.
///
/// The environment is a list of `KEY=VALUE` entries; the last entry for a key
/// wins, matching how a process sees a repeated variable.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
  fields: &'a BTreeMap<String, String>,
  env: &'a [String],
}

impl<'a> Scope<'a> {
  pub fn new(fields: &'a BTreeMap<String, String>, env: &'a [String]) -> Self {
    Self { fields, env }
  }
}

impl Resolver for Scope<'_> {
  fn resolve_field(&self, name: &str) -> Result<&str, TemplateError> {
    self
      .fields
      .get(name)
      .map(|s| s.as_str())
      .ok_or_else(|| TemplateError::UnknownField(name.to_string()))
  }

  fn resolve_env(&self, name: &str) -> Result<&str, TemplateError> {
    lookup_env(self.env, name).ok_or_else(|| TemplateError::MissingEnv(name.to_string()))
  }
}

/// Find the value of `name` in a `KEY=VALUE` list, last entry winning.
pub fn lookup_env<'a>(env: &'a [String], name: &str) -> Option<&'a str> {
  env
    .iter()
    .rev()
    .filter_map(|entry| entry.split_once('='))
    .find(|(key, _)| *key == name)
    .map(|(_, value)| value)
}
