//! Path template compilation.
//!
//! Template syntax:
//! - `/users` - literal path, matched by exact string equality
//! - `/users/{id}` - parameter matching one path segment
//! - `/users/{id:num}` - parameter typed through the [`PatternRegistry`]
//! - `/files/{*path}` - catch-all parameter (matches the rest of the path)
//! - `/blog[/{page:num}]` - optional group, may nest

use serde::{Deserialize, Serialize};

use crate::error::{Result, RouterError};
use crate::pattern::{PatternRegistry, CATCH_ALL_PATTERN, DEFAULT_PATTERN};
use crate::request::PathParams;

/// A parameter extracted from a path template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter name.
    pub name: String,
    /// Regex fragment the value must match.
    pub pattern: String,
    /// Whether the parameter sits inside an optional group.
    #[serde(default)]
    pub is_optional: bool,
}

/// Result of compiling a path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledPath {
    /// The original template.
    pub path: String,
    /// Anchored regex, `None` for static paths.
    pub regex: Option<String>,
    /// Parameters in capture group order.
    pub parameters: Vec<Parameter>,
}

impl CompiledPath {
    /// Returns whether the path is matched by exact string equality.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.regex.is_none()
    }

    /// Returns the parameter names in capture group order.
    pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
        self.parameters.iter().map(|p| p.name.as_str())
    }
}

/// A parsed piece of a path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    /// Literal text.
    Literal(String),
    /// A placeholder.
    Param {
        name: String,
        kind: Option<String>,
        catch_all: bool,
    },
    /// An optional group.
    Optional(Vec<Segment>),
}

/// Compiles path templates against a pattern registry.
#[derive(Debug, Clone, Copy)]
pub struct PathCompiler<'r> {
    registry: &'r PatternRegistry,
}

impl Default for PathCompiler<'static> {
    fn default() -> Self {
        Self::new(PatternRegistry::global())
    }
}

impl<'r> PathCompiler<'r> {
    /// Creates a compiler using the given registry.
    #[must_use]
    pub fn new(registry: &'r PatternRegistry) -> Self {
        Self { registry }
    }

    /// Returns the registry used to resolve `{name:type}` placeholders.
    #[must_use]
    pub fn registry(&self) -> &'r PatternRegistry {
        self.registry
    }

    /// Fills a path template with parameter values.
    ///
    /// Optional groups are left out when any parameter inside them is absent.
    /// Values are inserted as given, without percent-encoding.
    pub fn reverse(path: &str, params: &PathParams) -> Result<String> {
        let segments = tokenize(path)?;
        render(&segments, params).map_err(|parameter| RouterError::MissingParameter {
            route: path.to_string(),
            parameter,
        })
    }

    /// Compiles a path template.
    ///
    /// # Example
    ///
    /// ```
    /// use valkyrja_routing::PathCompiler;
    ///
    /// let compiled = PathCompiler::default().compile("/posts/{id:num}").unwrap();
    /// assert_eq!(compiled.regex.as_deref(), Some("^/posts/([0-9]+)$"));
    /// assert_eq!(compiled.parameter_names().collect::<Vec<_>>(), ["id"]);
    ///
    /// let compiled = PathCompiler::default().compile("/about").unwrap();
    /// assert!(compiled.is_static());
    /// ```
    pub fn compile(&self, path: &str) -> Result<CompiledPath> {
        let segments = tokenize(path)?;

        if segments.iter().all(|s| matches!(s, Segment::Literal(_))) {
            return Ok(CompiledPath {
                path: path.to_string(),
                regex: None,
                parameters: Vec::new(),
            });
        }

        let mut parameters = Vec::new();
        self.collect_parameters(path, &segments, false, &mut parameters)?;

        for (i, parameter) in parameters.iter().enumerate() {
            if parameters[..i].iter().any(|p| p.name == parameter.name) {
                return Err(invalid_path(
                    path,
                    format!("parameter `{}` appears more than once", parameter.name),
                ));
            }
        }

        let mut regex = String::from("^");
        write_regex(&segments, &parameters, &mut 0, &mut regex);
        regex.push('$');

        Ok(CompiledPath {
            path: path.to_string(),
            regex: Some(regex),
            parameters,
        })
    }

    fn collect_parameters(
        &self,
        path: &str,
        segments: &[Segment],
        optional: bool,
        out: &mut Vec<Parameter>,
    ) -> Result<()> {
        for segment in segments {
            match segment {
                Segment::Literal(_) => {}
                Segment::Param {
                    name,
                    kind,
                    catch_all,
                } => {
                    let pattern = match (kind, catch_all) {
                        (_, true) => CATCH_ALL_PATTERN,
                        (Some(kind), false) => self.registry.get(kind).ok_or_else(|| {
                            RouterError::InvalidParameterPattern {
                                path: path.to_string(),
                                parameter: name.clone(),
                                pattern: kind.clone(),
                            }
                        })?,
                        (None, false) => DEFAULT_PATTERN,
                    };
                    out.push(Parameter {
                        name: name.clone(),
                        pattern: pattern.to_string(),
                        is_optional: optional,
                    });
                }
                Segment::Optional(inner) => self.collect_parameters(path, inner, true, out)?,
            }
        }
        Ok(())
    }
}

fn write_regex(segments: &[Segment], parameters: &[Parameter], next: &mut usize, out: &mut String) {
    for segment in segments {
        match segment {
            Segment::Literal(text) => out.push_str(&regex::escape(text)),
            Segment::Param { .. } => {
                out.push('(');
                out.push_str(&parameters[*next].pattern);
                out.push(')');
                *next += 1;
            }
            Segment::Optional(inner) => {
                out.push_str("(?:");
                write_regex(inner, parameters, next, out);
                out.push_str(")?");
            }
        }
    }
}

fn invalid_path(path: &str, reason: impl Into<String>) -> RouterError {
    RouterError::InvalidRoutePath {
        path: path.to_string(),
        reason: reason.into(),
    }
}

/// Splits a template into segments without resolving parameter types.
pub(crate) fn tokenize(path: &str) -> Result<Vec<Segment>> {
    if path.is_empty() {
        return Err(invalid_path(path, "path is empty"));
    }
    if !path.starts_with('/') {
        return Err(invalid_path(path, "path must start with `/`"));
    }

    let mut chars = path.chars();
    parse_sequence(path, &mut chars, 0)
}

fn parse_sequence(path: &str, chars: &mut std::str::Chars<'_>, depth: usize) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut literal = String::new();

    while let Some(c) = chars.next() {
        match c {
            '{' => {
                flush_literal(&mut literal, &mut segments);
                segments.push(parse_param(path, chars)?);
            }
            '}' => return Err(invalid_path(path, "unexpected `}`")),
            '[' => {
                flush_literal(&mut literal, &mut segments);
                let inner = parse_sequence(path, chars, depth + 1)?;
                if inner.is_empty() {
                    return Err(invalid_path(path, "empty optional group"));
                }
                segments.push(Segment::Optional(inner));
            }
            ']' if depth == 0 => return Err(invalid_path(path, "unexpected `]`")),
            ']' => {
                flush_literal(&mut literal, &mut segments);
                return Ok(segments);
            }
            _ => literal.push(c),
        }
    }

    if depth > 0 {
        return Err(invalid_path(path, "unclosed `[`"));
    }

    flush_literal(&mut literal, &mut segments);
    Ok(segments)
}

fn flush_literal(literal: &mut String, segments: &mut Vec<Segment>) {
    if !literal.is_empty() {
        segments.push(Segment::Literal(std::mem::take(literal)));
    }
}

fn parse_param(path: &str, chars: &mut std::str::Chars<'_>) -> Result<Segment> {
    let mut body = String::new();
    loop {
        match chars.next() {
            Some('}') => break,
            Some('{') => return Err(invalid_path(path, "nested `{`")),
            Some(c) => body.push(c),
            None => return Err(invalid_path(path, "unclosed `{`")),
        }
    }

    let (catch_all, body) = match body.strip_prefix('*') {
        Some(rest) => (true, rest),
        None => (false, body.as_str()),
    };
    let (name, kind) = match body.split_once(':') {
        Some((name, kind)) => (name, Some(kind)),
        None => (body, None),
    };

    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(invalid_path(path, format!("invalid parameter name `{name}`")));
    }
    if catch_all && kind.is_some() {
        return Err(invalid_path(path, format!("catch-all `{name}` cannot be typed")));
    }
    if kind.is_some_and(str::is_empty) {
        return Err(invalid_path(path, format!("empty type for `{name}`")));
    }

    Ok(Segment::Param {
        name: name.to_string(),
        kind: kind.map(str::to_string),
        catch_all,
    })
}

/// Fills a template with parameter values.
///
/// Optional groups are dropped when any of their parameters is absent.
/// Returns the name of the first missing required parameter as the error.
pub(crate) fn render(segments: &[Segment], params: &PathParams) -> std::result::Result<String, String> {
    let mut out = String::new();
    render_into(segments, params, &mut out)?;
    Ok(out)
}

fn render_into(
    segments: &[Segment],
    params: &PathParams,
    out: &mut String,
) -> std::result::Result<(), String> {
    for segment in segments {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Param { name, .. } => out.push_str(params.get(name).ok_or_else(|| name.clone())?),
            Segment::Optional(inner) => {
                let mut group = String::new();
                if render_into(inner, params, &mut group).is_ok() {
                    out.push_str(&group);
                }
            }
        }
    }
    Ok(())
}
