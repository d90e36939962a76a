//! Typed path segments and query parameters.
//!
//! A request's path and query are both described as an ordered list of
//! [`PathComponent`]s. Rendering partitions the list: `Path` entries are
//! joined with `/`, `Parameter` entries with `&`, and relative order inside
//! each partition is kept.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathComponent {
    Path(String),
    Parameter { key: String, value: String },
}

impl PathComponent {
    pub fn path(segment: impl Into<String>) -> Self {
        Self::Path(segment.into())
    }

    pub fn parameter(key: impl Into<String>, value: impl ToString) -> Self {
        Self::Parameter {
            key: key.into(),
            value: value.to_string(),
        }
    }

    pub fn is_path(&self) -> bool {
        matches!(self, Self::Path(_))
    }

    pub fn is_parameter(&self) -> bool {
        matches!(self, Self::Parameter { .. })
    }
}

/// `"key=value"` parses as a parameter, anything else as a path segment.
impl From<&str> for PathComponent {
    fn from(value: &str) -> Self {
        let mut parts = value.split('=').filter(|p| !p.is_empty());
        match (parts.next(), parts.next(), parts.next()) {
            (Some(key), Some(val), None) => Self::parameter(key, val),
            _ => Self::Path(value.to_string()),
        }
    }
}

impl From<String> for PathComponent {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl fmt::Display for PathComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.write_str(path),
            Self::Parameter { key, value } => write!(f, "{key}={value}"),
        }
    }
}

/// Split a path-and-query string such as `"galaxies/7?page=1&size=10"` into
/// components. Empty segments are dropped.
pub fn parse_components(input: &str) -> Vec<PathComponent> {
    let pieces: Vec<&str> = match input.split_once('?') {
        Some((path, query)) => path.split('/').chain(query.split('&')).collect(),
        None if input.contains('/') => input.split('/').collect(),
        None if input.contains('&') => input.split('&').collect(),
        None => vec![input],
    };
    pieces
        .into_iter()
        .filter(|p| !p.is_empty())
        .map(PathComponent::from)
        .collect()
}

/// Join the `Path` entries of `components` with `/`.
pub fn render_path(components: &[PathComponent]) -> String {
    join(components.iter().filter(|c| c.is_path()), "/")
}

/// Join the `Parameter` entries of `components` with `&`.
pub fn render_query(components: &[PathComponent]) -> String {
    join(components.iter().filter(|c| c.is_parameter()), "&")
}

/// Render `path?query`, omitting whichever side is empty.
pub fn render(components: &[PathComponent]) -> String {
    [render_path(components), render_query(components)]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("?")
}

fn join<'a>(components: impl Iterator<Item = &'a PathComponent>, sep: &str) -> String {
    components
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(sep)
}

/// Chained builder for a component list.
///
/// ```
/// use apiclient_core::path::PathBuilder;
///
/// let components = PathBuilder::new()
///     .segment("galaxies")
///     .param("page", 1)
///     .segment("stars")
///     .build();
/// assert_eq!(apiclient_core::path::render(&components), "galaxies/stars?page=1");
/// ```
#[derive(Debug, Clone, Default)]
pub struct PathBuilder {
    components: Vec<PathComponent>,
}

impl PathBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn segment(mut self, segment: impl ToString) -> Self {
        self.components.push(PathComponent::Path(segment.to_string()));
        self
    }

    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.components.push(PathComponent::parameter(key, value));
        self
    }

    #[must_use]
    pub fn component(mut self, component: impl Into<PathComponent>) -> Self {
        self.components.push(component.into());
        self
    }

    #[must_use]
    pub fn extend(mut self, components: impl IntoIterator<Item = PathComponent>) -> Self {
        self.components.extend(components);
        self
    }

    pub fn build(self) -> Vec<PathComponent> {
        self.components
    }
}
