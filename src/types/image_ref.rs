// ABOUTME: Container image reference validation for work requests and the helper image.
// ABOUTME: Accepts nginx, nginx:tag, registry:port/repo:tag@digest; rejects shell metacharacters.

use std::fmt;
use thiserror::Error;

/// Kubernetes label values are capped at 63 characters.
const MAX_LABEL_VALUE: usize = 63;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseImageRefError {
    #[error("image reference cannot be empty")]
    Empty,

    #[error("invalid character in image reference: {0:?}")]
    InvalidChar(char),

    #[error("invalid image reference format: {0}")]
    InvalidFormat(String),
}

/// A parsed image reference. The original text is kept so the exact string the
/// image cache declared is what lands in the helper command.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageRef {
    raw: String,
    registry: Option<String>,
    repository: String,
    tag: Option<String>,
    digest: Option<String>,
}

impl ImageRef {
    pub fn parse(input: &str) -> Result<Self, ParseImageRefError> {
        let raw = input.trim();
        if raw.is_empty() {
            return Err(ParseImageRefError::Empty);
        }

        // The reference is interpolated into a shell script inside the Job.
        if let Some(c) = raw.chars().find(|c| {
            !(c.is_ascii_alphanumeric() || matches!(c, '/' | ':' | '.' | '-' | '_' | '@'))
        }) {
            return Err(ParseImageRefError::InvalidChar(c));
        }

        let (rest, digest) = match raw.split_once('@') {
            Some((_, "")) => return Err(ParseImageRefError::InvalidFormat(raw.to_string())),
            Some((before, after)) => (before, Some(after.to_string())),
            None => (raw, None),
        };

        // A colon followed by a slash belongs to a registry port, not a tag.
        let (rest, tag) = match rest.rsplit_once(':') {
            Some((before, after)) if !after.contains('/') => {
                if after.is_empty() {
                    return Err(ParseImageRefError::InvalidFormat(raw.to_string()));
                }
                (before, Some(after.to_string()))
            }
            _ => (rest, None),
        };

        let (registry, repository) = match rest.split_once('/') {
            Some((first, remainder))
                if first.contains('.') || first.contains(':') || first == "localhost" =>
            {
                (Some(first.to_string()), remainder.to_string())
            }
            _ => (None, rest.to_string()),
        };

        if repository.is_empty()
            || repository.starts_with('/')
            || repository.ends_with('/')
            || repository.contains("//")
        {
            return Err(ParseImageRefError::InvalidFormat(raw.to_string()));
        }

        Ok(Self {
            raw: raw.to_string(),
            registry,
            repository,
            tag,
            digest,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn registry(&self) -> Option<&str> {
        self.registry.as_deref()
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// Explicit tag, or `latest` when neither a tag nor a digest was given.
    pub fn tag(&self) -> Option<&str> {
        match (&self.tag, &self.digest) {
            (Some(tag), _) => Some(tag),
            (None, None) => Some("latest"),
            (None, Some(_)) => None,
        }
    }

    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    /// A value usable as a Kubernetes label: the last repository segment plus
    /// tag, restricted to `[A-Za-z0-9._-]` and trimmed to 63 characters.
    pub fn label_value(&self) -> String {
        let short = self.repository.rsplit('/').next().unwrap_or(&self.repository);
        let mut value: String = match self.tag() {
            Some(tag) => format!("{short}_{tag}"),
            None => short.to_string(),
        }
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_LABEL_VALUE)
        .collect();

        // Label values must start and end with an alphanumeric character.
        while value.ends_with(|c: char| !c.is_ascii_alphanumeric()) {
            value.pop();
        }
        value
            .trim_start_matches(|c: char| !c.is_ascii_alphanumeric())
            .to_string()
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl std::str::FromStr for ImageRef {
    type Err = ParseImageRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_name_defaults_to_latest() {
        let image = ImageRef::parse("foo").unwrap();
        assert_eq!(image.repository(), "foo");
        assert_eq!(image.tag(), Some("latest"));
        assert_eq!(image.as_str(), "foo");
    }

    #[test]
    fn registry_port_is_not_a_tag() {
        let image = ImageRef::parse("localhost:5000/team/app").unwrap();
        assert_eq!(image.registry(), Some("localhost:5000"));
        assert_eq!(image.repository(), "team/app");
        assert_eq!(image.tag(), Some("latest"));
    }

    #[test]
    fn digest_only_has_no_tag() {
        let image = ImageRef::parse("nginx@sha256:abc123").unwrap();
        assert_eq!(image.digest(), Some("sha256:abc123"));
        assert_eq!(image.tag(), None);
    }

    #[test]
    fn shell_metacharacters_are_rejected() {
        assert_eq!(
            ImageRef::parse("nginx;rm -rf /"),
            Err(ParseImageRefError::InvalidChar(';'))
        );
    }

    #[test]
    fn dangling_tag_separator_is_rejected() {
        assert!(matches!(
            ImageRef::parse("nginx:"),
            Err(ParseImageRefError::InvalidFormat(_))
        ));
    }

    #[test]
    fn label_value_is_label_safe() {
        let image = ImageRef::parse("ghcr.io/org/redis:7.2").unwrap();
        assert_eq!(image.label_value(), "redis_7.2");
    }

    #[test]
    fn label_value_is_truncated() {
        let long = format!("{}:v1", "a".repeat(80));
        let image = ImageRef::parse(&long).unwrap();
        assert_eq!(image.label_value().len(), 63);
    }
}
