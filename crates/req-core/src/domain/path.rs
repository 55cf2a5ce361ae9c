use std::{fmt, num::NonZeroUsize, ops::Deref, str::FromStr};

use non_empty_string::NonEmptyString;
use serde::{Deserialize, Serialize};

/// A validated section prefix, such as `REQ` or `SYS-A`.
///
/// Prefixes are non-empty and contain only ASCII letters, digits and `-`. The
/// `_` and `.` characters are reserved as separators in a
/// [`HierarchicalPath`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SectionPrefix(NonEmptyString);

impl SectionPrefix {
    /// The prefix used when neither the project nor the node supplies one.
    pub const DEFAULT: &'static str = "REQ";

    /// Creates a new `SectionPrefix` from a string.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPrefixError`] if the string is empty or contains
    /// characters other than ASCII letters, digits and `-`.
    pub fn new(s: String) -> Result<Self, InvalidPrefixError> {
        if !s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(InvalidPrefixError(s));
        }
        let non_empty = NonEmptyString::new(s).map_err(InvalidPrefixError)?;
        Ok(Self(non_empty))
    }

    /// Returns the string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Default for SectionPrefix {
    fn default() -> Self {
        Self::new(Self::DEFAULT.to_string()).expect("the default prefix is valid")
    }
}

impl TryFrom<String> for SectionPrefix {
    type Error = InvalidPrefixError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for SectionPrefix {
    type Error = InvalidPrefixError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value.to_string())
    }
}

impl From<SectionPrefix> for String {
    fn from(prefix: SectionPrefix) -> Self {
        prefix.as_str().to_owned()
    }
}

impl Deref for SectionPrefix {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.0.as_str()
    }
}

impl fmt::Display for SectionPrefix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SectionPrefix {
    type Err = InvalidPrefixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

/// Error returned when a string is not a valid section prefix.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error(
    "Invalid section prefix '{0}': must be non-empty and contain only letters, digits and '-'"
)]
pub struct InvalidPrefixError(String);

/// The derived, human-readable position of a requirement in its forest.
///
/// Format: `{PREFIX}_{P1}.{P2}...{Pn}`, where each `P` is the 1-based
/// position of an ancestor (and finally the node itself) among its siblings.
///
/// Examples: `REQ_1`, `REQ_2.1.3`, `SYS-A_4.2`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HierarchicalPath {
    prefix: SectionPrefix,
    positions: Vec<NonZeroUsize>,
}

impl HierarchicalPath {
    /// The path of a root node at the given position.
    #[must_use]
    pub fn root(prefix: SectionPrefix, position: NonZeroUsize) -> Self {
        Self {
            prefix,
            positions: vec![position],
        }
    }

    /// The path of a child of this node at the given position.
    #[must_use]
    pub fn child(&self, position: NonZeroUsize) -> Self {
        let mut positions = self.positions.clone();
        positions.push(position);
        Self {
            prefix: self.prefix.clone(),
            positions,
        }
    }

    /// The path of the parent node, or `None` for a root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.positions.len() < 2 {
            return None;
        }
        Some(Self {
            prefix: self.prefix.clone(),
            positions: self.positions[..self.positions.len() - 1].to_vec(),
        })
    }

    /// The resolved prefix shared by every node under the same root.
    #[must_use]
    pub const fn prefix(&self) -> &SectionPrefix {
        &self.prefix
    }

    /// Sibling positions from the root down to this node.
    #[must_use]
    pub fn positions(&self) -> &[NonZeroUsize] {
        &self.positions
    }

    /// Depth of the node; roots have depth 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.positions.len() - 1
    }

    /// Position of the node among its own siblings.
    #[must_use]
    pub fn position(&self) -> NonZeroUsize {
        *self
            .positions
            .last()
            .expect("a path always has at least one position")
    }
}

impl fmt::Display for HierarchicalPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}_", self.prefix)?;
        for (index, position) in self.positions.iter().enumerate() {
            if index > 0 {
                f.write_str(".")?;
            }
            write!(f, "{position}")?;
        }
        Ok(())
    }
}

/// Errors that can occur while parsing a [`HierarchicalPath`].
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum PathParseError {
    /// The string does not have the `PREFIX_POSITIONS` shape.
    #[error("Invalid hierarchical path format: {0}")]
    Syntax(String),

    /// A position segment is not a positive integer.
    #[error("Invalid position in hierarchical path '{0}': expected a non-zero integer, got '{1}'")]
    Position(String, String),

    /// The prefix segment is invalid.
    #[error(transparent)]
    Prefix(#[from] InvalidPrefixError),
}

impl FromStr for HierarchicalPath {
    type Err = PathParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((prefix, positions)) = s.rsplit_once('_') else {
            return Err(PathParseError::Syntax(s.to_string()));
        };

        if positions.is_empty() {
            return Err(PathParseError::Syntax(s.to_string()));
        }

        let prefix = SectionPrefix::new(prefix.to_string())?;
        let positions = positions
            .split('.')
            .map(|segment| {
                segment
                    .parse::<usize>()
                    .ok()
                    .and_then(NonZeroUsize::new)
                    .ok_or_else(|| PathParseError::Position(s.to_string(), segment.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { prefix, positions })
    }
}

impl TryFrom<String> for HierarchicalPath {
    type Error = PathParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl TryFrom<&str> for HierarchicalPath {
    type Error = PathParseError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HierarchicalPath> for String {
    fn from(path: HierarchicalPath) -> Self {
        path.to_string()
    }
}
