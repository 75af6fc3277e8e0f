//! Rules version parsing and numeric ordering.
//!
//! # Design
//! - Versions are `MAJOR.MINOR` pairs compared component-wise as integers, so
//!   `2.9 < 2.10` even though the strings sort the other way.
//! - Synthetic "definitely newer" versions bump only the minor component.

use std::cmp::Ordering;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use crate::error::{RulesError, RulesResult};

/// Offset added to the minor component when synthesising a version that must
/// sort after anything the server produces on its own.
pub const SYNTHETIC_MINOR_OFFSET: u32 = 10_000;

/// A `MAJOR.MINOR` rules version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    /// Major component; compared first.
    pub major: u32,
    /// Minor component; compared when majors are equal.
    pub minor: u32,
}

impl Version {
    /// Construct a version from its components.
    #[must_use]
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Numeric ordering between two versions.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }

    /// Version with the same major and `minor + offset`.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError::VersionParse`] when the minor component would overflow.
    pub fn with_minor_offset(&self, offset: u32) -> RulesResult<Self> {
        let minor = self
            .minor
            .checked_add(offset)
            .ok_or_else(|| RulesError::VersionParse {
                value: format!("{}.{}+{offset}", self.major, self.minor),
            })?;
        Ok(Self::new(self.major, minor))
    }

    /// Version guaranteed to sort after `self` and after any version the
    /// server reaches by its own increments during a session.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError::VersionParse`] when the minor component would overflow.
    pub fn synthetic_successor(&self) -> RulesResult<Self> {
        self.with_minor_offset(SYNTHETIC_MINOR_OFFSET)
    }
}

impl Display for Version {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for Version {
    type Err = RulesError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let invalid = || RulesError::VersionParse {
            value: input.to_string(),
        };
        let (major, minor) = input.trim().split_once('.').ok_or_else(invalid)?;
        if !is_digits(major) || !is_digits(minor) {
            return Err(invalid());
        }
        let major = major.parse::<u32>().map_err(|_| invalid())?;
        let minor = minor.parse::<u32>().map_err(|_| invalid())?;
        Ok(Self::new(major, minor))
    }
}

fn is_digits(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|byte| byte.is_ascii_digit())
}
