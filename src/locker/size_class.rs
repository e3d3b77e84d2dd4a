//! Locker size classes
//!
//! The set of classes is closed and totally ordered: `XS < S < M < L < XL`.
//! A package of class `c` fits in any locker of class `>= c`.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Capacity tier of a locker (and the requirement of a package)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum SizeClass {
    XS,
    S,
    M,
    L,
    XL,
}

impl SizeClass {
    /// All classes, smallest first
    pub const ALL: [SizeClass; 5] = [
        SizeClass::XS,
        SizeClass::S,
        SizeClass::M,
        SizeClass::L,
        SizeClass::XL,
    ];

    /// Short label used in logs, metrics and config files
    pub fn as_str(&self) -> &'static str {
        match self {
            SizeClass::XS => "XS",
            SizeClass::S => "S",
            SizeClass::M => "M",
            SizeClass::L => "L",
            SizeClass::XL => "XL",
        }
    }

    /// Rank of this class (0 = smallest)
    pub fn rank(&self) -> usize {
        *self as usize
    }

    /// Check if a package of class `required` fits in a locker of this class
    pub fn can_fit(&self, required: SizeClass) -> bool {
        required <= *self
    }
}

impl fmt::Display for SizeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<SizeClass> for &'static str {
    fn from(class: SizeClass) -> Self {
        class.as_str()
    }
}

impl TryFrom<String> for SizeClass {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl FromStr for SizeClass {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "XS" | "EXTRA_SMALL" => Ok(SizeClass::XS),
            "S" | "SMALL" => Ok(SizeClass::S),
            "M" | "MEDIUM" => Ok(SizeClass::M),
            "L" | "LARGE" => Ok(SizeClass::L),
            "XL" | "EXTRA_LARGE" => Ok(SizeClass::XL),
            other => Err(Error::InvalidInput(format!("Unknown size class: {:?}", other))),
        }
    }
}
