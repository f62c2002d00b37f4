//! Computed build identifiers
//!
//! A run is identified externally by its date-stamped build identifier
//! (`<YYYY-MM-DD>-<run-number>`), which also tags the published image.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Date-stamped identifier for one run, e.g. `2024-06-01-42`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildIdentifier(String);

impl BuildIdentifier {
    /// Formats the identifier from the run date and run number
    pub fn new(date: NaiveDate, run_number: u64) -> Self {
        Self(format!("{}-{}", date.format("%Y-%m-%d"), run_number))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BuildIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Published image reference: `<registry-account>/<image-name>:<tag>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReference {
    pub account: String,
    pub name: String,
    pub tag: String,
}

impl ImageReference {
    /// Image reference tagged with a build identifier
    pub fn for_build(
        account: impl Into<String>,
        name: impl Into<String>,
        build: &BuildIdentifier,
    ) -> Self {
        Self {
            account: account.into(),
            name: name.into(),
            tag: build.to_string(),
        }
    }

    /// Same repository, different tag
    pub fn with_tag(&self, tag: impl Into<String>) -> Self {
        Self {
            account: self.account.clone(),
            name: self.name.clone(),
            tag: tag.into(),
        }
    }

    /// `<account>/<name>` without the tag
    pub fn repository(&self) -> String {
        format!("{}/{}", self.account, self.name)
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.account, self.name, self.tag)
    }
}
