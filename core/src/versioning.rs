//! Change ledger and semantic version calculator.
//!
//! Every structural edit of a pattern appends one [`VersionChangeEntry`] to the
//! pattern's [`PatternVersioningHistory`]. The highest severity recorded since
//! the last release decides the next version:
//!
//! | Last change             | Estimated next version |
//! |-------------------------|------------------------|
//! | [`ChangeSeverity::Breaking`]    | next major   |
//! | [`ChangeSeverity::NonBreaking`] | next minor   |
//! | [`ChangeSeverity::None`]        | unchanged (next minor while still at `0.0.0`, see [`VersioningPolicy`]) |
//!
//! # Examples
//!
//! ```
//! use pattern_toolkit_core::{
//!     ChangeSeverity, PatternVersioningHistory, VersionInstruction, VersioningPolicy,
//! };
//!
//! let policy = VersioningPolicy::default();
//! let mut history = PatternVersioningHistory::new();
//! history.register_change(ChangeSeverity::NonBreaking, "Attribute 'title' added to 'Blog'");
//!
//! let result = history.update_version(&VersionInstruction::auto(), &policy).unwrap();
//! assert_eq!(result.version.to_string(), "0.1.0");
//!
//! history.register_change(ChangeSeverity::Breaking, "Attribute 'title' deleted from 'Blog'");
//! let result = history.update_version(&VersionInstruction::auto(), &policy).unwrap();
//! assert_eq!(result.version.to_string(), "1.0.0");
//! ```

use std::fmt;
use std::str::FromStr;

use semver::Version;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::VersioningPolicy;
use crate::error::{Result, ToolkitError};
use crate::persistence::{Persistable, PersistableFactory, PersistableProperties};

/// Instruction token that asks for the estimated next version.
pub const AUTO_VERSION: &str = "auto";

/// Classification of a recorded change.
///
/// Ordered so that a history's severity can only escalate with `max`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum ChangeSeverity {
    /// Bookkeeping entry (a committed version transition).
    #[default]
    None,
    /// Additive change that existing drafts can absorb.
    NonBreaking,
    /// Change that may lose or reinterpret existing draft data.
    Breaking,
}

impl ChangeSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeSeverity::None => "None",
            ChangeSeverity::NonBreaking => "NonBreaking",
            ChangeSeverity::Breaking => "Breaking",
        }
    }
}

impl fmt::Display for ChangeSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeSeverity {
    type Err = ToolkitError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "None" | "NoChange" => Ok(ChangeSeverity::None),
            "NonBreaking" => Ok(ChangeSeverity::NonBreaking),
            "Breaking" => Ok(ChangeSeverity::Breaking),
            other => Err(ToolkitError::persistence(
                "VersionChangeEntry",
                format!("unknown severity '{other}'"),
            )),
        }
    }
}

/// One entry of the change ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionChangeEntry {
    pub severity: ChangeSeverity,
    pub message: String,
}

impl fmt::Display for VersionChangeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)
    }
}

/// How the caller wants the version to change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionInstruction {
    /// Explicit version, or `None`/`"auto"` for the estimate.
    pub version: Option<String>,
    /// Accept an explicit version that skips a breaking change.
    pub force: bool,
}

impl VersionInstruction {
    /// Uses the estimated next version.
    pub fn auto() -> Self {
        Self::default()
    }

    /// Uses an explicit version.
    pub fn explicit(version: impl Into<String>) -> Self {
        Self {
            version: Some(version.into()),
            force: false,
        }
    }

    /// Allows an explicit version below a breaking estimate.
    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }

    fn is_auto(&self) -> bool {
        match &self.version {
            None => true,
            Some(version) => version.trim().eq_ignore_ascii_case(AUTO_VERSION),
        }
    }
}

/// Outcome of [`PatternVersioningHistory::update_version`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionUpdateResult {
    /// The version now current.
    pub version: Version,
    /// Set when the accepted version is lower than the estimate.
    pub warning: Option<String>,
}

/// Change ledger plus the current semantic version of a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternVersioningHistory {
    current: Version,
    last_change: ChangeSeverity,
    change_log: Vec<VersionChangeEntry>,
}

impl Default for PatternVersioningHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternVersioningHistory {
    /// Creates an empty history at version `0.0.0`.
    pub fn new() -> Self {
        Self {
            current: Version::new(0, 0, 0),
            last_change: ChangeSeverity::None,
            change_log: Vec::new(),
        }
    }

    pub fn current(&self) -> &Version {
        &self.current
    }

    /// Highest severity recorded since the last committed version.
    pub fn last_change(&self) -> ChangeSeverity {
        self.last_change
    }

    pub fn change_log(&self) -> &[VersionChangeEntry] {
        &self.change_log
    }

    /// Appends a change and escalates the pending severity.
    pub fn register_change(&mut self, severity: ChangeSeverity, message: impl Into<String>) {
        let message = message.into();
        debug!(%severity, %message, "recorded pattern change");
        self.last_change = self.last_change.max(severity);
        self.change_log.push(VersionChangeEntry { severity, message });
    }

    /// Computes the version `auto` would produce right now.
    pub fn estimate_next_version(&self, policy: &VersioningPolicy) -> Version {
        let current = &self.current;
        match self.last_change {
            ChangeSeverity::Breaking => Version::new(current.major + 1, 0, 0),
            ChangeSeverity::NonBreaking => Version::new(current.major, current.minor + 1, 0),
            ChangeSeverity::None
                if policy.bump_initial_version_without_changes && is_initial(current) =>
            {
                Version::new(current.major, current.minor + 1, 0)
            }
            ChangeSeverity::None => current.clone(),
        }
    }

    /// Moves the history to a new version.
    ///
    /// On an actual transition the change log is replaced by a single
    /// [`ChangeSeverity::None`] entry recording it, and the pending severity is
    /// reset. Requesting the current version records nothing.
    ///
    /// Only an explicit version strictly below the estimate is checked against
    /// the pending changes. A version equal to the estimate is what `auto`
    /// would pick, so it is accepted without a warning.
    ///
    /// # Errors
    ///
    /// - [`ToolkitError::VersionInstructionInvalid`] for an unparseable version.
    /// - [`ToolkitError::ZeroVersionRequested`] for `0.0.0`.
    /// - [`ToolkitError::VersionBeforeCurrent`] for a version below the current one.
    /// - [`ToolkitError::IllegalVersionBump`] for a version below the estimate
    ///   while breaking changes are pending, unless the instruction is forced.
    pub fn update_version(
        &mut self,
        instruction: &VersionInstruction,
        policy: &VersioningPolicy,
    ) -> Result<VersionUpdateResult> {
        let estimated = self.estimate_next_version(policy);
        let mut warning = None;

        let next = match instruction.version.as_deref() {
            Some(raw) if !instruction.is_auto() => {
                let requested = Version::parse(raw.trim())
                    .map_err(|_| ToolkitError::VersionInstructionInvalid(raw.to_string()))?;
                if is_initial(&requested) {
                    return Err(ToolkitError::ZeroVersionRequested);
                }
                if requested < self.current {
                    return Err(ToolkitError::VersionBeforeCurrent {
                        requested: requested.to_string(),
                        current: self.current.to_string(),
                    });
                }
                if requested < estimated {
                    match self.last_change {
                        ChangeSeverity::Breaking if !instruction.force => {
                            return Err(ToolkitError::IllegalVersionBump {
                                requested: requested.to_string(),
                                estimated: estimated.to_string(),
                                changes: self.describe_changes(),
                            });
                        }
                        ChangeSeverity::Breaking => {
                            warn!(%requested, %estimated, "forcing version past breaking changes");
                            warning = Some(self.version_warning(&requested, &estimated));
                        }
                        ChangeSeverity::NonBreaking => {
                            warning = Some(self.version_warning(&requested, &estimated));
                        }
                        ChangeSeverity::None => {}
                    }
                }
                requested
            }
            _ => estimated,
        };

        if next != self.current {
            info!(from = %self.current, to = %next, "pattern version changed");
            let message = format!("version changed from {} to {}", self.current, next);
            self.change_log.clear();
            self.change_log.push(VersionChangeEntry {
                severity: ChangeSeverity::None,
                message,
            });
            self.current = next;
            self.last_change = ChangeSeverity::None;
        }

        Ok(VersionUpdateResult {
            version: self.current.clone(),
            warning,
        })
    }

    fn describe_changes(&self) -> String {
        self.change_log
            .iter()
            .filter(|entry| entry.severity != ChangeSeverity::None)
            .map(|entry| format!("- {entry}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn version_warning(&self, requested: &Version, estimated: &Version) -> String {
        format!(
            "version {requested} is lower than the estimated version {estimated}; these changes were made since the last version:\n{}",
            self.describe_changes()
        )
    }
}

fn is_initial(version: &Version) -> bool {
    version.major == 0 && version.minor == 0 && version.patch == 0
}

impl Persistable for VersionChangeEntry {
    const TYPE_NAME: &'static str = "VersionChangeEntry";

    fn dehydrate(&self) -> PersistableProperties {
        let mut properties = PersistableProperties::for_type::<Self>();
        properties.set("Severity", self.severity.as_str());
        properties.set("Message", self.message.clone());
        properties
    }

    fn rehydrate(properties: &PersistableProperties, _: &PersistableFactory) -> Result<Self> {
        Ok(Self {
            severity: properties.parse("Severity")?,
            message: properties.string("Message")?,
        })
    }
}

impl Persistable for PatternVersioningHistory {
    const TYPE_NAME: &'static str = "PatternVersioningHistory";

    fn dehydrate(&self) -> PersistableProperties {
        let mut properties = PersistableProperties::for_type::<Self>();
        properties.set("Current", self.current.to_string());
        properties.set("LastChange", self.last_change.as_str());
        properties.set_list("ChangeLog", &self.change_log);
        properties
    }

    fn rehydrate(properties: &PersistableProperties, factory: &PersistableFactory) -> Result<Self> {
        Ok(Self {
            current: properties.parse("Current")?,
            last_change: properties.parse("LastChange")?,
            change_log: properties.list("ChangeLog", factory)?,
        })
    }
}
