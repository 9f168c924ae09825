//! Per-session behavioral toggle types.
//!
//! Each toggle gates one category of event forwarding:
//! - `groups`: group-chat messages are forwarded to webhooks
//! - `broadcasts`: broadcast-list messages are forwarded to webhooks
//! - `readreceipts`: inbound read receipts update cached status and are forwarded
//! - `calls`: call notifications are forwarded to webhooks
//!
//! Suppressed messages are still cached.

use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::error::ToggleError;

/// Name of one toggle flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToggleName {
    Groups,
    Broadcasts,
    ReadReceipts,
    Calls,
}

impl ToggleName {
    pub const ALL: [ToggleName; 4] = [
        ToggleName::Groups,
        ToggleName::Broadcasts,
        ToggleName::ReadReceipts,
        ToggleName::Calls,
    ];
}

impl fmt::Display for ToggleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToggleName::Groups => write!(f, "groups"),
            ToggleName::Broadcasts => write!(f, "broadcasts"),
            ToggleName::ReadReceipts => write!(f, "readreceipts"),
            ToggleName::Calls => write!(f, "calls"),
        }
    }
}

impl FromStr for ToggleName {
    type Err = ToggleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "groups" => Ok(ToggleName::Groups),
            "broadcasts" => Ok(ToggleName::Broadcasts),
            "readreceipts" | "read_receipts" => Ok(ToggleName::ReadReceipts),
            "calls" => Ok(ToggleName::Calls),
            other => Err(ToggleError::Unknown(other.to_string())),
        }
    }
}

/// Values of all four toggles.
///
/// Used both as the deployment-wide defaults in configuration and as a
/// session's current snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleValues {
    #[serde(default = "default_groups")]
    pub groups: bool,
    #[serde(default = "default_broadcasts")]
    pub broadcasts: bool,
    #[serde(default = "default_read_receipts")]
    pub read_receipts: bool,
    #[serde(default = "default_calls")]
    pub calls: bool,
}

fn default_groups() -> bool {
    true
}

fn default_broadcasts() -> bool {
    false
}

fn default_read_receipts() -> bool {
    true
}

fn default_calls() -> bool {
    false
}

impl Default for ToggleValues {
    fn default() -> Self {
        Self {
            groups: default_groups(),
            broadcasts: default_broadcasts(),
            read_receipts: default_read_receipts(),
            calls: default_calls(),
        }
    }
}

impl ToggleValues {
    pub fn get(&self, name: ToggleName) -> bool {
        match name {
            ToggleName::Groups => self.groups,
            ToggleName::Broadcasts => self.broadcasts,
            ToggleName::ReadReceipts => self.read_receipts,
            ToggleName::Calls => self.calls,
        }
    }
}

/// Per-session overrides layered over the deployment defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broadcasts: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_receipts: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calls: Option<bool>,
}

impl ToggleOverrides {
    /// Resolve the effective values on top of `base`.
    pub fn apply(&self, base: ToggleValues) -> ToggleValues {
        ToggleValues {
            groups: self.groups.unwrap_or(base.groups),
            broadcasts: self.broadcasts.unwrap_or(base.broadcasts),
            read_receipts: self.read_receipts.unwrap_or(base.read_receipts),
            calls: self.calls.unwrap_or(base.calls),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_name_parse() {
        assert_eq!("groups".parse::<ToggleName>().unwrap(), ToggleName::Groups);
        assert_eq!("GROUPS".parse::<ToggleName>().unwrap(), ToggleName::Groups);
        assert_eq!(
            "readreceipts".parse::<ToggleName>().unwrap(),
            ToggleName::ReadReceipts
        );
        assert_eq!(
            "read_receipts".parse::<ToggleName>().unwrap(),
            ToggleName::ReadReceipts
        );
        assert_eq!(
            "typing".parse::<ToggleName>(),
            Err(ToggleError::Unknown("typing".to_string()))
        );
    }

    #[test]
    fn test_toggle_name_display_roundtrip() {
        for name in ToggleName::ALL {
            assert_eq!(name.to_string().parse::<ToggleName>().unwrap(), name);
        }
    }

    #[test]
    fn test_default_values() {
        let values = ToggleValues::default();
        assert!(values.groups);
        assert!(!values.broadcasts);
        assert!(values.read_receipts);
        assert!(!values.calls);
    }

    #[test]
    fn test_overrides_apply_only_set_fields() {
        let overrides = ToggleOverrides {
            groups: Some(false),
            calls: Some(true),
            ..Default::default()
        };
        let values = overrides.apply(ToggleValues::default());
        assert!(!values.groups);
        assert!(!values.broadcasts);
        assert!(values.read_receipts);
        assert!(values.calls);
    }

    #[test]
    fn test_values_deserialize_partial_toml() {
        let values: ToggleValues = toml::from_str("broadcasts = true").unwrap();
        assert!(values.groups);
        assert!(values.broadcasts);
    }
}
