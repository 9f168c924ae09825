//! Per-session toggle flags.

use std::sync::atomic::{AtomicBool, Ordering};

use tenantgate_types::error::ToggleError;
use tenantgate_types::toggle::{ToggleName, ToggleValues};

/// Four independent feature flags with atomic flip semantics.
///
/// Toggles are not tied to the lifecycle: they can be read and flipped in
/// any session state, concurrently with ingestion.
#[derive(Debug)]
pub struct ToggleSet {
    groups: AtomicBool,
    broadcasts: AtomicBool,
    read_receipts: AtomicBool,
    calls: AtomicBool,
}

impl ToggleSet {
    pub fn new(initial: ToggleValues) -> Self {
        Self {
            groups: AtomicBool::new(initial.groups),
            broadcasts: AtomicBool::new(initial.broadcasts),
            read_receipts: AtomicBool::new(initial.read_receipts),
            calls: AtomicBool::new(initial.calls),
        }
    }

    fn flag(&self, name: ToggleName) -> &AtomicBool {
        match name {
            ToggleName::Groups => &self.groups,
            ToggleName::Broadcasts => &self.broadcasts,
            ToggleName::ReadReceipts => &self.read_receipts,
            ToggleName::Calls => &self.calls,
        }
    }

    pub fn is_enabled(&self, name: ToggleName) -> bool {
        self.flag(name).load(Ordering::Acquire)
    }

    /// Flip `name` and return its new value.
    pub fn toggle(&self, name: ToggleName) -> bool {
        !self.flag(name).fetch_xor(true, Ordering::AcqRel)
    }

    /// Flip the toggle named `name`. Unknown names are rejected.
    pub fn toggle_named(&self, name: &str) -> Result<bool, ToggleError> {
        let name: ToggleName = name.parse()?;
        Ok(self.toggle(name))
    }

    pub fn set(&self, name: ToggleName, value: bool) {
        self.flag(name).store(value, Ordering::Release);
    }

    pub fn snapshot(&self) -> ToggleValues {
        ToggleValues {
            groups: self.is_enabled(ToggleName::Groups),
            broadcasts: self.is_enabled(ToggleName::Broadcasts),
            read_receipts: self.is_enabled(ToggleName::ReadReceipts),
            calls: self.is_enabled(ToggleName::Calls),
        }
    }
}

impl Default for ToggleSet {
    fn default() -> Self {
        Self::new(ToggleValues::default())
    }
}
