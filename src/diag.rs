//! Category-gated debug diagnostics.
//! Warnings and errors always go straight to `tracing`; debug chatter is
//! additionally masked by a configured category bitmask so operators can
//! turn on exactly the subsystem they are chasing. Emission never fails
//! and never blocks beyond the cost of the write.

use crate::config::LogSettings;

pub const CONNECT: u32 = 1 << 0;
pub const QUERY: u32 = 1 << 1;
pub const MARSHAL: u32 = 1 << 2;
pub const ENUM: u32 = 1 << 3;
pub const ALL: u32 = CONNECT | QUERY | MARSHAL | ENUM;

/// Cheap, copyable gate derived from [`LogSettings`] at context creation.
#[derive(Debug, Clone, Copy)]
pub struct Diag {
    enabled: bool,
    mask: u32,
}

impl Diag {
    pub fn new(settings: &LogSettings) -> Self {
        Diag {
            enabled: settings.debug,
            mask: settings.debug_mask,
        }
    }

    /// Disabled gate, for contexts that want silence regardless of config.
    pub fn off() -> Self {
        Diag {
            enabled: false,
            mask: 0,
        }
    }

    pub fn wants(&self, category: u32) -> bool {
        self.enabled && self.mask & category != 0
    }

    /// Emit a debug record for `category`. The message closure only runs
    /// when the category is enabled, so callers can format freely.
    pub fn debug(&self, category: u32, msg: impl FnOnce() -> String) {
        if self.wants(category) {
            tracing::debug!(target: "sqlident", "{}", msg());
        }
    }
}

impl Default for Diag {
    fn default() -> Self {
        Diag {
            enabled: false,
            mask: ALL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_gates_categories() {
        let d = Diag::new(&LogSettings {
            debug: true,
            debug_mask: CONNECT | QUERY,
        });
        assert!(d.wants(CONNECT));
        assert!(d.wants(QUERY));
        assert!(!d.wants(MARSHAL));
        assert!(!d.wants(ENUM));
    }

    #[test]
    fn disabled_gate_formats_nothing() {
        let d = Diag::off();
        let mut ran = false;
        d.debug(ALL, || {
            ran = true;
            String::new()
        });
        assert!(!ran);
    }
}
