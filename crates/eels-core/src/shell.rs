#![forbid(unsafe_code)]

//! Electron-shell reference attached to an edge.
//!
//! Periodic-table data lives elsewhere; an edge only carries the
//! identifying triple so it can be persisted and looked up again.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies one subshell of one element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElectronShell {
    pub atomic_number: u32,
    pub shell_number: u32,
    pub subshell_index: u32,
}

impl ElectronShell {
    #[must_use]
    pub const fn new(atomic_number: u32, shell_number: u32, subshell_index: u32) -> Self {
        Self {
            atomic_number,
            shell_number,
            subshell_index,
        }
    }
}

impl fmt::Display for ElectronShell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Z={} n={} subshell={}",
            self.atomic_number, self.shell_number, self.subshell_index
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_field_names_are_stable() {
        let json = serde_json::to_value(ElectronShell::new(6, 1, 1)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "atomic_number": 6, "shell_number": 1, "subshell_index": 1 })
        );
    }

    #[test]
    fn display_is_compact() {
        assert_eq!(ElectronShell::new(8, 1, 1).to_string(), "Z=8 n=1 subshell=1");
    }
}
