//! Fixed catalog of commands the host will forward to the backend.
//!
//! Membership in this list is the sole validity check applied to a command
//! name before forwarding; anything else is refused without touching the
//! channel. The numeric ids identify commands across catalog versions and
//! carry no ordering semantics.

/// Catalog revision advertised alongside availability replies.
pub const CATALOG_VERSION: u32 = 1;

/// Known commands as `(id, name)` pairs.
pub const COMMANDS: &[(u16, &str)] = &[
    (1, "availability"),
    (2, "pair"),
    (3, "unpair"),
    (4, "vault-status"),
    (5, "lock"),
    (6, "unlock"),
    (7, "encrypt"),
    (8, "decrypt"),
];

/// Whether the catalog contains the named command.
#[must_use]
pub fn contains(name: &str) -> bool {
    COMMANDS.iter().any(|(_, command)| *command == name)
}

/// Numeric id for a catalogued command.
#[must_use]
pub fn command_id(name: &str) -> Option<u16> {
    COMMANDS
        .iter()
        .find(|(_, command)| *command == name)
        .map(|(id, _)| *id)
}
