//! Generic SQL dialect.

use super::Dialect;

/// A generic SQL dialect using ANSI SQL quoting.
///
/// Quoting can be switched off for backends reached through a connectivity
/// layer that does not accept quoted identifiers.
#[derive(Debug, Clone, Copy)]
pub struct GenericDialect {
    quote_identifiers: bool,
}

impl GenericDialect {
    /// Creates a new generic dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            quote_identifiers: true,
        }
    }

    /// Creates a generic dialect that never quotes identifiers.
    #[must_use]
    pub const fn unquoted() -> Self {
        Self {
            quote_identifiers: false,
        }
    }
}

impl Default for GenericDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl Dialect for GenericDialect {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn identifier_quotes(&self) -> Option<(char, char)> {
        self.quote_identifiers.then_some(('"', '"'))
    }
}
