//! Context for lookup digest generation.

use std::fmt;

/// Names the column a lookup digest is computed for.
///
/// In keyed mode the context is mixed into the HMAC, so the same value
/// produces unrelated digests in different columns.
///
/// # Example
///
/// ```
/// use boxoffice::context::LookupContext;
///
/// let ctx = LookupContext::new("users", "email");
/// assert_eq!(ctx.to_string(), "users|email");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupContext {
    table_name: String,
    column_name: String,
}

impl LookupContext {
    /// Creates a new lookup context.
    #[must_use]
    pub fn new(table_name: impl Into<String>, column_name: impl Into<String>) -> Self {
        Self { table_name: table_name.into(), column_name: column_name.into() }
    }

    /// Context of the `users.email_hash` column.
    #[must_use]
    pub fn email() -> Self {
        Self::new("users", "email")
    }

    /// Returns the table name.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Returns the column name.
    #[must_use]
    pub fn column_name(&self) -> &str {
        &self.column_name
    }
}

impl fmt::Display for LookupContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.table_name, self.column_name)
    }
}
