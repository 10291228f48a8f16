use sqlx::{Pool, Postgres};
use thiserror::Error;

mod user;
pub use user::UserExt;

mod taxonomy;
pub use taxonomy::TaxonomyExt;

mod title;
pub use title::TitleExt;

mod review;
pub use review::ReviewExt;

mod comment;
pub use comment::CommentExt;

#[cfg(test)]
pub mod memory;

pub type Result<T> = std::result::Result<T, DatabaseError>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    /// An unknown or internal error happened with the database
    #[error(transparent)]
    Internal(#[from] sqlx::Error),
    /// A unique constraint rejected the write
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        resource: &'static str,
        /// Request field the constraint guards, used as the error map key
        field: &'static str,
        value: String,
    },
    /// A resource in the database doesn't exist
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
}

/// Everything the services need from persistence.
///
/// Implemented for [`DBClient`] (PostgreSQL) and, in tests, for the in-memory
/// store. Handlers only ever see `Arc<dyn Store>`.
pub trait Store: UserExt + TaxonomyExt + TitleExt + ReviewExt + CommentExt + Send + Sync {}

impl<T> Store for T where T: UserExt + TaxonomyExt + TitleExt + ReviewExt + CommentExt + Send + Sync
{}

#[derive(Debug, Clone)]
pub struct DBClient {
    pool: Pool<Postgres>,
}

impl DBClient {
    pub fn new(pool: Pool<Postgres>) -> Self {
        DBClient { pool }
    }
}

/// Case-insensitive substring filter on `column` for bind parameter `$param`.
///
/// True when the parameter is NULL. The search text is matched literally, so
/// `%` and `_` typed by a client are not wildcards.
pub(crate) fn text_contains(column: &str, param: u8) -> String {
    format!("(${param}::TEXT IS NULL OR strpos(LOWER({column}), LOWER(${param})) > 0)")
}

/// Translate constraint violations into store errors.
///
/// Unique violations become [`DatabaseError::Conflict`] keyed by the column
/// the constraint covers (Postgres default names: `<table>_<column>_key`).
/// Foreign key violations mean a referenced row vanished mid-request.
pub(crate) fn constraint_error(
    error: sqlx::Error,
    resource: &'static str,
    value: &str,
) -> DatabaseError {
    if let sqlx::Error::Database(ref db_err) = error {
        if db_err.is_unique_violation() {
            let field = match db_err.constraint() {
                Some(c) if c.ends_with("_username_key") => "username",
                Some(c) if c.ends_with("_email_key") => "email",
                Some(c) if c.ends_with("_slug_key") => "slug",
                _ => "non_field_errors",
            };
            return DatabaseError::Conflict {
                resource,
                field,
                value: value.to_string(),
            };
        }
        if db_err.is_foreign_key_violation() {
            return DatabaseError::NotFound {
                resource,
                identifier: "reference",
            };
        }
    }
    DatabaseError::Internal(error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_search_is_a_literal_substring_match() {
        let clause = text_contains("t.name", 3);

        assert_eq!(
            clause,
            "($3::TEXT IS NULL OR strpos(LOWER(t.name), LOWER($3)) > 0)"
        );
        assert!(!clause.contains("LIKE"));
    }
}
