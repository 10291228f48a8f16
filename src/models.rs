use chrono::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User role enumeration for role-based access control (RBAC)
///
/// Stored in PostgreSQL as the `user_role` ENUM type, lowercase on the wire
/// and in the database (`Admin` -> "admin").
///
/// Variant order is the privilege order: `User < Moderator < Admin`.
/// `PartialOrd`/`Ord` are derived from that order, so permission checks read
/// as `role >= UserRole::Moderator` instead of comparing strings.
#[derive(
    Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq, PartialOrd, Ord, Default,
)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    User, // Standard user permissions
    Moderator, // May edit or delete any review and comment
    Admin,     // Full system access
}

impl UserRole {
    pub fn to_str(&self) -> &str {
        match self {
            UserRole::User => "user",
            UserRole::Moderator => "moderator",
            UserRole::Admin => "admin",
        }
    }
}

/// User model representing the users table
///
/// Security notes:
/// - `confirmation_code`: argon2 hash of the pending signup code, `None` once
///   the code has been exchanged for an access token. The plain code is only
///   ever sent by email.
/// - `is_staff` / `is_superuser`: escalate to admin-equivalent privilege
///   regardless of `role` (see [`User::is_admin_capable`]).
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub role: UserRole,
    pub is_staff: bool,
    pub is_superuser: bool,
    #[serde(skip_serializing)]
    pub confirmation_code: Option<String>,
    pub date_joined: DateTime<Utc>,
}

impl User {
    /// True when the user may manage the catalog and other users.
    pub fn is_admin_capable(&self) -> bool {
        self.role == UserRole::Admin || self.is_staff || self.is_superuser
    }
}

/// Fields for inserting a user row. Role defaults to `user` for signups.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub role: UserRole,
}

/// Partial update of a user row; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub role: Option<UserRole>,
}

/// Which slug-addressed taxonomy a row belongs to.
///
/// Categories and genres share the same shape (`id`, `name`, `slug`) and the
/// same store operations; they only differ in table and in how titles
/// reference them (a nullable foreign key vs. a link table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Taxonomy {
    Category,
    Genre,
}

impl Taxonomy {
    pub fn table(&self) -> &'static str {
        match self {
            Taxonomy::Category => "categories",
            Taxonomy::Genre => "genres",
        }
    }

    /// Field name used in request bodies and error maps.
    pub fn field(&self) -> &'static str {
        match self {
            Taxonomy::Category => "category",
            Taxonomy::Genre => "genre",
        }
    }
}

/// A category or genre
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone, PartialEq)]
pub struct SlugEntry {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

/// Title model with its resolved category and genres
///
/// `rating` is derived from the title's reviews and is only ever written by
/// the review mutation paths of the store.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Title {
    pub id: i64,
    pub name: String,
    pub year: i32,
    pub description: String,
    pub rating: Option<i32>,
    pub category: Option<SlugEntry>,
    pub genres: Vec<SlugEntry>,
}

#[derive(Debug, Clone, Default)]
pub struct NewTitle {
    pub name: String,
    pub year: i32,
    pub description: String,
    pub category_id: Option<i64>,
    pub genre_ids: Vec<i64>,
}

/// Partial title update. `genre_ids: Some(vec![])` clears the genre set.
#[derive(Debug, Clone, Default)]
pub struct TitleChanges {
    pub name: Option<String>,
    pub year: Option<i32>,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub genre_ids: Option<Vec<i64>>,
}

/// Title list filters, all optional and combined with AND
#[derive(Debug, Clone, Default)]
pub struct TitleFilter {
    pub category: Option<String>,
    pub genre: Option<String>,
    pub name: Option<String>,
    pub year: Option<i32>,
}

/// Review model
///
/// One review per (title, author) pair, enforced by the
/// `reviews_title_id_author_id_key` unique constraint.
/// `author_username` is joined from users for the API representation.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct Review {
    pub id: i64,
    pub title_id: i64,
    pub author_id: Uuid,
    pub author_username: String,
    pub text: String,
    pub score: i32,
    pub pub_date: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewReview {
    pub title_id: i64,
    pub author_id: Uuid,
    pub text: String,
    pub score: i32,
}

#[derive(Debug, Clone, Default)]
pub struct ReviewChanges {
    pub text: Option<String>,
    pub score: Option<i32>,
}

/// Comment model (one review has many comments)
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct Comment {
    pub id: i64,
    pub review_id: i64,
    pub author_id: Uuid,
    pub author_username: String,
    pub text: String,
    pub pub_date: DateTime<Utc>,
}
