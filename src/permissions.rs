//! Access rules for every resource class.
//!
//! Handlers and services describe *what* is being touched as a [`Resource`]
//! and ask [`authorize`] whether the actor may apply the request method to it.
//! Anonymous actors are `None`.

use axum::http::Method;
use uuid::Uuid;

use crate::{
    error::ServiceError,
    models::{User, UserRole},
};

/// What a request operates on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// Categories, genres and titles
    Catalog,
    /// Reviews and comments. `author_id` is `None` when the content is being
    /// created, in which case the actor becomes its author.
    Authored { author_id: Option<Uuid> },
    /// Admin user management (`/users`, `/users/{username}`)
    UserDirectory,
    /// The actor's own profile (`/users/me`)
    OwnProfile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

pub fn evaluate(method: &Method, actor: Option<&User>, resource: &Resource) -> Decision {
    let allowed = match resource {
        Resource::Catalog => method.is_safe() || actor.is_some_and(User::is_admin_capable),
        Resource::Authored { author_id } => {
            method.is_safe()
                || actor.is_some_and(|user| {
                    // role checks short-circuit; ownership is the fallback
                    user.role >= UserRole::Moderator
                        || user.is_admin_capable()
                        || author_id.is_none_or(|author| author == user.id)
                })
        }
        Resource::UserDirectory => actor.is_some_and(User::is_admin_capable),
        Resource::OwnProfile => actor.is_some(),
    };

    if allowed {
        Decision::Allow
    } else {
        Decision::Deny
    }
}

/// [`evaluate`] as a `Result`; a denial is [`ServiceError::PermissionDenied`]
pub fn authorize(
    method: &Method,
    actor: Option<&User>,
    resource: &Resource,
) -> Result<(), ServiceError> {
    match evaluate(method, actor, resource) {
        Decision::Allow => Ok(()),
        Decision::Deny => {
            tracing::warn!(
                %method,
                actor = actor.map(|u| u.username.as_str()).unwrap_or("anonymous"),
                ?resource,
                "permission denied"
            );
            Err(ServiceError::PermissionDenied)
        }
    }
}
