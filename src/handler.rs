pub mod auth;
pub mod catalog;
pub mod comments;
pub mod reviews;
pub mod users;
