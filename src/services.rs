pub mod catalog;
pub mod rating;
pub mod reviews;
pub mod signup;
pub mod users;
