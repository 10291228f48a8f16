use crate::error::ErrorMessage;
use crate::models::{Comment, Review, SlugEntry, Title, User, UserRole};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

// DTOs (Data Transfer Objects) define the structure of data exchanged with clients
// They are separate from database models to control exactly what data is exposed
//
// Request fields are `Option` so that a missing field is reported as
// "This field is required." next to every other field error, instead of
// failing JSON extraction on the first missing key.

/// Reserved path segment for the self profile endpoint
pub const RESERVED_USERNAME: &str = "me";

/// Letters, digits and `@ . + - _`, up to 150 characters
pub fn validate_username(username: &String) -> Result<(), ValidationError> {
    if username.eq_ignore_ascii_case(RESERVED_USERNAME) {
        return Err(ValidationError::new("reserved_username")
            .with_message(ErrorMessage::ReservedUsername.to_string().into()));
    }
    let valid = !username.is_empty()
        && username
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'));
    if !valid {
        return Err(ValidationError::new("invalid_username")
            .with_message(ErrorMessage::InvalidUsername.to_string().into()));
    }
    Ok(())
}

/// `[-a-zA-Z0-9_]+`
fn validate_slug(slug: &String) -> Result<(), ValidationError> {
    let valid = !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_slug").with_message(
            "Enter a valid slug consisting of letters, numbers, underscores or hyphens.".into(),
        ))
    }
}

// ============================================================================
// Authentication DTOs
// ============================================================================

/// Signup request: a (username, email) pair that will receive a confirmation code
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct SignupDto {
    #[validate(
        required(message = "This field is required."),
        length(max = 150, message = "Ensure this field has no more than 150 characters."),
        custom(function = "validate_username")
    )]
    pub username: Option<String>,

    #[validate(
        required(message = "This field is required."),
        length(max = 254, message = "Ensure this field has no more than 254 characters."),
        email(message = "Enter a valid email address.")
    )]
    pub email: Option<String>,
}

/// Echo of an accepted signup
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignupResponseDto {
    pub email: String,
    pub username: String,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct TokenRequestDto {
    #[validate(required(message = "This field is required."))]
    pub username: Option<String>,

    #[validate(
        required(message = "This field is required."),
        length(min = 1, message = "This field may not be blank.")
    )]
    pub confirmation_code: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponseDto {
    pub token: String,
}

// ============================================================================
// Pagination & Query DTOs
// ============================================================================

/// Limit/offset pagination plus an optional name search
#[derive(Serialize, Deserialize, Validate, Debug, Default)]
pub struct ListQueryDto {
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<i64>,

    #[validate(range(min = 0))]
    pub offset: Option<i64>,

    pub search: Option<String>,
}

impl ListQueryDto {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(10)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0)
    }
}

#[derive(Serialize, Deserialize, Validate, Debug, Default)]
pub struct TitleQueryDto {
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<i64>,

    #[validate(range(min = 0))]
    pub offset: Option<i64>,

    pub category: Option<String>,
    pub genre: Option<String>,
    pub name: Option<String>,
    pub year: Option<i32>,
}

/// Paginated list wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ListResponseDto<T> {
    pub count: i64,
    pub results: Vec<T>,
}

// ============================================================================
// User DTOs
// ============================================================================

/// Client-facing user representation (no ids, flags or code hashes)
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct UserDto {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub role: UserRole,
}

impl UserDto {
    pub fn filter_user(user: &User) -> Self {
        UserDto {
            username: user.username.to_owned(),
            email: user.email.to_owned(),
            first_name: user.first_name.to_owned(),
            last_name: user.last_name.to_owned(),
            bio: user.bio.to_owned(),
            role: user.role,
        }
    }

    pub fn filter_users(users: &[User]) -> Vec<UserDto> {
        users.iter().map(UserDto::filter_user).collect()
    }
}

/// Admin user creation
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct CreateUserDto {
    #[validate(
        required(message = "This field is required."),
        length(max = 150, message = "Ensure this field has no more than 150 characters."),
        custom(function = "validate_username")
    )]
    pub username: Option<String>,

    #[validate(
        required(message = "This field is required."),
        length(max = 254, message = "Ensure this field has no more than 254 characters."),
        email(message = "Enter a valid email address.")
    )]
    pub email: Option<String>,

    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    pub first_name: Option<String>,

    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    pub last_name: Option<String>,

    pub bio: Option<String>,

    pub role: Option<UserRole>,
}

/// Partial user update, used both by admins and by `/users/me`
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct UpdateUserDto {
    #[validate(
        length(max = 150, message = "Ensure this field has no more than 150 characters."),
        custom(function = "validate_username")
    )]
    pub username: Option<String>,

    #[validate(
        length(max = 254, message = "Ensure this field has no more than 254 characters."),
        email(message = "Enter a valid email address.")
    )]
    pub email: Option<String>,

    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    pub first_name: Option<String>,

    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    pub last_name: Option<String>,

    pub bio: Option<String>,

    /// Ignored on `/users/me`
    pub role: Option<UserRole>,
}

// ============================================================================
// Category / Genre DTOs
// ============================================================================

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct SlugEntryInputDto {
    #[validate(
        required(message = "This field is required."),
        length(min = 1, max = 256, message = "Ensure this field has 1 to 256 characters.")
    )]
    pub name: Option<String>,

    #[validate(
        required(message = "This field is required."),
        length(max = 50, message = "Ensure this field has no more than 50 characters."),
        custom(function = "validate_slug")
    )]
    pub slug: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlugEntryDto {
    pub name: String,
    pub slug: String,
}

impl From<&SlugEntry> for SlugEntryDto {
    fn from(entry: &SlugEntry) -> Self {
        SlugEntryDto {
            name: entry.name.clone(),
            slug: entry.slug.clone(),
        }
    }
}

// ============================================================================
// Title DTOs
// ============================================================================

/// Title creation: genre and category are referenced by slug
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct CreateTitleDto {
    #[validate(
        required(message = "This field is required."),
        length(min = 1, max = 256, message = "Ensure this field has 1 to 256 characters.")
    )]
    pub name: Option<String>,

    #[validate(
        required(message = "This field is required."),
        range(min = 1, message = "Ensure this value is greater than or equal to 1.")
    )]
    pub year: Option<i32>,

    pub description: Option<String>,

    #[validate(required(message = "This field is required."))]
    pub genre: Option<Vec<String>>,

    #[validate(required(message = "This field is required."))]
    pub category: Option<String>,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct UpdateTitleDto {
    #[validate(length(min = 1, max = 256, message = "Ensure this field has 1 to 256 characters."))]
    pub name: Option<String>,

    #[validate(range(min = 1, message = "Ensure this value is greater than or equal to 1."))]
    pub year: Option<i32>,

    pub description: Option<String>,

    pub genre: Option<Vec<String>>,

    pub category: Option<String>,
}

/// Full title representation; `rating` is null until the first review
#[derive(Debug, Serialize, Deserialize)]
pub struct TitleDto {
    pub id: i64,
    pub name: String,
    pub year: i32,
    pub rating: Option<i32>,
    pub description: String,
    pub genre: Vec<SlugEntryDto>,
    pub category: Option<SlugEntryDto>,
}

impl From<&Title> for TitleDto {
    fn from(title: &Title) -> Self {
        TitleDto {
            id: title.id,
            name: title.name.clone(),
            year: title.year,
            rating: title.rating,
            description: title.description.clone(),
            genre: title.genres.iter().map(SlugEntryDto::from).collect(),
            category: title.category.as_ref().map(SlugEntryDto::from),
        }
    }
}

// ============================================================================
// Review DTOs
// ============================================================================

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct CreateReviewDto {
    #[validate(
        required(message = "This field is required."),
        length(min = 1, message = "This field may not be blank.")
    )]
    pub text: Option<String>,

    #[validate(
        required(message = "This field is required."),
        range(min = 1, max = 10, message = "Score must be between 1 and 10.")
    )]
    pub score: Option<i32>,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct UpdateReviewDto {
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub text: Option<String>,

    #[validate(range(min = 1, max = 10, message = "Score must be between 1 and 10."))]
    pub score: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReviewDto {
    pub id: i64,
    pub text: String,
    pub author: String,
    pub score: i32,
    pub pub_date: DateTime<Utc>,
}

impl From<&Review> for ReviewDto {
    fn from(review: &Review) -> Self {
        ReviewDto {
            id: review.id,
            text: review.text.clone(),
            author: review.author_username.clone(),
            score: review.score,
            pub_date: review.pub_date,
        }
    }
}

// ============================================================================
// Comment DTOs
// ============================================================================

/// Comment creation and update share the same body
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct CommentInputDto {
    #[validate(
        required(message = "This field is required."),
        length(min = 1, message = "This field may not be blank.")
    )]
    pub text: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommentDto {
    pub id: i64,
    pub text: String,
    pub author: String,
    pub pub_date: DateTime<Utc>,
}

impl From<&Comment> for CommentDto {
    fn from(comment: &Comment) -> Self {
        CommentDto {
            id: comment.id,
            text: comment.text.clone(),
            author: comment.author_username.clone(),
            pub_date: comment.pub_date,
        }
    }
}
