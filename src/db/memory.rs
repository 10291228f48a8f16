//! In-memory [`Store`](super::Store) used by the test suites.
//!
//! One mutex guards the whole state, so every method is a single atomic
//! step, the same guarantee the Postgres transactions give. Constraints
//! (unique columns, cascades, `SET NULL`) mirror the SQL schema.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    CommentExt, DatabaseError, Result, ReviewExt, TaxonomyExt, TitleExt, UserExt,
};
use crate::models::{
    Comment, NewReview, NewTitle, NewUser, Review, ReviewChanges, SlugEntry, Taxonomy, Title,
    TitleChanges, TitleFilter, User, UserChanges,
};
use crate::services::rating::recompute_rating;

#[derive(Default)]
struct TitleRecord {
    name: String,
    year: i32,
    description: String,
    rating: Option<i32>,
    category_id: Option<i64>,
    genre_ids: Vec<i64>,
}

struct ReviewRecord {
    title_id: i64,
    author_id: Uuid,
    text: String,
    score: i32,
    pub_date: chrono::DateTime<Utc>,
}

struct CommentRecord {
    review_id: i64,
    author_id: Uuid,
    text: String,
    pub_date: chrono::DateTime<Utc>,
}

#[derive(Default)]
struct State {
    next_id: i64,
    users: Vec<User>,
    categories: BTreeMap<i64, SlugEntry>,
    genres: BTreeMap<i64, SlugEntry>,
    titles: BTreeMap<i64, TitleRecord>,
    reviews: BTreeMap<i64, ReviewRecord>,
    comments: BTreeMap<i64, CommentRecord>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip the staff flag, which no API operation can do
    pub async fn set_staff(&self, user_id: Uuid, is_staff: bool) {
        let mut state = self.state.lock().await;
        if let Some(user) = state.users.iter_mut().find(|u| u.id == user_id) {
            user.is_staff = is_staff;
        }
    }
}

fn not_found(resource: &'static str) -> DatabaseError {
    DatabaseError::NotFound {
        resource,
        identifier: "id",
    }
}

fn page<T>(items: Vec<T>, limit: i64, offset: i64) -> Vec<T> {
    items
        .into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

fn contains_ci(haystack: &str, needle: Option<&str>) -> bool {
    needle.is_none_or(|n| haystack.to_lowercase().contains(&n.to_lowercase()))
}

impl State {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn taxonomy(&self, taxonomy: Taxonomy) -> &BTreeMap<i64, SlugEntry> {
        match taxonomy {
            Taxonomy::Category => &self.categories,
            Taxonomy::Genre => &self.genres,
        }
    }

    fn taxonomy_mut(&mut self, taxonomy: Taxonomy) -> &mut BTreeMap<i64, SlugEntry> {
        match taxonomy {
            Taxonomy::Category => &mut self.categories,
            Taxonomy::Genre => &mut self.genres,
        }
    }

    fn username(&self, user_id: Uuid) -> String {
        self.users
            .iter()
            .find(|u| u.id == user_id)
            .map(|u| u.username.clone())
            .unwrap_or_default()
    }

    fn check_user_unique(&self, user_id: Option<Uuid>, username: &str, email: &str) -> Result<()> {
        for user in self.users.iter().filter(|u| Some(u.id) != user_id) {
            if user.username == username {
                return Err(DatabaseError::Conflict {
                    resource: "user",
                    field: "username",
                    value: username.to_string(),
                });
            }
            if user.email == email {
                return Err(DatabaseError::Conflict {
                    resource: "user",
                    field: "email",
                    value: email.to_string(),
                });
            }
        }
        Ok(())
    }

    fn title(&self, id: i64) -> Option<Title> {
        let record = self.titles.get(&id)?;
        let mut genres: Vec<SlugEntry> = record
            .genre_ids
            .iter()
            .filter_map(|g| self.genres.get(g).cloned())
            .collect();
        genres.sort_by(|a, b| a.name.cmp(&b.name));
        Some(Title {
            id,
            name: record.name.clone(),
            year: record.year,
            description: record.description.clone(),
            rating: record.rating,
            category: record
                .category_id
                .and_then(|c| self.categories.get(&c).cloned()),
            genres,
        })
    }

    fn matches(&self, title: &Title, filter: &TitleFilter) -> bool {
        let category_ok = filter.category.as_deref().is_none_or(|slug| {
            title.category.as_ref().is_some_and(|c| c.slug == slug)
        });
        let genre_ok = filter
            .genre
            .as_deref()
            .is_none_or(|slug| title.genres.iter().any(|g| g.slug == slug));
        let year_ok = filter.year.is_none_or(|y| title.year == y);
        category_ok && genre_ok && year_ok && contains_ci(&title.name, filter.name.as_deref())
    }

    fn review(&self, id: i64) -> Option<Review> {
        let record = self.reviews.get(&id)?;
        Some(Review {
            id,
            title_id: record.title_id,
            author_id: record.author_id,
            author_username: self.username(record.author_id),
            text: record.text.clone(),
            score: record.score,
            pub_date: record.pub_date,
        })
    }

    fn comment(&self, id: i64) -> Option<Comment> {
        let record = self.comments.get(&id)?;
        Some(Comment {
            id,
            review_id: record.review_id,
            author_id: record.author_id,
            author_username: self.username(record.author_id),
            text: record.text.clone(),
            pub_date: record.pub_date,
        })
    }

    fn rate_title(&mut self, title_id: i64) -> Option<i32> {
        let scores: Vec<i32> = self
            .reviews
            .values()
            .filter(|r| r.title_id == title_id)
            .map(|r| r.score)
            .collect();
        let rating = recompute_rating(&scores);
        if let Some(title) = self.titles.get_mut(&title_id) {
            title.rating = rating;
        }
        rating
    }

    fn check_references(&self, category_id: Option<i64>, genre_ids: &[i64]) -> Result<()> {
        if category_id.is_some_and(|c| !self.categories.contains_key(&c))
            || genre_ids.iter().any(|g| !self.genres.contains_key(g))
        {
            return Err(DatabaseError::NotFound {
                resource: "title",
                identifier: "reference",
            });
        }
        Ok(())
    }
}

#[async_trait]
impl UserExt for MemoryStore {
    async fn get_user(
        &self,
        user_id: Option<Uuid>,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>> {
        let state = self.state.lock().await;
        let found = if let Some(user_id) = user_id {
            state.users.iter().find(|u| u.id == user_id)
        } else if let Some(username) = username {
            state.users.iter().find(|u| u.username == username)
        } else if let Some(email) = email {
            let email = email.to_lowercase();
            state.users.iter().find(|u| u.email == email)
        } else {
            None
        };
        Ok(found.cloned())
    }

    async fn get_users(&self, search: Option<&str>, limit: i64, offset: i64) -> Result<Vec<User>> {
        let state = self.state.lock().await;
        let mut users: Vec<User> = state
            .users
            .iter()
            .filter(|u| contains_ci(&u.username, search))
            .cloned()
            .collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(page(users, limit, offset))
    }

    async fn get_user_count(&self, search: Option<&str>) -> Result<i64> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .iter()
            .filter(|u| contains_ci(&u.username, search))
            .count() as i64)
    }

    async fn save_user(&self, new_user: NewUser) -> Result<User> {
        let mut state = self.state.lock().await;
        let email = new_user.email.to_lowercase();
        state.check_user_unique(None, &new_user.username, &email)?;

        let user = User {
            id: Uuid::new_v4(),
            username: new_user.username,
            email,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            bio: new_user.bio,
            role: new_user.role,
            is_staff: false,
            is_superuser: false,
            confirmation_code: None,
            date_joined: Utc::now(),
        };
        state.users.push(user.clone());
        Ok(user)
    }

    async fn update_user(&self, user_id: Uuid, changes: UserChanges) -> Result<User> {
        let mut state = self.state.lock().await;
        let current = state
            .users
            .iter()
            .find(|u| u.id == user_id)
            .cloned()
            .ok_or_else(|| not_found("user"))?;

        let username = changes.username.unwrap_or(current.username);
        let email = changes
            .email
            .map(|e| e.to_lowercase())
            .unwrap_or(current.email);
        state.check_user_unique(Some(user_id), &username, &email)?;

        let user = state
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or_else(|| not_found("user"))?;
        user.username = username;
        user.email = email;
        if let Some(first_name) = changes.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = changes.last_name {
            user.last_name = last_name;
        }
        if let Some(bio) = changes.bio {
            user.bio = bio;
        }
        if let Some(role) = changes.role {
            user.role = role;
        }
        Ok(user.clone())
    }

    async fn set_confirmation_code(&self, user_id: Uuid, code_hash: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let user = state
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or_else(|| not_found("user"))?;
        user.confirmation_code = Some(code_hash.to_string());
        Ok(())
    }

    async fn consume_confirmation_code(&self, user_id: Uuid, code_hash: &str) -> Result<bool> {
        let mut state = self.state.lock().await;
        match state.users.iter_mut().find(|u| u.id == user_id) {
            Some(user) if user.confirmation_code.as_deref() == Some(code_hash) => {
                user.confirmation_code = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl TaxonomyExt for MemoryStore {
    async fn get_entries(
        &self,
        taxonomy: Taxonomy,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<SlugEntry>> {
        let state = self.state.lock().await;
        let mut entries: Vec<SlugEntry> = state
            .taxonomy(taxonomy)
            .values()
            .filter(|e| contains_ci(&e.name, search))
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(page(entries, limit, offset))
    }

    async fn get_entry_count(&self, taxonomy: Taxonomy, search: Option<&str>) -> Result<i64> {
        let state = self.state.lock().await;
        Ok(state
            .taxonomy(taxonomy)
            .values()
            .filter(|e| contains_ci(&e.name, search))
            .count() as i64)
    }

    async fn get_entries_by_slugs(
        &self,
        taxonomy: Taxonomy,
        slugs: &[String],
    ) -> Result<Vec<SlugEntry>> {
        let state = self.state.lock().await;
        Ok(state
            .taxonomy(taxonomy)
            .values()
            .filter(|e| slugs.contains(&e.slug))
            .cloned()
            .collect())
    }

    async fn save_entry(&self, taxonomy: Taxonomy, name: &str, slug: &str) -> Result<SlugEntry> {
        let mut state = self.state.lock().await;
        if state.taxonomy(taxonomy).values().any(|e| e.slug == slug) {
            return Err(DatabaseError::Conflict {
                resource: taxonomy.field(),
                field: "slug",
                value: slug.to_string(),
            });
        }
        let id = state.allocate_id();
        let entry = SlugEntry {
            id,
            name: name.to_string(),
            slug: slug.to_string(),
        };
        state.taxonomy_mut(taxonomy).insert(id, entry.clone());
        Ok(entry)
    }

    async fn delete_entry(&self, taxonomy: Taxonomy, slug: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let id = state
            .taxonomy(taxonomy)
            .values()
            .find(|e| e.slug == slug)
            .map(|e| e.id)
            .ok_or(DatabaseError::NotFound {
                resource: taxonomy.field(),
                identifier: "slug",
            })?;
        state.taxonomy_mut(taxonomy).remove(&id);

        for title in state.titles.values_mut() {
            match taxonomy {
                Taxonomy::Category if title.category_id == Some(id) => title.category_id = None,
                Taxonomy::Genre => title.genre_ids.retain(|g| *g != id),
                _ => {}
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TitleExt for MemoryStore {
    async fn get_title(&self, title_id: i64) -> Result<Option<Title>> {
        Ok(self.state.lock().await.title(title_id))
    }

    async fn get_titles(
        &self,
        filter: &TitleFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Title>> {
        let state = self.state.lock().await;
        let titles: Vec<Title> = state
            .titles
            .keys()
            .filter_map(|id| state.title(*id))
            .filter(|t| state.matches(t, filter))
            .collect();
        Ok(page(titles, limit, offset))
    }

    async fn get_title_count(&self, filter: &TitleFilter) -> Result<i64> {
        let state = self.state.lock().await;
        Ok(state
            .titles
            .keys()
            .filter_map(|id| state.title(*id))
            .filter(|t| state.matches(t, filter))
            .count() as i64)
    }

    async fn save_title(&self, new_title: NewTitle) -> Result<Title> {
        let mut state = self.state.lock().await;
        state.check_references(new_title.category_id, &new_title.genre_ids)?;

        let id = state.allocate_id();
        let mut genre_ids = new_title.genre_ids;
        genre_ids.dedup();
        state.titles.insert(
            id,
            TitleRecord {
                name: new_title.name,
                year: new_title.year,
                description: new_title.description,
                rating: None,
                category_id: new_title.category_id,
                genre_ids,
            },
        );
        state.title(id).ok_or_else(|| not_found("title"))
    }

    async fn update_title(&self, title_id: i64, changes: TitleChanges) -> Result<Title> {
        let mut state = self.state.lock().await;
        state.check_references(
            changes.category_id,
            changes.genre_ids.as_deref().unwrap_or_default(),
        )?;

        let title = state
            .titles
            .get_mut(&title_id)
            .ok_or_else(|| not_found("title"))?;
        if let Some(name) = changes.name {
            title.name = name;
        }
        if let Some(year) = changes.year {
            title.year = year;
        }
        if let Some(description) = changes.description {
            title.description = description;
        }
        if let Some(category_id) = changes.category_id {
            title.category_id = Some(category_id);
        }
        if let Some(genre_ids) = changes.genre_ids {
            title.genre_ids = genre_ids;
        }
        state.title(title_id).ok_or_else(|| not_found("title"))
    }

    async fn delete_title(&self, title_id: i64) -> Result<()> {
        let mut state = self.state.lock().await;
        state
            .titles
            .remove(&title_id)
            .ok_or_else(|| not_found("title"))?;

        let orphaned: Vec<i64> = state
            .reviews
            .iter()
            .filter(|(_, r)| r.title_id == title_id)
            .map(|(id, _)| *id)
            .collect();
        state.reviews.retain(|_, r| r.title_id != title_id);
        state.comments.retain(|_, c| !orphaned.contains(&c.review_id));
        Ok(())
    }
}

#[async_trait]
impl ReviewExt for MemoryStore {
    async fn get_review(&self, title_id: i64, review_id: i64) -> Result<Option<Review>> {
        let state = self.state.lock().await;
        Ok(state.review(review_id).filter(|r| r.title_id == title_id))
    }

    async fn get_reviews(&self, title_id: i64, limit: i64, offset: i64) -> Result<Vec<Review>> {
        let state = self.state.lock().await;
        let reviews: Vec<Review> = state
            .reviews
            .iter()
            .rev()
            .filter(|(_, r)| r.title_id == title_id)
            .filter_map(|(id, _)| state.review(*id))
            .collect();
        Ok(page(reviews, limit, offset))
    }

    async fn get_review_count(&self, title_id: i64) -> Result<i64> {
        let state = self.state.lock().await;
        Ok(state
            .reviews
            .values()
            .filter(|r| r.title_id == title_id)
            .count() as i64)
    }

    async fn save_review(&self, new_review: NewReview) -> Result<Review> {
        let mut state = self.state.lock().await;
        if !state.titles.contains_key(&new_review.title_id) {
            return Err(not_found("title"));
        }
        if state
            .reviews
            .values()
            .any(|r| r.title_id == new_review.title_id && r.author_id == new_review.author_id)
        {
            return Err(DatabaseError::Conflict {
                resource: "review",
                field: "non_field_errors",
                value: new_review.author_id.to_string(),
            });
        }

        let id = state.allocate_id();
        state.reviews.insert(
            id,
            ReviewRecord {
                title_id: new_review.title_id,
                author_id: new_review.author_id,
                text: new_review.text,
                score: new_review.score,
                pub_date: Utc::now(),
            },
        );
        state.rate_title(new_review.title_id);
        state.review(id).ok_or_else(|| not_found("review"))
    }

    async fn update_review(&self, review_id: i64, changes: ReviewChanges) -> Result<Review> {
        let mut state = self.state.lock().await;
        let review = state
            .reviews
            .get_mut(&review_id)
            .ok_or_else(|| not_found("review"))?;
        if let Some(text) = changes.text {
            review.text = text;
        }
        if let Some(score) = changes.score {
            review.score = score;
        }
        let title_id = review.title_id;
        state.rate_title(title_id);
        state.review(review_id).ok_or_else(|| not_found("review"))
    }

    async fn delete_review(&self, review_id: i64) -> Result<()> {
        let mut state = self.state.lock().await;
        let review = state
            .reviews
            .remove(&review_id)
            .ok_or_else(|| not_found("review"))?;
        state.comments.retain(|_, c| c.review_id != review_id);
        state.rate_title(review.title_id);
        Ok(())
    }

    async fn refresh_rating(&self, title_id: i64) -> Result<Option<i32>> {
        let mut state = self.state.lock().await;
        if !state.titles.contains_key(&title_id) {
            return Err(not_found("title"));
        }
        Ok(state.rate_title(title_id))
    }
}

#[async_trait]
impl CommentExt for MemoryStore {
    async fn get_comment(&self, review_id: i64, comment_id: i64) -> Result<Option<Comment>> {
        let state = self.state.lock().await;
        Ok(state
            .comment(comment_id)
            .filter(|c| c.review_id == review_id))
    }

    async fn get_comments(
        &self,
        review_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Comment>> {
        let state = self.state.lock().await;
        let comments: Vec<Comment> = state
            .comments
            .iter()
            .rev()
            .filter(|(_, c)| c.review_id == review_id)
            .filter_map(|(id, _)| state.comment(*id))
            .collect();
        Ok(page(comments, limit, offset))
    }

    async fn get_comment_count(&self, review_id: i64) -> Result<i64> {
        let state = self.state.lock().await;
        Ok(state
            .comments
            .values()
            .filter(|c| c.review_id == review_id)
            .count() as i64)
    }

    async fn save_comment(&self, review_id: i64, author_id: Uuid, text: &str) -> Result<Comment> {
        let mut state = self.state.lock().await;
        if !state.reviews.contains_key(&review_id) {
            return Err(not_found("review"));
        }
        let id = state.allocate_id();
        state.comments.insert(
            id,
            CommentRecord {
                review_id,
                author_id,
                text: text.to_string(),
                pub_date: Utc::now(),
            },
        );
        state.comment(id).ok_or_else(|| not_found("comment"))
    }

    async fn update_comment(&self, comment_id: i64, text: &str) -> Result<Comment> {
        let mut state = self.state.lock().await;
        let comment = state
            .comments
            .get_mut(&comment_id)
            .ok_or_else(|| not_found("comment"))?;
        comment.text = text.to_string();
        state.comment(comment_id).ok_or_else(|| not_found("comment"))
    }

    async fn delete_comment(&self, comment_id: i64) -> Result<()> {
        let mut state = self.state.lock().await;
        state
            .comments
            .remove(&comment_id)
            .map(|_| ())
            .ok_or_else(|| not_found("comment"))
    }
}
