// Repository pattern - isolates all database side effects
use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};
use std::sync::Arc;
use thiserror::Error;

use crate::db::models::{Comment, Story, UserProfile};
use crate::state::DbPool;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Invalid input: {0}")]
    Invalid(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Repository trait - all story, like, and comment operations.
///
/// Mutating operations take the acting user's id explicitly; there is no
/// ambient actor. Deletes check ownership and distinguish a missing record
/// from someone else's record.
#[async_trait]
pub trait StoryRepository: Send + Sync {
    /// List all stories, newest first. Counts are computed from the like and
    /// comment tables; `viewer` controls the `viewer_has_liked` annotation.
    async fn list(&self, viewer: Option<&str>) -> Result<Vec<Story>, RepositoryError>;

    /// Create a story owned by `actor`. Returns the stored row.
    async fn create(
        &self,
        actor: &str,
        title: &str,
        content: &str,
    ) -> Result<Story, RepositoryError>;

    /// Delete a story. NotFound if it does not exist, Forbidden if `actor`
    /// is not the author. Likes and comments cascade.
    async fn delete(&self, actor: &str, story_id: &str) -> Result<(), RepositoryError>;

    /// Toggle `actor`'s like on a story. Returns true when the story is now
    /// liked. A concurrent duplicate insert trips the (story_id, user_id)
    /// uniqueness constraint and surfaces as Conflict.
    async fn toggle_like(&self, actor: &str, story_id: &str) -> Result<bool, RepositoryError>;

    /// List a story's comments, oldest first. Empty vec for zero comments.
    async fn list_comments(&self, story_id: &str) -> Result<Vec<Comment>, RepositoryError>;

    /// Add a comment. Blank content is rejected before any SQL runs.
    async fn add_comment(
        &self,
        actor: &str,
        story_id: &str,
        content: &str,
    ) -> Result<Comment, RepositoryError>;

    /// Delete a comment with the same NotFound/Forbidden split as `delete`.
    async fn delete_comment(&self, actor: &str, comment_id: &str) -> Result<(), RepositoryError>;
}

/// SQLite implementation
pub struct SqliteStoryRepository {
    pool: DbPool,
}

impl SqliteStoryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn profile_from_row(
    display_name: Option<String>,
    avatar_url: Option<String>,
    has_profile: bool,
    user_id: &str,
) -> Option<UserProfile> {
    if has_profile {
        Some(UserProfile {
            user_id: user_id.to_string(),
            display_name,
            avatar_url,
        })
    } else {
        None
    }
}

#[async_trait]
impl StoryRepository for SqliteStoryRepository {
    async fn list(&self, viewer: Option<&str>) -> Result<Vec<Story>, RepositoryError> {
        let conn = self.pool.get()?;

        let mut stmt = conn.prepare(
            "SELECT s.id, s.user_id, s.title, s.content, s.image_url, s.created_at,
                    (SELECT COUNT(*) FROM story_likes l WHERE l.story_id = s.id),
                    (SELECT COUNT(*) FROM story_comments c WHERE c.story_id = s.id),
                    p.display_name, p.avatar_url, p.user_id IS NOT NULL,
                    EXISTS(SELECT 1 FROM story_likes l
                           WHERE l.story_id = s.id AND l.user_id = ?1)
             FROM success_stories s
             LEFT JOIN user_profiles p ON p.user_id = s.user_id
             ORDER BY s.created_at DESC, s.id DESC",
        )?;

        let stories = stmt
            .query_map(params![viewer.unwrap_or("")], |row| {
                let user_id: String = row.get(1)?;
                let has_profile: bool = row.get(10)?;
                Ok(Story {
                    id: row.get(0)?,
                    title: row.get(2)?,
                    content: row.get(3)?,
                    image_url: row.get(4)?,
                    created_at: row.get(5)?,
                    likes_count: row.get(6)?,
                    comments_count: row.get(7)?,
                    user_profile: profile_from_row(
                        row.get(8)?,
                        row.get(9)?,
                        has_profile,
                        &user_id,
                    ),
                    viewer_has_liked: row.get(11)?,
                    user_id,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(stories)
    }

    async fn create(
        &self,
        actor: &str,
        title: &str,
        content: &str,
    ) -> Result<Story, RepositoryError> {
        let title = title.trim();
        let content = content.trim();
        if title.is_empty() {
            return Err(RepositoryError::Invalid("Title must not be empty".into()));
        }
        if content.is_empty() {
            return Err(RepositoryError::Invalid("Content must not be empty".into()));
        }

        let conn = self.pool.get()?;
        let id = uuid::Uuid::now_v7().to_string();

        conn.execute(
            "INSERT INTO success_stories (id, user_id, title, content)
             VALUES (?1, ?2, ?3, ?4)",
            params![id, actor, title, content],
        )?;

        let story = conn.query_row(
            "SELECT id, user_id, title, content, image_url, created_at
             FROM success_stories WHERE id = ?1",
            params![id],
            |row| {
                Ok(Story {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    title: row.get(2)?,
                    content: row.get(3)?,
                    image_url: row.get(4)?,
                    created_at: row.get(5)?,
                    likes_count: 0,
                    comments_count: 0,
                    user_profile: None,
                    viewer_has_liked: false,
                })
            },
        )?;

        Ok(story)
    }

    async fn delete(&self, actor: &str, story_id: &str) -> Result<(), RepositoryError> {
        let conn = self.pool.get()?;

        let owner: Option<String> = conn
            .query_row(
                "SELECT user_id FROM success_stories WHERE id = ?1",
                params![story_id],
                |row| row.get(0),
            )
            .optional()?;

        match owner {
            None => Err(RepositoryError::NotFound(format!("story {}", story_id))),
            Some(owner) if owner != actor => Err(RepositoryError::Forbidden(
                "only the author may delete a story".into(),
            )),
            Some(_) => {
                conn.execute(
                    "DELETE FROM success_stories WHERE id = ?1",
                    params![story_id],
                )?;
                Ok(())
            }
        }
    }

    async fn toggle_like(&self, actor: &str, story_id: &str) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;

        let exists: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM success_stories WHERE id = ?1",
            params![story_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(RepositoryError::NotFound(format!("story {}", story_id)));
        }

        // Unlike if a like exists; otherwise insert one. The UNIQUE constraint
        // makes the lost-update race between two concurrent inserts fail loudly
        // instead of double-counting.
        let removed = conn.execute(
            "DELETE FROM story_likes WHERE story_id = ?1 AND user_id = ?2",
            params![story_id, actor],
        )?;
        if removed > 0 {
            return Ok(false);
        }

        let id = uuid::Uuid::now_v7().to_string();
        match conn.execute(
            "INSERT INTO story_likes (id, story_id, user_id) VALUES (?1, ?2, ?3)",
            params![id, story_id, actor],
        ) {
            Ok(_) => Ok(true),
            Err(ref e) if is_constraint_violation(e) => Err(RepositoryError::Conflict(
                "story already liked".into(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_comments(&self, story_id: &str) -> Result<Vec<Comment>, RepositoryError> {
        let conn = self.pool.get()?;

        let mut stmt = conn.prepare(
            "SELECT c.id, c.story_id, c.user_id, c.content, c.created_at,
                    p.display_name, p.avatar_url, p.user_id IS NOT NULL
             FROM story_comments c
             LEFT JOIN user_profiles p ON p.user_id = c.user_id
             WHERE c.story_id = ?1
             ORDER BY c.created_at ASC, c.id ASC",
        )?;

        let comments = stmt
            .query_map(params![story_id], |row| {
                let user_id: String = row.get(2)?;
                let has_profile: bool = row.get(7)?;
                Ok(Comment {
                    id: row.get(0)?,
                    story_id: row.get(1)?,
                    content: row.get(3)?,
                    created_at: row.get(4)?,
                    user_profile: profile_from_row(
                        row.get(5)?,
                        row.get(6)?,
                        has_profile,
                        &user_id,
                    ),
                    user_id,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(comments)
    }

    async fn add_comment(
        &self,
        actor: &str,
        story_id: &str,
        content: &str,
    ) -> Result<Comment, RepositoryError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(RepositoryError::Invalid(
                "Comment must not be empty".into(),
            ));
        }

        let conn = self.pool.get()?;
        let id = uuid::Uuid::now_v7().to_string();

        let result = conn.execute(
            "INSERT INTO story_comments (id, story_id, user_id, content)
             VALUES (?1, ?2, ?3, ?4)",
            params![id, story_id, actor, content],
        );
        if let Err(ref e) = result {
            // FK violation means the story does not exist
            if is_constraint_violation(e) {
                return Err(RepositoryError::NotFound(format!("story {}", story_id)));
            }
        }
        result?;

        let comment = conn.query_row(
            "SELECT id, story_id, user_id, content, created_at
             FROM story_comments WHERE id = ?1",
            params![id],
            |row| {
                Ok(Comment {
                    id: row.get(0)?,
                    story_id: row.get(1)?,
                    user_id: row.get(2)?,
                    content: row.get(3)?,
                    created_at: row.get(4)?,
                    user_profile: None,
                })
            },
        )?;

        Ok(comment)
    }

    async fn delete_comment(&self, actor: &str, comment_id: &str) -> Result<(), RepositoryError> {
        let conn = self.pool.get()?;

        let owner: Option<String> = conn
            .query_row(
                "SELECT user_id FROM story_comments WHERE id = ?1",
                params![comment_id],
                |row| row.get(0),
            )
            .optional()?;

        match owner {
            None => Err(RepositoryError::NotFound(format!(
                "comment {}",
                comment_id
            ))),
            Some(owner) if owner != actor => Err(RepositoryError::Forbidden(
                "only the author may delete a comment".into(),
            )),
            Some(_) => {
                conn.execute(
                    "DELETE FROM story_comments WHERE id = ?1",
                    params![comment_id],
                )?;
                Ok(())
            }
        }
    }
}

/// Type alias for Arc-wrapped repository (for AppState)
pub type DynStoryRepository = Arc<dyn StoryRepository>;
