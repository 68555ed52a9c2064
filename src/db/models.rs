use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// A success story as returned by the story repository: counts are computed
/// from the like and comment tables at query time, and the author profile is
/// joined in when one exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
    pub likes_count: i64,
    pub comments_count: i64,
    pub created_at: String,
    pub user_profile: Option<UserProfile>,
    pub viewer_has_liked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub story_id: String,
    pub user_id: String,
    pub content: String,
    pub created_at: String,
    pub user_profile: Option<UserProfile>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    pub title: String,
    pub content: String,
}
