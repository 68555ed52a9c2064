pub mod repository;

pub use repository::{DynStoryRepository, RepositoryError, StoryRepository};
