// Repository pattern - isolates all database side effects
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::db::models::ContentBlock;
use crate::site::LOGO_KEY;
use crate::stories::RepositoryError;

/// Admin-editable content blocks and key/value settings.
#[async_trait]
pub trait SiteRepository: Send + Sync {
    /// All content blocks keyed by block key.
    async fn content(&self) -> Result<BTreeMap<String, ContentBlock>, RepositoryError>;

    /// One block by key; missing keys read as empty title/content.
    async fn block(&self, key: &str) -> Result<ContentBlock, RepositoryError>;

    /// Upsert a block and stamp its update time.
    async fn update_content(
        &self,
        key: &str,
        title: &str,
        content: &str,
    ) -> Result<(), RepositoryError>;

    /// Current logo URL, if one has been uploaded.
    async fn logo_url(&self) -> Result<Option<String>, RepositoryError>;

    /// Upsert the logo URL setting.
    async fn set_logo_url(&self, url: &str) -> Result<(), RepositoryError>;
}

/// SQLite implementation
pub struct SqliteSiteRepository {
    pool: crate::state::DbPool,
}

impl SqliteSiteRepository {
    pub fn new(pool: crate::state::DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SiteRepository for SqliteSiteRepository {
    async fn content(&self) -> Result<BTreeMap<String, ContentBlock>, RepositoryError> {
        let conn = self.pool.get()?;

        let mut stmt = conn.prepare("SELECT key, title, content FROM site_content")?;
        let blocks = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    ContentBlock {
                        title: row.get(1)?,
                        content: row.get(2)?,
                    },
                ))
            })?
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        Ok(blocks)
    }

    async fn block(&self, key: &str) -> Result<ContentBlock, RepositoryError> {
        let conn = self.pool.get()?;

        let block = conn
            .query_row(
                "SELECT title, content FROM site_content WHERE key = ?1",
                params![key],
                |row| {
                    Ok(ContentBlock {
                        title: row.get(0)?,
                        content: row.get(1)?,
                    })
                },
            )
            .optional()?;

        Ok(block.unwrap_or_default())
    }

    async fn update_content(
        &self,
        key: &str,
        title: &str,
        content: &str,
    ) -> Result<(), RepositoryError> {
        let conn = self.pool.get()?;

        conn.execute(
            "INSERT INTO site_content (key, title, content, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(key) DO UPDATE SET
               title = excluded.title,
               content = excluded.content,
               updated_at = excluded.updated_at",
            params![key, title, content, Utc::now().to_rfc3339()],
        )?;

        Ok(())
    }

    async fn logo_url(&self) -> Result<Option<String>, RepositoryError> {
        let conn = self.pool.get()?;

        let url = conn
            .query_row(
                "SELECT value FROM site_settings WHERE key = ?1",
                params![LOGO_KEY],
                |row| row.get(0),
            )
            .optional()?;

        Ok(url)
    }

    async fn set_logo_url(&self, url: &str) -> Result<(), RepositoryError> {
        let conn = self.pool.get()?;

        conn.execute(
            "INSERT INTO site_settings (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
               value = excluded.value,
               updated_at = excluded.updated_at",
            params![LOGO_KEY, url, Utc::now().to_rfc3339()],
        )?;

        Ok(())
    }
}

/// Type alias for Arc-wrapped repository (for AppState)
pub type DynSiteRepository = Arc<dyn SiteRepository>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use tempfile::TempDir;

    fn create_test_repo() -> (SqliteSiteRepository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let pool = db::create_pool(&db_path).unwrap();
        db::run_migrations(&pool).unwrap();

        (SqliteSiteRepository::new(pool), temp_dir)
    }

    #[tokio::test]
    async fn seeded_blocks_read_as_empty() {
        let (repo, _tmp) = create_test_repo();

        let content = repo.content().await.unwrap();
        assert!(content.contains_key("hero_title"));
        assert!(content.contains_key("about_mission"));
        assert_eq!(content["about_mission"], ContentBlock::default());
    }

    #[tokio::test]
    async fn unknown_key_reads_as_empty_block() {
        let (repo, _tmp) = create_test_repo();

        let block = repo.block("no_such_slot").await.unwrap();
        assert_eq!(block, ContentBlock::default());
    }

    #[tokio::test]
    async fn update_then_read_returns_new_value() {
        let (repo, _tmp) = create_test_repo();

        repo.update_content("about_mission", "Our Mission", "We build things.")
            .await
            .unwrap();

        let block = repo.block("about_mission").await.unwrap();
        assert_eq!(block.title, "Our Mission");
        assert_eq!(block.content, "We build things.");

        let content = repo.content().await.unwrap();
        assert_eq!(content["about_mission"], block);
    }

    #[tokio::test]
    async fn update_inserts_new_keys() {
        let (repo, _tmp) = create_test_repo();

        repo.update_content("footer_note", "Note", "Fine print")
            .await
            .unwrap();

        let block = repo.block("footer_note").await.unwrap();
        assert_eq!(block.title, "Note");
    }

    #[tokio::test]
    async fn logo_url_starts_empty_and_upserts() {
        let (repo, _tmp) = create_test_repo();

        assert_eq!(repo.logo_url().await.unwrap(), None);

        repo.set_logo_url("/uploads/logo.png").await.unwrap();
        assert_eq!(
            repo.logo_url().await.unwrap().as_deref(),
            Some("/uploads/logo.png")
        );

        // Upsert keeps a single row for the key
        repo.set_logo_url("/uploads/logo.svg").await.unwrap();
        assert_eq!(
            repo.logo_url().await.unwrap().as_deref(),
            Some("/uploads/logo.svg")
        );
    }
}
