pub mod models;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::path::Path;

use crate::state::DbPool;

pub const MIGRATIONS: &[(&str, &str)] = &[
    (
        "001_initial",
        include_str!("../../migrations/001_initial.sql"),
    ),
    (
        "002_community",
        include_str!("../../migrations/002_community.sql"),
    ),
    (
        "003_site_content",
        include_str!("../../migrations/003_site_content.sql"),
    ),
];

pub fn create_pool(db_path: &Path) -> anyhow::Result<DbPool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
            ",
        )
    });
    let pool = Pool::builder().max_size(8).build(manager)?;

    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    let conn = pool.get()?;

    // Create migrations tracking table
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM schema_version WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;

        if !already_applied {
            tracing::info!("Applying migration: {}", name);
            conn.execute_batch(sql)?;
            conn.execute(
                "INSERT INTO schema_version (name) VALUES (?1)",
                params![name],
            )?;
        }
    }

    tracing::info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_pool() -> DbPool {
        let manager = SqliteConnectionManager::memory()
            .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
        Pool::builder().max_size(1).build(manager).unwrap()
    }

    #[test]
    fn create_pool_creates_db_file() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("sub/dir/test.db");
        let pool = create_pool(&db_path).unwrap();
        assert!(db_path.exists());
        // Verify we can get a connection
        let conn = pool.get().unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "wal");
    }

    #[test]
    fn migrations_run_successfully() {
        let pool = test_pool();
        run_migrations(&pool).unwrap();

        let conn = pool.get().unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 3);

        // Verify key tables exist
        let tables: Vec<String> = {
            let mut stmt = conn
                .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
                .unwrap();
            stmt.query_map([], |row| row.get(0))
                .unwrap()
                .filter_map(|r| r.ok())
                .collect()
        };
        assert!(tables.contains(&"users".to_string()));
        assert!(tables.contains(&"sessions".to_string()));
        assert!(tables.contains(&"user_profiles".to_string()));
        assert!(tables.contains(&"success_stories".to_string()));
        assert!(tables.contains(&"story_likes".to_string()));
        assert!(tables.contains(&"story_comments".to_string()));
        assert!(tables.contains(&"site_content".to_string()));
        assert!(tables.contains(&"site_settings".to_string()));
    }

    #[test]
    fn migrations_are_idempotent() {
        let pool = test_pool();
        run_migrations(&pool).unwrap();
        run_migrations(&pool).unwrap(); // Should not error on second run

        let conn = pool.get().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn content_slots_are_seeded() {
        let pool = test_pool();
        run_migrations(&pool).unwrap();

        let conn = pool.get().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM site_content", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 8);

        let (title, content): (String, String) = conn
            .query_row(
                "SELECT title, content FROM site_content WHERE key = 'about_mission'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(title, "");
        assert_eq!(content, "");
    }

    #[test]
    fn like_uniqueness_enforced() {
        let pool = test_pool();
        run_migrations(&pool).unwrap();

        let conn = pool.get().unwrap();
        conn.execute(
            "INSERT INTO users (id, email, password_hash) VALUES ('u1', 'a@b.c', 'x')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO success_stories (id, user_id, title, content) VALUES ('s1', 'u1', 't', 'c')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO story_likes (id, story_id, user_id) VALUES ('l1', 's1', 'u1')",
            [],
        )
        .unwrap();

        // Second like for the same (story, user) must fail
        let result = conn.execute(
            "INSERT INTO story_likes (id, story_id, user_id) VALUES ('l2', 's1', 'u1')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn foreign_keys_enforced() {
        let pool = test_pool();
        run_migrations(&pool).unwrap();

        let conn = pool.get().unwrap();
        // Inserting a story with a non-existent user_id should fail
        let result = conn.execute(
            "INSERT INTO success_stories (id, user_id, title, content)
             VALUES ('story-1', 'nonexistent-user', 'Title', 'Body')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn deleting_story_cascades_likes_and_comments() {
        let pool = test_pool();
        run_migrations(&pool).unwrap();

        let conn = pool.get().unwrap();
        conn.execute_batch(
            "INSERT INTO users (id, email, password_hash) VALUES ('u1', 'a@b.c', 'x');
             INSERT INTO success_stories (id, user_id, title, content) VALUES ('s1', 'u1', 't', 'c');
             INSERT INTO story_likes (id, story_id, user_id) VALUES ('l1', 's1', 'u1');
             INSERT INTO story_comments (id, story_id, user_id, content) VALUES ('c1', 's1', 'u1', 'hi');",
        )
        .unwrap();

        conn.execute("DELETE FROM success_stories WHERE id = 's1'", [])
            .unwrap();

        let likes: i64 = conn
            .query_row("SELECT COUNT(*) FROM story_likes", [], |row| row.get(0))
            .unwrap();
        let comments: i64 = conn
            .query_row("SELECT COUNT(*) FROM story_comments", [], |row| row.get(0))
            .unwrap();
        assert_eq!(likes, 0);
        assert_eq!(comments, 0);
    }
}
