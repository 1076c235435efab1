//! In-memory stores for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::Connection;

use crate::db::SqliteStore;
use crate::error::{StoreError, StoreResult};
use crate::ranking::PageScore;
use crate::repository::{GroupRef, PageRepository, PageRow, ScoreStats, TierCount};

const SCHEMA: &str = include_str!("../tests/fixtures/schema.sql");

/// Builds an in-memory database with the production table layout.
pub struct Fixture {
    conn: Connection,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_schema(SCHEMA)
    }

    pub fn with_schema(sql: &str) -> Self {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(sql).unwrap();
        Self { conn }
    }

    pub fn company(&self, name: &str, industry: Option<&str>) -> i64 {
        self.conn
            .execute(
                "INSERT INTO companies (name, industry) VALUES (?1, ?2)",
                rusqlite::params![name, industry],
            )
            .unwrap();
        self.conn.last_insert_rowid()
    }

    pub fn website(&self, company_id: i64, domain: &str, status: &str) -> i64 {
        self.conn
            .execute(
                "INSERT INTO websites (company_id, domain, analysis_status) VALUES (?1, ?2, ?3)",
                rusqlite::params![company_id, domain, status],
            )
            .unwrap();
        self.conn.last_insert_rowid()
    }

    pub fn page(
        &self,
        website_id: i64,
        url: &str,
        title: Option<&str>,
        priority: Option<f64>,
        last_modified: Option<&str>,
    ) -> i64 {
        self.conn
            .execute(
                "INSERT INTO website_pages (website_id, url, title, sitemap_priority, last_modified)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![website_id, url, title, priority, last_modified],
            )
            .unwrap();
        self.conn.last_insert_rowid()
    }

    pub fn into_store(self) -> SqliteStore {
        SqliteStore::from_connection(self.conn)
    }
}

/// Wraps a store and fails score updates for chosen pages. Each entry is the
/// number of attempts that fail before the page starts succeeding;
/// `u32::MAX` fails forever.
pub struct FlakyStore<R> {
    inner: R,
    failures: Mutex<HashMap<i64, u32>>,
}

impl<R> FlakyStore<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            failures: Mutex::new(HashMap::new()),
        }
    }

    pub fn fail_page(self, page_id: i64, times: u32) -> Self {
        self.failures.lock().unwrap().insert(page_id, times);
        self
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    fn should_fail(&self, page_id: i64) -> bool {
        let mut failures = self.failures.lock().unwrap();
        match failures.get_mut(&page_id) {
            Some(0) | None => false,
            Some(remaining) => {
                if *remaining != u32::MAX {
                    *remaining -= 1;
                }
                true
            }
        }
    }
}

#[async_trait]
impl<R: PageRepository> PageRepository for FlakyStore<R> {
    async fn count_pages(&self) -> StoreResult<i64> {
        self.inner.count_pages().await
    }

    async fn fetch_page_window(&self, offset: i64, limit: i64) -> StoreResult<Vec<PageRow>> {
        self.inner.fetch_page_window(offset, limit).await
    }

    async fn update_page_score(&self, page_id: i64, score: &PageScore) -> StoreResult<()> {
        if self.should_fail(page_id) {
            return Err(StoreError::Sqlite(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
                Some("database is locked".into()),
            )));
        }
        self.inner.update_page_score(page_id, score).await
    }

    async fn list_completed_groups(&self) -> StoreResult<Vec<GroupRef>> {
        self.inner.list_completed_groups().await
    }

    async fn select_top_page_ids(&self, group_id: i64, limit: i64) -> StoreResult<Vec<i64>> {
        self.inner.select_top_page_ids(group_id, limit).await
    }

    async fn set_top_page_flag(&self, page_ids: &[i64], value: bool) -> StoreResult<()> {
        self.inner.set_top_page_flag(page_ids, value).await
    }

    async fn replace_top_pages(&self, group_id: i64, page_ids: &[i64]) -> StoreResult<()> {
        self.inner.replace_top_pages(group_id, page_ids).await
    }

    async fn aggregate_score_stats(&self) -> StoreResult<ScoreStats> {
        self.inner.aggregate_score_stats().await
    }

    async fn category_breakdown(&self) -> StoreResult<Vec<(String, i64)>> {
        self.inner.category_breakdown().await
    }

    async fn tier_breakdown(&self) -> StoreResult<Vec<TierCount>> {
        self.inner.tier_breakdown().await
    }
}
