use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use tokio::sync::Semaphore;
use tracing::warn;

use crate::error::{StoreError, StoreResult};
use crate::ranking::PageScore;
use crate::repository::{GroupRef, PageRepository, PageRow, ScoreStats, TierCount};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Blocking tasks allowed in flight at once. They all share one connection,
/// so more would only park threads on the mutex.
const MAX_BLOCKING_CALLS: usize = 4;

const TIER_COLUMNS: &[&str] = &["bi_classification", "business_value_tier", "intelligence_value"];

/// SQLite-backed page store. Every call runs on tokio's blocking pool against
/// a single shared connection.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    permits: Arc<Semaphore>,
    /// Whether `website_pages` has the business-value tier columns.
    tier_columns: bool,
}

impl SqliteStore {
    /// Open an existing database. The schema belongs to the ingestion side, so a
    /// missing file is a configuration error rather than something to create.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            bail!("database not found at {:?} (set RANKER_DB_PATH or --db)", path);
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("Failed to open {:?}", path))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let store = Self::from_connection(conn);
        if !store.tier_columns {
            warn!("website_pages has no tier columns, business value tiers will not be stored");
        }
        Ok(store)
    }

    pub fn from_connection(conn: Connection) -> Self {
        let tier_columns = has_tier_columns(&conn).unwrap_or(false);
        Self {
            conn: Arc::new(Mutex::new(conn)),
            permits: Arc::new(Semaphore::new(MAX_BLOCKING_CALLS)),
            tier_columns,
        }
    }

    async fn with_conn<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| StoreError::Closed)?;
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let mut guard = conn.lock().map_err(|_| StoreError::Poisoned)?;
            f(&mut *guard)
        })
        .await?
    }

    /// Flagged top pages of one website, in rank order.
    pub async fn fetch_top_pages(&self, group_id: i64, limit: i64) -> StoreResult<Vec<TopPageRow>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, COALESCE(url, ''), COALESCE(title, ''), COALESCE(importance_score, 0),
                        COALESCE(category, 'general')
                 FROM website_pages
                 WHERE website_id = ?1 AND is_top_page = 1
                 ORDER BY importance_score DESC NULLS LAST,
                          sitemap_priority DESC NULLS LAST,
                          id
                 LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![group_id, limit], |row| {
                    Ok(TopPageRow {
                        page_id: row.get(0)?,
                        url: row.get(1)?,
                        title: row.get(2)?,
                        importance_score: row.get(3)?,
                        category: row.get(4)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }
}

fn has_tier_columns(conn: &Connection) -> rusqlite::Result<bool> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info('website_pages')")?;
    let existing = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(TIER_COLUMNS.iter().all(|c| existing.iter().any(|e| e == c)))
}

// Ingested columns can hold NULLs or drifted types; they read as absent.

fn lenient_text(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Text(t) => Some(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Null | ValueRef::Blob(_) => None,
    }
}

fn lenient_f64(value: ValueRef<'_>) -> Option<f64> {
    match value {
        ValueRef::Real(f) => Some(f),
        ValueRef::Integer(i) => Some(i as f64),
        ValueRef::Text(t) => std::str::from_utf8(t).ok()?.trim().parse().ok(),
        ValueRef::Null | ValueRef::Blob(_) => None,
    }
}

pub struct TopPageRow {
    pub page_id: i64,
    pub url: String,
    pub title: String,
    pub importance_score: i64,
    pub category: String,
}

#[async_trait]
impl PageRepository for SqliteStore {
    // ── Batch ──

    async fn count_pages(&self) -> StoreResult<i64> {
        self.with_conn(|conn| {
            let n = conn.query_row("SELECT COUNT(*) FROM website_pages", [], |r| r.get(0))?;
            Ok(n)
        })
        .await
    }

    async fn fetch_page_window(&self, offset: i64, limit: i64) -> StoreResult<Vec<PageRow>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT wp.id, wp.url, wp.title, wp.sitemap_priority, wp.last_modified,
                        w.domain, c.name, c.industry
                 FROM website_pages wp
                 LEFT JOIN websites w ON w.id = wp.website_id
                 LEFT JOIN companies c ON c.id = w.company_id
                 ORDER BY wp.id
                 LIMIT ?1 OFFSET ?2",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![limit, offset], |row| {
                    Ok(PageRow {
                        id: row.get(0)?,
                        url: lenient_text(row.get_ref(1)?).unwrap_or_default(),
                        title: lenient_text(row.get_ref(2)?),
                        sitemap_priority: lenient_f64(row.get_ref(3)?),
                        last_modified: lenient_text(row.get_ref(4)?),
                        domain: lenient_text(row.get_ref(5)?).unwrap_or_default(),
                        owner_name: lenient_text(row.get_ref(6)?),
                        owner_industry: lenient_text(row.get_ref(7)?),
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn update_page_score(&self, page_id: i64, score: &PageScore) -> StoreResult<()> {
        let factors = serde_json::to_string(&score.factors)?;
        let importance_score = score.importance_score;
        let category = score.category;
        let tier = score.tier;
        let tier_columns = self.tier_columns;
        self.with_conn(move |conn| {
            let changed = if tier_columns {
                conn.prepare_cached(
                    "UPDATE website_pages
                     SET importance_score = ?1, category = ?2, ranking_factors = ?3,
                         bi_classification = ?4, business_value_tier = ?5, intelligence_value = ?6
                     WHERE id = ?7",
                )?
                .execute(rusqlite::params![
                    importance_score,
                    category.as_str(),
                    factors,
                    tier.class.as_str(),
                    tier.tier,
                    tier.intelligence,
                    page_id
                ])?
            } else {
                conn.prepare_cached(
                    "UPDATE website_pages
                     SET importance_score = ?1, category = ?2, ranking_factors = ?3
                     WHERE id = ?4",
                )?
                .execute(rusqlite::params![importance_score, category.as_str(), factors, page_id])?
            };
            if changed == 0 {
                return Err(StoreError::PageNotFound(page_id));
            }
            Ok(())
        })
        .await
    }

    // ── Top pages ──

    async fn list_completed_groups(&self) -> StoreResult<Vec<GroupRef>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT w.id, c.name
                 FROM websites w
                 LEFT JOIN companies c ON c.id = w.company_id
                 WHERE w.analysis_status = 'completed'
                 ORDER BY w.id",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(GroupRef {
                        group_id: row.get(0)?,
                        owner_name: row.get(1)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn select_top_page_ids(&self, group_id: i64, limit: i64) -> StoreResult<Vec<i64>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT id FROM website_pages
                 WHERE website_id = ?1
                 ORDER BY importance_score DESC NULLS LAST,
                          sitemap_priority DESC NULLS LAST,
                          id
                 LIMIT ?2",
            )?;
            let ids = stmt
                .query_map(rusqlite::params![group_id, limit], |row| row.get(0))?
                .collect::<Result<Vec<i64>, _>>()?;
            Ok(ids)
        })
        .await
    }

    async fn set_top_page_flag(&self, page_ids: &[i64], value: bool) -> StoreResult<()> {
        let page_ids = page_ids.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare("UPDATE website_pages SET is_top_page = ?1 WHERE id = ?2")?;
                for id in &page_ids {
                    stmt.execute(rusqlite::params![value, id])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn replace_top_pages(&self, group_id: i64, page_ids: &[i64]) -> StoreResult<()> {
        let page_ids = page_ids.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE website_pages SET is_top_page = 0
                 WHERE website_id = ?1 AND is_top_page = 1",
                [group_id],
            )?;
            {
                let mut stmt = tx.prepare(
                    "UPDATE website_pages SET is_top_page = 1
                     WHERE id = ?1 AND website_id = ?2",
                )?;
                for id in &page_ids {
                    stmt.execute(rusqlite::params![id, group_id])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    // ── Stats ──

    async fn aggregate_score_stats(&self) -> StoreResult<ScoreStats> {
        self.with_conn(|conn| {
            let stats = conn.query_row(
                "SELECT COUNT(*),
                        COUNT(CASE WHEN is_top_page = 1 THEN 1 END),
                        AVG(importance_score),
                        MIN(importance_score),
                        MAX(importance_score)
                 FROM website_pages
                 WHERE importance_score IS NOT NULL",
                [],
                |r| {
                    Ok(ScoreStats {
                        ranked_count: r.get(0)?,
                        top_count: r.get(1)?,
                        avg_score: r.get(2)?,
                        min_score: r.get(3)?,
                        max_score: r.get(4)?,
                    })
                },
            )?;
            Ok(stats)
        })
        .await
    }

    async fn category_breakdown(&self) -> StoreResult<Vec<(String, i64)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT category, COUNT(*) AS n
                 FROM website_pages
                 WHERE importance_score IS NOT NULL AND category IS NOT NULL
                 GROUP BY category
                 ORDER BY n DESC, category",
            )?;
            let rows = stmt
                .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn tier_breakdown(&self) -> StoreResult<Vec<TierCount>> {
        if !self.tier_columns {
            return Ok(Vec::new());
        }
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT business_value_tier, bi_classification, COUNT(*) AS n
                 FROM website_pages
                 WHERE importance_score IS NOT NULL
                   AND business_value_tier IS NOT NULL
                   AND bi_classification IS NOT NULL
                   AND bi_classification != 'unclassified'
                 GROUP BY business_value_tier, bi_classification
                 ORDER BY business_value_tier, n DESC, bi_classification",
            )?;
            let rows = stmt
                .query_map([], |r| {
                    Ok(TierCount {
                        tier: r.get(0)?,
                        class: r.get(1)?,
                        count: r.get(2)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }
}

// ── Test support ──

#[cfg(test)]
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPage {
    pub importance_score: Option<i64>,
    pub category: Option<String>,
    pub ranking_factors: Option<String>,
    pub is_top_page: bool,
    pub bi_classification: Option<String>,
    pub business_value_tier: Option<i64>,
}

#[cfg(test)]
impl SqliteStore {
    pub fn stored_page(&self, page_id: i64) -> StoredPage {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT importance_score, category, ranking_factors, is_top_page,
                    bi_classification, business_value_tier
             FROM website_pages WHERE id = ?1",
            [page_id],
            |r| {
                Ok(StoredPage {
                    importance_score: r.get(0)?,
                    category: r.get(1)?,
                    ranking_factors: r.get(2)?,
                    is_top_page: r.get(3)?,
                    bi_classification: r.get(4)?,
                    business_value_tier: r.get(5)?,
                })
            },
        )
        .unwrap()
    }

    pub fn top_page_ids(&self, group_id: i64) -> Vec<i64> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT id FROM website_pages WHERE website_id = ?1 AND is_top_page = 1 ORDER BY id")
            .unwrap();
        let ids = stmt
            .query_map([group_id], |r| r.get(0))
            .unwrap()
            .collect::<Result<Vec<i64>, _>>()
            .unwrap();
        ids
    }

    pub fn execute(&self, sql: &str) {
        self.conn.lock().unwrap().execute_batch(sql).unwrap();
    }
}
