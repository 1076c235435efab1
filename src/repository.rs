use async_trait::async_trait;

use crate::error::StoreResult;
use crate::ranking::{PageScore, ScoreInput};

/// One row of a page window: the page plus read-only context from its website
/// and owning company.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRow {
    pub id: i64,
    pub url: String,
    pub title: Option<String>,
    pub sitemap_priority: Option<f64>,
    pub last_modified: Option<String>,
    pub domain: String,
    pub owner_name: Option<String>,
    pub owner_industry: Option<String>,
}

impl PageRow {
    pub fn score_input(&self) -> ScoreInput<'_> {
        ScoreInput {
            url: &self.url,
            title: self.title.as_deref(),
            sitemap_priority: self.sitemap_priority,
            last_modified: self.last_modified.as_deref(),
            domain: &self.domain,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRef {
    pub group_id: i64,
    pub owner_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreStats {
    pub ranked_count: i64,
    pub top_count: i64,
    pub avg_score: Option<f64>,
    pub min_score: Option<i64>,
    pub max_score: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierCount {
    pub tier: i64,
    pub class: String,
    pub count: i64,
}

/// Storage contract the ranking core runs against. Implementations must keep
/// `fetch_page_window` ordered by page id so offset pagination stays stable
/// while derived columns change underneath it.
#[async_trait]
pub trait PageRepository: Send + Sync {
    async fn count_pages(&self) -> StoreResult<i64>;

    async fn fetch_page_window(&self, offset: i64, limit: i64) -> StoreResult<Vec<PageRow>>;

    /// Write score, category, factors and business-value tier of one page.
    async fn update_page_score(&self, page_id: i64, score: &PageScore) -> StoreResult<()>;

    /// Websites whose analysis status is `completed`.
    async fn list_completed_groups(&self) -> StoreResult<Vec<GroupRef>>;

    /// Page ids ordered by score desc, sitemap priority desc (nulls last), id asc.
    async fn select_top_page_ids(&self, group_id: i64, limit: i64) -> StoreResult<Vec<i64>>;

    async fn set_top_page_flag(&self, page_ids: &[i64], value: bool) -> StoreResult<()>;

    /// Clear every top-page flag in the group and set it on `page_ids`, atomically.
    async fn replace_top_pages(&self, group_id: i64, page_ids: &[i64]) -> StoreResult<()>;

    async fn aggregate_score_stats(&self) -> StoreResult<ScoreStats>;

    /// Ranked page count per category label, largest first.
    async fn category_breakdown(&self) -> StoreResult<Vec<(String, i64)>>;

    /// Classified page count per tier and class, tier ascending then largest
    /// first. Unclassified pages are left out.
    async fn tier_breakdown(&self) -> StoreResult<Vec<TierCount>>;
}
