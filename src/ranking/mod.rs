//! Page importance scoring.
//!
//! `score_page` is pure and total: every input, including missing or garbage
//! fields, produces an integer score in `0..=100` and exactly one category.

pub mod category;
pub mod factors;
pub mod tier;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use category::Category;
pub use tier::TierMatch;

pub const SITEMAP_WEIGHT: f64 = 0.30;
pub const URL_STRUCTURE_WEIGHT: f64 = 0.25;
pub const TITLE_WEIGHT: f64 = 0.20;
pub const CATEGORY_WEIGHT: f64 = 0.15;
pub const FRESHNESS_WEIGHT: f64 = 0.10;

pub const UNTITLED: &str = "Untitled";

/// Attributes the scorer reads. Borrowed so a window can be scored without copying rows.
#[derive(Debug, Clone, Copy)]
pub struct ScoreInput<'a> {
    pub url: &'a str,
    pub title: Option<&'a str>,
    pub sitemap_priority: Option<f64>,
    pub last_modified: Option<&'a str>,
    pub domain: &'a str,
}

/// Sub-scores kept for explainability. Persisted as JSON.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingFactors {
    pub sitemap: f64,
    pub url_structure: f64,
    pub title: f64,
    pub category: f64,
    pub freshness: f64,
}

impl RankingFactors {
    pub fn weighted_sum(&self) -> f64 {
        self.sitemap * SITEMAP_WEIGHT
            + self.url_structure * URL_STRUCTURE_WEIGHT
            + self.title * TITLE_WEIGHT
            + self.category * CATEGORY_WEIGHT
            + self.freshness * FRESHNESS_WEIGHT
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageScore {
    pub importance_score: i64,
    pub category: Category,
    pub factors: RankingFactors,
    /// Business-value tier. Does not feed the importance score.
    pub tier: TierMatch,
}

pub fn score_page(input: &ScoreInput<'_>, now: DateTime<Utc>) -> PageScore {
    let title = input.title.unwrap_or(UNTITLED);
    let category = category::classify(input.url, title, input.domain);

    let factors = RankingFactors {
        sitemap: factors::sitemap_score(input.sitemap_priority),
        url_structure: factors::url_structure_score(input.url, input.domain),
        title: factors::title_score(title),
        category: f64::from(category.score()),
        freshness: factors::freshness_score(input.last_modified, now),
    };

    PageScore {
        importance_score: clamp_score(factors.weighted_sum()),
        category,
        factors,
        tier: tier::classify_tier(input.url, input.title),
    }
}

fn clamp_score(raw: f64) -> i64 {
    if raw.is_nan() {
        return 0;
    }
    (raw.round() as i64).clamp(0, 100)
}
