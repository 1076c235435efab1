use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::future::{join_all, try_join_all};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::{info, warn};

use crate::error::RankError;
use crate::ranking::{score_page, PageScore};
use crate::repository::{PageRepository, PageRow};

pub const DEFAULT_WINDOW_SIZE: i64 = 1000;
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 200;

/// What to do when a page update fails after its retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Abort the run on the first failed update.
    #[default]
    FailFast,
    /// Record the failure and keep going.
    Collect,
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub window_size: i64,
    /// Total tries per page update. 1 means no retry.
    pub update_attempts: u32,
    pub retry_backoff: Duration,
    pub failure_policy: FailurePolicy,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            update_attempts: 1,
            retry_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
            failure_policy: FailurePolicy::FailFast,
        }
    }
}

#[derive(Debug)]
pub struct FailedUpdate {
    pub page_id: i64,
    pub url: String,
    pub error: String,
}

#[derive(Debug)]
pub struct BatchReport {
    pub total: i64,
    pub processed: usize,
    pub failed: Vec<FailedUpdate>,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn pages_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.processed as f64 / secs
        } else {
            0.0
        }
    }

    pub fn print(&self) {
        println!(
            "Ranked {} of {} pages in {:.1}s ({:.0} pages/sec).",
            self.processed,
            self.total,
            self.elapsed.as_secs_f64(),
            self.pages_per_sec()
        );
        if !self.failed.is_empty() {
            println!("{} page updates failed:", self.failed.len());
            for f in self.failed.iter().take(20) {
                println!("  page {} ({}): {}", f.page_id, f.url, f.error);
            }
        }
    }
}

/// Recompute score, category and factors for every page, one window at a time.
///
/// Windows are read in page-id order and each window's updates are joined
/// before the next window is fetched. `now` is the clock every page is aged
/// against, so the same data and clock always produce the same rows.
pub async fn rank_all_pages<R>(
    repo: &R,
    opts: &BatchOptions,
    now: DateTime<Utc>,
) -> Result<BatchReport, RankError>
where
    R: PageRepository + ?Sized,
{
    let start = Instant::now();
    let window_size = opts.window_size.max(1);
    let total = repo.count_pages().await?;
    info!(total, window_size, "Ranking pages");

    let pb = ProgressBar::new(total.max(0) as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}, eta {eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-"),
    );

    let mut offset = 0i64;
    let mut processed = 0usize;
    let mut failed = Vec::new();

    while offset < total {
        let window = repo.fetch_page_window(offset, window_size).await?;
        if window.is_empty() {
            break;
        }

        let scored: Vec<(&PageRow, PageScore)> = window
            .par_iter()
            .map(|page| (page, score_page(&page.score_input(), now)))
            .collect();

        let window_failures = persist_window(repo, &scored, opts).await?;
        processed += scored.len() - window_failures.len();
        failed.extend(window_failures);

        offset += window.len() as i64;
        pb.inc(window.len() as u64);

        let secs = start.elapsed().as_secs_f64();
        info!(
            processed,
            total,
            percent = %format!("{:.1}", offset as f64 * 100.0 / total as f64),
            pages_per_sec = %format!("{:.0}", if secs > 0.0 { offset as f64 / secs } else { 0.0 }),
            "Window committed"
        );
    }

    pb.finish_and_clear();

    let report = BatchReport {
        total,
        processed,
        failed,
        elapsed: start.elapsed(),
    };
    info!(
        processed = report.processed,
        failed = report.failed.len(),
        "Ranking finished in {:.1}s",
        report.elapsed.as_secs_f64()
    );
    Ok(report)
}

/// Issue one update per page concurrently and wait for all of them.
async fn persist_window<R>(
    repo: &R,
    scored: &[(&PageRow, PageScore)],
    opts: &BatchOptions,
) -> Result<Vec<FailedUpdate>, RankError>
where
    R: PageRepository + ?Sized,
{
    let updates = scored
        .iter()
        .map(|(page, score)| update_with_retry(repo, page.id, score, opts));

    match opts.failure_policy {
        FailurePolicy::FailFast => {
            try_join_all(updates).await?;
            Ok(Vec::new())
        }
        FailurePolicy::Collect => {
            let results = join_all(updates).await;
            let failures = scored
                .iter()
                .zip(results)
                .filter_map(|((page, _), result)| {
                    let error = format!("{:#}", anyhow::Error::new(result.err()?));
                    warn!(
                        page_id = page.id,
                        owner = page.owner_name.as_deref().unwrap_or("-"),
                        industry = page.owner_industry.as_deref().unwrap_or("-"),
                        error = %error,
                        "Page update failed, continuing"
                    );
                    Some(FailedUpdate {
                        page_id: page.id,
                        url: page.url.clone(),
                        error,
                    })
                })
                .collect();
            Ok(failures)
        }
    }
}

async fn update_with_retry<R>(
    repo: &R,
    page_id: i64,
    score: &PageScore,
    opts: &BatchOptions,
) -> Result<(), RankError>
where
    R: PageRepository + ?Sized,
{
    let attempts = opts.update_attempts.max(1);
    let mut attempt = 1;
    loop {
        let result = repo.update_page_score(page_id, score).await;
        match result {
            Ok(()) => return Ok(()),
            Err(e) if attempt < attempts => {
                let backoff = opts.retry_backoff * 2u32.saturating_pow(attempt - 1);
                warn!(
                    "Update of page {} failed (attempt {}/{}): {}, backing off {:.1}s",
                    page_id,
                    attempt,
                    attempts,
                    e,
                    backoff.as_secs_f64()
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(source) => return Err(RankError::PageUpdate { page_id, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranking::Category;
    use crate::testing::{FlakyStore, Fixture};

    fn now() -> DateTime<Utc> {
        "2024-06-01T00:00:00Z".parse().unwrap()
    }

    fn opts(window_size: i64) -> BatchOptions {
        BatchOptions {
            window_size,
            retry_backoff: Duration::from_millis(1),
            ..Default::default()
        }
    }

    /// One website, `n` pages under /p/<i>.
    fn corpus(n: usize) -> (Fixture, i64, Vec<i64>) {
        let fx = Fixture::new();
        let site = fx.website(fx.company("Acme", Some("Retail")), "acme.com", "completed");
        let ids = (0..n)
            .map(|i| {
                fx.page(
                    site,
                    &format!("https://acme.com/p/{i}"),
                    Some(format!("Page number {i}").as_str()),
                    Some((i % 10) as f64 / 10.0),
                    Some("2024-05-20"),
                )
            })
            .collect();
        (fx, site, ids)
    }

    #[tokio::test]
    async fn ranks_every_page_across_windows() {
        let (fx, _, ids) = corpus(23);
        let store = fx.into_store();

        let report = rank_all_pages(&store, &opts(5), now()).await.unwrap();
        assert_eq!(report.total, 23);
        assert_eq!(report.processed, 23);
        assert!(report.failed.is_empty());

        for id in ids {
            let page = store.stored_page(id);
            let score = page.importance_score.unwrap();
            assert!((0..=100).contains(&score));
            assert_eq!(page.category.as_deref(), Some("general"));
            assert!(page.ranking_factors.is_some());
        }
    }

    #[tokio::test]
    async fn stores_the_scorer_output() {
        let fx = Fixture::new();
        let site = fx.website(fx.company("Acme", None), "acme.com", "completed");
        let home = fx.page(site, "https://acme.com/", Some("Acme Home"), Some(1.0), Some("2024-05-30"));
        let jobs = fx.page(
            site,
            "https://acme.com/careers/jobs/2023/listing-44",
            Some("Job Listing #44"),
            None,
            Some("2021-01-01"),
        );
        let store = fx.into_store();

        rank_all_pages(&store, &opts(1000), now()).await.unwrap();

        let page = store.stored_page(home);
        assert_eq!(page.category.as_deref(), Some("homepage"));
        assert!(page.importance_score.unwrap() >= 90);

        let page = store.stored_page(jobs);
        assert_eq!(page.category.as_deref(), Some(Category::Careers.as_str()));
        let factors: serde_json::Value =
            serde_json::from_str(page.ranking_factors.as_deref().unwrap()).unwrap();
        assert_eq!(factors["freshness"], 30.0);
        assert_eq!(factors["sitemap"], 50.0);
        assert_eq!(page.bi_classification.as_deref(), Some("careers"));
        assert_eq!(page.business_value_tier, Some(1));
    }

    #[tokio::test]
    async fn second_run_is_identical() {
        let (fx, _, ids) = corpus(12);
        let store = fx.into_store();

        rank_all_pages(&store, &opts(4), now()).await.unwrap();
        let first: Vec<_> = ids.iter().map(|id| store.stored_page(*id)).collect();
        rank_all_pages(&store, &opts(4), now()).await.unwrap();
        let second: Vec<_> = ids.iter().map(|id| store.stored_page(*id)).collect();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn empty_corpus() {
        let store = Fixture::new().into_store();
        let report = rank_all_pages(&store, &opts(10), now()).await.unwrap();
        assert_eq!(report.total, 0);
        assert_eq!(report.processed, 0);
    }

    #[tokio::test]
    async fn fail_fast_aborts_and_names_the_page() {
        let (fx, _, ids) = corpus(10);
        let bad = ids[6];
        let store = FlakyStore::new(fx.into_store()).fail_page(bad, u32::MAX);

        let err = rank_all_pages(&store, &opts(5), now()).await.unwrap_err();
        match err {
            RankError::PageUpdate { page_id, .. } => assert_eq!(page_id, bad),
            other => panic!("unexpected error: {other}"),
        }

        // first window committed, second window's healthy pages may or may not
        // have landed, nothing beyond it was touched
        for id in &ids[..5] {
            assert!(store.inner().stored_page(*id).importance_score.is_some());
        }
        assert!(store.inner().stored_page(bad).importance_score.is_none());
    }

    #[tokio::test]
    async fn fail_fast_stops_before_later_windows() {
        let (fx, _, ids) = corpus(9);
        let store = FlakyStore::new(fx.into_store()).fail_page(ids[0], u32::MAX);

        assert!(rank_all_pages(&store, &opts(3), now()).await.is_err());
        for id in &ids[3..] {
            assert!(store.inner().stored_page(*id).importance_score.is_none());
        }
    }

    #[tokio::test]
    async fn retry_recovers_transient_failure() {
        let (fx, _, ids) = corpus(4);
        let flaky = ids[2];
        let store = FlakyStore::new(fx.into_store()).fail_page(flaky, 2);
        let options = BatchOptions {
            update_attempts: 3,
            ..opts(10)
        };

        let report = rank_all_pages(&store, &options, now()).await.unwrap();
        assert_eq!(report.processed, 4);
        assert!(store.inner().stored_page(flaky).importance_score.is_some());
    }

    #[tokio::test]
    async fn collect_policy_keeps_going() {
        let (fx, _, ids) = corpus(8);
        let bad = ids[1];
        let store = FlakyStore::new(fx.into_store()).fail_page(bad, u32::MAX);
        let options = BatchOptions {
            failure_policy: FailurePolicy::Collect,
            update_attempts: 2,
            ..opts(3)
        };

        let report = rank_all_pages(&store, &options, now()).await.unwrap();
        assert_eq!(report.processed, 7);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].page_id, bad);
        assert!(report.failed[0].error.contains("database is locked"));
        assert!(store.inner().stored_page(ids[7]).importance_score.is_some());
    }
}
