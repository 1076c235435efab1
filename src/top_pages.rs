use tracing::{debug, info};

use crate::error::{RankError, StoreError};
use crate::repository::PageRepository;

pub const DEFAULT_TOP_N: i64 = 20;

#[derive(Debug, Clone)]
pub struct SelectionOptions {
    pub top_n: i64,
    /// Only ever set flags, never clear them. Pages that drop out of the top
    /// set keep their old flag.
    pub additive: bool,
}

impl Default for SelectionOptions {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
            additive: false,
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SelectionReport {
    pub groups: usize,
    pub flagged: usize,
}

/// Flag the highest-ranked pages of every completed website.
///
/// Must run after the batch so it sees the fresh scores. Websites are
/// independent of each other.
pub async fn flag_top_pages<R>(repo: &R, opts: &SelectionOptions) -> Result<SelectionReport, RankError>
where
    R: PageRepository + ?Sized,
{
    let groups = repo.list_completed_groups().await?;
    info!(groups = groups.len(), top_n = opts.top_n, "Selecting top pages");

    let mut report = SelectionReport::default();
    for group in &groups {
        let group_id = group.group_id;
        let wrap = |source: StoreError| RankError::TopPages { group_id, source };

        let ids = repo
            .select_top_page_ids(group_id, opts.top_n.max(0))
            .await
            .map_err(wrap)?;

        if opts.additive {
            if !ids.is_empty() {
                repo.set_top_page_flag(&ids, true).await.map_err(wrap)?;
            }
        } else {
            repo.replace_top_pages(group_id, &ids).await.map_err(wrap)?;
        }

        debug!(
            group_id,
            owner = group.owner_name.as_deref().unwrap_or("-"),
            flagged = ids.len(),
            "Top pages flagged"
        );
        report.groups += 1;
        report.flagged += ids.len();
    }

    info!(groups = report.groups, flagged = report.flagged, "Top pages done");
    Ok(report)
}
