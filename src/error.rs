use thiserror::Error;

/// Failures raised by a page store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Task(#[from] tokio::task::JoinError),

    #[error("database connection lock poisoned")]
    Poisoned,

    #[error("store is shut down")]
    Closed,

    #[error("page {0} not found")]
    PageNotFound(i64),
}

/// Failures that abort a ranking run. Persistence errors carry the page or
/// group that triggered them.
#[derive(Debug, Error)]
pub enum RankError {
    #[error("failed to update page {page_id}")]
    PageUpdate {
        page_id: i64,
        #[source]
        source: StoreError,
    },

    #[error("failed to flag top pages for website {group_id}")]
    TopPages {
        group_id: i64,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
