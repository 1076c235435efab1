use crate::error::RankError;
use crate::ranking::category::score_for_label;
use crate::ranking::tier::tier_name;
use crate::repository::{PageRepository, ScoreStats, TierCount};

pub struct RunStats {
    pub scores: ScoreStats,
    pub categories: Vec<(String, i64)>,
    pub tiers: Vec<TierCount>,
}

pub async fn collect<R>(repo: &R) -> Result<RunStats, RankError>
where
    R: PageRepository + ?Sized,
{
    let scores = repo.aggregate_score_stats().await?;
    let categories = repo.category_breakdown().await?;
    let tiers = repo.tier_breakdown().await?;
    Ok(RunStats {
        scores,
        categories,
        tiers,
    })
}

impl RunStats {
    pub fn print(&self) {
        let s = &self.scores;
        println!("Ranked:    {}", s.ranked_count);
        println!("Top pages: {}", s.top_count);
        println!("Avg score: {}", fmt_opt(s.avg_score.map(|v| format!("{:.1}", v))));
        println!("Min score: {}", fmt_opt(s.min_score.map(|v| v.to_string())));
        println!("Max score: {}", fmt_opt(s.max_score.map(|v| v.to_string())));

        if !self.categories.is_empty() {
            println!("\n--- Categories (table score) ---");
            for (category, count) in &self.categories {
                println!(
                    "  {:<16} {:>3} {:>7} ({:.1}%)",
                    category,
                    score_for_label(category),
                    count,
                    percent(*count, s.ranked_count)
                );
            }
        }

        if !self.tiers.is_empty() {
            println!("\n--- Business value tiers ---");
            let mut current = None;
            for t in &self.tiers {
                if current != Some(t.tier) {
                    println!("  {}:", tier_name(t.tier));
                    current = Some(t.tier);
                }
                println!(
                    "    {:<14} {:>7} ({:.1}%)",
                    t.class,
                    t.count,
                    percent(t.count, s.ranked_count)
                );
            }
        }
    }
}

fn fmt_opt(v: Option<String>) -> String {
    v.unwrap_or_else(|| "-".into())
}

fn percent(part: i64, total: i64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}
