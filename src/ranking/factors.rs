use std::borrow::Cow;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

pub const DEFAULT_SITEMAP_PRIORITY: f64 = 0.5;
pub const NEUTRAL_FRESHNESS: f64 = 60.0;

const ROOT_SCORE: f64 = 100.0;
const DEPTH_PENALTY: f64 = 15.0;
const MIN_DEPTH_SCORE: f64 = 20.0;
const IMPORTANT_SEGMENT_BONUS: f64 = 15.0;

const IMPORTANT_SEGMENTS: &[&str] = &[
    "about",
    "services",
    "products",
    "contact",
    "careers",
    "news",
    "investors",
    "locations",
    "leadership",
    "mission",
];

const TITLE_BASE: f64 = 50.0;
const HIGH_VALUE_HIT: f64 = 15.0;
const MEDIUM_VALUE_HIT: f64 = 8.0;

const HIGH_VALUE_TITLE_WORDS: &[&str] = &[
    "home", "about", "services", "products", "contact", "leadership", "board", "mission",
    "vision", "values", "careers", "jobs", "investors", "news", "press",
];

const MEDIUM_VALUE_TITLE_WORDS: &[&str] = &[
    "team",
    "management",
    "executives",
    "directors",
    "sustainability",
    "community",
    "research",
    "innovation",
    "locations",
    "offices",
    "branches",
];

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// `priority * 100`. NaN counts as missing; other out-of-range values are clamped.
pub fn sitemap_score(priority: Option<f64>) -> f64 {
    let p = match priority {
        Some(p) if !p.is_nan() => p.clamp(0.0, 1.0),
        _ => DEFAULT_SITEMAP_PRIORITY,
    };
    p * 100.0
}

pub fn url_structure_score(url: &str, domain: &str) -> f64 {
    let path = url_path(url, domain);
    if path.is_empty() || path == "/" {
        return ROOT_SCORE;
    }

    let depth = path.matches('/').count();
    let mut score = depth_score(depth);
    let lower = path.to_lowercase();
    if IMPORTANT_SEGMENTS.iter().any(|kw| lower.contains(kw)) {
        score += IMPORTANT_SEGMENT_BONUS;
    }
    score.min(100.0)
}

pub fn depth_score(depth: usize) -> f64 {
    (ROOT_SCORE - depth as f64 * DEPTH_PENALTY).max(MIN_DEPTH_SCORE)
}

/// Path portion of `url` relative to the group's domain.
///
/// Scheme and a leading `www.` are ignored on both sides. A URL without a
/// scheme is taken to be a path already.
pub fn url_path<'a>(url: &'a str, domain: &str) -> &'a str {
    let Some(rest) = strip_scheme(url) else {
        return url;
    };
    let rest = strip_www(rest);
    let domain = bare_host(domain);

    if !domain.is_empty() {
        let host_matches = rest
            .get(..domain.len())
            .is_some_and(|host| host.eq_ignore_ascii_case(domain));
        if host_matches {
            let path = &rest[domain.len()..];
            if path.is_empty() || path.starts_with(['/', '?', '#']) {
                return path;
            }
        }
    }

    // Foreign host: everything after the authority.
    match rest.find('/') {
        Some(i) => &rest[i..],
        None => "",
    }
}

/// `url` with scheme and host. A bare path gets `https://` and the group's
/// domain in front, so both stored forms of a page classify the same way.
pub fn absolute_url<'a>(url: &'a str, domain: &str) -> Cow<'a, str> {
    if url.trim().is_empty() || strip_scheme(url).is_some() {
        return Cow::Borrowed(url);
    }
    let slash = if url.starts_with('/') { "" } else { "/" };
    Cow::Owned(format!("https://{}{}{}", bare_host(domain), slash, url))
}

fn bare_host(domain: &str) -> &str {
    let domain = domain.trim();
    strip_www(strip_scheme(domain).unwrap_or(domain)).trim_end_matches('/')
}

fn strip_scheme(s: &str) -> Option<&str> {
    s.strip_prefix("https://")
        .or_else(|| s.strip_prefix("http://"))
}

fn strip_www(s: &str) -> &str {
    s.strip_prefix("www.").unwrap_or(s)
}

/// Keyword hits plus a length adjustment. Only the upper bound is clamped here;
/// the final weighted score is clamped as a whole.
pub fn title_score(title: &str) -> f64 {
    let lower = title.to_lowercase();
    let high = keyword_hits(&lower, HIGH_VALUE_TITLE_WORDS) as f64;
    let medium = keyword_hits(&lower, MEDIUM_VALUE_TITLE_WORDS) as f64;
    let mut score = TITLE_BASE + high * HIGH_VALUE_HIT + medium * MEDIUM_VALUE_HIT;

    let len = title.chars().count();
    if (10..=60).contains(&len) {
        score += 10.0;
    } else if !(10..=100).contains(&len) {
        score -= 10.0;
    }
    score.min(100.0)
}

fn keyword_hits(text: &str, words: &[&str]) -> usize {
    words.iter().filter(|w| text.contains(*w)).count()
}

pub fn freshness_score(last_modified: Option<&str>, now: DateTime<Utc>) -> f64 {
    let Some(modified) = last_modified.and_then(parse_timestamp) else {
        return NEUTRAL_FRESHNESS;
    };
    let age_days = (now - modified).num_days().max(0);
    match age_days {
        0..=29 => 90.0,
        30..=89 => 75.0,
        90..=364 => 60.0,
        365..=729 => 45.0,
        _ => 30.0,
    }
}

/// RFC 3339, naive date-times (taken as UTC), or a bare date.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        "2024-06-01T00:00:00Z".parse().unwrap()
    }

    #[test]
    fn sitemap_priority_scales_linearly() {
        for p in [0.0, 0.1, 0.25, 0.5, 0.8, 1.0] {
            assert!((sitemap_score(Some(p)) - p * 100.0).abs() < 1e-9);
        }
        assert_eq!(sitemap_score(None), 50.0);
        assert_eq!(sitemap_score(Some(f64::NAN)), 50.0);
        assert_eq!(sitemap_score(Some(3.0)), 100.0);
        assert_eq!(sitemap_score(Some(-1.0)), 0.0);
    }

    #[test]
    fn domain_root_is_perfect() {
        assert_eq!(url_structure_score("https://acme.com", "acme.com"), 100.0);
        assert_eq!(url_structure_score("https://acme.com/", "acme.com"), 100.0);
        assert_eq!(url_structure_score("https://www.acme.com/", "acme.com"), 100.0);
        assert_eq!(url_structure_score("http://acme.com/", "www.acme.com"), 100.0);
        assert_eq!(url_structure_score("/", "acme.com"), 100.0);
    }

    #[test]
    fn depth_penalty_and_floor() {
        assert_eq!(url_structure_score("https://acme.com/widgets", "acme.com"), 85.0);
        assert_eq!(url_structure_score("https://acme.com/a/b", "acme.com"), 70.0);
        assert_eq!(
            url_structure_score("https://acme.com/a/b/c/d/e/f/g/h", "acme.com"),
            20.0
        );
        assert_eq!(depth_score(4), 40.0);
        assert_eq!(depth_score(6), 20.0);
    }

    #[test]
    fn important_segment_bonus() {
        assert_eq!(url_structure_score("https://acme.com/about-us", "acme.com"), 100.0);
        assert_eq!(url_structure_score("https://acme.com/x/y/News", "acme.com"), 70.0);
    }

    #[test]
    fn path_extraction() {
        assert_eq!(url_path("https://acme.com/about", "acme.com"), "/about");
        assert_eq!(url_path("https://ACME.com/about", "acme.com"), "/about");
        assert_eq!(url_path("https://acme.com/about", "https://acme.com/"), "/about");
        assert_eq!(url_path("/contact", "acme.com"), "/contact");
        assert_eq!(url_path("https://cdn.other.net/a/b", "acme.com"), "/a/b");
        assert_eq!(url_path("https://acme.community/a", "acme.com"), "/a");
        assert_eq!(url_path("https://acme.com", "acme.com"), "");
    }

    #[test]
    fn bare_paths_become_absolute() {
        assert_eq!(absolute_url("/careers/", "acme.com"), "https://acme.com/careers/");
        assert_eq!(absolute_url("careers", "https://www.acme.com/"), "https://acme.com/careers");
        assert_eq!(absolute_url("/", "acme.com"), "https://acme.com/");
        assert_eq!(absolute_url("http://acme.com/x", "other.net"), "http://acme.com/x");
        assert_eq!(absolute_url("", "acme.com"), "");
    }

    #[test]
    fn title_keywords_and_length() {
        // 9 chars: base + "home" - short penalty
        assert_eq!(title_score("Acme Home"), 55.0);
        // 20 chars, no keywords
        assert_eq!(title_score("Quarterly Widget Fun"), 60.0);
        assert_eq!(title_score("Meet our leadership team"), 83.0);
        assert_eq!(title_score("Untitled"), 40.0);
        assert_eq!(title_score(""), 40.0);
        let long = "x".repeat(80);
        assert_eq!(title_score(&long), 50.0);
        let very_long = "y".repeat(120);
        assert_eq!(title_score(&very_long), 40.0);
        assert_eq!(
            title_score("Home | About | Services | Products | Contact"),
            100.0
        );
    }

    #[test]
    fn freshness_buckets() {
        let at = |days: i64| (now() - Duration::days(days)).to_rfc3339();
        assert_eq!(freshness_score(Some(&at(0)), now()), 90.0);
        assert_eq!(freshness_score(Some(&at(29)), now()), 90.0);
        assert_eq!(freshness_score(Some(&at(30)), now()), 75.0);
        assert_eq!(freshness_score(Some(&at(100)), now()), 60.0);
        assert_eq!(freshness_score(Some(&at(400)), now()), 45.0);
        assert_eq!(freshness_score(Some(&at(1000)), now()), 30.0);
    }

    #[test]
    fn freshness_defaults() {
        assert_eq!(freshness_score(None, now()), NEUTRAL_FRESHNESS);
        assert_eq!(freshness_score(Some("last tuesday"), now()), NEUTRAL_FRESHNESS);
        assert_eq!(freshness_score(Some(""), now()), NEUTRAL_FRESHNESS);
        // future dates count as brand new
        assert_eq!(freshness_score(Some("2030-01-01"), now()), 90.0);
    }

    #[test]
    fn timestamp_formats() {
        let expected: DateTime<Utc> = "2024-05-01T10:30:00Z".parse().unwrap();
        assert_eq!(parse_timestamp("2024-05-01T10:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T12:30:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01 10:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T10:30:00.000"), Some(expected));
        assert!(parse_timestamp("2024-05-01").is_some());
        assert!(parse_timestamp("05/01/2024").is_none());
    }
}
