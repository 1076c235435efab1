use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::factors::absolute_url;

/// Semantic label assigned to every page. Classification is total: anything
/// that matches no rule falls back to `General`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Homepage,
    About,
    Services,
    Products,
    Contact,
    Careers,
    News,
    Investors,
    Locations,
    Leadership,
    Mission,
    Community,
    Sustainability,
    Research,
    Healthcare,
    General,
}

/// Keyword rules after the homepage check, in precedence order. First match wins.
const KEYWORD_RULES: &[(Category, &[&str])] = &[
    (Category::About, &["about"]),
    (Category::Services, &["services"]),
    (Category::Products, &["products"]),
    (Category::Contact, &["contact"]),
    (Category::Careers, &["careers", "job"]),
    (Category::News, &["news", "press"]),
    (Category::Investors, &["investor"]),
    (Category::Locations, &["locations"]),
    (Category::Leadership, &["leadership", "board"]),
    (Category::Mission, &["mission", "vision"]),
    (Category::Community, &["community"]),
    (Category::Sustainability, &["sustainability"]),
    (Category::Research, &["research"]),
    (Category::Healthcare, &["patient", "provider"]),
];

const CATEGORY_SCORES: &[(Category, u32)] = &[
    (Category::Homepage, 100),
    (Category::Services, 90),
    (Category::Products, 88),
    (Category::Leadership, 85),
    (Category::Mission, 85),
    (Category::Healthcare, 85),
    (Category::About, 85),
    (Category::Investors, 80),
    (Category::Locations, 78),
    (Category::Contact, 75),
    (Category::Community, 75),
    (Category::Research, 75),
    (Category::Careers, 70),
    (Category::Sustainability, 70),
    (Category::News, 65),
    (Category::General, 50),
];

pub const DEFAULT_CATEGORY_SCORE: u32 = 50;

impl Category {
    pub const ALL: [Category; 16] = [
        Category::Homepage,
        Category::About,
        Category::Services,
        Category::Products,
        Category::Contact,
        Category::Careers,
        Category::News,
        Category::Investors,
        Category::Locations,
        Category::Leadership,
        Category::Mission,
        Category::Community,
        Category::Sustainability,
        Category::Research,
        Category::Healthcare,
        Category::General,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Homepage => "homepage",
            Category::About => "about",
            Category::Services => "services",
            Category::Products => "products",
            Category::Contact => "contact",
            Category::Careers => "careers",
            Category::News => "news",
            Category::Investors => "investors",
            Category::Locations => "locations",
            Category::Leadership => "leadership",
            Category::Mission => "mission",
            Category::Community => "community",
            Category::Sustainability => "sustainability",
            Category::Research => "research",
            Category::Healthcare => "healthcare",
            Category::General => "general",
        }
    }

    /// Sub-score used for the category factor.
    pub fn score(self) -> u32 {
        CATEGORY_SCORES
            .iter()
            .find(|(c, _)| *c == self)
            .map(|(_, s)| *s)
            .unwrap_or(DEFAULT_CATEGORY_SCORE)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCategory(pub String);

impl fmt::Display for UnknownCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown category: {}", self.0)
    }
}

impl std::error::Error for UnknownCategory {}

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim().to_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == label)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

/// Score for a stored category label. Labels outside the table score the default.
pub fn score_for_label(label: &str) -> u32 {
    label
        .parse::<Category>()
        .map(Category::score)
        .unwrap_or(DEFAULT_CATEGORY_SCORE)
}

/// Assign exactly one category from url + title. Bare paths are read as
/// pages of `domain`.
pub fn classify(url: &str, title: &str, domain: &str) -> Category {
    let url = absolute_url(url, domain).to_lowercase();
    let title = title.to_lowercase();

    if is_homepage(&url) {
        return Category::Homepage;
    }

    KEYWORD_RULES
        .iter()
        .find(|(_, keywords)| {
            keywords
                .iter()
                .any(|kw| url.contains(kw) || title.contains(kw))
        })
        .map(|(category, _)| *category)
        .unwrap_or(Category::General)
}

// "https://acme.com/" splits into 4 parts; anything deeper is not a homepage.
fn is_homepage(url: &str) -> bool {
    url.ends_with('/') && url.split('/').count() <= 4
}
