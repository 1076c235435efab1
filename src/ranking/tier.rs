//! Business-value tiers.
//!
//! A second, independent rule set next to [`Category`](super::Category): each
//! page lands in one business-intelligence class, and each class belongs to a
//! tier from 1 (most valuable) to 6. Pages that match nothing are tier 7.

use std::fmt;

use serde::{Deserialize, Serialize};

pub const UNCLASSIFIED_TIER: u8 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BiClass {
    Careers,
    Services,
    Products,
    About,
    Team,
    News,
    Locations,
    Contact,
    CaseStudies,
    Industries,
    Investors,
    Legal,
    Unclassified,
}

struct TierRule {
    class: BiClass,
    tier: u8,
    note: &'static str,
    url_patterns: &'static [&'static str],
    title_patterns: &'static [&'static str],
}

// Order matters: rules are tried top to bottom, URL patterns before title
// patterns within each rule.
const TIER_RULES: &[TierRule] = &[
    TierRule {
        class: BiClass::Careers,
        tier: 1,
        note: "Hiring activity, growth indicators, business expansion signals",
        url_patterns: &["/careers", "/jobs", "/employment", "/opportunities", "/hiring", "/work-with-us", "/join-us"],
        title_patterns: &["careers", "jobs", "employment", "opportunities", "join us", "work with us", "hiring", "open positions"],
    },
    TierRule {
        class: BiClass::Services,
        tier: 1,
        note: "Revenue streams, core competencies, competitive positioning",
        url_patterns: &["/services", "/solutions", "/offerings", "/capabilities", "/expertise", "/what-we-do"],
        title_patterns: &["services", "solutions", "what we do", "capabilities", "offerings", "expertise"],
    },
    TierRule {
        class: BiClass::Products,
        tier: 1,
        note: "Product portfolio, market focus, innovation pipeline",
        url_patterns: &["/products", "/catalog", "/portfolio", "/brands", "/shop"],
        title_patterns: &["products", "catalog", "portfolio", "brands", "offerings", "shop"],
    },
    TierRule {
        class: BiClass::About,
        tier: 1,
        note: "Mission, history, size, business model, values",
        url_patterns: &["/about", "/company", "/who-we-are", "/overview", "/our-story"],
        title_patterns: &["about", "company", "who we are", "overview", "our story", "about us"],
    },
    TierRule {
        class: BiClass::Team,
        tier: 2,
        note: "Leadership depth, expertise, company culture, decision makers",
        url_patterns: &["/team", "/leadership", "/people", "/staff", "/management", "/executives", "/board", "/founders"],
        title_patterns: &[
            "team", "leadership", "people", "staff", "management", "executives", "our team", "meet the team",
            "board of directors", "founders",
        ],
    },
    TierRule {
        class: BiClass::News,
        tier: 2,
        note: "Market activity, thought leadership, PR activity, company momentum",
        url_patterns: &["/news", "/blog", "/insights", "/updates", "/press", "/media", "/articles", "/resources"],
        title_patterns: &[
            "news", "blog", "insights", "updates", "press releases", "media", "articles", "thought leadership",
            "resources",
        ],
    },
    TierRule {
        class: BiClass::Locations,
        tier: 3,
        note: "Market reach, geographic expansion, operational footprint",
        url_patterns: &["/locations", "/offices", "/facilities", "/branches", "/stores", "/find-us"],
        title_patterns: &["locations", "offices", "facilities", "branches", "stores", "find us", "where we are"],
    },
    TierRule {
        class: BiClass::Contact,
        tier: 3,
        note: "Geographic presence, contact channels, business accessibility",
        url_patterns: &["/contact", "/reach-us", "/get-in-touch", "/connect"],
        title_patterns: &["contact", "reach us", "get in touch", "contact us", "connect"],
    },
    TierRule {
        class: BiClass::CaseStudies,
        tier: 4,
        note: "Client quality, project scale, market positioning, success metrics",
        url_patterns: &["/case-studies", "/portfolio", "/work", "/projects", "/clients", "/success-stories", "/testimonials"],
        title_patterns: &["case studies", "portfolio", "our work", "projects", "success stories", "client stories", "testimonials"],
    },
    TierRule {
        class: BiClass::Industries,
        tier: 4,
        note: "Market segments, vertical expertise, industry positioning",
        url_patterns: &["/industries", "/sectors", "/markets", "/verticals", "/who-we-serve"],
        title_patterns: &["industries", "sectors", "markets", "verticals", "who we serve", "market focus"],
    },
    TierRule {
        class: BiClass::Investors,
        tier: 5,
        note: "Financial health, public company status, growth metrics",
        url_patterns: &["/investors", "/investor-relations", "/financials", "/sec-filings", "/earnings"],
        title_patterns: &["investors", "investor relations", "financials", "sec filings", "earnings"],
    },
    TierRule {
        class: BiClass::Legal,
        tier: 6,
        note: "Compliance status (minimal business intelligence)",
        url_patterns: &["/terms", "/privacy", "/legal", "/compliance", "/gdpr", "/ccpa", "/cookies"],
        title_patterns: &["terms", "privacy", "legal", "compliance", "gdpr", "ccpa", "cookie policy"],
    },
];

const UNCLASSIFIED_NOTE: &str = "Unknown business intelligence value";

impl BiClass {
    pub fn as_str(self) -> &'static str {
        match self {
            BiClass::Careers => "careers",
            BiClass::Services => "services",
            BiClass::Products => "products",
            BiClass::About => "about",
            BiClass::Team => "team",
            BiClass::News => "news",
            BiClass::Locations => "locations",
            BiClass::Contact => "contact",
            BiClass::CaseStudies => "case-studies",
            BiClass::Industries => "industries",
            BiClass::Investors => "investors",
            BiClass::Legal => "legal",
            BiClass::Unclassified => "unclassified",
        }
    }
}

impl fmt::Display for BiClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Class, tier and a short note on what the page tells about the business.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TierMatch {
    pub class: BiClass,
    pub tier: u8,
    pub intelligence: &'static str,
}

impl TierMatch {
    pub const UNCLASSIFIED: TierMatch = TierMatch {
        class: BiClass::Unclassified,
        tier: UNCLASSIFIED_TIER,
        intelligence: UNCLASSIFIED_NOTE,
    };
}

/// First rule whose URL or title pattern occurs in the page. Case-insensitive.
pub fn classify_tier(url: &str, title: Option<&str>) -> TierMatch {
    let url = url.to_lowercase();
    let title = title.unwrap_or_default().to_lowercase();

    TIER_RULES
        .iter()
        .find(|rule| {
            rule.url_patterns.iter().any(|p| url.contains(p))
                || rule.title_patterns.iter().any(|p| title.contains(p))
        })
        .map(|rule| TierMatch {
            class: rule.class,
            tier: rule.tier,
            intelligence: rule.note,
        })
        .unwrap_or(TierMatch::UNCLASSIFIED)
}

/// Heading used when printing a tier.
pub fn tier_name(tier: i64) -> String {
    match tier {
        1 => "Tier 1 - critical".into(),
        2 => "Tier 2 - high value".into(),
        3 => "Tier 3 - operations".into(),
        4 => "Tier 4 - market intel".into(),
        5 => "Tier 5 - financial".into(),
        6 => "Tier 6 - administrative".into(),
        n => format!("Tier {n}"),
    }
}
