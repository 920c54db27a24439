use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fixed page size for every list request.
pub const PAGE_SIZE: u32 = 25;

pub const REGIONS: &[&str] = &[
    "NA", "EUW", "EUNE", "KR", "JP", "BR", "LAN", "LAS", "OCE", "TR", "RU", "TW",
];

pub const LANGUAGES: &[&str] = &["korean", "chinese"];

pub type ItemId = i64;

/// A ranked leaderboard entry as served by the remote list endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Item {
    pub id: ItemId,
    pub username: String,
    pub translation: String,
    #[serde(default)]
    pub transliteration: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
    pub region: String,
    pub language: String,
    #[serde(default)]
    pub rank: Option<String>,
    #[serde(default)]
    pub top_champions: Vec<String>,
    #[serde(rename = "riot_verified", default)]
    pub verified: bool,
    pub upvotes: u32,
    pub downvotes: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub first_seen: Option<DateTime<Utc>>,
}

impl Item {
    /// Net score; never stored, always derived from the tallies.
    pub fn score(&self) -> i64 {
        i64::from(self.upvotes) - i64::from(self.downvotes)
    }

    pub fn tally(&self) -> VoteTally {
        VoteTally {
            upvotes: self.upvotes,
            downvotes: self.downvotes,
        }
    }

    /// Copy of this item carrying the given tallies.
    pub fn with_tally(&self, tally: VoteTally) -> Item {
        Item {
            upvotes: tally.upvotes,
            downvotes: tally.downvotes,
            ..self.clone()
        }
    }

    /// Short relative age such as "5m ago" or "3d ago".
    pub fn age_label(&self, now: DateTime<Utc>) -> String {
        let seconds = (now - self.created_at).num_seconds().max(0);
        match seconds {
            0..=59 => "just now".to_string(),
            60..=3_599 => format!("{}m ago", seconds / 60),
            3_600..=86_399 => format!("{}h ago", seconds / 3_600),
            86_400..=2_591_999 => format!("{}d ago", seconds / 86_400),
            _ => format!("{}mo ago", seconds / 2_592_000),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortMode {
    #[default]
    Hot,
    New,
    Top,
}

impl SortMode {
    pub const ALL: [SortMode; 3] = [SortMode::Hot, SortMode::New, SortMode::Top];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortMode::Hot => "hot",
            SortMode::New => "new",
            SortMode::Top => "top",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SortMode::Hot => "Hot",
            SortMode::New => "New",
            SortMode::Top => "Top",
        }
    }
}

/// Time window; only meaningful for `SortMode::Top`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Period {
    Hour,
    Day,
    #[default]
    Week,
    Month,
    Year,
    All,
}

impl Period {
    pub const ALL: [Period; 6] = [
        Period::Hour,
        Period::Day,
        Period::Week,
        Period::Month,
        Period::Year,
        Period::All,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Hour => "hour",
            Period::Day => "day",
            Period::Week => "week",
            Period::Month => "month",
            Period::Year => "year",
            Period::All => "all",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Period::Hour => "Hour",
            Period::Day => "Day",
            Period::Week => "Week",
            Period::Month => "Month",
            Period::Year => "Year",
            Period::All => "All",
        }
    }
}

/// Identifies one cacheable result set.
///
/// Built through [`QueryKey::new`] so that keys which request the same data
/// compare equal: the period is dropped unless the sort is `Top`, empty
/// filters collapse to "all", and the page is clamped to at least 1.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    sort: SortMode,
    period: Option<Period>,
    region: Option<String>,
    language: Option<String>,
    page: u32,
}

impl QueryKey {
    pub fn new(
        sort: SortMode,
        period: Period,
        region: Option<&str>,
        language: Option<&str>,
        page: u32,
    ) -> Self {
        let normalize = |value: Option<&str>| {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("all"))
                .map(str::to_string)
        };
        Self {
            sort,
            period: (sort == SortMode::Top).then_some(period),
            region: normalize(region),
            language: normalize(language),
            page: page.max(1),
        }
    }

    pub fn sort(&self) -> SortMode {
        self.sort
    }

    pub fn period(&self) -> Option<Period> {
        self.period
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    /// Same filters, different page.
    pub fn with_page(&self, page: u32) -> Self {
        Self {
            page: page.max(1),
            ..self.clone()
        }
    }

    /// Request parameters for the list endpoint, in wire order.
    pub fn query_params(&self, limit: u32) -> Vec<(&'static str, String)> {
        let mut params = vec![("sort", self.sort.as_str().to_string())];
        if let Some(period) = self.period {
            params.push(("period", period.as_str().to_string()));
        }
        if let Some(region) = &self.region {
            params.push(("region", region.clone()));
        }
        if let Some(language) = &self.language {
            params.push(("language", language.clone()));
        }
        params.push(("page", self.page.to_string()));
        params.push(("limit", limit.to_string()));
        params
    }
}

impl Default for QueryKey {
    fn default() -> Self {
        Self::new(SortMode::Hot, Period::Week, None, None, 1)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sort.as_str())?;
        if let Some(period) = self.period {
            write!(f, "/{}", period.as_str())?;
        }
        write!(
            f,
            " region={} language={} page={}",
            self.region.as_deref().unwrap_or("all"),
            self.language.as_deref().unwrap_or("all"),
            self.page
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
}

impl Pagination {
    pub fn total_pages(&self) -> u32 {
        if self.limit == 0 {
            return 0;
        }
        let pages = self.total.div_ceil(u64::from(self.limit));
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    /// Pagination controls are only useful past a single page.
    pub fn needs_controls(&self) -> bool {
        self.total > u64::from(self.limit)
    }
}

/// One fetched page. Items are shared so that a patch only allocates the
/// entry it changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResult {
    pub items: Vec<Arc<Item>>,
    pub pagination: Pagination,
}

impl PageResult {
    pub fn new(items: Vec<Item>, pagination: Pagination) -> Self {
        Self {
            items: items.into_iter().map(Arc::new).collect(),
            pagination,
        }
    }

    pub fn item(&self, id: ItemId) -> Option<&Arc<Item>> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Body of the list endpoint.
#[derive(Debug, Deserialize)]
pub struct ListResponse {
    pub data: Vec<Item>,
    pub pagination: Pagination,
}

impl From<ListResponse> for PageResult {
    fn from(response: ListResponse) -> Self {
        PageResult::new(response.data, response.pagination)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoteDirection {
    Up,
    Down,
}

impl VoteDirection {
    pub fn as_wire(&self) -> i8 {
        match self {
            VoteDirection::Up => 1,
            VoteDirection::Down => -1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct VoteTally {
    pub upvotes: u32,
    pub downvotes: u32,
}

impl VoteTally {
    /// A vote only ever increments the counter in its own direction.
    pub fn apply(self, direction: VoteDirection) -> VoteTally {
        match direction {
            VoteDirection::Up => VoteTally {
                upvotes: self.upvotes.saturating_add(1),
                ..self
            },
            VoteDirection::Down => VoteTally {
                downvotes: self.downvotes.saturating_add(1),
                ..self
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VoteRequest {
    pub vote: i8,
}

#[derive(Debug, Serialize)]
pub struct FeedbackRequest<'a> {
    pub text: &'a str,
}

/// A feedback submission as listed on the admin feed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedbackRecord {
    pub id: i64,
    pub translation_id: ItemId,
    pub username: String,
    pub translation: String,
    pub feedback_text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedbackPage {
    pub data: Vec<FeedbackRecord>,
    pub pagination: Pagination,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_key_drops_period_unless_top() {
        let hot_week = QueryKey::new(SortMode::Hot, Period::Week, None, None, 1);
        let hot_day = QueryKey::new(SortMode::Hot, Period::Day, None, None, 1);
        assert_eq!(hot_week, hot_day);
        assert_eq!(hot_week.period(), None);

        let top_week = QueryKey::new(SortMode::Top, Period::Week, None, None, 1);
        let top_day = QueryKey::new(SortMode::Top, Period::Day, None, None, 1);
        assert_ne!(top_week, top_day);
    }

    #[test]
    fn test_key_normalizes_filters_and_page() {
        let key = QueryKey::new(SortMode::New, Period::All, Some(""), Some("all"), 0);
        assert_eq!(key.region(), None);
        assert_eq!(key.language(), None);
        assert_eq!(key.page(), 1);
        assert_eq!(key, QueryKey::new(SortMode::New, Period::All, None, None, 1));
    }

    #[test]
    fn test_with_page_keeps_filters() {
        let key = QueryKey::new(SortMode::Top, Period::Day, Some("EUW"), Some("korean"), 1);
        let next = key.with_page(2);
        assert_eq!(next.sort(), SortMode::Top);
        assert_eq!(next.period(), Some(Period::Day));
        assert_eq!(next.region(), Some("EUW"));
        assert_eq!(next.page(), 2);
        assert_eq!(key.with_page(0).page(), 1);
        assert_ne!(key, next);
    }

    #[test]
    fn test_query_params() {
        let key = QueryKey::new(SortMode::Top, Period::Month, Some("KR"), None, 3);
        let params = key.query_params(PAGE_SIZE);
        assert_eq!(
            params,
            vec![
                ("sort", "top".to_string()),
                ("period", "month".to_string()),
                ("region", "KR".to_string()),
                ("page", "3".to_string()),
                ("limit", "25".to_string()),
            ]
        );

        let hot = QueryKey::new(SortMode::Hot, Period::Month, None, Some("korean"), 1);
        assert!(hot.query_params(PAGE_SIZE).iter().all(|(k, _)| *k != "period"));
    }

    #[test]
    fn test_vote_never_touches_opposite_tally() {
        let tally = VoteTally {
            upvotes: 10,
            downvotes: 2,
        };
        assert_eq!(
            tally.apply(VoteDirection::Up),
            VoteTally {
                upvotes: 11,
                downvotes: 2
            }
        );
        assert_eq!(
            tally.apply(VoteDirection::Down),
            VoteTally {
                upvotes: 10,
                downvotes: 3
            }
        );
    }

    #[test]
    fn test_pagination_pages() {
        let pagination = Pagination {
            page: 2,
            limit: 25,
            total: 51,
        };
        assert_eq!(pagination.total_pages(), 3);
        assert!(pagination.has_prev());
        assert!(pagination.has_next());
        assert!(pagination.needs_controls());

        let single = Pagination {
            page: 1,
            limit: 25,
            total: 25,
        };
        assert_eq!(single.total_pages(), 1);
        assert!(!single.has_next());
        assert!(!single.needs_controls());
    }

    #[test]
    fn test_parse_list_response() {
        let body = r#"{
            "data": [{
                "id": 7,
                "username": "바람",
                "transliteration": "baram",
                "translation": "Wind",
                "language": "korean",
                "region": "KR",
                "riot_verified": true,
                "rank": "GOLD",
                "top_champions": ["Ahri", "Yasuo"],
                "upvotes": 10,
                "downvotes": 2,
                "score": 3.2,
                "created_at": "2025-01-02T03:04:05Z",
                "first_seen": "2025-01-01T00:00:00Z"
            }],
            "pagination": {"page": 1, "limit": 25, "total": 1}
        }"#;
        let response: ListResponse = serde_json::from_str(body).unwrap();
        let page = PageResult::from(response);
        let item = page.item(7).unwrap();
        assert_eq!(item.score(), 8);
        assert!(item.verified);
        assert_eq!(item.explanation, None);
        assert_eq!(item.top_champions, vec!["Ahri", "Yasuo"]);
        assert_eq!(page.pagination.total, 1);
    }

    #[test]
    fn test_age_label() {
        let created = "2025-01-02T03:04:05Z".parse::<DateTime<Utc>>().unwrap();
        let item = Item {
            id: 1,
            username: "a".to_string(),
            translation: "b".to_string(),
            transliteration: None,
            explanation: None,
            region: "NA".to_string(),
            language: "korean".to_string(),
            rank: None,
            top_champions: Vec::new(),
            verified: false,
            upvotes: 0,
            downvotes: 0,
            created_at: created,
            first_seen: None,
        };
        assert_eq!(item.age_label(created + Duration::seconds(5)), "just now");
        assert_eq!(item.age_label(created + Duration::minutes(5)), "5m ago");
        assert_eq!(item.age_label(created + Duration::hours(3)), "3h ago");
        assert_eq!(item.age_label(created + Duration::days(2)), "2d ago");
    }
}
