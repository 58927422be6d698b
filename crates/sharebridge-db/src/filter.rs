//! Shared search plumbing for listings and requests: WHERE-clause
//! building, pagination and proximity ranking.

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use uuid::Uuid;

use sharebridge_types::geo::{BoundingBox, Point};
use sharebridge_types::models::{Category, DonationRequest, Listing};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// 1-based page number plus page size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    /// Clamps caller input into a valid window.
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> u32 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Proximity {
    pub center: Point,
    pub radius_km: f64,
}

pub struct SearchFilter<S> {
    pub category: Option<Category>,
    pub status: Option<S>,
    pub owner_id: Option<Uuid>,
    pub text: Option<String>,
    pub near: Option<Proximity>,
    pub page: PageRequest,
}

impl<S> Default for SearchFilter<S> {
    fn default() -> Self {
        Self {
            category: None,
            status: None,
            owner_id: None,
            text: None,
            near: None,
            page: PageRequest::default(),
        }
    }
}

/// Conjunction of conditions with positional `?` parameters.
#[derive(Default)]
pub(crate) struct WhereClause {
    conditions: Vec<String>,
    pub(crate) params: Vec<Value>,
}

impl WhereClause {
    pub(crate) fn push(&mut self, condition: impl Into<String>, params: impl IntoIterator<Item = Value>) {
        self.conditions.push(condition.into());
        self.params.extend(params);
    }

    pub(crate) fn sql(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.conditions.join(" AND "))
        }
    }

    /// Conditions common to listing and request searches. `alias` is the
    /// table alias used in the surrounding query.
    pub(crate) fn for_search(
        alias: &str,
        category: Option<Category>,
        status: Option<&str>,
        owner_id: Option<Uuid>,
        text: Option<&str>,
        near: Option<&Proximity>,
    ) -> Self {
        let mut clause = Self::default();
        if let Some(category) = category {
            clause.push(format!("{alias}.category = ?"), [Value::Text(category.as_str().into())]);
        }
        if let Some(status) = status {
            clause.push(format!("{alias}.status = ?"), [Value::Text(status.into())]);
        }
        if let Some(owner_id) = owner_id {
            clause.push(format!("{alias}.user_id = ?"), [Value::Text(owner_id.to_string())]);
        }
        if let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) {
            let pattern = like_pattern(text);
            clause.push(
                format!(
                    "(casefold({alias}.title) LIKE ? ESCAPE '\\' OR casefold({alias}.description) LIKE ? ESCAPE '\\')"
                ),
                [Value::Text(pattern.clone()), Value::Text(pattern)],
            );
        }
        if let Some(near) = near {
            let bbox = BoundingBox::around(&near.center, near.radius_km);
            clause.push(
                format!("{alias}.latitude BETWEEN ? AND ? AND {alias}.longitude BETWEEN ? AND ?"),
                [
                    Value::Real(bbox.min_lat),
                    Value::Real(bbox.max_lat),
                    Value::Real(bbox.min_lng),
                    Value::Real(bbox.max_lng),
                ],
            );
        }
        clause
    }
}

/// Lowercased `%text%` with LIKE wildcards escaped. Match it against
/// `casefold(column)`, not SQLite's ASCII-only `LOWER`.
pub(crate) fn like_pattern(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 2);
    escaped.push('%');
    for c in text.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Anything with an optional stored point that can carry a computed distance.
pub(crate) trait Located {
    fn location(&self) -> Option<Point>;
    fn created_at(&self) -> DateTime<Utc>;
    fn set_distance(&mut self, km: f64);
}

impl Located for Listing {
    fn location(&self) -> Option<Point> {
        self.location
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
    fn set_distance(&mut self, km: f64) {
        self.distance_km = Some(km);
    }
}

impl Located for DonationRequest {
    fn location(&self) -> Option<Point> {
        self.location
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
    fn set_distance(&mut self, km: f64) {
        self.distance_km = Some(km);
    }
}

/// Exact radius filter over bounding-box candidates, nearest first (newest
/// first on ties), then cut to the requested page. Returns the page and the
/// total number of hits.
pub(crate) fn rank_by_distance<T: Located>(
    candidates: Vec<T>,
    near: &Proximity,
    page: &PageRequest,
) -> (Vec<T>, u64) {
    let mut hits: Vec<(f64, T)> = candidates
        .into_iter()
        .filter_map(|item| {
            let distance = item.location()?.distance_km(&near.center);
            (distance <= near.radius_km).then_some((distance, item))
        })
        .collect();

    hits.sort_by(|(da, a), (db, b)| {
        da.total_cmp(db)
            .then_with(|| b.created_at().cmp(&a.created_at()))
    });

    let total = hits.len() as u64;
    let items = hits
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit as usize)
        .map(|(distance, mut item)| {
            item.set_distance(distance);
            item
        })
        .collect();

    (items, total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sharebridge_types::models::ListingStatus;

    fn listing_at(title: &str, location: Option<Point>, age_secs: i64) -> Listing {
        let created_at = Utc::now() - chrono::Duration::seconds(age_secs);
        Listing {
            id: Uuid::new_v4(),
            owner_id: Uuid::nil(),
            owner_name: "owner".into(),
            title: title.into(),
            description: String::new(),
            category: Category::Food,
            status: ListingStatus::Active,
            image_url: None,
            address: None,
            location,
            distance_km: None,
            created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn page_request_clamps_input() {
        assert_eq!(PageRequest::new(None, None), PageRequest { page: 1, limit: DEFAULT_PAGE_SIZE });
        assert_eq!(PageRequest::new(Some(0), Some(0)), PageRequest { page: 1, limit: 1 });
        assert_eq!(PageRequest::new(Some(3), Some(500)).limit, MAX_PAGE_SIZE);
        assert_eq!(PageRequest::new(Some(3), Some(10)).offset(), 20);
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("Baby_Food"), "%baby\\_food%");
        assert_eq!(like_pattern("100%"), "%100\\%%");
        assert_eq!(like_pattern("ÉCOLE"), "%école%");
    }

    #[test]
    fn where_clause_collects_params_in_order() {
        let clause = WhereClause::for_search(
            "l",
            Some(Category::Books),
            Some("ACTIVE"),
            None,
            Some("  novel "),
            None,
        );
        assert_eq!(
            clause.sql(),
            "WHERE l.category = ? AND l.status = ? AND (casefold(l.title) LIKE ? ESCAPE '\\' OR casefold(l.description) LIKE ? ESCAPE '\\')"
        );
        assert_eq!(clause.params.len(), 4);
        assert_eq!(clause.params[2], Value::Text("%novel%".into()));
    }

    #[test]
    fn empty_clause_renders_nothing() {
        let clause = WhereClause::for_search("r", None, None, None, Some("   "), None);
        assert_eq!(clause.sql(), "");
        assert!(clause.params.is_empty());
    }

    #[test]
    fn ranks_nearest_first_and_drops_out_of_radius() {
        let center = Point::new(12.9716, 77.5946).unwrap();
        let near = Proximity { center, radius_km: 5.0 };
        let candidates = vec![
            listing_at("far", Some(Point::new(13.05, 77.59).unwrap()), 0),
            listing_at("closest", Some(Point::new(12.972, 77.595).unwrap()), 0),
            listing_at("middle", Some(Point::new(12.99, 77.60).unwrap()), 0),
            listing_at("nowhere", None, 0),
        ];

        let (items, total) = rank_by_distance(candidates, &near, &PageRequest::default());
        assert_eq!(total, 2);
        let titles: Vec<_> = items.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, ["closest", "middle"]);
        assert!(items.iter().all(|l| l.distance_km.unwrap() <= 5.0));
    }

    #[test]
    fn ranking_paginates_after_sorting() {
        let center = Point::new(0.0, 0.0).unwrap();
        let near = Proximity { center, radius_km: 100.0 };
        let candidates = (0..5)
            .map(|i| listing_at(&i.to_string(), Some(Point::new(0.0, 0.1 * i as f64).unwrap()), 0))
            .collect();

        let (items, total) = rank_by_distance(candidates, &near, &PageRequest::new(Some(2), Some(2)));
        assert_eq!(total, 5);
        let titles: Vec<_> = items.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, ["2", "3"]);
    }

    #[test]
    fn equal_distance_prefers_newest() {
        let spot = Point::new(1.0, 1.0).unwrap();
        let near = Proximity { center: spot, radius_km: 1.0 };
        let candidates = vec![listing_at("old", Some(spot), 600), listing_at("new", Some(spot), 0)];
        let (items, _) = rank_by_distance(candidates, &near, &PageRequest::default());
        assert_eq!(items[0].title, "new");
    }
}
