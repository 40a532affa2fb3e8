//! Search request model: free text, typed filter predicates, sort key and
//! page selection.
//!
//! Requests usually arrive as web-style parameters (`price_max=450000000`,
//! `pets=1`, `sort=price_asc`). [`SearchQuery::from_params`] validates them
//! up front: a filter value that does not parse is a rejected request, never
//! a silently dropped filter.

use crate::config::SearchConfig;
use crate::error::{SearchError, SearchResult};
use crate::types::Record;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Fields a predicate can filter on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterField {
    Price,
    Area,
    Rooms,
    Bathrooms,
    ParkingSpaces,
    PropertyType,
    PetsAllowed,
    Furnished,
}

impl FilterField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::Area => "area",
            Self::Rooms => "rooms",
            Self::Bathrooms => "bathrooms",
            Self::ParkingSpaces => "parking_spaces",
            Self::PropertyType => "property_type",
            Self::PetsAllowed => "pets_allowed",
            Self::Furnished => "furnished",
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::Price | Self::Area | Self::Rooms | Self::Bathrooms | Self::ParkingSpaces
        )
    }

    fn is_count(&self) -> bool {
        matches!(self, Self::Rooms | Self::Bathrooms | Self::ParkingSpaces)
    }

    fn numeric_value(&self, record: &Record) -> Option<f64> {
        match self {
            Self::Price => record.price.map(|p| p as f64),
            Self::Area => record.area_m2,
            Self::Rooms => record.rooms.map(f64::from),
            Self::Bathrooms => record.bathrooms.map(f64::from),
            Self::ParkingSpaces => record.parking_spaces.map(f64::from),
            _ => None,
        }
    }
}

impl fmt::Display for FilterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Gt,
    Gte,
    Lte,
    Lt,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Number(f64),
    Bool(bool),
    Text(String),
}

/// A validated `(field, operator, value)` filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Predicate {
    field: FilterField,
    op: FilterOp,
    value: FilterValue,
}

impl Predicate {
    /// Builds a predicate, rejecting values whose type or range does not
    /// suit the field.
    pub fn new(field: FilterField, op: FilterOp, value: FilterValue) -> SearchResult<Self> {
        let reject = |reason: &str| {
            Err(SearchError::invalid_filter(
                field.as_str(),
                value_text(&value),
                reason,
            ))
        };

        match (&value, field) {
            (FilterValue::Number(n), f) if f.is_numeric() => {
                if !n.is_finite() || *n < 0.0 {
                    return reject("expected a non-negative number");
                }
                if f.is_count() && n.fract() != 0.0 {
                    return reject("expected a whole number");
                }
            }
            (FilterValue::Text(t), FilterField::PropertyType) => {
                if op != FilterOp::Eq {
                    return reject("property type only supports equality");
                }
                if t.trim().is_empty() {
                    return reject("expected a property type");
                }
            }
            (FilterValue::Bool(_), FilterField::PetsAllowed | FilterField::Furnished) => {
                if op != FilterOp::Eq {
                    return reject("boolean filters only support equality");
                }
            }
            _ => return reject("value type does not match the field"),
        }

        Ok(Self { field, op, value })
    }

    pub fn field(&self) -> FilterField {
        self.field
    }

    pub fn op(&self) -> FilterOp {
        self.op
    }

    pub fn value(&self) -> &FilterValue {
        &self.value
    }

    /// Records missing the filtered attribute never match.
    pub fn matches(&self, record: &Record) -> bool {
        match (&self.value, self.field) {
            (FilterValue::Number(target), field) => {
                let Some(actual) = field.numeric_value(record) else {
                    return false;
                };
                match self.op {
                    FilterOp::Eq => actual == *target,
                    FilterOp::Gt => actual > *target,
                    FilterOp::Gte => actual >= *target,
                    FilterOp::Lte => actual <= *target,
                    FilterOp::Lt => actual < *target,
                }
            }
            (FilterValue::Text(target), FilterField::PropertyType) => record
                .property_type
                .as_deref()
                .is_some_and(|t| t.trim().to_lowercase() == target.trim().to_lowercase()),
            (FilterValue::Bool(target), FilterField::PetsAllowed) => {
                record.pets_allowed == Some(*target)
            }
            (FilterValue::Bool(target), FilterField::Furnished) => {
                record.furnished == Some(*target)
            }
            _ => false,
        }
    }
}

fn value_text(value: &FilterValue) -> String {
    match value {
        FilterValue::Number(n) => n.to_string(),
        FilterValue::Bool(b) => b.to_string(),
        FilterValue::Text(t) => t.clone(),
    }
}

/// Explicit result orderings. Records missing the sort attribute go last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    PriceAsc,
    PriceDesc,
    AreaAsc,
    AreaDesc,
    Recent,
}

impl SortKey {
    /// Parses a sort parameter. Unknown keys yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "price_asc" => Some(Self::PriceAsc),
            "price_desc" => Some(Self::PriceDesc),
            "area_asc" => Some(Self::AreaAsc),
            "area_desc" => Some(Self::AreaDesc),
            "recent" => Some(Self::Recent),
            "precio_asc" => Some(Self::PriceAsc),
            "precio_desc" => Some(Self::PriceDesc),
            "recientes" => Some(Self::Recent),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PriceAsc => "price_asc",
            Self::PriceDesc => "price_desc",
            Self::AreaAsc => "area_asc",
            Self::AreaDesc => "area_desc",
            Self::Recent => "recent",
        }
    }

    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        match self {
            Self::PriceAsc => missing_last(a.price, b.price, |x, y| x.cmp(&y)),
            Self::PriceDesc => missing_last(a.price, b.price, |x, y| y.cmp(&x)),
            Self::AreaAsc => missing_last(a.area_m2, b.area_m2, |x, y| x.total_cmp(&y)),
            Self::AreaDesc => missing_last(a.area_m2, b.area_m2, |x, y| y.total_cmp(&x)),
            Self::Recent => missing_last(a.created_at, b.created_at, |x, y| y.cmp(&x)),
        }
    }
}

fn missing_last<T>(a: Option<T>, b: Option<T>, cmp: impl Fn(T, T) -> Ordering) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => cmp(x, y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// A complete search request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchQuery {
    pub text: Option<String>,
    pub predicates: Vec<Predicate>,
    pub sort: Option<SortKey>,
    /// 1-based page number requested
    pub page: usize,
    pub page_size: usize,
}

impl SearchQuery {
    pub fn new(page_size: usize) -> Self {
        Self {
            text: None,
            predicates: Vec::new(),
            sort: None,
            page: 1,
            page_size: page_size.max(1),
        }
    }

    /// Sets the free-text query. Blank text means no text query.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        let trimmed = text.trim();
        self.text = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn with_sort(mut self, sort: SortKey) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_page(mut self, page: usize) -> Self {
        self.page = page.max(1);
        self
    }

    /// Parses web-style request parameters.
    ///
    /// Recognized keys: `q` (alias `search`), `price_min`, `price_max`,
    /// `rooms`, `bathrooms`, `parking_spaces`, `area_min`, `area_max`,
    /// `type`, `garage`, `pets`, `furnished`, `sort`, `page`, `page_size`.
    /// The Spanish names of the listing site (`precio_min`, `precio_max`,
    /// `tipo`, `garaje`, `mascotas`, `amoblado`, `orden`) are accepted too.
    /// Empty values and unknown keys are ignored.
    pub fn from_params<I, K, V>(params: I, config: &SearchConfig) -> SearchResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut query = Self::new(config.page_size);

        for (key, value) in params {
            let key = key.as_ref();
            let value = value.as_ref().trim();
            if value.is_empty() {
                continue;
            }

            match key {
                "q" | "search" => query = query.with_text(value),
                "price_min" | "precio_min" => {
                    query.push_number(key, FilterField::Price, FilterOp::Gte, value)?
                }
                "price_max" | "precio_max" => {
                    query.push_number(key, FilterField::Price, FilterOp::Lte, value)?
                }
                "area_min" => query.push_number(key, FilterField::Area, FilterOp::Gte, value)?,
                "area_max" => query.push_number(key, FilterField::Area, FilterOp::Lte, value)?,
                "rooms" => query.push_number(key, FilterField::Rooms, FilterOp::Eq, value)?,
                "bathrooms" => {
                    query.push_number(key, FilterField::Bathrooms, FilterOp::Eq, value)?
                }
                "parking_spaces" => {
                    query.push_number(key, FilterField::ParkingSpaces, FilterOp::Eq, value)?
                }
                "type" | "tipo" => query.predicates.push(Predicate::new(
                    FilterField::PropertyType,
                    FilterOp::Eq,
                    FilterValue::Text(value.to_string()),
                )?),
                "garage" | "garaje" if value == "1" => query.predicates.push(Predicate::new(
                    FilterField::ParkingSpaces,
                    FilterOp::Gt,
                    FilterValue::Number(0.0),
                )?),
                "pets" | "mascotas" if value == "1" => query.predicates.push(Predicate::new(
                    FilterField::PetsAllowed,
                    FilterOp::Eq,
                    FilterValue::Bool(true),
                )?),
                "furnished" | "amoblado" if value == "1" => query.predicates.push(Predicate::new(
                    FilterField::Furnished,
                    FilterOp::Eq,
                    FilterValue::Bool(true),
                )?),
                "sort" | "orden" => query.sort = SortKey::parse(value),
                "page" => query.page = value.parse::<usize>().unwrap_or(1).max(1),
                "page_size" => {
                    query.page_size = value
                        .parse::<usize>()
                        .ok()
                        .filter(|&n| n > 0)
                        .unwrap_or(config.page_size)
                        .clamp(1, config.max_page_size.max(1));
                }
                _ => {}
            }
        }

        Ok(query)
    }

    /// Parses a URL query string such as `q=casa&price_max=500000000`.
    pub fn from_query_string(query: &str, config: &SearchConfig) -> SearchResult<Self> {
        Self::from_params(Self::parse_pairs(query)?, config)
    }

    /// Splits a URL query string into decoded key/value pairs. A leading
    /// `?` is allowed.
    pub fn parse_pairs(query: &str) -> SearchResult<Vec<(String, String)>> {
        serde_urlencoded::from_str(query.trim_start_matches('?')).map_err(|e| {
            SearchError::invalid_filter("query", query, format!("malformed query string: {e}"))
        })
    }

    fn push_number(
        &mut self,
        param: &str,
        field: FilterField,
        op: FilterOp,
        raw: &str,
    ) -> SearchResult<()> {
        let number = raw
            .parse::<f64>()
            .map_err(|_| SearchError::invalid_filter(param, raw, "expected a number"))?;
        let predicate = Predicate::new(field, op, FilterValue::Number(number)).map_err(|e| {
            match e {
                SearchError::InvalidFilterValue { reason, .. } => {
                    SearchError::invalid_filter(param, raw, reason)
                }
                other => other,
            }
        })?;
        self.predicates.push(predicate);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RecordId;

    fn config() -> SearchConfig {
        SearchConfig::default()
    }

    fn record(price: Option<u64>, rooms: Option<u32>) -> Record {
        let mut record = Record::new(RecordId(1));
        record.price = price;
        record.rooms = rooms;
        record
    }

    #[test]
    fn test_from_params_builds_predicates() {
        let query = SearchQuery::from_params(
            [
                ("q", " casa con piscina "),
                ("price_max", "500000000"),
                ("rooms", "3"),
                ("garage", "1"),
                ("pets", "1"),
                ("type", "House"),
                ("sort", "price_asc"),
                ("page", "2"),
            ],
            &config(),
        )
        .unwrap();

        assert_eq!(query.text.as_deref(), Some("casa con piscina"));
        assert_eq!(query.predicates.len(), 5);
        assert_eq!(query.sort, Some(SortKey::PriceAsc));
        assert_eq!(query.page, 2);
        assert_eq!(query.page_size, 12);
    }

    #[test]
    fn test_from_params_accepts_listing_site_names() {
        let query = SearchQuery::from_params(
            [
                ("search", "finca"),
                ("precio_min", "100"),
                ("precio_max", "900"),
                ("tipo", "Casa"),
                ("garaje", "1"),
                ("mascotas", "1"),
                ("orden", "precio_asc"),
            ],
            &config(),
        )
        .unwrap();

        assert_eq!(query.text.as_deref(), Some("finca"));
        assert_eq!(query.predicates.len(), 5);
        assert_eq!(query.sort, Some(SortKey::PriceAsc));

        let err = SearchQuery::from_params([("precio_max", "barato")], &config()).unwrap_err();
        assert!(
            matches!(err, SearchError::InvalidFilterValue { field, .. } if field == "precio_max")
        );
    }

    #[test]
    fn test_listing_site_sort_values() {
        assert_eq!(SortKey::parse("precio_desc"), Some(SortKey::PriceDesc));
        assert_eq!(SortKey::parse("area_asc"), Some(SortKey::AreaAsc));
        assert_eq!(SortKey::parse("recientes"), Some(SortKey::Recent));
    }

    #[test]
    fn test_parse_pairs_decodes_query_string() {
        let pairs = SearchQuery::parse_pairs("?q=casa+con+piscina&tipo=Apartamento").unwrap();
        assert_eq!(
            pairs,
            vec![
                ("q".to_string(), "casa con piscina".to_string()),
                ("tipo".to_string(), "Apartamento".to_string()),
            ]
        );
    }

    #[test]
    fn test_empty_values_and_unknown_keys_are_ignored() {
        let query = SearchQuery::from_params(
            [("q", ""), ("price_min", " "), ("color", "blue"), ("garage", "0")],
            &config(),
        )
        .unwrap();

        assert!(query.text.is_none());
        assert!(query.predicates.is_empty());
    }

    #[test]
    fn test_non_numeric_filter_is_rejected() {
        let err = SearchQuery::from_params([("price_max", "cheap")], &config()).unwrap_err();
        match err {
            SearchError::InvalidFilterValue { field, value, .. } => {
                assert_eq!(field, "price_max");
                assert_eq!(value, "cheap");
            }
            other => panic!("Expected InvalidFilterValue, got {other:?}"),
        }
    }

    #[test]
    fn test_negative_and_fractional_counts_are_rejected() {
        assert!(matches!(
            SearchQuery::from_params([("area_min", "-10")], &config()),
            Err(SearchError::InvalidFilterValue { .. })
        ));
        assert!(matches!(
            SearchQuery::from_params([("rooms", "2.5")], &config()),
            Err(SearchError::InvalidFilterValue { .. })
        ));
    }

    #[test]
    fn test_unknown_sort_is_ignored() {
        let query = SearchQuery::from_params([("sort", "cheapest")], &config()).unwrap();
        assert!(query.sort.is_none());
    }

    #[test]
    fn test_page_parsing_is_lenient() {
        let query =
            SearchQuery::from_params([("page", "abc"), ("page_size", "1000")], &config()).unwrap();
        assert_eq!(query.page, 1);
        assert_eq!(query.page_size, 100);

        let query = SearchQuery::from_params([("page", "0")], &config()).unwrap();
        assert_eq!(query.page, 1);
    }

    #[test]
    fn test_from_query_string() {
        let query =
            SearchQuery::from_query_string("?search=pool+house&furnished=1", &config()).unwrap();
        assert_eq!(query.text.as_deref(), Some("pool house"));
        assert_eq!(query.predicates.len(), 1);
    }

    #[test]
    fn test_predicate_type_validation() {
        assert!(
            Predicate::new(
                FilterField::Rooms,
                FilterOp::Eq,
                FilterValue::Text("three".into())
            )
            .is_err()
        );
        assert!(
            Predicate::new(
                FilterField::PropertyType,
                FilterOp::Gt,
                FilterValue::Text("House".into())
            )
            .is_err()
        );
        assert!(
            Predicate::new(
                FilterField::Furnished,
                FilterOp::Eq,
                FilterValue::Bool(true)
            )
            .is_ok()
        );
    }

    #[test]
    fn test_predicate_matching() {
        let max_price =
            Predicate::new(FilterField::Price, FilterOp::Lte, FilterValue::Number(100.0)).unwrap();
        assert!(max_price.matches(&record(Some(100), None)));
        assert!(!max_price.matches(&record(Some(101), None)));
        assert!(!max_price.matches(&record(None, None)));

        let rooms =
            Predicate::new(FilterField::Rooms, FilterOp::Eq, FilterValue::Number(2.0)).unwrap();
        assert!(rooms.matches(&record(None, Some(2))));
        assert!(!rooms.matches(&record(None, Some(3))));
    }

    #[test]
    fn test_property_type_is_case_insensitive() {
        let mut apartment = Record::new(RecordId(1));
        apartment.property_type = Some("Apartamento".to_string());

        let predicate = Predicate::new(
            FilterField::PropertyType,
            FilterOp::Eq,
            FilterValue::Text("apartamento".into()),
        )
        .unwrap();
        assert!(predicate.matches(&apartment));
    }

    #[test]
    fn test_sort_missing_values_last() {
        let cheap = record(Some(10), None);
        let pricey = record(Some(20), None);
        let unknown = record(None, None);

        assert_eq!(SortKey::PriceAsc.compare(&cheap, &pricey), Ordering::Less);
        assert_eq!(SortKey::PriceDesc.compare(&cheap, &pricey), Ordering::Greater);
        assert_eq!(SortKey::PriceAsc.compare(&unknown, &cheap), Ordering::Greater);
        assert_eq!(SortKey::PriceDesc.compare(&unknown, &cheap), Ordering::Greater);
    }
}
