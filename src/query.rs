//! Listing query composition.
//!
//! [`FindQuery`] is an unexecuted query handle: a filter plus the cursor options a
//! store applies when it runs the query. [`QueryComposer`] narrows a handle from
//! URL parameters (sort, pagination, filters, field selection, search) without
//! ever failing on malformed input.

use std::collections::BTreeMap;

use bson::{doc, Bson, Document, Regex};
use mongodb::options::FindOptions;

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: i64 = 12;

/// Control parameters that never become filters.
pub const RESERVED_KEYS: [&str; 5] = ["page", "limit", "sort", "fields", "search"];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindQuery {
    filter: Document,
    sort: Option<Document>,
    skip: Option<u64>,
    limit: Option<i64>,
    projection: Option<Document>,
}

impl FindQuery {
    pub fn new(filter: Document) -> Self {
        FindQuery {
            filter,
            ..Default::default()
        }
    }

    /// Merges `filter` into the current filter; later keys win.
    pub fn find(mut self, filter: Document) -> Self {
        for (key, value) in filter {
            self.filter.insert(key, value);
        }
        self
    }

    pub fn sort(mut self, spec: Document) -> Self {
        self.sort = Some(spec);
        self
    }

    pub fn skip(mut self, n: u64) -> Self {
        self.skip = Some(n);
        self
    }

    pub fn limit(mut self, n: i64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn select(mut self, projection: Document) -> Self {
        self.projection = Some(projection);
        self
    }

    pub fn filter(&self) -> &Document {
        &self.filter
    }

    pub fn sort_spec(&self) -> Option<&Document> {
        self.sort.as_ref()
    }

    pub fn skip_count(&self) -> Option<u64> {
        self.skip
    }

    pub fn limit_count(&self) -> Option<i64> {
        self.limit
    }

    pub fn projection(&self) -> Option<&Document> {
        self.projection.as_ref()
    }

    pub fn options(&self) -> FindOptions {
        let mut options = FindOptions::default();
        options.sort = self.sort.clone();
        options.skip = self.skip;
        options.limit = self.limit;
        options.projection = self.projection.clone();
        options
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Comparator {
    Gte,
    Gt,
    Lte,
    Lt,
}

impl Comparator {
    fn parse(op: &str) -> Option<Self> {
        match op {
            "gte" => Some(Comparator::Gte),
            "gt" => Some(Comparator::Gt),
            "lte" => Some(Comparator::Lte),
            "lt" => Some(Comparator::Lt),
            _ => None,
        }
    }

    fn operator(self) -> &'static str {
        match self {
            Comparator::Gte => "$gte",
            Comparator::Gt => "$gt",
            Comparator::Lte => "$lte",
            Comparator::Lt => "$lt",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Single(String),
    Many(Vec<String>),
    Compare(BTreeMap<Comparator, String>),
}

impl ParamValue {
    /// Plain text of the value; lists are comma-joined, comparators have none.
    fn text(&self) -> Option<String> {
        match self {
            ParamValue::Single(v) => Some(v.clone()),
            ParamValue::Many(vs) => Some(vs.join(",")),
            ParamValue::Compare(_) => None,
        }
    }

    fn to_filter(&self) -> Bson {
        match self {
            ParamValue::Single(v) => scalar(v),
            ParamValue::Many(vs) => {
                Bson::Document(doc! { "$in": vs.iter().map(|v| scalar(v)).collect::<Vec<_>>() })
            }
            ParamValue::Compare(ops) => {
                let mut filter = Document::new();
                for (op, v) in ops {
                    filter.insert(op.operator(), scalar(v));
                }
                Bson::Document(filter)
            }
        }
    }
}

/// Casts a raw parameter to the store type it most likely compares against.
fn scalar(raw: &str) -> Bson {
    let trimmed = raw.trim();
    if let Ok(n) = trimmed.parse::<i64>() {
        return Bson::Int64(n);
    }
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() && !trimmed.is_empty() => Bson::Double(n),
        _ => Bson::String(raw.to_string()),
    }
}

/// Parsed query-string parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams(BTreeMap<String, ParamValue>);

impl QueryParams {
    /// Builds the mapping from raw `(key, value)` pairs in request order.
    ///
    /// `price[gte]=50` becomes a comparator, a repeated plain key becomes a list.
    /// Unknown bracket operators are dropped, and so are empty or `$`-prefixed
    /// field names, which Mongo would read as operators.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut params: BTreeMap<String, ParamValue> = BTreeMap::new();
        for (key, value) in pairs {
            let (key, value) = (key.into(), value.into());
            match split_bracket(&key) {
                Some((field, op)) => {
                    let Some(op) = Comparator::parse(op).filter(|_| is_field_name(field)) else {
                        continue;
                    };
                    match params.get_mut(field) {
                        Some(ParamValue::Compare(ops)) => {
                            ops.insert(op, value);
                        }
                        _ => {
                            params.insert(
                                field.to_string(),
                                ParamValue::Compare(BTreeMap::from([(op, value)])),
                            );
                        }
                    }
                }
                None if !is_field_name(&key) => continue,
                None => match params.get_mut(&key) {
                    Some(ParamValue::Single(first)) => {
                        let first = std::mem::take(first);
                        params.insert(key, ParamValue::Many(vec![first, value]));
                    }
                    Some(ParamValue::Many(values)) => values.push(value),
                    _ => {
                        params.insert(key, ParamValue::Single(value));
                    }
                },
            }
        }
        QueryParams(params)
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    fn text(&self, key: &str) -> Option<String> {
        self.get(key).and_then(ParamValue::text)
    }

    /// Copy of the mapping with every reserved control key removed.
    pub fn without_reserved(&self) -> QueryParams {
        QueryParams(
            self.0
                .iter()
                .filter(|(k, _)| !RESERVED_KEYS.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Equality and comparator filter for every key in the mapping.
    pub fn to_filter(&self) -> Document {
        self.0
            .iter()
            .map(|(k, v)| (k.clone(), v.to_filter()))
            .collect()
    }
}

fn is_field_name(key: &str) -> bool {
    !key.is_empty() && !key.starts_with('$')
}

fn split_bracket(key: &str) -> Option<(&str, &str)> {
    let open = key.find('[')?;
    let inner = key[open + 1..].strip_suffix(']')?;
    Some((&key[..open], inner))
}

/// Resolved pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginate {
    pub skip: u64,
    pub limit: i64,
}

impl Default for Paginate {
    fn default() -> Self {
        Paginate {
            skip: 0,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Paginate {
    /// Reads `page` and `limit`. Each falls back to its default when it is not an
    /// integer >= 1, and the page falls back to the first when its offset does not
    /// fit the store's signed skip.
    pub fn resolve(params: &QueryParams) -> Self {
        let page = params
            .text("page")
            .and_then(|p| p.trim().parse::<u64>().ok())
            .filter(|p| *p >= 1)
            .unwrap_or(DEFAULT_PAGE);
        let limit = params
            .text("limit")
            .and_then(|l| l.trim().parse::<i64>().ok())
            .filter(|l| *l >= 1)
            .unwrap_or(DEFAULT_LIMIT);
        let skip = (page - 1)
            .checked_mul(limit as u64)
            .filter(|skip| *skip <= i64::MAX as u64)
            .unwrap_or(0);
        Paginate { skip, limit }
    }
}

/// Newest first, with `_id` to keep equal timestamps in a fixed order.
pub fn default_sort() -> Document {
    doc! { "createdAt": -1, "_id": -1 }
}

fn parse_sort(raw: &str) -> Option<Document> {
    let mut spec = Document::new();
    for field in raw.split(',').map(str::trim) {
        let (name, direction) = match field.strip_prefix('-') {
            Some(name) => (name.trim(), -1),
            None => (field, 1),
        };
        if name.is_empty() || spec.contains_key(name) {
            continue;
        }
        spec.insert(name, direction);
    }
    if spec.is_empty() {
        return None;
    }
    if !spec.contains_key("_id") {
        spec.insert("_id", 1);
    }
    Some(spec)
}

fn parse_fields(raw: &str) -> Option<Document> {
    let mut include = Document::new();
    let mut exclude = Document::new();
    for field in raw.split(',').map(str::trim).filter(|f| !f.is_empty()) {
        match field.strip_prefix('-') {
            Some(name) if !name.is_empty() => {
                exclude.insert(name, 0);
            }
            Some(_) => {}
            None => {
                include.insert(field, 1);
            }
        }
    }
    match (include.is_empty(), exclude.is_empty()) {
        (false, _) => Some(include),
        (true, false) => Some(exclude),
        (true, true) => None,
    }
}

/// Builds a listing query step by step from request parameters.
///
/// ```ignore
/// let features = QueryComposer::new(FindQuery::default(), params)
///     .apply_sort()
///     .apply_pagination()
///     .apply_filtering();
/// ```
#[derive(Debug, Clone)]
pub struct QueryComposer {
    query: FindQuery,
    params: QueryParams,
    residual: QueryParams,
    paginate: Paginate,
}

impl QueryComposer {
    pub fn new(query: FindQuery, params: QueryParams) -> Self {
        let residual = params.without_reserved();
        QueryComposer {
            query,
            params,
            residual,
            paginate: Paginate::default(),
        }
    }

    pub fn apply_sort(mut self) -> Self {
        let spec = self
            .params
            .text("sort")
            .and_then(|s| parse_sort(&s))
            .unwrap_or_else(default_sort);
        self.query = self.query.sort(spec);
        self
    }

    pub fn apply_pagination(mut self) -> Self {
        self.paginate = Paginate::resolve(&self.params);
        self.query = self.query.skip(self.paginate.skip).limit(self.paginate.limit);
        self
    }

    pub fn apply_filtering(mut self) -> Self {
        let filter = self.residual.to_filter();
        self.query = self.query.find(filter);
        self
    }

    pub fn apply_field_selection(mut self) -> Self {
        if let Some(projection) = self.params.text("fields").and_then(|f| parse_fields(&f)) {
            self.query = self.query.select(projection);
        }
        self
    }

    /// Case-insensitive substring match of `search` against `field`.
    pub fn apply_search(mut self, field: &str) -> Self {
        let term = self.params.text("search").unwrap_or_default();
        let term = term.trim();
        if !term.is_empty() {
            self.query = self.query.find(doc! { field: title_pattern(term) });
        }
        self
    }

    pub fn query(&self) -> &FindQuery {
        &self.query
    }

    pub fn into_query(self) -> FindQuery {
        self.query
    }

    pub fn paginate(&self) -> Paginate {
        self.paginate
    }

    pub fn params(&self) -> &QueryParams {
        &self.params
    }

    pub fn residual(&self) -> &QueryParams {
        &self.residual
    }

    /// The residual parameters as a filter, ready for sibling queries.
    pub fn residual_filter(&self) -> Document {
        self.residual.to_filter()
    }
}

/// Escaped, case-insensitive regex matching `term` anywhere in a field.
pub fn title_pattern(term: &str) -> Regex {
    Regex {
        pattern: regex::escape(term),
        options: "i".to_string(),
    }
}
