//! HATEOAS links for JSON responses.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// A single hyperlink, serialized as `{"href": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Link {
    pub href: String,
}

impl Link {
    pub fn new(href: impl Into<String>) -> Self {
        Self { href: href.into() }
    }
}

/// Links keyed by relation name (`self`, `next`, `result`, ...).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Links(BTreeMap<String, Link>);

impl Links {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the link for `rel`.
    pub fn insert(&mut self, rel: impl Into<String>, href: impl Into<String>) {
        self.0.insert(rel.into(), Link::new(href));
    }

    pub fn with(mut self, rel: impl Into<String>, href: impl Into<String>) -> Self {
        self.insert(rel, href);
        self
    }

    pub fn get(&self, rel: &str) -> Option<&Link> {
        self.0.get(rel)
    }

    pub fn contains(&self, rel: &str) -> bool {
        self.0.contains_key(rel)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Inputs for [`generate_links`].
#[derive(Debug, Clone, Default)]
pub struct LinkOptions {
    /// Scheme and host, e.g. `https://api.example.com`
    pub base_url: String,
    /// Collection path, e.g. `/api/users`
    pub path: String,
    /// Resource id when linking a single item
    pub id: Option<String>,
    /// Query parameters of the current request, in order
    pub query: Vec<(String, String)>,
    /// Current page (1-based)
    pub page: Option<u64>,
    /// Items per page
    pub limit: Option<u64>,
    /// Total number of items in the collection
    pub total: Option<u64>,
}

/// Build `self`, `collection` and pagination links.
///
/// `collection` is present when an id is given. `first`/`prev` appear past the
/// first page, `next`/`last` before the last one.
pub fn generate_links(options: &LinkOptions) -> Links {
    let base = options.base_url.as_str();
    let path = options.path.as_str();

    let mut links = Links::new().with(
        "self",
        build_url(base, path, options.id.as_deref(), &options.query),
    );

    if options.id.is_some() {
        links.insert("collection", build_url(base, path, None, &options.query));
    }

    if let (Some(page), Some(limit), Some(total)) = (options.page, options.limit, options.total) {
        if limit > 0 {
            let total_pages = total.div_ceil(limit);
            let page_url = |target: u64| {
                let mut query = options.query.clone();
                set_param(&mut query, "page", target.to_string());
                set_param(&mut query, "limit", limit.to_string());
                build_url(base, path, None, &query)
            };

            if page > 1 {
                links.insert("first", page_url(1));
                links.insert("prev", page_url(page - 1));
            }

            if page < total_pages {
                links.insert("next", page_url(page + 1));
                links.insert("last", page_url(total_pages));
            }
        }
    }

    links
}

/// Replace a query parameter in place, or append it.
fn set_param(query: &mut Vec<(String, String)>, key: &str, value: String) {
    match query.iter_mut().find(|(k, _)| k == key) {
        Some(entry) => entry.1 = value,
        None => query.push((key.to_string(), value)),
    }
}

/// Join base, path, optional id and an encoded query string.
pub fn build_url(base_url: &str, path: &str, id: Option<&str>, query: &[(String, String)]) -> String {
    let mut url = format!("{}{}", base_url, path);

    if let Some(id) = id {
        url.push('/');
        url.push_str(id);
    }

    let query_string = query
        .iter()
        .map(|(key, value)| format!("{}={}", encode_component(key), encode_component(value)))
        .collect::<Vec<_>>()
        .join("&");

    if !query_string.is_empty() {
        url.push('?');
        url.push_str(&query_string);
    }

    url
}

/// Percent-encode everything except `A-Z a-z 0-9 - _ . ! ~ * ' ( )`.
pub fn encode_component(raw: &str) -> String {
    let mut encoded = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'_'
            | b'.'
            | b'!'
            | b'~'
            | b'*'
            | b'\''
            | b'('
            | b')' => encoded.push(byte as char),
            _ => {
                let _ = write!(encoded, "%{:02X}", byte);
            }
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_build_url() {
        assert_eq!(
            build_url("http://localhost:3001", "/api/users", Some("42"), &[]),
            "http://localhost:3001/api/users/42"
        );
        assert_eq!(
            build_url(
                "http://localhost:3001",
                "/api/users",
                None,
                &query(&[("city", "New York"), ("role", "walker")])
            ),
            "http://localhost:3001/api/users?city=New%20York&role=walker"
        );
    }

    #[test]
    fn test_encode_component() {
        assert_eq!(encode_component("a b&c=d"), "a%20b%26c%3Dd");
        assert_eq!(encode_component("it's-ok_(1).~*!"), "it's-ok_(1).~*!");
        assert_eq!(encode_component("café"), "caf%C3%A9");
    }

    #[test]
    fn test_single_resource_links() {
        let links = generate_links(&LinkOptions {
            base_url: "http://api".to_string(),
            path: "/api/dogs".to_string(),
            id: Some("7".to_string()),
            ..Default::default()
        });
        assert_eq!(links.get("self").unwrap().href, "http://api/api/dogs/7");
        assert_eq!(links.get("collection").unwrap().href, "http://api/api/dogs");
        assert_eq!(links.len(), 2);
    }

    #[test]
    fn test_middle_page_links() {
        let links = generate_links(&LinkOptions {
            base_url: "http://api".to_string(),
            path: "/api/users".to_string(),
            query: query(&[("role", "owner"), ("page", "2"), ("limit", "10")]),
            page: Some(2),
            limit: Some(10),
            total: Some(35),
            ..Default::default()
        });

        assert_eq!(
            links.get("first").unwrap().href,
            "http://api/api/users?role=owner&page=1&limit=10"
        );
        assert_eq!(
            links.get("prev").unwrap().href,
            "http://api/api/users?role=owner&page=1&limit=10"
        );
        assert_eq!(
            links.get("next").unwrap().href,
            "http://api/api/users?role=owner&page=3&limit=10"
        );
        assert_eq!(
            links.get("last").unwrap().href,
            "http://api/api/users?role=owner&page=4&limit=10"
        );
        assert!(!links.contains("collection"));
    }

    #[test]
    fn test_edge_pages() {
        let first_page = generate_links(&LinkOptions {
            base_url: "http://api".to_string(),
            path: "/api/walks".to_string(),
            page: Some(1),
            limit: Some(10),
            total: Some(10),
            ..Default::default()
        });
        assert_eq!(first_page.len(), 1);

        let zero_limit = generate_links(&LinkOptions {
            page: Some(2),
            limit: Some(0),
            total: Some(10),
            ..Default::default()
        });
        assert_eq!(zero_limit.len(), 1);
    }

    #[test]
    fn test_links_serialize_as_object() {
        let links = Links::new().with("self", "http://api/x");
        assert_eq!(
            serde_json::to_value(&links).unwrap(),
            serde_json::json!({"self": {"href": "http://api/x"}})
        );
    }
}
