use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BundleType {
    Searchset,
    Collection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchEntryMode {
    Match,
    Include,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleLink {
    pub relation: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleEntrySearch {
    pub mode: SearchEntryMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleEntry {
    #[serde(rename = "fullUrl", default, skip_serializing_if = "Option::is_none")]
    pub full_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<BundleEntrySearch>,
}

impl BundleEntry {
    /// `fullUrl` is `{resourceType}/{id}` when the resource carries both.
    pub fn from_resource(resource: Value) -> Self {
        let full_url = resource["resourceType"]
            .as_str()
            .zip(resource["id"].as_str())
            .map(|(resource_type, id)| format!("{resource_type}/{id}"));
        Self {
            full_url,
            resource: Some(resource),
            search: None,
        }
    }

    pub fn with_search_mode(mut self, mode: SearchEntryMode) -> Self {
        self.search = Some(BundleEntrySearch { mode });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    #[serde(rename = "resourceType")]
    pub resource_type: String,
    #[serde(rename = "type")]
    pub bundle_type: BundleType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub link: Vec<BundleLink>,
    #[serde(default)]
    pub entry: Vec<BundleEntry>,
}

impl Bundle {
    fn new(bundle_type: BundleType, entry: Vec<BundleEntry>) -> Self {
        Self {
            resource_type: "Bundle".into(),
            bundle_type,
            total: None,
            link: Vec::new(),
            entry,
        }
    }

    /// Search result page. `total` counts all matches, not just this page.
    pub fn searchset(total: u64, entries: Vec<BundleEntry>, links: Vec<BundleLink>) -> Self {
        Self {
            total: Some(total),
            link: links,
            ..Self::new(BundleType::Searchset, entries)
        }
    }

    pub fn collection(entries: Vec<BundleEntry>) -> Self {
        Self::new(BundleType::Collection, entries)
    }
}

/// `self`, `first` and `last` links plus `previous`/`next` where they exist.
///
/// `page` is 1-indexed. `filters` is the already encoded query string of the
/// search parameters, without paging.
pub fn build_search_links(
    total: usize,
    base: &str,
    page: usize,
    count: usize,
    filters: Option<&str>,
) -> Vec<BundleLink> {
    let last = total.div_ceil(count.max(1)).max(1);
    let link = |relation: &str, page: usize| {
        let url = match filters.filter(|f| !f.is_empty()) {
            Some(f) => format!("{base}?{f}&_count={count}&_page={page}"),
            None => format!("{base}?_count={count}&_page={page}"),
        };
        BundleLink {
            relation: relation.into(),
            url,
        }
    };

    let mut links = vec![link("self", page), link("first", 1), link("last", last)];
    // A page far beyond the end has no meaningful neighbours.
    if (2..=last + 1).contains(&page) {
        links.push(link("previous", page - 1));
    }
    if page < last {
        links.push(link("next", page + 1));
    }
    links
}
