//! Link-header pagination.
//!
//! The first page is requested with `per_page` at its maximum. When the
//! response carries a `Link` header, the `last` relation gives the final page
//! number and serves as the URL template for every page in between; those
//! pages are then fetched concurrently. Without `last`, the `next` relation of
//! each page is followed until it runs out.

use std::collections::HashSet;
use std::future::Future;

use futures::future::try_join_all;
use url::Url;

/// Largest page size the API accepts.
pub const MAX_PER_PAGE: u32 = 100;

/// Relations parsed from a `Link` header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageLinks {
    pub next: Option<Url>,
    pub last: Option<Url>,
}

/// Parse `<url>; rel="next", <url>; rel="last"`.
///
/// Entries that fail to parse are ignored.
pub fn parse_link_header(value: &str) -> PageLinks {
    let mut links = PageLinks::default();
    for entry in value.split(',') {
        let mut parts = entry.split(';');
        let Some(target) = parts.next() else {
            continue;
        };
        let target = target.trim();
        let Some(target) = target
            .strip_prefix('<')
            .and_then(|rest| rest.strip_suffix('>'))
        else {
            continue;
        };
        let Ok(url) = Url::parse(target) else {
            continue;
        };
        for param in parts {
            let Some((key, rel)) = param.trim().split_once('=') else {
                continue;
            };
            if key.trim() != "rel" {
                continue;
            }
            for rel in rel.trim().trim_matches('"').split_whitespace() {
                match rel {
                    "next" => links.next = Some(url.clone()),
                    "last" => links.last = Some(url.clone()),
                    _ => {}
                }
            }
        }
    }
    links
}

/// Value of the `page` query parameter.
pub fn page_number(url: &Url) -> Option<u32> {
    url.query_pairs()
        .find(|(key, _)| key == "page")
        .and_then(|(_, value)| value.parse().ok())
}

/// Copy of `template` addressing `page`, other query parameters preserved.
pub fn with_page(template: &Url, page: u32) -> Url {
    let retained: Vec<(String, String)> = template
        .query_pairs()
        .filter(|(key, _)| key != "page")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    let mut url = template.clone();
    {
        let mut query = url.query_pairs_mut();
        query.clear();
        for (key, value) in &retained {
            query.append_pair(key, value);
        }
        query.append_pair("page", &page.to_string());
    }
    url
}

/// One fetched page with the `Link` header that came with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub link: Option<String>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, link: Option<String>) -> Self {
        Self { items, link }
    }
}

/// How the pages after the first are reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Continuation {
    /// The first page was the only one.
    Done,
    /// Every remaining page is known up front from the `last` relation.
    Known(Vec<Url>),
    /// Only `next` is advertised; each page names its successor.
    Chained(Url),
}

/// Plan the fetches after the first page from its `Link` header.
pub fn continuation(link_header: Option<&str>) -> Continuation {
    let Some(header) = link_header else {
        return Continuation::Done;
    };
    let links = parse_link_header(header);
    let Some(next) = links.next else {
        return Continuation::Done;
    };
    let last_page = links.last.as_ref().and_then(|last| {
        page_number(last).map(|page| (last, page))
    });
    match (page_number(&next), last_page) {
        (Some(first_remaining), Some((last, last_page))) => Continuation::Known(
            (first_remaining..=last_page)
                .map(|page| with_page(last, page))
                .collect(),
        ),
        _ => Continuation::Chained(next),
    }
}

/// Merge `first_page` with every remaining page.
///
/// Pages known up front are requested concurrently; a `next`-only chain is
/// walked one page at a time until a page has no successor. Any failure fails
/// the whole resolution. Items keep page order and no URL is requested twice.
pub async fn resolve_pages<T, E, F, Fut>(first_page: Page<T>, fetch: F) -> Result<Vec<T>, E>
where
    F: Fn(Url) -> Fut,
    Fut: Future<Output = Result<Page<T>, E>>,
{
    let mut items = first_page.items;
    match continuation(first_page.link.as_deref()) {
        Continuation::Done => {}
        Continuation::Known(urls) => {
            tracing::debug!(pages = urls.len() + 1, "resolving paginated listing");
            let pages = try_join_all(urls.into_iter().map(fetch)).await?;
            for page in pages {
                items.extend(page.items);
            }
        }
        Continuation::Chained(next) => {
            tracing::debug!("following next links");
            let mut visited = HashSet::new();
            let mut cursor = Some(next);
            while let Some(url) = cursor.take() {
                if !visited.insert(url.clone()) {
                    tracing::warn!(%url, "pagination loop detected; stopping");
                    break;
                }
                let page = fetch(url).await?;
                items.extend(page.items);
                cursor = page
                    .link
                    .as_deref()
                    .and_then(|header| parse_link_header(header).next);
            }
        }
    }
    Ok(items)
}
