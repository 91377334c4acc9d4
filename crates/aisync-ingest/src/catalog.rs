//! Catalog listing
//!
//! Discovers the archives published for one year by scraping the portal's
//! HTML directory listing. Every `<a href>` ending in `.zip` is an archive;
//! everything else on the page is ignored.

use reqwest::Client;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::IngestConfig;
use crate::error::{IngestError, Result};
use crate::retry::RetryPolicy;

/// Archive file extension recognised in listings (compared case-insensitively)
pub const ARCHIVE_EXTENSION: &str = ".zip";

/// One remote archive
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArchiveRef {
    /// Remote file name, e.g. `AIS_2020_01_05.zip`
    pub id: String,
    pub url: Url,
}

impl ArchiveRef {
    /// Build a ref from an absolute URL; the id is its last path segment
    pub fn from_url(url: Url) -> Option<Self> {
        let id = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|segment| !segment.is_empty())?
            .to_string();
        Some(Self { id, url })
    }
}

/// Whether a resume marker belongs to `year`
///
/// A marker is associated with a year when the year's digits appear in it,
/// which is how NOAA names its daily archives (`AIS_2020_01_05.zip`).
pub fn resume_applies(year: u16, resume_after: &str) -> bool {
    resume_after.contains(&year.to_string())
}

/// Keep only refs whose id sorts strictly after `resume_after`
///
/// Plain string comparison: identifiers must be named so that lexical order
/// matches the order in which they should be resumed.
pub fn filter_after(refs: Vec<ArchiveRef>, resume_after: &str) -> Vec<ArchiveRef> {
    refs.into_iter()
        .filter(|archive| archive.id.as_str() > resume_after)
        .collect()
}

/// Extract archive refs from a listing page
///
/// Returns them in document order with duplicates removed. A page that holds
/// no hyperlinks at all is reported as [`IngestError::ListingParse`].
pub fn parse_listing(html: &str, base: &Url) -> Result<Vec<ArchiveRef>> {
    let document = Html::parse_document(html);
    let link_selector = Selector::parse("a").map_err(|e| IngestError::ListingParse {
        url: base.to_string(),
        reason: e.to_string(),
    })?;

    let mut anchors = 0usize;
    let mut seen = HashSet::new();
    let mut refs = Vec::new();

    for element in document.select(&link_selector) {
        anchors += 1;

        let Some(href) = element.value().attr("href") else {
            continue;
        };

        let href = href.trim();
        let path = href.split(['?', '#']).next().unwrap_or(href);
        if !path.to_ascii_lowercase().ends_with(ARCHIVE_EXTENSION) {
            continue;
        }

        let resolved = match base.join(href) {
            Ok(url) => url,
            Err(e) => {
                warn!(href, error = %e, "Skipping unresolvable archive link");
                continue;
            },
        };

        match ArchiveRef::from_url(resolved) {
            Some(archive) if seen.insert(archive.id.clone()) => {
                debug!(id = %archive.id, "Discovered archive");
                refs.push(archive);
            },
            Some(_) => {},
            None => warn!(href, "Skipping archive link without a file name"),
        }
    }

    if anchors == 0 {
        return Err(IngestError::ListingParse {
            url: base.to_string(),
            reason: "listing page contains no hyperlinks".to_string(),
        });
    }

    Ok(refs)
}

/// Lists archives per year from the remote portal
pub struct CatalogLister {
    client: Client,
    config: IngestConfig,
    retry: RetryPolicy,
}

impl CatalogLister {
    pub fn new(config: IngestConfig) -> Result<Self> {
        let client = config.http_client()?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: IngestConfig) -> Self {
        let retry = config.retry_policy();
        Self {
            client,
            config,
            retry,
        }
    }

    /// Archives available for `year`, in listing order
    ///
    /// When `resume_after` names an archive of this year only later archives
    /// are returned. An unparsable page yields an empty list and a warning.
    pub async fn list(&self, year: u16, resume_after: Option<&str>) -> Result<Vec<ArchiveRef>> {
        let url = self.config.listing_url(year);
        let base = Url::parse(&url).map_err(|e| IngestError::Config(format!("{}: {}", url, e)))?;

        let html = self
            .retry
            .run("listing", || self.fetch_listing(&url))
            .await?;

        let mut refs = match parse_listing(&html, &base) {
            Ok(refs) => refs,
            Err(e @ IngestError::ListingParse { .. }) => {
                warn!(year, url = %url, error = %e, "Listing unparsable, treating year as empty");
                return Ok(Vec::new());
            },
            Err(e) => return Err(e),
        };

        if let Some(marker) = resume_after.filter(|marker| resume_applies(year, marker)) {
            let before = refs.len();
            refs = filter_after(refs, marker);
            info!(
                year,
                resume_after = marker,
                skipped = before - refs.len(),
                "Resuming year after marker"
            );
        }

        info!(year, count = refs.len(), "Listed archives");
        Ok(refs)
    }

    async fn fetch_listing(&self, url: &str) -> Result<String> {
        debug!("Fetching listing from: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| IngestError::listing_fetch(url, e))?;

        response
            .text()
            .await
            .map_err(|e| IngestError::listing_fetch(url, e))
    }
}
