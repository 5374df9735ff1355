//! Generic acquisition for allow-listed hosts: fetch the page and read its
//! OpenGraph and plain meta tags.

use super::extract::{
    enclosed_body, find_iso_datetime, find_opener, json_string_field, meta_content,
    title_tag, top_level_members,
};
use super::{fetch_html, AcquireContext, Acquirer, PageFetchSettings};
use crate::app::ports::HttpClientPort;
use crate::error::{ImportError, Result};
use crate::types::{ClassifiedTarget, OpenGraphFields, RawAcquiredItem};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, instrument};

/// "Hosted by ..." up to the end of the line or the next tag.
static HOSTED_BY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bhosted by\s+([^<>\n\r|]{2,80})").unwrap());

pub struct OpenGraphAcquirer {
    http: Arc<dyn HttpClientPort>,
    settings: PageFetchSettings,
}

impl OpenGraphAcquirer {
    pub fn new(http: Arc<dyn HttpClientPort>, settings: PageFetchSettings) -> Self {
        Self { http, settings }
    }
}

#[async_trait]
impl Acquirer for OpenGraphAcquirer {
    #[instrument(skip(self, target, ctx), fields(platform = %target.platform, url = %target.url))]
    async fn acquire(
        &self,
        target: &ClassifiedTarget,
        ctx: &AcquireContext,
    ) -> Result<Vec<RawAcquiredItem>> {
        let html = fetch_html(self.http.as_ref(), target.url.as_str(), &self.settings, ctx).await?;
        let fields = extract_opengraph(&html).ok_or_else(|| ImportError::NoDataFound {
            url: target.url.to_string(),
        })?;
        debug!(title = %fields.title, has_start = fields.start_date.is_some(), "Read page metadata");
        Ok(vec![RawAcquiredItem::OpenGraph(fields)])
    }
}

/// Reads the metadata of a page. `None` when the page has no usable title.
pub fn extract_opengraph(html: &str) -> Option<OpenGraphFields> {
    let title = meta_content(html, "og:title").or_else(|| title_tag(html))?;

    let start_date = json_string_field(html, "startDate")
        .or_else(|| meta_content(html, "event:start_time"))
        .or_else(|| find_iso_datetime(html));

    Some(OpenGraphFields {
        title,
        description: meta_content(html, "og:description")
            .or_else(|| meta_content(html, "description")),
        image: meta_content(html, "og:image"),
        canonical_url: meta_content(html, "og:url"),
        start_date,
        organizer: organizer(html),
    })
}

fn organizer(html: &str) -> Option<String> {
    if let Some(name) = json_string_field(html, "organizer") {
        return Some(name);
    }
    if let Some(idx) = find_opener(html, "organizer", '{') {
        let members = top_level_members(enclosed_body(&html[idx..]));
        if let Some(name) = json_string_field(&members, "name") {
            return Some(name);
        }
    }
    HOSTED_BY
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().trim_end_matches(['.', ',', ';']).trim_end().to_string())
        .filter(|s| !s.is_empty())
}
