use crate::constants;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;
use uuid::Uuid;

/// One inbound import call.
#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub url: String,
    pub requesting_user_id: Uuid,
}

impl ImportRequest {
    pub fn new(url: impl Into<String>, requesting_user_id: Uuid) -> Self {
        Self {
            url: url.into(),
            requesting_user_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Facebook,
    FacebookSearch,
    Eventbrite,
    Luma,
    OpengraphGeneric,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Facebook => constants::FACEBOOK,
            Platform::FacebookSearch => constants::FACEBOOK_SEARCH,
            Platform::Eventbrite => constants::EVENTBRITE,
            Platform::Luma => constants::LUMA,
            Platform::OpengraphGeneric => constants::OPENGRAPH_GENERIC,
        }
    }

    /// Search-result pages yield many items from one acquisition.
    pub fn is_batch(&self) -> bool {
        matches!(self, Platform::FacebookSearch)
    }

    /// Broker-sourced platforms require a parseable start time.
    pub fn requires_start_time(&self) -> bool {
        matches!(
            self,
            Platform::Facebook | Platform::FacebookSearch | Platform::Eventbrite
        )
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionStrategy {
    Broker,
    DirectPage,
    OpenGraph,
}

/// Result of classifying a validated URL. Immutable for the rest of the run.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedTarget {
    pub url: Url,
    pub platform: Platform,
    pub strategy: AcquisitionStrategy,
}

/// Fields pulled out of a Lu.ma event page.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LumaPageFields {
    pub name: String,
    pub start_at: Option<String>,
    pub end_at: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub place_name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub cover_url: Option<String>,
    pub host_name: Option<String>,
}

/// Fields pulled out of a page's OpenGraph/meta tags.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OpenGraphFields {
    pub title: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub canonical_url: Option<String>,
    pub start_date: Option<String>,
    pub organizer: Option<String>,
}

/// Raw, platform-shaped output of an acquirer. Lives for one run only.
#[derive(Debug, Clone, PartialEq)]
pub enum RawAcquiredItem {
    Broker(serde_json::Value),
    LumaPage(LumaPageFields),
    OpenGraph(OpenGraphFields),
}

/// Canonical, platform-independent event produced by a normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawImportedEvent {
    pub source_url: String,
    pub title: String,
    pub description: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub location_name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub organizer_name: Option<String>,
    pub image_url: Option<String>,
    pub is_free: bool,
    pub price: Option<String>,
}

/// How precisely an event's location is known, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationPrecision {
    Coordinates,
    Address,
    VenueName,
    Unknown,
}

impl RawImportedEvent {
    pub fn location_precision(&self) -> LocationPrecision {
        if self.latitude.is_some() && self.longitude.is_some() {
            LocationPrecision::Coordinates
        } else if self.address.is_some() {
            LocationPrecision::Address
        } else if self.location_name.is_some() {
            LocationPrecision::VenueName
        } else {
            LocationPrecision::Unknown
        }
    }
}

/// Reference to an event created by an import, returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportedEventRef {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
}

/// Summary of one import call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportOutcome {
    pub platform: Platform,
    pub is_multiple: bool,
    pub processed_count: usize,
    pub skipped_count: usize,
    pub error_count: usize,
    pub details: Vec<String>,
    pub imported: Vec<ImportedEventRef>,
}

impl ImportOutcome {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            is_multiple: platform.is_batch(),
            processed_count: 0,
            skipped_count: 0,
            error_count: 0,
            details: Vec::new(),
            imported: Vec::new(),
        }
    }
}
