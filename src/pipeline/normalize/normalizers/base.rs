use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::error::ImportError;
use crate::metrics::ImportMetrics;
use crate::types::{Platform, RawAcquiredItem, RawImportedEvent};

/// Longest description kept on a canonical event, in characters.
pub const MAX_DESCRIPTION_CHARS: usize = 10_000;

/// Unix timestamps above this are read as milliseconds.
const MILLIS_THRESHOLD: f64 = 1e11;

/// Why a raw item could not become a canonical event.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NormalizeError {
    #[error("event has no title")]
    MissingTitle,

    #[error("event \"{title}\" has no usable start time")]
    MissingStartTime { title: String },

    #[error("search result has no usable event URL")]
    MissingSourceUrl,

    #[error("{platform} normalizer cannot read this item: {detail}")]
    UnexpectedShape { platform: Platform, detail: String },
}

impl NormalizeError {
    /// Skips are counted apart from errors: the item was readable but incomplete.
    pub fn is_skip(&self) -> bool {
        matches!(self, NormalizeError::MissingStartTime { .. })
    }
}

impl From<NormalizeError> for ImportError {
    fn from(e: NormalizeError) -> Self {
        ImportError::NormalizationRejected {
            reason: e.to_string(),
        }
    }
}

/// What a normalizer knows about the run besides the item itself.
#[derive(Debug, Clone)]
pub struct NormalizeContext {
    pub platform: Platform,
    /// Canonicalised submitted URL.
    pub source_url: String,
}

/// Base trait for platform-specific normalizers
pub trait SourceNormalizer: Send + Sync {
    fn normalize(
        &self,
        item: &RawAcquiredItem,
        ctx: &NormalizeContext,
    ) -> Result<RawImportedEvent, NormalizeError>;

    fn name(&self) -> &str;
}

/// A wrapper that adds metrics to any normalizer implementation
pub struct MetricsNormalizer<N: SourceNormalizer> {
    inner: N,
}

impl<N: SourceNormalizer> MetricsNormalizer<N> {
    pub fn new(inner: N) -> Self {
        Self { inner }
    }
}

impl<N: SourceNormalizer> SourceNormalizer for MetricsNormalizer<N> {
    fn normalize(
        &self,
        item: &RawAcquiredItem,
        ctx: &NormalizeContext,
    ) -> Result<RawImportedEvent, NormalizeError> {
        let result = self.inner.normalize(item, ctx);
        ImportMetrics::record_normalized(ctx.platform, result.is_ok());
        result
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

pub(crate) fn unexpected_shape(platform: Platform, item: &RawAcquiredItem) -> NormalizeError {
    let kind = match item {
        RawAcquiredItem::Broker(_) => "broker item",
        RawAcquiredItem::LumaPage(_) => "Lu.ma page",
        RawAcquiredItem::OpenGraph(_) => "OpenGraph page",
    };
    NormalizeError::UnexpectedShape {
        platform,
        detail: format!("got a {kind}"),
    }
}

/// The JSON object inside a broker item. Datasets can carry strings or nulls
/// between real entries; those are rejected here so they still get counted.
pub(crate) fn broker_object<'a>(
    platform: Platform,
    item: &'a RawAcquiredItem,
) -> Result<&'a Value, NormalizeError> {
    match item {
        RawAcquiredItem::Broker(value @ Value::Object(_)) => Ok(value),
        RawAcquiredItem::Broker(other) => {
            let kind = match other {
                Value::Null => "null",
                Value::Bool(_) => "boolean",
                Value::Number(_) => "number",
                Value::String(_) => "string",
                Value::Array(_) => "array",
                Value::Object(_) => "object",
            };
            Err(NormalizeError::UnexpectedShape {
                platform,
                detail: format!("dataset entry is a {kind}, not an object"),
            })
        }
        other => Err(unexpected_shape(platform, other)),
    }
}

/// Shared utilities for normalizers
pub struct NormalizerUtils;

impl NormalizerUtils {
    /// Walks `path` through objects, and through arrays for numeric segments.
    pub fn value_at<'a>(data: &'a Value, path: &[&str]) -> Option<&'a Value> {
        path.iter().try_fold(data, |current, segment| match current {
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => current.get(*segment),
        })
    }

    /// String (or number) at `path`, trimmed; blank becomes `None`.
    pub fn str_at(data: &Value, path: &[&str]) -> Option<String> {
        match Self::value_at(data, path)? {
            Value::String(s) => Self::clean(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// First non-blank string among `paths`.
    pub fn first_str(data: &Value, paths: &[&[&str]]) -> Option<String> {
        paths.iter().find_map(|path| Self::str_at(data, path))
    }

    pub fn num_at(data: &Value, path: &[&str]) -> Option<f64> {
        match Self::value_at(data, path)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn bool_at(data: &Value, path: &[&str]) -> Option<bool> {
        match Self::value_at(data, path)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// First parseable date among `paths`. Values may be strings or unix timestamps.
    pub fn first_datetime(data: &Value, paths: &[&[&str]]) -> Option<DateTime<Utc>> {
        paths
            .iter()
            .filter_map(|path| Self::value_at(data, path))
            .find_map(Self::datetime_value)
    }

    pub fn datetime_value(value: &Value) -> Option<DateTime<Utc>> {
        match value {
            Value::Number(n) => n.as_f64().and_then(Self::from_unix),
            Value::String(s) => Self::parse_datetime(s),
            _ => None,
        }
    }

    /// Accepts RFC 3339, naive date-times (read as UTC), bare dates and unix timestamps.
    pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
        let s = raw.trim();
        if s.is_empty() {
            return None;
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z") {
            return Some(dt.with_timezone(&Utc));
        }
        for format in [
            "%Y-%m-%dT%H:%M:%S%.f",
            "%Y-%m-%dT%H:%M",
            "%Y-%m-%d %H:%M:%S%.f",
            "%Y-%m-%d %H:%M",
        ] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
                return Some(Utc.from_utc_datetime(&naive));
            }
        }
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return date.and_hms_opt(0, 0, 0).map(|n| Utc.from_utc_datetime(&n));
        }
        if s.bytes().all(|b| b.is_ascii_digit()) {
            return s.parse::<f64>().ok().and_then(Self::from_unix);
        }
        None
    }

    fn from_unix(value: f64) -> Option<DateTime<Utc>> {
        if !value.is_finite() || value <= 0.0 {
            return None;
        }
        let millis = if value > MILLIS_THRESHOLD {
            value
        } else {
            value * 1000.0
        };
        Utc.timestamp_millis_opt(millis as i64).single()
    }

    /// Trims and collapses whitespace; blank becomes `None`.
    pub fn clean(value: &str) -> Option<String> {
        let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            None
        } else {
            Some(collapsed)
        }
    }

    /// Trims a description and caps its length. Line breaks are kept.
    pub fn clean_description(value: Option<String>) -> Option<String> {
        let text = value?;
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(match trimmed.char_indices().nth(MAX_DESCRIPTION_CHARS) {
            Some((idx, _)) => trimmed[..idx].to_string(),
            None => trimmed.to_string(),
        })
    }

    pub fn require_title(title: Option<String>) -> Result<String, NormalizeError> {
        title
            .and_then(|t| Self::clean(&t))
            .ok_or(NormalizeError::MissingTitle)
    }

    /// Applies the platform's start-time policy: a missing start skips the
    /// item where the platform requires one, and is kept as `None` elsewhere.
    pub fn require_start(
        platform: Platform,
        starts_at: Option<DateTime<Utc>>,
        title: &str,
    ) -> Result<Option<DateTime<Utc>>, NormalizeError> {
        match starts_at {
            None if platform.requires_start_time() => Err(NormalizeError::MissingStartTime {
                title: title.to_string(),
            }),
            other => Ok(other),
        }
    }
}

/// Resolved location fields, coordinates kept only as a valid pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedLocation {
    pub location_name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

pub fn resolve_location(
    venue_name: Option<String>,
    address: Option<String>,
    city: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
) -> ResolvedLocation {
    let (latitude, longitude) = match (latitude, longitude) {
        (Some(lat), Some(lng))
            if lat.is_finite()
                && lng.is_finite()
                && (-90.0..=90.0).contains(&lat)
                && (-180.0..=180.0).contains(&lng) =>
        {
            (Some(lat), Some(lng))
        }
        _ => (None, None),
    };
    let venue_name = venue_name.and_then(|v| NormalizerUtils::clean(&v));
    let address = address.and_then(|a| NormalizerUtils::clean(&a));
    ResolvedLocation {
        location_name: venue_name.or_else(|| address.clone()),
        address,
        city: city.and_then(|c| NormalizerUtils::clean(&c)),
        latitude,
        longitude,
    }
}

/// `(is_free, price)`. Free unless the source says otherwise.
pub fn resolve_price(free_flag: Option<bool>, price: Option<&Value>) -> (bool, Option<String>) {
    let (text, amount) = match price {
        Some(Value::Number(n)) => (Some(n.to_string()), n.as_f64()),
        Some(Value::String(s)) => {
            let text = NormalizerUtils::clean(s);
            let amount = text.as_deref().and_then(amount_in);
            (text, amount)
        }
        _ => (None, None),
    };

    let priced = match (&text, amount) {
        (_, Some(amount)) => amount > 0.0,
        (Some(t), None) => !t.to_ascii_lowercase().contains("free"),
        (None, None) => false,
    };

    let is_free = match free_flag {
        Some(flag) => flag,
        None => !priced,
    };
    (is_free, if priced { text } else { None })
}

/// First numeric amount in a price text such as "$25.00" or "From €10".
fn amount_in(text: &str) -> Option<f64> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let digits: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .filter(|c| *c != ',')
        .collect();
    digits.parse().ok()
}
