use crate::constants::{EVENTBRITE_HOSTS, FACEBOOK_HOSTS, LUMA_HOSTS};
use crate::error::{ImportError, Result};
use crate::types::{AcquisitionStrategy, ClassifiedTarget, Platform};
use url::Url;

/// Immutable view of the platform allow-list, built once from configuration.
#[derive(Debug, Clone, Default)]
pub struct PlatformConfig {
    opengraph_hosts: Vec<String>,
}

impl PlatformConfig {
    pub fn new(opengraph_hosts: Vec<String>) -> Self {
        Self { opengraph_hosts }
    }

    pub fn opengraph_hosts(&self) -> &[String] {
        &self.opengraph_hosts
    }

    /// Human-readable list used in the "unsupported URL" error.
    pub fn supported_hosts(&self) -> String {
        let mut hosts: Vec<&str> = vec!["facebook.com", "eventbrite.com", "lu.ma", "luma.com"];
        hosts.extend(self.opengraph_hosts.iter().map(String::as_str));
        hosts.join(", ")
    }
}

/// True when `host` is `domain` or one of its subdomains.
fn host_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

fn host_in(host: &str, domains: &[&str]) -> bool {
    domains.iter().any(|d| host_matches(host, d))
}

fn is_facebook_search(url: &Url) -> bool {
    url.path_segments()
        .map(|mut segments| segments.any(|s| s.eq_ignore_ascii_case("search")))
        .unwrap_or(false)
}

/// Maps a validated URL to its platform and acquisition strategy.
pub fn classify(url: &Url, config: &PlatformConfig) -> Result<ClassifiedTarget> {
    let host = url
        .host_str()
        .map(|h| h.trim_end_matches('.').to_ascii_lowercase())
        .unwrap_or_default();

    let (platform, strategy) = if host_in(&host, FACEBOOK_HOSTS) {
        if is_facebook_search(url) {
            (Platform::FacebookSearch, AcquisitionStrategy::Broker)
        } else {
            (Platform::Facebook, AcquisitionStrategy::Broker)
        }
    } else if host_in(&host, EVENTBRITE_HOSTS) {
        (Platform::Eventbrite, AcquisitionStrategy::Broker)
    } else if host_in(&host, LUMA_HOSTS) {
        (Platform::Luma, AcquisitionStrategy::DirectPage)
    } else if config
        .opengraph_hosts
        .iter()
        .any(|allowed| host_matches(&host, allowed))
    {
        (Platform::OpengraphGeneric, AcquisitionStrategy::OpenGraph)
    } else {
        return Err(ImportError::UnsupportedPlatform {
            supported: config.supported_hosts(),
        });
    };

    Ok(ClassifiedTarget {
        url: url.clone(),
        platform,
        strategy,
    })
}

/// Dedup key for an event page. Tracking query strings are dropped for the
/// platforms whose event identity lives entirely in the path.
pub fn canonical_source_url(url: &Url, platform: Platform) -> String {
    let mut canonical = url.clone();
    canonical.set_fragment(None);
    if matches!(
        platform,
        Platform::Facebook | Platform::FacebookSearch | Platform::Eventbrite | Platform::Luma
    ) {
        canonical.set_query(None);
    }
    let path = canonical.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        canonical.set_path(path.trim_end_matches('/'));
    }
    canonical.to_string()
}

/// Canonicalises a URL reported by the broker for one search result.
pub fn canonical_item_url(raw: &str, platform: Platform) -> Option<String> {
    let parsed = crate::security::validate(raw).ok()?;
    Some(canonical_source_url(&parsed, platform))
}
