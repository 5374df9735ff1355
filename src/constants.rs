/// Platform identifiers, used in logs, metrics labels and the persisted `platform` column.
pub const FACEBOOK: &str = "facebook";
pub const FACEBOOK_SEARCH: &str = "facebook_search";
pub const EVENTBRITE: &str = "eventbrite";
pub const LUMA: &str = "luma";
pub const OPENGRAPH_GENERIC: &str = "opengraph_generic";

// Hosts recognised by the classifier (a subdomain of any of these also matches)
pub const FACEBOOK_HOSTS: &[&str] = &["facebook.com", "fb.me"];
pub const EVENTBRITE_HOSTS: &[&str] = &[
    "eventbrite.com",
    "eventbrite.co.uk",
    "eventbrite.ca",
    "eventbrite.com.au",
    "eventbrite.de",
    "eventbrite.fr",
    "eventbrite.es",
    "eventbrite.ie",
    "eventbrite.it",
    "eventbrite.nl",
];
pub const LUMA_HOSTS: &[&str] = &["lu.ma", "luma.com"];

// Broker defaults (Apify actor API)
pub const DEFAULT_BROKER_BASE_URL: &str = "https://api.apify.com/v2/acts";
pub const DEFAULT_FACEBOOK_EVENT_PROFILE: &str = "apify~facebook-events-scraper";
pub const DEFAULT_FACEBOOK_SEARCH_PROFILE: &str = "apify~facebook-events-scraper";
pub const DEFAULT_EVENTBRITE_PROFILE: &str = "aitorsm~eventbrite";
pub const DEFAULT_MAX_SEARCH_RESULTS: u32 = 50;

// Timing defaults, in seconds
pub const DEFAULT_REQUEST_DEADLINE_SECS: u64 = 60;
pub const DEFAULT_BROKER_TIMEOUT_SECS: u64 = 50;
pub const DEFAULT_PAGE_FETCH_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_PROCESSING_BUFFER_SECS: u64 = 5;

pub const DEFAULT_ITEM_CONCURRENCY: usize = 4;
pub const DEFAULT_MAX_PAGE_BYTES: usize = 5 * 1024 * 1024;
pub const DEFAULT_PORT: u16 = 8080;
pub const MAX_REDIRECTS: usize = 5;

/// Quiet sources fetched directly and read through their OpenGraph tags.
pub const DEFAULT_OPENGRAPH_HOSTS: &[&str] = &["meetup.com", "allevents.in"];

pub fn default_user_agent() -> String {
    format!(
        "event-importer/{} (+https://github.com/event-importer/event-importer)",
        env!("CARGO_PKG_VERSION")
    )
}

/// Header the upstream auth layer uses to pass the authenticated user id.
pub const USER_ID_HEADER: &str = "x-user-id";
