// Boundaries between the import pipeline and the outside world
pub mod ports;

pub use ports::{HttpClientPort, HttpMethod, HttpRequest, HttpResponse, TransportError};
