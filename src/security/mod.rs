pub mod url_safety;

pub use url_safety::{is_safe, validate, UnsafeReason};
