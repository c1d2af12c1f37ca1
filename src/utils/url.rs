//! Endpoint URL construction.
//!
//! The backend address comes from user configuration, so it may or may not
//! carry a trailing slash or a path prefix (for example when it sits behind
//! a reverse proxy at `https://host/tok/`).

/// Strip trailing slashes from a configured base URL.
///
/// ```
/// use tok::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("http://127.0.0.1:5000/"), "http://127.0.0.1:5000");
/// assert_eq!(normalize_base_url("https://host/tok///"), "https://host/tok");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}

/// Join a base URL and an endpoint path with exactly one slash between them.
///
/// ```
/// use tok::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("http://127.0.0.1:5000", "api/query"),
///     "http://127.0.0.1:5000/api/query"
/// );
/// assert_eq!(
///     construct_api_url("https://host/tok/", "/api/history"),
///     "https://host/tok/api/history"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let normalized_base = normalize_base_url(base_url);
    let endpoint = endpoint.trim_start_matches('/');
    format!("{}/{}", normalized_base, endpoint)
}
