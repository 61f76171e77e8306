use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Errors that can occur when validating a configured feed URL.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL points to a private/internal IP address.
    #[error("Private IP address not allowed: {0}")]
    PrivateIp(String),
    /// The URL points to localhost.
    #[error("Localhost not allowed")]
    Localhost,
}

/// Validates a configured feed URL.
///
/// Feed URLs are handed to a public proxy, so anything that only makes sense
/// on the local network is rejected: non-HTTP(S) schemes, `localhost`,
/// loopback, RFC 1918, link-local and unique-local addresses.
///
/// # Examples
///
/// ```
/// use feedboard::util::validate_url;
///
/// assert!(validate_url("https://nrkbeta.no/feed/").is_ok());
/// assert!(validate_url("http://localhost/feed").is_err());
/// assert!(validate_url("file:///etc/passwd").is_err());
/// ```
pub fn validate_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str)?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    if let Some(host) = url.host_str() {
        if host.eq_ignore_ascii_case("localhost") {
            return Err(UrlValidationError::Localhost);
        }

        let bare = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);

        if let Ok(ip) = bare.parse::<IpAddr>() {
            if ip.is_loopback() {
                return Err(UrlValidationError::Localhost);
            }
            if is_private_ip(&ip) {
                return Err(UrlValidationError::PrivateIp(ip.to_string()));
            }
        }
    }

    Ok(url)
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_link_local() || v4.is_unspecified(),
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            // fc00::/7 unique local, fe80::/10 link local
            v6.is_unspecified() || (first & 0xfe00) == 0xfc00 || (first & 0xffc0) == 0xfe80
        }
    }
}

/// Hostname of `url`, if it parses and has one.
pub fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_owned))
        .filter(|h| !h.is_empty())
}

/// Best-effort absolutization of an entry link.
///
/// Absolute URLs are returned untouched. Otherwise a single leading run of
/// slashes is replaced by `https://` (`//host/a` becomes `https://host/a`);
/// a value without leading slashes is returned as given.
pub fn absolutize_link(href: &str) -> String {
    if Url::parse(href).is_ok() {
        return href.to_owned();
    }
    let rest = href.trim_start_matches('/');
    if rest.len() == href.len() {
        return href.to_owned();
    }
    format!("https://{rest}")
}

/// Resolves an image reference found in an entry against `base`.
///
/// - absolute `http`/`https` URLs are normalised by the URL parser
/// - protocol-relative `//host/...` gets an explicit `https:` scheme
/// - anything else is joined onto `base`
///
/// Returns `None` when the reference cannot be turned into an `http(s)` URL.
pub fn resolve_url(href: &str, base: Option<&Url>) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    let resolved = if href.starts_with("//") {
        Url::parse(&format!("https:{href}")).ok()?
    } else {
        match Url::parse(href) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => base?.join(href).ok()?,
            Err(_) => return None,
        }
    };

    match resolved.scheme() {
        "http" | "https" => Some(resolved.to_string()),
        _ => None,
    }
}
