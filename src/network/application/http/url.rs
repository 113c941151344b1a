//! Splitting absolute URLs into the pieces the engine needs.
//!
//! Pre-signed object storage URLs are the usual input:
//!
//! ```rust
//! use libiot_https::network::application::http::url;
//!
//! let link = "https://bucket.s3.amazonaws.com/fw/app.bin?X-Amz-Signature=abc";
//! assert_eq!(url::url_address(link), Ok("bucket.s3.amazonaws.com"));
//! assert_eq!(url::url_path(link), Ok("/fw/app.bin?X-Amz-Signature=abc"));
//! assert_eq!(url::url_port(link), None);
//! ```

use super::error::Error;

/// Splits `scheme://authority/rest` into authority and rest.
fn split(url: &str) -> Result<(&str, &str), Error> {
    let (scheme, after) = url.split_once("://").ok_or(Error::InvalidParameter)?;
    if scheme.is_empty() || !scheme.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'+') {
        return Err(Error::InvalidParameter);
    }
    let end = after.find(['/', '?', '#']).unwrap_or(after.len());
    Ok(after.split_at(end))
}

/// Host and optional port of the authority, without user information.
fn host_port(url: &str) -> Result<(&str, Option<&str>), Error> {
    let (authority, _) = split(url)?;
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, hp)| hp);
    if let Some(bracketed) = host_port.strip_prefix('[') {
        let (host, tail) = bracketed.split_once(']').ok_or(Error::InvalidParameter)?;
        return Ok((host, tail.strip_prefix(':')));
    }
    Ok(match host_port.rsplit_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (host_port, None),
    })
}

/// The host of `url`, brackets removed for IPv6 literals.
pub fn url_address(url: &str) -> Result<&str, Error> {
    let (host, _) = host_port(url)?;
    if host.is_empty() {
        return Err(Error::NotFound);
    }
    Ok(host)
}

/// Path and query of `url`, without the fragment, ready to be used as the
/// request target.
///
/// A URL without an explicit path, such as `https://host?x=1`, has no
/// borrowable origin-form target and yields `NotFound`; request `/` and the
/// query yourself in that case.
pub fn url_path(url: &str) -> Result<&str, Error> {
    let (_, rest) = split(url)?;
    let rest = rest.split_once('#').map_or(rest, |(before, _)| before);
    if !rest.starts_with('/') {
        return Err(Error::NotFound);
    }
    Ok(rest)
}

/// The explicit port of `url`, if any.
pub fn url_port(url: &str) -> Option<u16> {
    let (_, port) = host_port(url).ok()?;
    port?.parse().ok()
}
