use thiserror::Error;
use url::Url;

use crate::context::RequestContext;

/// Path prefix the hosting directory is served under.
pub const MOUNT_PATH: &str = "filehost";

#[derive(Debug, Error)]
pub enum UrlError {
    #[error("No host override configured and no inbound request host to derive a URL from")]
    NoReachableBaseUrl,
    #[error("Request host header {0:?} is not a valid authority")]
    InvalidHost(String),
    #[error("Base URL {0} cannot carry a path")]
    CannotBeABase(String),
}

/// Build the public URL for a hosted file named `name`.
///
/// `override_base` wins when set. Otherwise the scheme and `host` header of
/// `request` are used. `name` may contain `/`; each segment is percent-encoded.
pub fn build_url(
    name: &str,
    override_base: Option<&Url>,
    request: Option<&RequestContext>,
) -> Result<Url, UrlError> {
    let mut url = match (override_base, request) {
        (Some(base), _) => base.clone(),
        (None, Some(ctx)) => request_base(ctx)?,
        (None, None) => return Err(UrlError::NoReachableBaseUrl),
    };

    if url.cannot_be_a_base() {
        return Err(UrlError::CannotBeABase(url.to_string()));
    }

    url.set_query(None);
    url.set_fragment(None);
    if let Ok(mut segments) = url.path_segments_mut() {
        segments
            .pop_if_empty()
            .push(MOUNT_PATH)
            .extend(name.split('/').filter(|s| !s.is_empty()));
    }

    Ok(url)
}

fn request_base(ctx: &RequestContext) -> Result<Url, UrlError> {
    let host = ctx.host().ok_or(UrlError::NoReachableBaseUrl)?;
    let scheme = public_scheme(&ctx.scheme);

    let url = Url::parse(&format!("{scheme}://{host}/"))
        .map_err(|_| UrlError::InvalidHost(host.to_string()))?;

    // Anything beyond an authority (path, userinfo smuggled in via '@') is rejected.
    if url.path() != "/"
        || url.query().is_some()
        || url.fragment().is_some()
        || !url.username().is_empty()
    {
        return Err(UrlError::InvalidHost(host.to_string()));
    }

    Ok(url)
}

/// WebSocket schemes map onto their HTTP counterparts; unknown schemes become `http`.
pub fn public_scheme(scheme: &str) -> &'static str {
    match scheme {
        "https" | "wss" => "https",
        _ => "http",
    }
}
