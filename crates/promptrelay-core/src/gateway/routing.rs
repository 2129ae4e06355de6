//! Route token resolution: alias lookup, scheme completion, URL validation.

use crate::error::{GatewayError, GatewayResult};
use url::Url;

/// Short names accepted in place of a full upstream URL.
const ALIASES: &[(&str, &str)] = &[
    ("claude", "https://api.anthropic.com/v1/messages"),
    ("openai", "https://api.openai.com/v1/chat/completions"),
];

/// Resolve the raw path remainder into the exact upstream URL string.
///
/// The returned string is what gets matched against the whitelist, so it is
/// passed through verbatim after validation rather than re-serialized from
/// the parsed form.
pub fn resolve_target(raw: &str) -> GatewayResult<String> {
    let token = raw.trim();
    if token.is_empty() {
        return Err(GatewayError::InvalidTarget("empty route".to_string()));
    }

    for (alias, url) in ALIASES {
        if token.eq_ignore_ascii_case(alias) {
            return Ok((*url).to_string());
        }
    }

    let candidate = match explicit_scheme(token) {
        Some(scheme)
            if scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https") =>
        {
            token.to_string()
        }
        Some(scheme) => {
            return Err(GatewayError::InvalidTarget(format!("unsupported scheme {scheme}")));
        }
        None => format!("https://{token}"),
    };

    let parsed = Url::parse(&candidate)
        .map_err(|err| GatewayError::InvalidTarget(format!("{token}: {err}")))?;
    if parsed.host_str().is_none() {
        return Err(GatewayError::InvalidTarget(format!("{token}: missing host")));
    }

    Ok(candidate)
}

/// Returns the scheme of a token that carries one explicitly. A `://` inside
/// a path or query does not count.
fn explicit_scheme(token: &str) -> Option<&str> {
    let (scheme, _) = token.split_once("://")?;
    if !scheme.is_empty()
        && scheme.chars().all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '+' | '-' | '.'))
    {
        Some(scheme)
    } else {
        None
    }
}
