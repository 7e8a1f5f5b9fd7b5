use crate::error::{Error, Result};
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

static STATUS_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)status/(\d+)").expect("status pattern is valid"));

const KNOWN_HOSTS: [&str; 2] = ["twitter.com", "x.com"];

/// Extracts the numeric post id from a pasted post URL.
///
/// Only the `status/<digits>` segment is required; the host is checked
/// loosely so mirror and mobile links still work.
pub fn extract_post_id(input: &str) -> Result<String> {
    let input = input.trim();
    if input.is_empty() {
        return Err(Error::invalid_input("post url is required"));
    }

    let id = STATUS_SEGMENT
        .captures(input)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| Error::invalid_input(format!("not a post url: {input}")))?;

    if !is_known_host(input) {
        debug!("Post url {} is not on a known host, continuing anyway", input);
    }

    Ok(id)
}

pub fn is_known_host(input: &str) -> bool {
    let with_scheme = if input.contains("://") {
        input.to_string()
    } else {
        format!("https://{input}")
    };

    url::Url::parse(&with_scheme)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
        .is_some_and(|host| {
            KNOWN_HOSTS
                .iter()
                .any(|known| host == *known || host.ends_with(&format!(".{known}")))
        })
}
