//! Turns a mirror's metadata document into a canonical media list.
//!
//! The mirror has shipped several response schemas over time, so every
//! field lookup goes through an ordered table: the first non-empty entry wins
//! and a new schema revision is one more row.

use super::types::{FetchResult, MediaItem, MediaKind, VariantCandidate};
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;
use url::Url;

/// Where the media array has lived, highest priority first.
const MEDIA_ARRAY_FIELDS: &[&str] = &["media_extended", "media", "media_urls", "mediaURLs"];

const PHOTO_URL_FIELDS: &[&str] = &["url", "media_url_https", "media_url"];

const THUMBNAIL_FIELDS: &[&str] = &["thumbnail_url", "media_url_https", "media_url"];

/// Fields that may carry a ready-to-use CDN video URL.
const DIRECT_VIDEO_FIELDS: &[&str] = &["url"];

/// JSON pointers to the variant list; newer schemas keep it top level.
const VARIANT_FIELDS: &[&str] = &["/variants", "/video_info/variants"];

const VIDEO_CDN_HOST: &str = "video.twimg.com";
const MP4_CONTENT_TYPE: &str = "video/mp4";

const SIZE_PARAM: &str = "name";
const ORIGINAL_SIZE: &str = "orig";

fn first_str<'a>(value: &'a Value, fields: &[&str]) -> Option<&'a str> {
    fields.iter().find_map(|field| {
        value
            .get(field)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    })
}

/// Returns the first non-empty media array of the document.
pub fn media_array(body: &Value) -> Option<&[Value]> {
    MEDIA_ARRAY_FIELDS.iter().find_map(|field| {
        body.get(field)
            .and_then(Value::as_array)
            .filter(|array| !array.is_empty())
            .map(Vec::as_slice)
    })
}

fn parse_http_url(raw: &str) -> Option<Url> {
    Url::parse(raw)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https"))
}

/// Rewrites a photo URL so it requests the original-resolution rendition.
/// Any existing size parameter is dropped first, so this is idempotent.
/// Other query parameters are kept byte for byte.
pub fn original_photo_url(raw: &str) -> Option<String> {
    let mut url = parse_http_url(raw)?;

    let size = format!("{SIZE_PARAM}={ORIGINAL_SIZE}");
    let query = url
        .query()
        .unwrap_or("")
        .split('&')
        .filter(|pair| !pair.is_empty() && pair.split('=').next() != Some(SIZE_PARAM))
        .chain([size.as_str()])
        .collect::<Vec<_>>()
        .join("&");
    url.set_query(Some(&query));

    Some(url.into())
}

fn is_direct_video(raw: &str) -> bool {
    parse_http_url(raw).is_some_and(|url| url.host_str() == Some(VIDEO_CDN_HOST))
}

fn as_candidate(variant: &Value) -> Option<VariantCandidate<'_>> {
    let url = variant
        .get("url")
        .and_then(Value::as_str)
        .filter(|u| !u.is_empty())?;
    let bitrate = variant
        .get("bitrate")
        .and_then(|b| b.as_u64().or_else(|| b.as_f64().map(|f| f as u64)))
        .unwrap_or(0);

    Some(VariantCandidate {
        url,
        content_type: variant
            .get("content_type")
            .and_then(Value::as_str)
            .unwrap_or(""),
        bitrate,
    })
}

/// Highest-bitrate MP4 rendition. On equal bitrate the earlier entry stays.
pub fn best_mp4_variant(variants: &[Value]) -> Option<VariantCandidate<'_>> {
    let mut best: Option<VariantCandidate<'_>> = None;

    for candidate in variants.iter().filter_map(as_candidate) {
        if candidate.content_type != MP4_CONTENT_TYPE {
            continue;
        }
        match &best {
            Some(current) if current.bitrate >= candidate.bitrate => {}
            _ => best = Some(candidate),
        }
    }

    best
}

fn photo(raw: &Value) -> Option<MediaItem> {
    let url = original_photo_url(first_str(raw, PHOTO_URL_FIELDS)?)?;
    Some(MediaItem {
        thumbnail: Some(url.clone()),
        url,
        kind: MediaKind::Photo,
    })
}

fn variants(raw: &Value) -> Option<&[Value]> {
    VARIANT_FIELDS.iter().find_map(|pointer| {
        raw.pointer(pointer)
            .and_then(Value::as_array)
            .filter(|array| !array.is_empty())
            .map(Vec::as_slice)
    })
}

fn video(raw: &Value, kind: MediaKind) -> Option<MediaItem> {
    let direct = DIRECT_VIDEO_FIELDS.iter().find_map(|field| {
        raw.get(field)
            .and_then(Value::as_str)
            .filter(|u| is_direct_video(u))
    });

    let url = match direct {
        Some(url) => url,
        None => best_mp4_variant(variants(raw)?)?.url,
    };
    parse_http_url(url)?;

    Some(MediaItem {
        url: url.to_string(),
        kind,
        thumbnail: first_str(raw, THUMBNAIL_FIELDS).map(str::to_string),
    })
}

/// Legacy arrays list bare URLs with no type, so the URL itself decides.
fn bare_url(raw: &str) -> Option<MediaItem> {
    let url = parse_http_url(raw)?;
    if is_direct_video(raw) || url.path().ends_with(".mp4") {
        return Some(MediaItem {
            url: raw.to_string(),
            kind: MediaKind::Video,
            thumbnail: None,
        });
    }

    let url = original_photo_url(raw)?;
    Some(MediaItem {
        thumbnail: Some(url.clone()),
        url,
        kind: MediaKind::Photo,
    })
}

/// Parses one raw media descriptor. Shapes we don't understand yield `None`.
pub fn parse_descriptor(raw: &Value) -> Option<MediaItem> {
    match raw {
        Value::String(url) => bare_url(url),
        Value::Object(_) => {
            let kind = raw
                .get("type")
                .and_then(Value::as_str)
                .and_then(MediaKind::from_upstream)?;
            match kind {
                MediaKind::Photo => photo(raw),
                MediaKind::Video | MediaKind::AnimatedGif => video(raw, kind),
            }
        }
        _ => None,
    }
}

/// Canonical media list of a metadata document, unique by URL in first-seen order.
pub fn normalize_media(body: &Value) -> FetchResult {
    let Some(descriptors) = media_array(body) else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut items = Vec::with_capacity(descriptors.len());

    for raw in descriptors {
        let Some(item) = parse_descriptor(raw) else {
            debug!("Skipping unrecognized media descriptor: {}", raw);
            continue;
        };
        if seen.insert(item.url.clone()) {
            items.push(item);
        }
    }

    items
}
