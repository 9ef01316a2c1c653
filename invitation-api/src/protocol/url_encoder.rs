//! Encodes one guest's invitation state into the iframe URL of a template
//! deployment. The template contract of the event picks the wire layout.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::Value;
use shared_types::{Event, Guest, GuestAccessGrid, TemplateContract, Wish};
use url::form_urlencoded;

/// Characters `encodeURIComponent` leaves untouched.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub const MISSING_DATA_PARAM: &str = "error=missing_data";

/// Scalar details: (details key, extended name, compact name).
const SCALAR_FIELDS: &[(&str, &str, &str)] = &[
    ("brideName", "brideName", "bride"),
    ("groomName", "groomName", "groom"),
    ("weddingDate", "weddingDate", "date"),
    ("weddingTime", "weddingTime", "time"),
    ("venueName", "venueName", "venue"),
    ("venueAddress", "venueAddress", "address"),
    ("venueMapUrl", "venueMapUrl", "map"),
    ("coverImage", "coverImage", "cover"),
    ("invitationMessage", "invitationMessage", "msg"),
    ("dressCode", "dressCode", "dress"),
    ("hashtag", "hashtag", "tag"),
    ("musicUrl", "musicUrl", "music"),
    ("primaryColor", "primaryColor", "color"),
    ("rsvpDeadline", "rsvpDeadline", "deadline"),
];

/// Structured details: (details key, extended name, compact name).
const COMPOSITE_FIELDS: &[(&str, &str, &str)] = &[
    ("brideFamily", "brideFamily", "bf"),
    ("groomFamily", "groomFamily", "gf"),
    ("contacts", "contacts", "contacts"),
];

/// Inputs to the URL beyond the event and guest rows.
#[derive(Debug, Clone, Default)]
pub struct UrlExtras<'a> {
    /// Sub-event grants for the guest; every sub-event is shown when absent.
    pub access: Option<&'a GuestAccessGrid>,
    pub wishes: &'a [Wish],
    pub preview: bool,
    pub hero_preview: bool,
    /// Passed through verbatim after the generated parameters.
    pub params: Vec<(String, String)>,
}

pub fn encode_uri_component(raw: &str) -> String {
    utf8_percent_encode(raw, URI_COMPONENT).to_string()
}

/// Builds the iframe URL for `guest` of `event`.
///
/// Never fails: a missing event or guest yields `{base}?error=missing_data`
/// and missing details are left out of the query. The output depends only on
/// the arguments.
pub fn build_invitation_url(
    base_url: &str,
    event: Option<&Event>,
    guest: Option<&Guest>,
    extras: &UrlExtras<'_>,
) -> String {
    let (Some(event), Some(guest)) = (event, guest) else {
        tracing::warn!("Cannot build invitation URL: event or guest missing");
        return join(base_url, MISSING_DATA_PARAM);
    };

    let mut query = form_urlencoded::Serializer::new(String::new());
    append_core(&mut query, event, guest);

    match event.template_contract {
        TemplateContract::ExtendedParams => append_extended(&mut query, event, guest, extras),
        TemplateContract::CompactParams => append_compact(&mut query, event, guest, extras),
    }

    if extras.preview {
        query.append_pair("preview", "true");
    }
    if extras.hero_preview {
        query.append_pair("isHeroPreview", "true");
    }
    for (name, value) in &extras.params {
        if !name.is_empty() && !value.is_empty() {
            query.append_pair(name, value);
        }
    }

    join(base_url, &query.finish())
}

fn join(base_url: &str, query: &str) -> String {
    let separator = if base_url.ends_with('?') || base_url.ends_with('&') {
        ""
    } else if base_url.contains('?') {
        "&"
    } else {
        "?"
    };
    format!("{base_url}{separator}{query}")
}

type Query = form_urlencoded::Serializer<'static, String>;

/// Parameters every contract carries under the same names.
fn append_core(query: &mut Query, event: &Event, guest: &Guest) {
    let status = guest.status();
    query.append_pair("eventId", &event.public_id());
    query.append_pair("guestId", &guest.public_id());
    query.append_pair("guestStatus", status.as_str());
    query.append_pair("hasResponded", bool_param(status.has_responded()));
    query.append_pair("accepted", bool_param(guest.accepted));
    query.append_pair("rsvpConfig", &event.rsvp_config.to_json_string());
}

fn append_extended(query: &mut Query, event: &Event, guest: &Guest, extras: &UrlExtras<'_>) {
    let details = &event.details;

    if !guest.name.trim().is_empty() {
        query.append_pair("guestName", &guest.name);
    }
    if !event.name.trim().is_empty() {
        query.append_pair("eventName", &event.name);
    }
    for (key, name, _) in SCALAR_FIELDS {
        if let Some(value) = details.text(key) {
            query.append_pair(name, &value);
        }
    }

    for (key, name, _) in COMPOSITE_FIELDS {
        if let Some(json) = details.value(key).and_then(composite_json) {
            query.append_pair(name, &encode_uri_component(&json));
        }
    }
    if let Some(json) = json_list(details.list("photos").to_vec()) {
        query.append_pair("photos", &encode_uri_component(&json));
    }
    if let Some(json) = json_list(visible_sub_events(event, extras)) {
        query.append_pair("events", &encode_uri_component(&json));
    }

    query.append_pair("wishesEnabled", bool_param(details.wishes_enabled()));
    if let Some(json) = wishes_json(extras.wishes) {
        query.append_pair("wishes", &encode_uri_component(&json));
    }
}

fn append_compact(query: &mut Query, event: &Event, guest: &Guest, extras: &UrlExtras<'_>) {
    let details = &event.details;

    if !guest.name.trim().is_empty() {
        query.append_pair("name", &guest.name);
    }
    if !event.name.trim().is_empty() {
        query.append_pair("title", &event.name);
    }
    for (key, _, name) in SCALAR_FIELDS {
        if let Some(value) = details.text(key) {
            query.append_pair(name, &value);
        }
    }

    for (key, _, name) in COMPOSITE_FIELDS {
        if let Some(json) = details.value(key).and_then(composite_json) {
            query.append_pair(name, &json);
        }
    }
    let photos: Vec<&str> = details.list("photos").iter().filter_map(photo_url).collect();
    if !photos.is_empty() {
        query.append_pair("photos", &photos.join(","));
    }
    if let Some(json) = json_list(visible_sub_events(event, extras)) {
        query.append_pair("ev", &json);
    }

    query.append_pair("we", bool_param(details.wishes_enabled()));
    if let Some(json) = wishes_json(extras.wishes) {
        query.append_pair("w", &json);
    }
}

fn bool_param(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

fn visible_sub_events(event: &Event, extras: &UrlExtras<'_>) -> Vec<Value> {
    let sub_events = event.details.sub_events();
    match extras.access {
        Some(grid) => grid.filter_sub_events(sub_events),
        None => sub_events.to_vec(),
    }
}

fn composite_json(value: &Value) -> Option<String> {
    match value {
        Value::Array(items) if items.is_empty() => None,
        Value::Object(map) if map.is_empty() => None,
        Value::Array(_) | Value::Object(_) => serde_json::to_string(value).ok(),
        Value::String(s) if !s.trim().is_empty() => serde_json::to_string(value).ok(),
        _ => None,
    }
}

fn json_list(items: Vec<Value>) -> Option<String> {
    if items.is_empty() {
        return None;
    }
    serde_json::to_string(&items).ok()
}

/// Photos are stored either as bare URLs or as `{url}` / `{src}` objects.
fn photo_url(item: &Value) -> Option<&str> {
    let url = match item {
        Value::String(s) => s.as_str(),
        Value::Object(map) => map
            .get("url")
            .or_else(|| map.get("src"))
            .and_then(Value::as_str)?,
        _ => return None,
    };
    let url = url.trim();
    (!url.is_empty()).then_some(url)
}

/// Approved wishes only, with image data replaced by the marker.
fn wishes_json(wishes: &[Wish]) -> Option<String> {
    let safe: Vec<Wish> = wishes
        .iter()
        .filter(|w| w.is_approved)
        .map(Wish::without_image_data)
        .collect();
    if safe.is_empty() {
        return None;
    }
    serde_json::to_string(&safe).ok()
}
