//! `<video>` / `<source>` extraction.
//!
//! Extension-based classification is authoritative; the element's `type`
//! attribute is consulted only when the URL carries no recognizable
//! extension. `currentSrc` is not part of serialized markup; the source it
//! would pick is covered by the `<source>` sweep.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use super::{Candidate, ScanContext};
use crate::classify::{is_stream_url, type_from_mime, type_from_url, StreamType};
use crate::record::provenance;

static VIDEO: LazyLock<Selector> = LazyLock::new(|| Selector::parse("video").expect("valid selector"));
static SOURCE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("source").expect("valid selector"));

/// Scan every `<video>` element in the document.
#[must_use]
pub fn scan_video_elements(document: &Html, ctx: &ScanContext) -> Vec<Candidate> {
    let mut out = Vec::new();

    for video in document.select(&VIDEO) {
        scan_video(video, ctx, &mut out);
    }

    out
}

fn scan_video(video: ElementRef<'_>, ctx: &ScanContext, out: &mut Vec<Candidate>) {
    let element = video.value();

    let src = element.attr("src").map(|raw| ctx.reflect(raw)).unwrap_or_default();
    if !src.is_empty() {
        let mime = element.attr("type").and_then(type_from_mime);
        if is_stream_url(&src) {
            let stream_type = type_from_url(&src);
            out.push(Candidate::new(src, stream_type, provenance::VIDEO_ELEMENT));
        } else if let Some(stream_type) = mime {
            out.push(Candidate::new(src, stream_type, provenance::VIDEO_ELEMENT_MIME));
        } else if src.starts_with("http") {
            out.push(Candidate::new(src, StreamType::Video, provenance::VIDEO_ELEMENT_FALLBACK));
        }
    }

    for source in video.select(&SOURCE) {
        scan_source(source, ctx, out);
    }

    // Lazy-loading players park the real URL in data attributes
    if let Some(data_src) = data_src(video) {
        if is_stream_url(data_src) {
            out.push(Candidate::new(data_src, type_from_url(data_src), provenance::VIDEO_DATA_SRC));
        }
    }
}

fn scan_source(source: ElementRef<'_>, ctx: &ScanContext, out: &mut Vec<Candidate>) {
    let reflected = source.value().attr("src").map(|raw| ctx.reflect(raw)).unwrap_or_default();
    let src = if reflected.is_empty() {
        match data_src(source) {
            Some(raw) => raw.to_string(),
            None => return,
        }
    } else {
        reflected
    };

    if is_stream_url(&src) {
        let stream_type = type_from_url(&src);
        out.push(Candidate::new(src, stream_type, provenance::VIDEO_SOURCE));
    } else if let Some(stream_type) = source.value().attr("type").and_then(type_from_mime) {
        out.push(Candidate::new(src, stream_type, provenance::VIDEO_SOURCE_MIME));
    }
}

/// `data-src`, falling back to `data-main`; empty values count as absent.
fn data_src<'a>(element: ElementRef<'a>) -> Option<&'a str> {
    let element = element.value();
    element
        .attr("data-src")
        .filter(|v| !v.is_empty())
        .or_else(|| element.attr("data-main").filter(|v| !v.is_empty()))
}
