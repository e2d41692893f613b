//! Media type detection from the leading bytes of an upload

use bytes::{Bytes, BytesMut};
use cdn_store::ByteStream;
use futures::{stream, StreamExt};
use tracing::warn;

/// Number of leading bytes inspected
pub const SNIFF_LEN: usize = 512;

/// Generic binary type used whenever nothing more specific applies
pub const OCTET_STREAM: &str = "application/octet-stream";

const HTML: &str = "text/html; charset=utf-8";
const XML: &str = "text/xml; charset=utf-8";
const TEXT: &str = "text/plain; charset=utf-8";

/// Tags that mark a document as HTML when followed by a space or `>`
const HTML_TAGS: &[&[u8]] = &[
    b"<!DOCTYPE HTML",
    b"<HTML",
    b"<HEAD",
    b"<SCRIPT",
    b"<IFRAME",
    b"<H1",
    b"<DIV",
    b"<FONT",
    b"<TABLE",
    b"<A",
    b"<STYLE",
    b"<TITLE",
    b"<B",
    b"<BODY",
    b"<BR",
    b"<P",
    b"<!--",
];

/// Fixed leading signatures, checked in order
const PREFIXES: &[(&[u8], &str)] = &[
    (b"%PDF-", "application/pdf"),
    (b"%!PS-Adobe-", "application/postscript"),
    (b"\xFE\xFF", "text/plain; charset=utf-16be"),
    (b"\xFF\xFE", "text/plain; charset=utf-16le"),
    (b"\xEF\xBB\xBF", TEXT),
    (b"\x00\x00\x01\x00", "image/x-icon"),
    (b"\x00\x00\x02\x00", "image/x-icon"),
    (b"BM", "image/bmp"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"\x89PNG\r\n\x1A\n", "image/png"),
    (b"\xFF\xD8\xFF", "image/jpeg"),
    (b".snd", "audio/basic"),
    (b"ID3", "audio/mpeg"),
    (b"OggS\x00", "application/ogg"),
    (b"MThd\x00\x00\x00\x06", "audio/midi"),
    (b"\x1A\x45\xDF\xA3", "video/webm"),
];

/// Embedded OpenType magic, found after the EOT header fields
const EOT_MAGIC: (usize, &[u8]) = (34, b"LP");

/// Signatures checked after the media containers and EOT
const LATE_PREFIXES: &[(&[u8], &str)] = &[
    (b"\x00\x01\x00\x00", "font/ttf"),
    (b"OTTO", "font/otf"),
    (b"ttcf", "font/collection"),
    (b"wOFF", "font/woff"),
    (b"wOF2", "font/woff2"),
    (b"\x1F\x8B\x08", "application/x-gzip"),
    (b"PK\x03\x04", "application/zip"),
    (b"Rar!\x1A\x07\x00", "application/x-rar-compressed"),
    (b"Rar!\x1A\x07\x01\x00", "application/x-rar-compressed"),
    (b"\x00asm", "application/wasm"),
];

/// Container formats: outer tag at 0..4, inner form type at 8..
const CONTAINERS: &[(&[u8], &[u8], &str)] = &[
    (b"RIFF", b"WEBPVP", "image/webp"),
    (b"FORM", b"AIFF", "audio/aiff"),
    (b"RIFF", b"AVI ", "video/avi"),
    (b"RIFF", b"WAVE", "audio/wave"),
];

/// A stream whose content type has been determined
pub struct Sniffed<'a> {
    /// Detected media type
    pub content_type: &'static str,
    /// The full original stream, starting at byte 0
    pub body: ByteStream<'a>,
}

/// Classifies uploads from their first [`SNIFF_LEN`] bytes
#[derive(Clone, Copy, Debug, Default)]
pub struct ContentSniffer;

impl ContentSniffer {
    /// Buffer up to [`SNIFF_LEN`] bytes from `body`, classify them, and hand
    /// back a stream that replays the buffered chunks before the rest.
    ///
    /// Never fails: a stream error before enough bytes arrive yields
    /// [`OCTET_STREAM`], and the error is replayed to the consumer.
    pub async fn sniff(mut body: ByteStream<'_>) -> Sniffed<'_> {
        let mut prefix = BytesMut::with_capacity(SNIFF_LEN);
        let mut buffered: Vec<std::io::Result<Bytes>> = Vec::new();
        let mut failed = false;

        while prefix.len() < SNIFF_LEN {
            match body.next().await {
                Some(Ok(chunk)) => {
                    let take = chunk.len().min(SNIFF_LEN - prefix.len());
                    prefix.extend_from_slice(&chunk[..take]);
                    buffered.push(Ok(chunk));
                }
                Some(Err(e)) => {
                    warn!(error = %e, "Failed to read upload prefix");
                    buffered.push(Err(e));
                    failed = true;
                    break;
                }
                None => break,
            }
        }

        let content_type = if failed {
            OCTET_STREAM
        } else {
            Self::detect(&prefix)
        };

        let rest = if failed { stream::empty().boxed() } else { body };
        Sniffed {
            content_type,
            body: stream::iter(buffered).chain(rest).boxed(),
        }
    }

    /// Classify a byte prefix. Only the first [`SNIFF_LEN`] bytes are read.
    pub fn detect(data: &[u8]) -> &'static str {
        let data = &data[..data.len().min(SNIFF_LEN)];
        if data.is_empty() {
            return OCTET_STREAM;
        }

        let trimmed = skip_whitespace(data);
        if HTML_TAGS.iter().any(|tag| is_html_tag(trimmed, tag)) {
            return HTML;
        }
        if trimmed.starts_with(b"<?xml") {
            return XML;
        }

        if let Some(&(_, content_type)) = PREFIXES.iter().find(|(sig, _)| data.starts_with(sig)) {
            return content_type;
        }

        if let Some(&(_, _, content_type)) = CONTAINERS.iter().find(|(outer, inner, _)| {
            data.starts_with(outer) && data.get(8..8 + inner.len()) == Some(*inner)
        }) {
            return content_type;
        }

        if is_mp4(data) {
            return "video/mp4";
        }

        let (offset, magic) = EOT_MAGIC;
        if data.get(offset..offset + magic.len()) == Some(magic) {
            return "application/vnd.ms-fontobject";
        }

        if let Some(&(_, content_type)) = LATE_PREFIXES
            .iter()
            .find(|(sig, _)| data.starts_with(sig))
        {
            return content_type;
        }

        if !data.iter().any(|&b| is_binary(b)) {
            return TEXT;
        }

        OCTET_STREAM
    }
}

fn skip_whitespace(data: &[u8]) -> &[u8] {
    let start = data
        .iter()
        .position(|&b| !matches!(b, b'\t' | b'\n' | b'\x0C' | b'\r' | b' '))
        .unwrap_or(data.len());
    &data[start..]
}

/// Case-insensitive tag match followed by a tag-terminating byte
fn is_html_tag(data: &[u8], tag: &[u8]) -> bool {
    if data.len() <= tag.len() {
        return false;
    }
    let matches = tag
        .iter()
        .zip(data)
        .all(|(&t, &d)| if t.is_ascii_uppercase() { d & 0xDF == t } else { d == t });
    matches && matches!(data[tag.len()], b' ' | b'>')
}

/// ISO base media file with an `mp4` brand in its `ftyp` box
fn is_mp4(data: &[u8]) -> bool {
    if data.len() < 12 || &data[4..8] != b"ftyp" {
        return false;
    }
    let box_size = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if box_size % 4 != 0 || box_size > data.len() {
        return false;
    }
    // Offset 12 holds the minor version, not a brand.
    (8..box_size)
        .step_by(4)
        .filter(|&offset| offset != 12)
        .any(|offset| data.get(offset..offset + 3) == Some(&b"mp4"[..]))
}

fn is_binary(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}
