//! # URL Normalization
//!
//! Dedup keys come from a conservative canonical form: two URLs share a key
//! only when the differences are cosmetic. The steps are
//!
//! 1. trim surrounding whitespace
//! 2. percent-decode `%XX` escapes (skipped when the result is not UTF-8)
//! 3. lowercase the scheme and host, never the path or query
//! 4. strip a leading `www.` from the host
//! 5. drop a single trailing slash when a non-root path is present
//!
//! `https://ex.com/` keeps its slash (root), `https://ex.com/papers/` loses
//! it. Query strings and fragments pass through untouched; reordering or
//! dropping them would merge URLs that are genuinely different resources.

use crate::config::DedupConfig;

/// Produces the canonical dedup key for a URL
pub trait UrlNormalizer: Send + Sync {
    fn normalize(&self, url: &str) -> String;
}

/// The default normalizer; each step can be disabled via [`DedupConfig`]
#[derive(Debug, Clone, Copy)]
pub struct StandardUrlNormalizer {
    strip_www: bool,
    strip_trailing_slash: bool,
    percent_decode: bool,
}

impl Default for StandardUrlNormalizer {
    fn default() -> Self {
        Self {
            strip_www: true,
            strip_trailing_slash: true,
            percent_decode: true,
        }
    }
}

impl StandardUrlNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &DedupConfig) -> Self {
        Self {
            strip_www: config.strip_www,
            strip_trailing_slash: config.strip_trailing_slash,
            percent_decode: config.percent_decode,
        }
    }
}

impl UrlNormalizer for StandardUrlNormalizer {
    fn normalize(&self, url: &str) -> String {
        let mut normalized = url.trim().to_string();

        if self.percent_decode {
            normalized = percent_decode(&normalized);
        }

        if let Some(scheme_end) = normalized.find("://") {
            let scheme = normalized[..scheme_end].to_ascii_lowercase();
            let rest = &normalized[scheme_end + 3..];
            let host_end = rest
                .find(|c| matches!(c, '/' | '?' | '#'))
                .unwrap_or(rest.len());
            let mut host = rest[..host_end].to_ascii_lowercase();
            if self.strip_www {
                if let Some(bare) = host.strip_prefix("www.") {
                    host = bare.to_string();
                }
            }
            normalized = format!("{scheme}://{host}{}", &rest[host_end..]);
        }

        if self.strip_trailing_slash && normalized.ends_with('/') {
            if let Some(scheme_end) = normalized.find("://") {
                let after_host = &normalized[scheme_end + 3..];
                // keep the slash of a bare root URL
                if let Some(path_start) = after_host.find('/') {
                    if path_start + 1 < after_host.len() {
                        normalized.pop();
                    }
                }
            } else if normalized.len() > 1 {
                normalized.pop();
            }
        }

        normalized
    }
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        if bytes[index] == b'%' && index + 2 < bytes.len() {
            if let (Some(high), Some(low)) = (hex_value(bytes[index + 1]), hex_value(bytes[index + 2]))
            {
                decoded.push(high * 16 + low);
                index += 3;
                continue;
            }
        }
        decoded.push(bytes[index]);
        index += 1;
    }
    String::from_utf8(decoded).unwrap_or_else(|_| input.to_string())
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}
