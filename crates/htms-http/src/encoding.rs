//! Content-encoding negotiation.

use std::fmt;

/// A response encoding the adapter can offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    Brotli,
    Gzip,
    Deflate,
    Identity,
}

impl Encoding {
    /// Token used in `Accept-Encoding` / `Content-Encoding`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Brotli => "br",
            Self::Gzip => "gzip",
            Self::Deflate => "deflate",
            Self::Identity => "identity",
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        match token {
            "br" => Some(Self::Brotli),
            "gzip" | "x-gzip" => Some(Self::Gzip),
            "deflate" => Some(Self::Deflate),
            // Any encoding; prefer the strongest.
            "*" => Some(Self::Brotli),
            _ => None,
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn parse_quality(params: &str) -> f32 {
    params
        .split(';')
        .filter_map(|p| p.trim().strip_prefix("q="))
        .find_map(|q| q.trim().parse::<f32>().ok())
        .unwrap_or(1.0)
}

/// Pick the encoding for a response from an `Accept-Encoding` value.
///
/// The highest quality wins; ties go to the encoding the client listed
/// first. Encodings with `q=0` are refused. Without a usable entry the
/// response is sent as `identity`.
pub fn negotiate_encoding(accept_encoding: Option<&str>) -> Encoding {
    let Some(header) = accept_encoding else {
        return Encoding::Identity;
    };

    let mut best: Option<(Encoding, f32)> = None;
    for entry in header.split(',') {
        let (token, params) = entry.split_once(';').unwrap_or((entry, ""));
        let token = token.trim().to_ascii_lowercase();
        let Some(encoding) = Encoding::from_token(&token) else {
            continue;
        };

        let quality = parse_quality(params);
        if quality <= 0.0 {
            continue;
        }
        if best.map_or(true, |(_, q)| quality > q) {
            best = Some((encoding, quality));
        }
    }

    best.map_or(Encoding::Identity, |(encoding, _)| encoding)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_header() {
        assert_eq!(negotiate_encoding(None), Encoding::Identity);
        assert_eq!(negotiate_encoding(Some("")), Encoding::Identity);
    }

    #[test]
    fn test_client_order_breaks_ties() {
        assert_eq!(negotiate_encoding(Some("gzip, deflate, br")), Encoding::Gzip);
        assert_eq!(negotiate_encoding(Some("br, gzip")), Encoding::Brotli);
    }

    #[test]
    fn test_quality_values() {
        assert_eq!(negotiate_encoding(Some("gzip;q=0.5, br;q=0.8")), Encoding::Brotli);
        assert_eq!(negotiate_encoding(Some("br;q=0, gzip;q=0.1")), Encoding::Gzip);
        assert_eq!(negotiate_encoding(Some("br;q=0")), Encoding::Identity);
    }

    #[test]
    fn test_unsupported_and_wildcard() {
        assert_eq!(negotiate_encoding(Some("zstd, compress")), Encoding::Identity);
        assert_eq!(negotiate_encoding(Some("zstd, *;q=0.5")), Encoding::Brotli);
        assert_eq!(negotiate_encoding(Some("GZIP")), Encoding::Gzip);
    }
}
