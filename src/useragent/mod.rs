//! Browser and platform labels for click analytics.
//!
//! The labels produced here are consumed by existing reports, so the detection
//! order and the fallback format are fixed: the first matching rule wins and an
//! unrecognised header yields `Unknown, More-Info: <raw header>`.

/// Maps a raw `User-Agent` header to `(browser, platform)` labels.
pub trait UserAgentClassifier: Send + Sync {
    fn browser(&self, header: &str) -> String;

    fn platform(&self, header: &str) -> String;

    fn classify(&self, header: &str) -> (String, String) {
        (self.browser(header), self.platform(header))
    }
}

/// Substring heuristics over the lowercased header.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicClassifier;

const NETSCAPE_SIGNATURES: [&str; 6] = [
    "mozilla/7.0",
    "netscape6",
    "mozilla/4.7",
    "mozilla/4.78",
    "mozilla/4.08",
    "mozilla/3",
];

fn unknown(header: &str) -> String {
    format!("Unknown, More-Info: {header}")
}

/// The space-delimited token of `header` starting at `marker` (matched
/// case-insensitively). `lower` must be `header.to_ascii_lowercase()`.
fn token_at<'a>(header: &'a str, lower: &str, marker: &str) -> Option<&'a str> {
    let start = lower.find(marker)?;
    header[start..].split(' ').next()
}

/// `Name/1.2` becomes `Name-1.2`; a token without a version keeps the bare name.
fn dashed(name: &str, token: &str) -> String {
    match token.split_once('/') {
        Some((_, version)) => format!("{name}-{}", version.replace('/', "-")),
        None => name.to_string(),
    }
}

fn version_of(token: &str) -> Option<&str> {
    token.split('/').nth(1).filter(|v| !v.is_empty())
}

impl HeuristicClassifier {
    fn msie(header: &str, lower: &str) -> Option<String> {
        let start = lower.find("msie")?;
        let segment = header[start..].split(';').next()?;
        let version = segment.split(' ').nth(1).filter(|v| !v.is_empty())?;
        Some(format!("IE-{version}"))
    }

    fn safari(header: &str, lower: &str) -> Option<String> {
        let version = version_of(token_at(header, lower, "version")?)?;
        Some(format!("Safari-{version}"))
    }

    fn opera(header: &str, lower: &str) -> Option<String> {
        let version = token_at(header, lower, "version")
            .and_then(version_of)
            .or_else(|| token_at(header, lower, "opera").and_then(version_of))?;
        Some(format!("Opera-{version}"))
    }
}

impl UserAgentClassifier for HeuristicClassifier {
    fn browser(&self, header: &str) -> String {
        let lower = header.to_ascii_lowercase();

        let label = if lower.contains("msie") {
            Self::msie(header, &lower)
        } else if lower.contains("safari") && lower.contains("version") {
            Self::safari(header, &lower)
        } else if lower.contains("opera") {
            Self::opera(header, &lower)
        } else if lower.contains("opr") {
            token_at(header, &lower, "opr").map(|token| dashed("Opera", token))
        } else if lower.contains("chrome") {
            token_at(header, &lower, "chrome").map(|token| dashed("Chrome", token))
        } else if NETSCAPE_SIGNATURES.iter().any(|sig| lower.contains(sig)) {
            Some("Netscape-?".to_string())
        } else if lower.contains("firefox") {
            token_at(header, &lower, "firefox").map(|token| dashed("Firefox", token))
        } else if lower.contains("rv") {
            Some("IE".to_string())
        } else {
            None
        };

        label.unwrap_or_else(|| unknown(header))
    }

    fn platform(&self, header: &str) -> String {
        let lower = header.to_ascii_lowercase();

        let platform = if lower.contains("windows") {
            "Windows"
        } else if lower.contains("mac") {
            "Mac"
        } else if lower.contains("x11") {
            "Unix"
        } else if lower.contains("android") {
            "Android"
        } else if lower.contains("iphone") {
            "IPhone"
        } else {
            return unknown(header);
        };

        platform.to_string()
    }
}
