use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Outcome of a single asynchronous check (safety or reachability).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    #[default]
    Unknown,
    Pass,
    Fail,
}

impl Verdict {
    pub fn from_option(value: Option<bool>) -> Self {
        match value {
            Some(true) => Verdict::Pass,
            Some(false) => Verdict::Fail,
            None => Verdict::Unknown,
        }
    }

    pub fn as_option(self) -> Option<bool> {
        match self {
            Verdict::Pass => Some(true),
            Verdict::Fail => Some(false),
            Verdict::Unknown => None,
        }
    }

    /// Only an explicit pass counts; `Unknown` is treated as not passed.
    pub fn passed(self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

impl From<bool> for Verdict {
    fn from(value: bool) -> Self {
        if value {
            Verdict::Pass
        } else {
            Verdict::Fail
        }
    }
}

/// Resolve an optional property to its value, or the type's default
/// (`false` for flags, `""` for text) when it has not been determined.
pub fn present_or_default<T: Default>(value: Option<T>) -> T {
    value.unwrap_or_default()
}

/// Target and HTTP redirect status for a short key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redirection {
    pub target: String,
    pub mode: u16,
}

/// Metadata captured when the mapping was created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortUrlProperties {
    pub ip: Option<String>,
    pub sponsor: Option<String>,
    pub owner: Option<String>,
}

/// Status written by the validators after creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationStatus {
    pub validated: bool,
    pub safe: Verdict,
    pub reachable: Verdict,
    pub country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortUrlMapping {
    pub hash: String,
    pub redirection: Redirection,
    pub created: DateTime<Utc>,
    pub properties: ShortUrlProperties,
    pub validation: ValidationStatus,
    pub want_qr: bool,
}

impl ShortUrlMapping {
    pub fn new(
        hash: impl Into<String>,
        target: impl Into<String>,
        mode: u16,
        properties: ShortUrlProperties,
        want_qr: bool,
    ) -> Self {
        Self {
            hash: hash.into(),
            redirection: Redirection {
                target: target.into(),
                mode,
            },
            created: Utc::now(),
            properties,
            validation: ValidationStatus::default(),
            want_qr,
        }
    }
}

/// Flat database row for a mapping, shared by the SQL backends.
#[derive(Debug, Clone, FromRow)]
pub struct ShortUrlRow {
    pub hash: String,
    pub target: String,
    pub mode: i32,
    pub created_at: i64,
    pub owner: Option<String>,
    pub sponsor: Option<String>,
    pub ip: Option<String>,
    pub want_qr: bool,
    pub validated: bool,
    pub safe: Option<bool>,
    pub reachable: Option<bool>,
    pub country: Option<String>,
}

impl From<ShortUrlRow> for ShortUrlMapping {
    fn from(row: ShortUrlRow) -> Self {
        Self {
            hash: row.hash,
            redirection: Redirection {
                target: row.target,
                mode: u16::try_from(row.mode).unwrap_or(307),
            },
            created: Utc
                .timestamp_opt(row.created_at, 0)
                .single()
                .unwrap_or_default(),
            properties: ShortUrlProperties {
                ip: row.ip,
                sponsor: row.sponsor,
                owner: row.owner,
            },
            validation: ValidationStatus {
                validated: row.validated,
                safe: Verdict::from_option(row.safe),
                reachable: Verdict::from_option(row.reachable),
                country: row.country,
            },
            want_qr: row.want_qr,
        }
    }
}
