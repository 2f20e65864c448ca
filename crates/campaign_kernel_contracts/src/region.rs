#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

/// Closed set of administrative areas used for dashboard aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CanonicalRegion {
    AbuDhabi,
    Dubai,
    Sharjah,
    Ajman,
    UmmAlQuwain,
    RasAlKhaimah,
    Fujairah,
    Unknown,
}

impl CanonicalRegion {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AbuDhabi => "Abu Dhabi",
            Self::Dubai => "Dubai",
            Self::Sharjah => "Sharjah",
            Self::Ajman => "Ajman",
            Self::UmmAlQuwain => "Umm Al Quwain",
            Self::RasAlKhaimah => "Ras Al Khaimah",
            Self::Fujairah => "Fujairah",
            Self::Unknown => "Unknown",
        }
    }

    /// Declaration order; also the tie-break order for dashboard output.
    pub const fn all() -> &'static [Self] {
        &[
            Self::AbuDhabi,
            Self::Dubai,
            Self::Sharjah,
            Self::Ajman,
            Self::UmmAlQuwain,
            Self::RasAlKhaimah,
            Self::Fujairah,
            Self::Unknown,
        ]
    }

    pub const fn display_color(self) -> &'static str {
        match self {
            Self::AbuDhabi => "#c8102e",
            Self::Dubai => "#00843d",
            Self::Sharjah => "#4760c4",
            Self::Ajman => "#f2a900",
            Self::UmmAlQuwain => "#8e44ad",
            Self::RasAlKhaimah => "#e67e22",
            Self::Fujairah => "#16a085",
            Self::Unknown => "#9e9e9e",
        }
    }

    /// Exact match on a stored canonical label.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::all().iter().copied().find(|r| r.as_str() == label)
    }
}

/// Output of region normalization. Unlisted free text is preserved as typed
/// (trimmed) rather than forced into `Unknown`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RegionLabel {
    Canonical(CanonicalRegion),
    Unlisted(String),
}

impl RegionLabel {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Canonical(region) => region.as_str(),
            Self::Unlisted(raw) => raw.as_str(),
        }
    }

    /// Bucket used by aggregation: unlisted text counts as `Unknown`.
    pub fn bucket(&self) -> CanonicalRegion {
        match self {
            Self::Canonical(region) => *region,
            Self::Unlisted(_) => CanonicalRegion::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LanguageBucket {
    En,
    Ar,
}

impl LanguageBucket {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Ar => "ar",
        }
    }
}
