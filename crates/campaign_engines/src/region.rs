#![forbid(unsafe_code)]

use campaign_kernel_contracts::region::{CanonicalRegion, LanguageBucket, RegionLabel};
use unicode_normalization::UnicodeNormalization;

/// Lookup keys are stored already folded (NFC, single spaces, lowercase).
const REGION_ALIASES: &[(&str, CanonicalRegion)] = &[
    ("abu dhabi", CanonicalRegion::AbuDhabi),
    ("abudhabi", CanonicalRegion::AbuDhabi),
    ("abu-dhabi", CanonicalRegion::AbuDhabi),
    ("أبوظبي", CanonicalRegion::AbuDhabi),
    ("أبو ظبي", CanonicalRegion::AbuDhabi),
    ("ابوظبي", CanonicalRegion::AbuDhabi),
    ("ابو ظبي", CanonicalRegion::AbuDhabi),
    ("dubai", CanonicalRegion::Dubai),
    ("دبي", CanonicalRegion::Dubai),
    ("sharjah", CanonicalRegion::Sharjah),
    ("al sharjah", CanonicalRegion::Sharjah),
    ("الشارقة", CanonicalRegion::Sharjah),
    ("الشارقه", CanonicalRegion::Sharjah),
    ("ajman", CanonicalRegion::Ajman),
    ("عجمان", CanonicalRegion::Ajman),
    ("umm al quwain", CanonicalRegion::UmmAlQuwain),
    ("umm al-quwain", CanonicalRegion::UmmAlQuwain),
    ("umm al qaiwain", CanonicalRegion::UmmAlQuwain),
    ("umm al-qaiwain", CanonicalRegion::UmmAlQuwain),
    ("umm al quawain", CanonicalRegion::UmmAlQuwain),
    ("أم القيوين", CanonicalRegion::UmmAlQuwain),
    ("ام القيوين", CanonicalRegion::UmmAlQuwain),
    ("ras al khaimah", CanonicalRegion::RasAlKhaimah),
    ("ras al-khaimah", CanonicalRegion::RasAlKhaimah),
    ("ras alkhaimah", CanonicalRegion::RasAlKhaimah),
    ("rak", CanonicalRegion::RasAlKhaimah),
    ("رأس الخيمة", CanonicalRegion::RasAlKhaimah),
    ("راس الخيمة", CanonicalRegion::RasAlKhaimah),
    ("رأس الخيمه", CanonicalRegion::RasAlKhaimah),
    ("fujairah", CanonicalRegion::Fujairah),
    ("al fujairah", CanonicalRegion::Fujairah),
    ("الفجيرة", CanonicalRegion::Fujairah),
    ("الفجيره", CanonicalRegion::Fujairah),
    ("unknown", CanonicalRegion::Unknown),
];

fn fold_key(raw: &str) -> String {
    let composed: String = raw.nfc().collect();
    composed
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Maps free-text region input onto a canonical region.
///
/// Unmatched non-empty input is kept as typed (trimmed). Blank input is
/// `Unknown`. Feeding a result back in returns the same label.
pub fn normalize_region(raw: &str) -> RegionLabel {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return RegionLabel::Canonical(CanonicalRegion::Unknown);
    }
    let key = fold_key(trimmed);
    match lookup_alias(&key) {
        Some(region) => RegionLabel::Canonical(region),
        None => RegionLabel::Unlisted(trimmed.to_string()),
    }
}

fn lookup_alias(key: &str) -> Option<CanonicalRegion> {
    REGION_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, region)| *region)
        .or_else(|| {
            CanonicalRegion::all()
                .iter()
                .copied()
                .find(|region| region.as_str().to_lowercase() == key)
        })
}

fn is_arabic_code_point(c: char) -> bool {
    matches!(
        u32::from(c),
        0x0600..=0x06FF
            | 0x0750..=0x077F
            | 0x08A0..=0x08FF
            | 0xFB50..=0xFDFF
            | 0xFE70..=0xFEFF
    )
}

/// `Ar` when any field carries Arabic script, else `En`.
pub fn infer_language<'a, I>(fields: I) -> LanguageBucket
where
    I: IntoIterator<Item = &'a str>,
{
    if fields
        .into_iter()
        .any(|field| field.chars().any(is_arabic_code_point))
    {
        LanguageBucket::Ar
    } else {
        LanguageBucket::En
    }
}
