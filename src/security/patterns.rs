//! Suspicious input detection.
//!
//! Raw values are lower-cased and matched against a fixed, ordered list of
//! attack signatures. The first signature that matches is reported, so list
//! order is priority order.

use lazy_static::lazy_static;
use regex::Regex;

const SIGNATURES: &[&str] = &[
    r"<script",
    r"javascript:",
    r"on\w+\s*=",
    r"eval\s*\(",
    r"document\.",
    r"window\.",
    r"\.\./",
    r"union\s+select",
    r"drop\s+table",
    r"insert\s+into",
    r"delete\s+from",
];

lazy_static! {
    static ref COMPILED: Vec<(&'static str, Regex)> = SIGNATURES
        .iter()
        .map(|src| {
            let re = Regex::new(src)
                .expect("Failed to compile suspicious-input signature - this is a bug in the hardcoded pattern");
            (*src, re)
        })
        .collect();
}

/// Outcome of scanning a raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan {
    Clean,
    Suspicious {
        /// Source of the first signature that matched.
        pattern: &'static str,
    },
}

impl Scan {
    pub fn is_suspicious(&self) -> bool {
        matches!(self, Scan::Suspicious { .. })
    }

    pub fn matched_pattern(&self) -> Option<&'static str> {
        match self {
            Scan::Clean => None,
            Scan::Suspicious { pattern } => Some(pattern),
        }
    }
}

/// Scan a raw value against the signature list.
pub fn scan(raw: &str) -> Scan {
    let lowered = raw.to_lowercase();
    COMPILED
        .iter()
        .find(|(_, re)| re.is_match(&lowered))
        .map(|(pattern, _)| Scan::Suspicious { pattern })
        .unwrap_or(Scan::Clean)
}
