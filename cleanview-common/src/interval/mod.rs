//! Time interval value type
//!
//! A [`TimeInterval`] is a `[start, end]` span of media time (seconds) with a
//! classification reason, an edit action and the signal source that produced
//! it. Intervals are values: every operation in [`algebra`] returns new ones.

pub mod algebra;

pub use algebra::{
    add_buffer_to_intervals, compute_keep_segments, merge_intervals, overlaps,
    subtract_intervals, total_duration,
};

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Separator used when several reasons are folded into one interval
pub const REASON_SEPARATOR: &str = "; ";

/// Metadata key carrying a detection confidence in `[0.0, 1.0]`
pub const CONFIDENCE_KEY: &str = "confidence";

/// Edit action applied to an interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Remove the span from the output entirely
    #[default]
    Cut,
    /// Silence the audio
    Mute,
    /// Replace the audio with a tone
    Beep,
    /// Obscure the picture
    Blur,
    /// Informational only
    None,
}

impl Action {
    /// Merge precedence; the higher value wins when two actions collide.
    ///
    /// CUT dominates everything, so a span that is both cut and muted is only cut.
    pub fn precedence(self) -> u8 {
        match self {
            Self::Cut => 4,
            Self::Beep => 3,
            Self::Mute => 2,
            Self::Blur => 1,
            Self::None => 0,
        }
    }

    /// Whichever of the two actions has the higher precedence
    pub fn dominant(self, other: Action) -> Action {
        if other.precedence() > self.precedence() {
            other
        } else {
            self
        }
    }

    /// True for actions that only touch the audio track
    pub fn is_audio_edit(self) -> bool {
        matches!(self, Self::Mute | Self::Beep)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cut => "cut",
            Self::Mute => "mute",
            Self::Beep => "beep",
            Self::Blur => "blur",
            Self::None => "none",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cut" => Ok(Self::Cut),
            "mute" => Ok(Self::Mute),
            "beep" => Ok(Self::Beep),
            "blur" => Ok(Self::Blur),
            "none" => Ok(Self::None),
            other => Err(Error::InvalidInput(format!("Unknown action: {}", other))),
        }
    }
}

/// Signal source that produced an interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchSource {
    Audio,
    Visual,
    Subtitle,
    Manual,
    #[default]
    Unknown,
}

impl MatchSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Visual => "visual",
            Self::Subtitle => "subtitle",
            Self::Manual => "manual",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for MatchSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified `[start, end]` span of media time in seconds
///
/// Invariant: `start <= end`, both finite. Enforced by [`TimeInterval::new`]
/// and on deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawInterval")]
pub struct TimeInterval {
    pub start: f64,
    pub end: f64,
    pub reason: String,
    pub action: Action,
    pub source: MatchSource,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

/// Wire shape of an interval before bounds validation
#[derive(Deserialize)]
struct RawInterval {
    start: f64,
    end: f64,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    action: Action,
    #[serde(default)]
    source: MatchSource,
    #[serde(default)]
    metadata: BTreeMap<String, serde_json::Value>,
}

impl TryFrom<RawInterval> for TimeInterval {
    type Error = Error;

    fn try_from(raw: RawInterval) -> Result<Self> {
        let mut interval = TimeInterval::new(raw.start, raw.end, raw.reason)?;
        interval.action = raw.action;
        interval.source = raw.source;
        interval.metadata = raw.metadata;
        Ok(interval)
    }
}

impl TimeInterval {
    /// Create a CUT interval with unknown source
    ///
    /// # Errors
    /// Returns `InvalidInput` if either bound is not finite or `start > end`.
    pub fn new(start: f64, end: f64, reason: impl Into<String>) -> Result<Self> {
        if !start.is_finite() || !end.is_finite() {
            return Err(Error::InvalidInput(format!(
                "Interval bounds must be finite: [{}, {}]",
                start, end
            )));
        }
        if start > end {
            return Err(Error::InvalidInput(format!(
                "Interval start {} is after end {}",
                start, end
            )));
        }

        Ok(Self {
            start,
            end,
            reason: reason.into(),
            action: Action::default(),
            source: MatchSource::default(),
            metadata: BTreeMap::new(),
        })
    }

    /// Builder-style action override
    pub fn with_action(mut self, action: Action) -> Self {
        self.action = action;
        self
    }

    /// Builder-style source override
    pub fn with_source(mut self, source: MatchSource) -> Self {
        self.source = source;
        self
    }

    /// Builder-style metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Builder-style confidence entry (clamped to `[0, 1]`)
    pub fn with_confidence(self, confidence: f64) -> Self {
        self.with_metadata(CONFIDENCE_KEY, serde_json::json!(confidence.clamp(0.0, 1.0)))
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Confidence stored in metadata, if any
    pub fn confidence(&self) -> Option<f64> {
        self.metadata.get(CONFIDENCE_KEY).and_then(|v| v.as_f64())
    }

    /// True if `other` lies entirely within this interval
    pub fn contains(&self, other: &TimeInterval) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// True if the instant lies within `[start, end]`
    pub fn contains_time(&self, time: f64) -> bool {
        self.start <= time && time <= self.end
    }

    /// Length of the shared span (0.0 when disjoint)
    pub fn overlap_duration(&self, other: &TimeInterval) -> f64 {
        (self.end.min(other.end) - self.start.max(other.start)).max(0.0)
    }

    /// Individual reasons folded into this interval
    pub fn reasons(&self) -> impl Iterator<Item = &str> {
        self.reason
            .split(REASON_SEPARATOR)
            .map(str::trim)
            .filter(|r| !r.is_empty())
    }

    /// Combine two intervals into the span covering both.
    ///
    /// Reasons are unioned (sorted, deduplicated), the action follows
    /// [`Action::dominant`] so CUT always wins, sources collapse to `Unknown`
    /// when they differ, and metadata keeps the greater value under
    /// [`metadata_value_order`] on key collisions, so `confidence` keeps the
    /// maximum and `a.merge(b) == b.merge(a)`.
    pub fn merge(&self, other: &TimeInterval) -> TimeInterval {
        let reasons: BTreeSet<&str> = self.reasons().chain(other.reasons()).collect();
        let reason = reasons.into_iter().collect::<Vec<_>>().join(REASON_SEPARATOR);

        let source = if self.source == other.source {
            self.source
        } else {
            MatchSource::Unknown
        };

        let mut metadata = other.metadata.clone();
        for (key, value) in &self.metadata {
            let keep_existing = metadata
                .get(key)
                .is_some_and(|existing| metadata_value_order(existing, value) != Ordering::Less);
            if !keep_existing {
                metadata.insert(key.clone(), value.clone());
            }
        }

        TimeInterval {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            reason,
            action: self.action.dominant(other.action),
            source,
            metadata,
        }
    }

    /// Copy of this interval with new bounds (clamped so `start <= end`)
    pub fn with_bounds(&self, start: f64, end: f64) -> TimeInterval {
        TimeInterval {
            start,
            end: end.max(start),
            ..self.clone()
        }
    }
}

/// Total order over metadata values.
///
/// Numbers compare numerically and sort before every other value; anything
/// else compares by its JSON text.
pub fn metadata_value_order(a: &serde_json::Value, b: &serde_json::Value) -> Ordering {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.to_string().cmp(&b.to_string()),
    }
}

/// Key-by-key order over whole metadata maps
pub fn metadata_order(
    a: &BTreeMap<String, serde_json::Value>,
    b: &BTreeMap<String, serde_json::Value>,
) -> Ordering {
    for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
        let order = ka.cmp(kb).then_with(|| metadata_value_order(va, vb));
        if order != Ordering::Equal {
            return order;
        }
    }
    a.len().cmp(&b.len())
}

impl fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:.3}, {:.3}] {} ({}, {})",
            self.start, self.end, self.action, self.source, self.reason
        )
    }
}
