//! Object classes and track identities
//!
//! Class labels follow the perception message convention (UNKNOWN = 0 through
//! PEDESTRIAN = 7), which is also the row/column order of every per-class
//! association table.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Object Label
// ============================================================================

/// Semantic class of a detected or tracked object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ObjectLabel {
    #[default]
    Unknown = 0,
    Car = 1,
    Truck = 2,
    Bus = 3,
    Trailer = 4,
    Motorcycle = 5,
    Bicycle = 6,
    Pedestrian = 7,
}

impl ObjectLabel {
    /// Number of distinct labels; per-class tables are `COUNT x COUNT`.
    pub const COUNT: usize = 8;

    /// All labels in index order.
    pub const ALL: [ObjectLabel; Self::COUNT] = [
        ObjectLabel::Unknown,
        ObjectLabel::Car,
        ObjectLabel::Truck,
        ObjectLabel::Bus,
        ObjectLabel::Trailer,
        ObjectLabel::Motorcycle,
        ObjectLabel::Bicycle,
        ObjectLabel::Pedestrian,
    ];

    /// Index of this label into per-class tables.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Label for a table index, if in range.
    #[inline]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl ::core::fmt::Display for ObjectLabel {
    fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
        let name = match self {
            ObjectLabel::Unknown => "UNKNOWN",
            ObjectLabel::Car => "CAR",
            ObjectLabel::Truck => "TRUCK",
            ObjectLabel::Bus => "BUS",
            ObjectLabel::Trailer => "TRAILER",
            ObjectLabel::Motorcycle => "MOTORCYCLE",
            ObjectLabel::Bicycle => "BICYCLE",
            ObjectLabel::Pedestrian => "PEDESTRIAN",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Classification
// ============================================================================

/// One entry of a ranked classification list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub label: ObjectLabel,
    pub probability: f64,
}

impl Classification {
    #[inline]
    pub const fn new(label: ObjectLabel, probability: f64) -> Self {
        Self { label, probability }
    }
}

/// Returns the label with the highest probability.
///
/// An empty list is UNKNOWN. On equal probabilities the earlier entry wins.
pub fn highest_prob_label(classification: &[Classification]) -> ObjectLabel {
    let mut best = ObjectLabel::Unknown;
    let mut best_probability = f64::NEG_INFINITY;
    for c in classification {
        if c.probability > best_probability {
            best_probability = c.probability;
            best = c.label;
        }
    }
    best
}

// ============================================================================
// Track Identity
// ============================================================================

/// Unique, random identity of a track for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrackId(Uuid);

impl TrackId {
    /// Generates a fresh random identity.
    #[inline]
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[inline]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for TrackId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl ::core::fmt::Display for TrackId {
    fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
        // short form is enough to tell tracks apart in logs
        let s = self.0.simple().to_string();
        f.write_str(&s[..8])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_indices_round_trip() {
        for (i, label) in ObjectLabel::ALL.iter().enumerate() {
            assert_eq!(label.index(), i);
            assert_eq!(ObjectLabel::from_index(i), Some(*label));
        }
        assert_eq!(ObjectLabel::from_index(ObjectLabel::COUNT), None);
    }

    #[test]
    fn test_highest_prob_label() {
        let classes = [
            Classification::new(ObjectLabel::Car, 0.3),
            Classification::new(ObjectLabel::Truck, 0.6),
            Classification::new(ObjectLabel::Bus, 0.1),
        ];
        assert_eq!(highest_prob_label(&classes), ObjectLabel::Truck);
        assert_eq!(highest_prob_label(&[]), ObjectLabel::Unknown);
    }

    #[test]
    fn test_highest_prob_label_tie_keeps_first() {
        let classes = [
            Classification::new(ObjectLabel::Bicycle, 0.5),
            Classification::new(ObjectLabel::Motorcycle, 0.5),
        ];
        assert_eq!(highest_prob_label(&classes), ObjectLabel::Bicycle);
    }

    #[test]
    fn test_track_ids_are_unique() {
        let a = TrackId::new_random();
        let b = TrackId::new_random();
        assert_ne!(a, b);
        assert_eq!(a.to_string().len(), 8);
    }

    #[test]
    fn test_label_serde_names() {
        let json = serde_json::to_string(&ObjectLabel::Pedestrian).unwrap();
        assert_eq!(json, "\"pedestrian\"");
        let back: ObjectLabel = serde_json::from_str("\"truck\"").unwrap();
        assert_eq!(back, ObjectLabel::Truck);
    }
}
