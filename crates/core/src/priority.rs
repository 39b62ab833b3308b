use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Alert priority, `P1` (most urgent) through `P5` (least urgent).
///
/// Ordering follows urgency: `P1 < P2 < ... < P5`, so sorting ascending
/// puts the most urgent alerts first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum Priority {
    P1,
    P2,
    #[default]
    P3,
    P4,
    P5,
}

impl Priority {
    /// All priorities in urgency order.
    pub const ALL: [Self; 5] = [Self::P1, Self::P2, Self::P3, Self::P4, Self::P5];

    /// Stable string form (`"P1"`..`"P5"`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::P1 => "P1",
            Self::P2 => "P2",
            Self::P3 => "P3",
            Self::P4 => "P4",
            Self::P5 => "P5",
        }
    }

    /// Whether this is the highest urgency level.
    #[must_use]
    pub const fn is_critical(self) -> bool {
        matches!(self, Self::P1)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown priority string.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid priority: {0}")]
pub struct InvalidPriority(pub String);

impl FromStr for Priority {
    type Err = InvalidPriority;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "P1" => Ok(Self::P1),
            "P2" => Ok(Self::P2),
            "P3" => Ok(Self::P3),
            "P4" => Ok(Self::P4),
            "P5" => Ok(Self::P5),
            _ => Err(InvalidPriority(s.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_by_urgency() {
        assert!(Priority::P1 < Priority::P2);
        assert!(Priority::P4 < Priority::P5);
        let mut v = vec![Priority::P3, Priority::P1, Priority::P5];
        v.sort();
        assert_eq!(v, vec![Priority::P1, Priority::P3, Priority::P5]);
    }

    #[test]
    fn parse_case_insensitive() {
        assert_eq!("p2".parse::<Priority>().unwrap(), Priority::P2);
        assert_eq!("P5".parse::<Priority>().unwrap(), Priority::P5);
        assert!("P6".parse::<Priority>().is_err());
        assert!("critical".parse::<Priority>().is_err());
    }

    #[test]
    fn serde_uses_plain_names() {
        let json = serde_json::to_string(&Priority::P1).unwrap();
        assert_eq!(json, "\"P1\"");
        let back: Priority = serde_json::from_str("\"P4\"").unwrap();
        assert_eq!(back, Priority::P4);
    }

    #[test]
    fn default_is_p3() {
        assert_eq!(Priority::default(), Priority::P3);
    }
}
