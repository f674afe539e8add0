//! Strongly typed record identifiers

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Raw numeric value of the id
            pub fn value(self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse::<u64>().map(Self)
            }
        }
    };
}

record_id!(
    /// Identifies a delegate (assembly participant)
    DelegateId
);
record_id!(
    /// Identifies a keypad record
    KeypadId
);
record_id!(
    /// Identifies a proxy edge record
    ProxyEdgeId
);
record_id!(
    /// Identifies a share record
    ShareRecordId
);
record_id!(
    /// Identifies a weighting category (voting principle)
    CategoryId
);
record_id!(
    /// Identifies a motion
    MotionId
);
record_id!(
    /// Identifies an absentee vote record
    AbsenteeVoteId
);
record_id!(
    /// Identifies an attendance log entry
    AttendanceLogId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_parse_and_display() {
        let id: DelegateId = " 42 ".parse().unwrap();
        assert_eq!(id, DelegateId(42));
        assert_eq!(id.to_string(), "42");
        assert!("abc".parse::<CategoryId>().is_err());
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let json = serde_yaml::to_string(&KeypadId(7)).unwrap();
        assert_eq!(json.trim(), "7");
    }
}
