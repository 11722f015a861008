//! The pricing request vocabulary and canonical cache-key construction.
//!
//! The three query fields are closed enumerations; anything else is
//! rejected at the edge before it can reach the upstream. Keys are opaque
//! to the store, so the only requirement is uniqueness per tuple.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// A query value outside its closed enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownValue;

macro_rules! closed_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        pub enum $name {
            $($variant,)+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = UnknownValue;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err(UnknownValue),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

closed_enum!(Period {
    Summer => "Summer",
    Autumn => "Autumn",
    Winter => "Winter",
    Spring => "Spring",
});

closed_enum!(Hotel {
    FloatingPointResort => "FloatingPointResort",
    GitawayHotel => "GitawayHotel",
    RecursionRetreat => "RecursionRetreat",
});

closed_enum!(Room {
    SingletonRoom => "SingletonRoom",
    BooleanTwin => "BooleanTwin",
    RestfulKing => "RestfulKing",
});

/// A validated pricing query tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RateQuery {
    pub period: Period,
    pub hotel: Hotel,
    pub room: Room,
}

impl RateQuery {
    /// Canonical cache key for this tuple: `rate:{period}:{hotel}:{room}`.
    pub fn cache_key(&self) -> String {
        format!("rate:{}:{}:{}", self.period, self.hotel, self.room)
    }

    /// Name of the cross-process fetch lock for this tuple.
    pub fn lock_name(&self) -> String {
        format!("lock:{}", self.cache_key())
    }
}
