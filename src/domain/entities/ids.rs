//! Snowflake identifiers

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

macro_rules! snowflake {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl $name {
            pub fn get(self) -> u64 {
                self.0
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
                s.trim().parse().map($name)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                $name(id)
            }
        }

        // Discord sends snowflakes as strings; stored settings use plain numbers.
        // Both forms are accepted, numbers are written.
        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_u64(self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                #[derive(Deserialize)]
                #[serde(untagged)]
                enum Raw {
                    Num(u64),
                    Str(String),
                }

                match Raw::deserialize(deserializer)? {
                    Raw::Num(n) => Ok($name(n)),
                    Raw::Str(s) => s.parse().map($name).map_err(serde::de::Error::custom),
                }
            }
        }
    };
}

snowflake!(
    /// Guild (server) id
    GuildId
);
snowflake!(ChannelId);
snowflake!(UserId);
snowflake!(RoleId);
snowflake!(MessageId);
snowflake!(AttachmentId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_string_and_number() {
        let a: GuildId = serde_json::from_str("\"176070082584248320\"").unwrap();
        let b: GuildId = serde_json::from_str("176070082584248320").unwrap();
        assert_eq!(a, b);
        assert_eq!(serde_json::to_string(&a).unwrap(), "176070082584248320");
    }

    #[test]
    fn test_from_str_trims() {
        assert_eq!(" 42 ".parse::<ChannelId>().unwrap(), ChannelId(42));
        assert!("abc".parse::<ChannelId>().is_err());
    }
}
