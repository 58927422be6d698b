use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use uuid::Uuid;

use crate::geo::Point;

#[derive(Debug, Error, PartialEq)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Declares a closed string enum. Values travel as SCREAMING_CASE in JSON
/// and in the database; parsing is case-insensitive.
macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $(
                    if s.eq_ignore_ascii_case($text) {
                        return Ok($name::$variant);
                    }
                )+
                Err(ParseEnumError { kind: $kind, value: s.to_string() })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

string_enum! {
    Role, "role" {
        Donor => "DONOR",
        Acceptor => "ACCEPTOR",
        Admin => "ADMIN",
    }
}

string_enum! {
    /// What kind of item a listing offers or a request asks for.
    Category, "category" {
        Food => "FOOD",
        Clothing => "CLOTHING",
        Furniture => "FURNITURE",
        Electronics => "ELECTRONICS",
        Books => "BOOKS",
        Toys => "TOYS",
        Household => "HOUSEHOLD",
        Medical => "MEDICAL",
        Other => "OTHER",
    }
}

string_enum! {
    /// Listing lifecycle: ACTIVE -> CLAIMED -> COMPLETED.
    ListingStatus, "listing status" {
        Active => "ACTIVE",
        Claimed => "CLAIMED",
        Completed => "COMPLETED",
    }
}

string_enum! {
    /// Request lifecycle: OPEN -> FULFILLED -> CLOSED.
    RequestStatus, "request status" {
        Open => "OPEN",
        Fulfilled => "FULFILLED",
        Closed => "CLOSED",
    }
}

string_enum! {
    OtpPurpose, "otp purpose" {
        VerifyEmail => "VERIFY_EMAIL",
        ResetPassword => "RESET_PASSWORD",
    }
}

impl Role {
    pub fn can_create_listings(&self) -> bool {
        matches!(self, Role::Donor | Role::Admin)
    }

    pub fn can_create_requests(&self) -> bool {
        matches!(self, Role::Acceptor | Role::Admin)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub role: Role,
    pub location: Option<Point>,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

/// What other users get to see about someone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub owner_name: String,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub status: ListingStatus,
    pub image_url: Option<String>,
    pub address: Option<String>,
    pub location: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An acceptor's stated need.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DonationRequest {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub owner_name: String,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub quantity: Option<u32>,
    pub status: RequestStatus,
    pub address: Option<String>,
    pub location: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub listing_id: Option<Uuid>,
    pub request_id: Option<Uuid>,
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// One row of the conversation list: the latest exchange with a counterpart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub user_id: Uuid,
    pub name: String,
    pub last_message: String,
    pub last_at: DateTime<Utc>,
    pub unread: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: i64,
    pub user_id: Option<Uuid>,
    pub user_email: Option<String>,
    pub action: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_parse_case_insensitively() {
        assert_eq!("donor".parse::<Role>(), Ok(Role::Donor));
        assert_eq!("Claimed".parse::<ListingStatus>(), Ok(ListingStatus::Claimed));
        assert_eq!("reset_password".parse::<OtpPurpose>(), Ok(OtpPurpose::ResetPassword));
        let err = "WIZARD".parse::<Role>().unwrap_err();
        assert_eq!(err.to_string(), "unknown role 'WIZARD'");
    }

    #[test]
    fn enums_serialize_as_screaming_case() {
        assert_eq!(serde_json::to_string(&Category::Household).unwrap(), "\"HOUSEHOLD\"");
        let status: RequestStatus = serde_json::from_str("\"fulfilled\"").unwrap();
        assert_eq!(status, RequestStatus::Fulfilled);
        assert!(serde_json::from_str::<Category>("\"JEWELRY\"").is_err());
    }

    #[test]
    fn role_permissions() {
        assert!(Role::Donor.can_create_listings());
        assert!(!Role::Donor.can_create_requests());
        assert!(Role::Acceptor.can_create_requests());
        assert!(!Role::Acceptor.can_create_listings());
        assert!(Role::Admin.can_create_listings() && Role::Admin.can_create_requests());
    }

    #[test]
    fn distance_is_omitted_when_absent() {
        let listing = Listing {
            id: Uuid::nil(),
            owner_id: Uuid::nil(),
            owner_name: "Ann".into(),
            title: "Chair".into(),
            description: String::new(),
            category: Category::Furniture,
            status: ListingStatus::Active,
            image_url: None,
            address: None,
            location: None,
            distance_km: None,
            created_at: DateTime::default(),
            updated_at: DateTime::default(),
        };
        let json = serde_json::to_value(&listing).unwrap();
        assert!(json.get("distance_km").is_none());
        assert_eq!(json["status"], "ACTIVE");
    }
}
