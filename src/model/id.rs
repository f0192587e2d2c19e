use std::fmt::{Debug, Display, Formatter};
use std::ops::Deref;
use std::str::FromStr;

use data_encoding::BASE64URL;
use rand::RngCore;
use rocket::{
    http::{
        impl_from_uri_param_identity,
        uri::fmt::{Path, UriDisplay},
    },
    request::FromParam,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of random bytes behind every identifier.
pub const ID_LENGTH: usize = 32;

/// Length of an identifier once encoded.
const ENCODED_LENGTH: usize = (ID_LENGTH + 2) / 3 * 4;

/// Generate a fresh identifier string: 32 bytes from the thread-local CSPRNG,
/// encoded as padded URL-safe base64.
///
/// Identifiers double as capability tokens, so they must be unguessable,
/// not merely unique.
fn random_id() -> String {
    let mut bytes = [0; ID_LENGTH];
    rand::thread_rng().fill_bytes(&mut bytes);
    BASE64URL.encode(&bytes)
}

/// Reasons a string cannot be an identifier.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdParseError {
    #[error("identifier must be {ENCODED_LENGTH} characters, got {0}")]
    InvalidLength(usize),
    #[error("identifier is not URL-safe base64")]
    InvalidEncoding,
}

/// Check that `s` looks like something [`random_id`] could have produced.
fn check_encoded(s: &str) -> Result<(), IdParseError> {
    if s.len() != ENCODED_LENGTH {
        return Err(IdParseError::InvalidLength(s.len()));
    }
    match BASE64URL.decode(s.as_bytes()) {
        Ok(bytes) if bytes.len() == ID_LENGTH => Ok(()),
        _ => Err(IdParseError::InvalidEncoding),
    }
}

/// Declare a string-backed identifier type usable as a Rocket path segment.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Generate a new random identifier.
            pub fn generate() -> Self {
                Self(random_id())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Debug for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl Deref for $name {
            type Target = str;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                check_encoded(s)?;
                Ok(Self(s.to_string()))
            }
        }

        impl From<&str> for $name {
            /// Wrap a raw string without checking its shape. Stores accept
            /// whatever ids callers hand them.
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl<'a> FromParam<'a> for $name {
            type Error = IdParseError;

            fn from_param(param: &'a str) -> Result<Self, Self::Error> {
                param.parse()
            }
        }

        impl UriDisplay<Path> for $name {
            fn fmt(&self, f: &mut rocket::http::uri::fmt::Formatter<'_, Path>) -> std::fmt::Result {
                f.write_value(self.0.as_str())
            }
        }

        impl_from_uri_param_identity!([Path] $name);
    };
}

string_id! {
    /// The public handle of an election, used to poll for its result.
    ElectionId
}

string_id! {
    /// The secret handle a participant uses to cast their vote.
    BallotId
}
