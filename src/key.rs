use std::fmt::Display;

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Local};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Source of wall-clock time for time-derived keys.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Opaque identifier of one tracked generation request.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// 16 random bytes from the OS, URL-safe base64 without padding.
    pub fn generate() -> Self {
        let mut id = [0u8; 16];
        OsRng.fill_bytes(&mut id);
        Self(Base64UrlUnpadded::encode_string(&id))
    }

    /// Accepts only ids this service could have produced.
    pub fn parse(raw: &str) -> Option<Self> {
        let valid = raw.len() == 22
            && raw
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        valid.then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// `<prefix>/<HHMMSS>.txt`. Two keys taken within the same second are equal.
pub fn timestamp_key(prefix: &str, now: DateTime<Local>) -> String {
    format!("{}/{}.txt", prefix, now.format("%H%M%S"))
}

/// `<prefix>/<request id>.txt`
pub fn request_key(prefix: &str, id: &RequestId) -> String {
    format!("{}/{}.txt", prefix, id)
}
