use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of the signed-in user.
///
/// Store operations take `Option<&UserId>`: the caller decides per call
/// whether a user is present, and that alone selects the authoritative store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Treat blank input (e.g. an empty env var) as "no user".
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        raw.map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_is_no_user() {
        assert!(UserId::parse(None).is_none());
        assert!(UserId::parse(Some("  ")).is_none());
        assert_eq!(UserId::parse(Some(" u1 ")).unwrap().as_str(), "u1");
    }
}
