//! The `@uuid[.segment]*` address grammar.

use uuid::Uuid;

use crate::errors::{EntigraphError, Result};

/// A parsed address: the id it starts from, plus the path of segments to
/// walk from there. A segment is either a field name, a decimal sequence
/// index, or a mapping key — which one it means is decided by the resolver
/// against the shape of the value it is currently standing on, not by the
/// parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub uuid: Uuid,
    pub segments: Vec<String>,
}

impl Address {
    /// Parse `@<uuid>( .<segment> )*`.
    pub fn parse(raw: &str) -> Result<Self> {
        let rest = raw
            .strip_prefix('@')
            .ok_or_else(|| EntigraphError::MalformedAddress {
                address: raw.to_string(),
            })?;
        let mut parts = rest.split('.');
        let uuid_str = parts.next().unwrap_or_default();
        let uuid = Uuid::parse_str(uuid_str).map_err(|_| EntigraphError::MalformedAddress {
            address: raw.to_string(),
        })?;
        let segments = parts.map(|s| s.to_string()).collect();
        Ok(Self { uuid, segments })
    }

    /// Whether `raw` parses as a well-formed address at all.
    pub fn is_address(raw: &str) -> bool {
        Address::parse(raw).is_ok()
    }

    /// Render back to wire form: `@<uuid-canonical-lowercase>(.<segment>)*`.
    pub fn format(&self) -> String {
        let mut out = format!("@{}", self.uuid);
        for seg in &self.segments {
            out.push('.');
            out.push_str(seg);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_uuid() {
        let id = Uuid::now_v7();
        let addr = Address::parse(&format!("@{id}")).unwrap();
        assert_eq!(addr.uuid, id);
        assert!(addr.segments.is_empty());
    }

    #[test]
    fn parses_field_and_index_segments() {
        let id = Uuid::now_v7();
        let addr = Address::parse(&format!("@{id}.grades.1")).unwrap();
        assert_eq!(addr.segments, vec!["grades".to_string(), "1".to_string()]);
    }

    #[test]
    fn missing_prefix_is_malformed() {
        let id = Uuid::now_v7();
        assert!(Address::parse(&id.to_string()).is_err());
    }

    #[test]
    fn bad_uuid_is_malformed() {
        assert!(Address::parse("@not-a-uuid").is_err());
    }

    #[test]
    fn round_trips_through_format() {
        let raw = format!("@{}.courses.math", Uuid::now_v7());
        let addr = Address::parse(&raw).unwrap();
        assert_eq!(addr.format(), raw);
        let reparsed = Address::parse(&addr.format()).unwrap();
        assert_eq!(reparsed, addr);
    }
}
