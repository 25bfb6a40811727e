use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::LockError;

/// Hierarchical name of a lockable resource, e.g. `database/T1/12`.
///
/// A name always has at least one segment. Two names are equal iff their
/// segment sequences are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct ResourceName {
    segments: Vec<String>,
}

impl ResourceName {
    /// A top-level name with a single segment.
    ///
    /// Segments are not checked here; one containing `/` will not survive a
    /// `Display`/`FromStr` round trip. Use [`ResourceName::check_segment`] or
    /// [`ResourceName::from_segments`] for untrusted input.
    pub fn new(root: impl ToString) -> Self {
        ResourceName {
            segments: vec![root.to_string()],
        }
    }

    /// Build a name from its segments. Fails on an empty sequence.
    pub fn from_segments<I, S>(segments: I) -> Result<Self, LockError>
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        let segments: Vec<String> = segments.into_iter().map(|s| s.to_string()).collect();
        if segments.is_empty() {
            return Err(LockError::InvalidResourceName(
                "a resource name needs at least one segment".into(),
            ));
        }
        for segment in &segments {
            Self::check_segment(segment)?;
        }
        Ok(ResourceName { segments })
    }

    /// Fails on an empty segment or one containing the `/` separator.
    pub fn check_segment(segment: &str) -> Result<(), LockError> {
        if segment.is_empty() {
            return Err(LockError::InvalidResourceName("empty segment".into()));
        }
        if segment.contains('/') {
            return Err(LockError::InvalidResourceName(format!(
                "segment {:?} contains '/'",
                segment
            )));
        }
        Ok(())
    }

    /// The name of child `segment` under this resource. Like
    /// [`ResourceName::new`], the segment is taken as is.
    pub fn child(&self, segment: impl ToString) -> Self {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.extend(self.segments.iter().cloned());
        segments.push(segment.to_string());
        ResourceName { segments }
    }

    /// The enclosing resource, or `None` at the top of the hierarchy.
    pub fn parent(&self) -> Option<ResourceName> {
        if self.segments.len() <= 1 {
            return None;
        }
        Some(ResourceName {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Strict ancestors, nearest first.
    pub fn ancestors(&self) -> impl Iterator<Item = ResourceName> + '_ {
        (1..self.segments.len()).rev().map(move |len| ResourceName {
            segments: self.segments[..len].to_vec(),
        })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments; top-level names have depth 1.
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// The last segment.
    pub fn leaf(&self) -> &str {
        // never empty
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    /// True iff `self` lies strictly beneath `other`.
    pub fn is_descendant_of(&self, other: &ResourceName) -> bool {
        self.segments.len() > other.segments.len() && self.segments.starts_with(&other.segments)
    }

    /// True iff `self` lies strictly above `other`.
    pub fn is_ancestor_of(&self, other: &ResourceName) -> bool {
        other.is_descendant_of(self)
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

impl FromStr for ResourceName {
    type Err = LockError;

    /// Parses `a/b/c`. Empty segments are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let segments: Vec<&str> = s.split('/').collect();
        if segments.iter().any(|segment| segment.is_empty()) {
            return Err(LockError::InvalidResourceName(format!(
                "empty segment in {:?}",
                s
            )));
        }
        ResourceName::from_segments(segments)
    }
}

impl TryFrom<Vec<String>> for ResourceName {
    type Error = LockError;

    fn try_from(segments: Vec<String>) -> Result<Self, Self::Error> {
        ResourceName::from_segments(segments)
    }
}

impl From<ResourceName> for Vec<String> {
    fn from(name: ResourceName) -> Self {
        name.segments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> ResourceName {
        ResourceName::new("database").child("T1").child(12)
    }

    #[test]
    fn child_and_parent() {
        let name = page();
        assert_eq!(name.segments(), &["database", "T1", "12"]);
        assert_eq!(name.depth(), 3);
        assert_eq!(name.leaf(), "12");
        assert_eq!(name.parent().unwrap().to_string(), "database/T1");
        assert!(ResourceName::new("database").parent().is_none());
    }

    #[test]
    fn ancestors_nearest_first() {
        let names: Vec<String> = page().ancestors().map(|n| n.to_string()).collect();
        assert_eq!(names, vec!["database/T1", "database"]);
        assert_eq!(ResourceName::new("database").ancestors().count(), 0);
    }

    #[test]
    fn descendant_relation_is_strict() {
        let db = ResourceName::new("database");
        let table = db.child("T1");
        assert!(page().is_descendant_of(&db));
        assert!(page().is_descendant_of(&table));
        assert!(table.is_ancestor_of(&page()));
        assert!(!table.is_descendant_of(&table));
        assert!(!db.is_descendant_of(&table));
        // prefix of a segment is not an ancestor
        assert!(!ResourceName::new("database").child("T10").is_descendant_of(&table));
    }

    #[test]
    fn parse_round_trip() {
        let name: ResourceName = "database/T1/12".parse().unwrap();
        assert_eq!(name, page());
        assert_eq!(name.to_string(), "database/T1/12");
        assert!("".parse::<ResourceName>().is_err());
        assert!("database//12".parse::<ResourceName>().is_err());
        assert!(ResourceName::from_segments(Vec::<String>::new()).is_err());
    }

    #[test]
    fn separator_inside_a_segment_is_rejected() {
        assert!(matches!(
            ResourceName::from_segments(["database", "a/b"]),
            Err(LockError::InvalidResourceName(_))
        ));
        assert!(ResourceName::from_segments(["database", ""]).is_err());
        assert!(ResourceName::check_segment("T1").is_ok());
        assert!(serde_json::from_str::<ResourceName>(r#"["database","a/b"]"#).is_err());
    }

    #[test]
    fn serializes_as_segment_list() {
        let json = serde_json::to_string(&page()).unwrap();
        assert_eq!(json, r#"["database","T1","12"]"#);
        let back: ResourceName = serde_json::from_str(&json).unwrap();
        assert_eq!(back, page());
        assert!(serde_json::from_str::<ResourceName>("[]").is_err());
    }
}
