use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::errors::ValidationError;

/// Kind of a directed relation `issue -> depends_on`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationKind {
    /// `depends_on` must close before `issue` is ready
    Blocks,
    /// `depends_on` is the parent of `issue`
    ParentChild,
    Related,
    DiscoveredFrom,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::Blocks => "blocks",
            RelationKind::ParentChild => "parent-child",
            RelationKind::Related => "related",
            RelationKind::DiscoveredFrom => "discovered-from",
        }
    }
}

impl FromStr for RelationKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blocks" => Ok(RelationKind::Blocks),
            "parent-child" => Ok(RelationKind::ParentChild),
            "related" => Ok(RelationKind::Related),
            "discovered-from" => Ok(RelationKind::DiscoveredFrom),
            other => Err(ValidationError::UnknownRelationKind {
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for RelationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub issue_id: String,
    pub depends_on_id: String,
    pub kind: RelationKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trips_through_str() {
        for kind in [
            RelationKind::Blocks,
            RelationKind::ParentChild,
            RelationKind::Related,
            RelationKind::DiscoveredFrom,
        ] {
            assert_eq!(kind.as_str().parse::<RelationKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_serde_matches_store_spelling() {
        let json = serde_json::to_string(&RelationKind::ParentChild).unwrap();
        assert_eq!(json, "\"parent-child\"");
    }
}
