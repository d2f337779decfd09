// Declarative mapping between remote status names and checkbox glyphs.
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use strum::{EnumIter, IntoEnumIterator};

/// Local completion state, as written between the brackets of `- [ ] `.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter)]
pub enum CheckboxState {
    Unchecked,
    Checked,
    InProgress,
    Cancelled,
}

impl CheckboxState {
    pub fn glyph(self) -> char {
        match self {
            Self::Unchecked => ' ',
            Self::Checked => 'x',
            Self::InProgress => '/',
            Self::Cancelled => '-',
        }
    }

    /// Parses a glyph character. `X` is accepted as checked since editors
    /// render both cases the same.
    pub fn from_glyph(c: char) -> Option<Self> {
        match c {
            ' ' => Some(Self::Unchecked),
            'x' | 'X' => Some(Self::Checked),
            '/' => Some(Self::InProgress),
            '-' => Some(Self::Cancelled),
            _ => None,
        }
    }

    fn bucket_name(self) -> &'static str {
        match self {
            Self::Unchecked => "todo",
            Self::Checked => "done",
            Self::InProgress => "in_progress",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for CheckboxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.glyph())
    }
}

/// A set of remote statuses sharing one glyph. The canonical status is the
/// one written when pushing that glyph; it is always a member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub canonical: String,
    #[serde(default)]
    pub members: Vec<String>,
}

impl Bucket {
    pub fn new(canonical: &str, members: &[&str]) -> Self {
        Self {
            canonical: canonical.to_string(),
            members: members.iter().map(|m| m.to_string()).collect(),
        }
    }

    pub fn contains(&self, status: &str) -> bool {
        self.canonical == status || self.members.iter().any(|m| m == status)
    }

    /// Canonical first, then members, without repeats.
    fn statuses(&self) -> Vec<&str> {
        let mut out = vec![self.canonical.as_str()];
        for member in &self.members {
            if !out.contains(&member.as_str()) {
                out.push(member);
            }
        }
        out
    }
}

fn default_done() -> Bucket {
    Bucket::new("Done", &["Archived"])
}
fn default_in_progress() -> Bucket {
    Bucket::new("In Progress", &["In Review", "Paused"])
}
fn default_todo() -> Bucket {
    Bucket::new("Todo", &["Backlog"])
}

/// The four-bucket table consulted by both mapping directions.
///
/// Cancelled is optional: boards without a cancelled status leave it unset,
/// which makes `[-]` an unrecognized glyph for pushes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTable {
    #[serde(default = "default_done")]
    pub done: Bucket,
    #[serde(default = "default_in_progress")]
    pub in_progress: Bucket,
    #[serde(default = "default_todo")]
    pub todo: Bucket,
    #[serde(default)]
    pub cancelled: Option<Bucket>,
}

impl Default for StatusTable {
    fn default() -> Self {
        Self {
            done: default_done(),
            in_progress: default_in_progress(),
            todo: default_todo(),
            cancelled: None,
        }
    }
}

impl StatusTable {
    pub fn bucket(&self, state: CheckboxState) -> Option<&Bucket> {
        match state {
            CheckboxState::Unchecked => Some(&self.todo),
            CheckboxState::Checked => Some(&self.done),
            CheckboxState::InProgress => Some(&self.in_progress),
            CheckboxState::Cancelled => self.cancelled.as_ref(),
        }
    }

    /// Forward mapping. `None` means the status is outside every bucket.
    pub fn to_glyph(&self, status: &str) -> Option<CheckboxState> {
        CheckboxState::iter().find(|state| {
            self.bucket(*state)
                .is_some_and(|bucket| bucket.contains(status))
        })
    }

    /// Reverse mapping: every remote status that renders as `state`.
    pub fn to_statuses(&self, state: CheckboxState) -> Vec<&str> {
        self.bucket(state)
            .map(Bucket::statuses)
            .unwrap_or_default()
    }

    /// The status written to the service when pushing `state`.
    pub fn canonical(&self, state: CheckboxState) -> Option<&str> {
        self.bucket(state).map(|b| b.canonical.as_str())
    }

    /// Rejects tables where one status would land in two buckets, since the
    /// forward mapping would then depend on iteration order.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen: HashMap<&str, &'static str> = HashMap::new();
        for state in CheckboxState::iter() {
            let Some(bucket) = self.bucket(state) else {
                continue;
            };
            if bucket.canonical.trim().is_empty() {
                return Err(ConfigError::EmptyCanonical(state.bucket_name()));
            }
            for status in bucket.statuses() {
                if let Some(first) = seen.insert(status, state.bucket_name())
                    && first != state.bucket_name()
                {
                    return Err(ConfigError::DuplicateStatus {
                        status: status.to_string(),
                        first,
                        second: state.bucket_name(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_follows_board_names() {
        let table = StatusTable::default();
        assert_eq!(table.to_glyph("Done"), Some(CheckboxState::Checked));
        assert_eq!(table.to_glyph("Archived"), Some(CheckboxState::Checked));
        assert_eq!(table.to_glyph("In Review"), Some(CheckboxState::InProgress));
        assert_eq!(table.to_glyph("Paused"), Some(CheckboxState::InProgress));
        assert_eq!(table.to_glyph("Backlog"), Some(CheckboxState::Unchecked));
        assert_eq!(table.to_glyph("Cancelled"), None);
        assert_eq!(table.canonical(CheckboxState::Cancelled), None);
    }

    #[test]
    fn test_collapse_is_stable() {
        let mut table = StatusTable::default();
        table.cancelled = Some(Bucket::new("Cancelled", &["Won't do"]));

        for state in CheckboxState::iter() {
            for status in table.to_statuses(state) {
                let glyph = table.to_glyph(status).expect("member maps");
                let canonical = table.canonical(glyph).expect("bucket has canonical");
                assert_eq!(table.to_glyph(canonical), Some(glyph), "status {status}");
            }
        }
    }

    #[test]
    fn test_to_statuses_lists_canonical_first_without_duplicates() {
        let table = StatusTable {
            done: Bucket::new("Done", &["Done", "Archived"]),
            ..StatusTable::default()
        };
        assert_eq!(table.to_statuses(CheckboxState::Checked), vec!["Done", "Archived"]);
        assert!(table.to_statuses(CheckboxState::Cancelled).is_empty());
    }

    #[test]
    fn test_status_match_is_case_sensitive() {
        let table = StatusTable::default();
        assert_eq!(table.to_glyph("done"), None);
    }

    #[test]
    fn test_glyph_parsing() {
        assert_eq!(CheckboxState::from_glyph('X'), Some(CheckboxState::Checked));
        assert_eq!(CheckboxState::from_glyph('?'), None);
        assert_eq!(CheckboxState::Checked.glyph(), 'x');
        assert_eq!(CheckboxState::InProgress.to_string(), "[/]");
    }

    #[test]
    fn test_validate_rejects_shared_status() {
        let table = StatusTable {
            todo: Bucket::new("Todo", &["Paused"]),
            ..StatusTable::default()
        };
        let err = table.validate().unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateStatus { ref status, .. } if status == "Paused"));
    }

    #[test]
    fn test_validate_rejects_blank_canonical() {
        let table = StatusTable {
            cancelled: Some(Bucket::new(" ", &[])),
            ..StatusTable::default()
        };
        assert_eq!(table.validate(), Err(ConfigError::EmptyCanonical("cancelled")));
        assert!(StatusTable::default().validate().is_ok());
    }
}
