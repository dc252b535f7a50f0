use std::cmp::Ordering;

use chrono::NaiveDateTime;

/// File name of the live descriptor, and of a pristine backup copy.
pub const PRISTINE_NAME: &str = "product.json";

pub const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// A file name admitted as a backup.
///
/// Ordering agrees with plain string ordering of the file names: the bare
/// pristine name sorts before every timestamped one, and timestamped names
/// sort by their timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackupName {
    Pristine,
    Timestamped(NaiveDateTime),
}

impl BackupName {
    pub fn parse(file_name: &str) -> Option<Self> {
        if file_name == PRISTINE_NAME {
            return Some(Self::Pristine);
        }

        let suffix = file_name
            .strip_prefix(PRISTINE_NAME)
            .and_then(|rest| rest.strip_prefix('.'))?;
        let taken_at = NaiveDateTime::parse_from_str(suffix, TIMESTAMP_FORMAT).ok()?;
        // Reject non-canonical spellings chrono would still accept.
        if taken_at.format(TIMESTAMP_FORMAT).to_string() != suffix {
            return None;
        }
        Some(Self::Timestamped(taken_at))
    }

    pub fn file_name(&self) -> String {
        match self {
            Self::Pristine => PRISTINE_NAME.to_string(),
            Self::Timestamped(taken_at) => {
                format!("{PRISTINE_NAME}.{}", taken_at.format(TIMESTAMP_FORMAT))
            }
        }
    }
}

impl Ord for BackupName {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Pristine, Self::Pristine) => Ordering::Equal,
            (Self::Pristine, Self::Timestamped(_)) => Ordering::Less,
            (Self::Timestamped(_), Self::Pristine) => Ordering::Greater,
            (Self::Timestamped(left), Self::Timestamped(right)) => left.cmp(right),
        }
    }
}

impl PartialOrd for BackupName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
