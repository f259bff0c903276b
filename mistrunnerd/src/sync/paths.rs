use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;
use time::OffsetDateTime;

/// Subdirectory of the static root holding the per-period dataset files.
pub const DATASET_SUBDIR: &str = "derpy";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PeriodError {
    #[error("month must be within 1..=12, got {0}")]
    MonthOutOfRange(u8),
    #[error("period must look like YYYY-MM, got {0:?}")]
    Malformed(String),
}

/// One dataset content window, identified by (year, month). Maps one-to-one
/// onto a remote file title and a canonical local path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period {
    year: u16,
    month: u8,
}

impl Period {
    pub fn new(year: u16, month: u8) -> Result<Self, PeriodError> {
        if !(1..=12).contains(&month) {
            return Err(PeriodError::MonthOutOfRange(month));
        }
        Ok(Self { year, month })
    }

    /// The period containing the current UTC instant.
    pub fn current() -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            year: now.year().clamp(0, i32::from(u16::MAX)) as u16,
            month: now.month() as u8,
        }
    }

    pub fn year(self) -> u16 {
        self.year
    }

    pub fn month(self) -> u8 {
        self.month
    }

    /// Canonical remote title for this period's dataset file.
    pub fn file_name(self) -> String {
        format!("{self}.json")
    }

    pub fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = PeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((year, month)) = s.split_once('-') else {
            return Err(PeriodError::Malformed(s.to_string()));
        };
        let year = year
            .parse::<u16>()
            .map_err(|_| PeriodError::Malformed(s.to_string()))?;
        let month = month
            .parse::<u8>()
            .map_err(|_| PeriodError::Malformed(s.to_string()))?;
        Self::new(year, month)
    }
}

/// Periods from `first` through `last`, inclusive. Empty when `first > last`.
pub fn range_inclusive(first: Period, last: Period) -> impl Iterator<Item = Period> {
    let mut cursor = Some(first);
    std::iter::from_fn(move || {
        let period = cursor?;
        if period > last {
            cursor = None;
            return None;
        }
        cursor = Some(period.next());
        Some(period)
    })
}

pub fn local_path_for(static_root: &Path, period: Period) -> PathBuf {
    static_root.join(DATASET_SUBDIR).join(period.file_name())
}

/// Sibling holding the immediately-preceding content of `path`.
pub fn backup_path_for(path: &Path) -> PathBuf {
    append_suffix(path, ".bak")
}

/// Staging sibling used to replace `path` atomically.
pub(crate) fn incoming_path_for(path: &Path) -> PathBuf {
    append_suffix(path, ".incoming")
}

fn append_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}
