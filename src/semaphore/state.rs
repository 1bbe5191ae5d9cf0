//! Persistent semaphore state and its on-disk line format.
//!
//! The lock file holds a single line shared by every process using the semaphore:
//!
//! ```text
//! <last-update (%Y-%m-%d %H:%M:%S.cc, UTC)>|<remaining slots>|<comma-separated holder pids>
//! 2013-11-21 13:17:25.86|5|12345,12346,12347
//! ```
//!
//! An empty file stands for the initial state: epoch timestamp, every slot free,
//! no holders. Timestamps are written with centisecond precision; any fractional
//! precision is accepted when reading.
//!
//! Holders are a set. A PID listed twice (only possible in a hand-edited file)
//! is read as a single holder, so cleanup of that PID reclaims one slot, not two.

use crate::error::{MutexError, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::collections::BTreeSet;
use std::fmt;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

/// Date and time part of the timestamp, before the centiseconds.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Accepted when parsing: seconds with an optional fraction of any length.
const TIMESTAMP_PARSE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Whether a write records the calling process as joining or leaving the holders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    /// The caller took a slot.
    Join,
    /// The caller gave a slot back (or is cleaning up).
    Leave,
}

/// Snapshot of the state shared through the lock file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemaphoreState {
    /// Time of the most recent successful write.
    pub updated_at: DateTime<Utc>,

    /// Number of free slots.
    pub remaining: u32,

    /// PIDs of the processes currently holding a slot.
    pub holders: BTreeSet<u32>,
}

impl SemaphoreState {
    /// The state an empty lock file stands for.
    pub fn initial(capacity: u32) -> Self {
        Self {
            updated_at: DateTime::UNIX_EPOCH,
            remaining: capacity,
            holders: BTreeSet::new(),
        }
    }

    /// Build the state to persist after a transition of process `pid`.
    ///
    /// Joining adds `pid` to the holders, leaving removes it. The timestamp is
    /// set to now.
    pub fn stamped(
        remaining: u32,
        mut holders: BTreeSet<u32>,
        pid: u32,
        membership: Membership,
    ) -> Self {
        match membership {
            Membership::Join => {
                holders.insert(pid);
            }
            Membership::Leave => {
                holders.remove(&pid);
            }
        }

        Self {
            updated_at: Utc::now(),
            remaining,
            holders,
        }
    }

    /// Parse lock file content. Only the first line is considered.
    ///
    /// # Errors
    ///
    /// * `MutexError::StateFormat` - The line is not `timestamp|count|pids`
    pub fn parse(content: &str, capacity: u32) -> Result<Self> {
        let line = content.lines().next().unwrap_or("").trim();
        if line.is_empty() {
            return Ok(Self::initial(capacity));
        }

        let fields: Vec<&str> = line.split('|').collect();
        let [timestamp, remaining, pids] = fields.as_slice() else {
            return Err(MutexError::StateFormat(format!(
                "expected 3 '|'-separated fields, found {} in '{}'",
                fields.len(),
                line
            )));
        };

        let updated_at = NaiveDateTime::parse_from_str(timestamp.trim(), TIMESTAMP_PARSE_FORMAT)
            .map_err(|e| {
                MutexError::StateFormat(format!("invalid timestamp '{}': {}", timestamp, e))
            })?
            .and_utc();

        let remaining = remaining.trim().parse::<u32>().map_err(|e| {
            MutexError::StateFormat(format!("invalid remaining count '{}': {}", remaining, e))
        })?;

        let holders = pids
            .split(',')
            .map(str::trim)
            .filter(|pid| !pid.is_empty())
            .map(|pid| {
                pid.parse::<u32>().map_err(|e| {
                    MutexError::StateFormat(format!("invalid pid '{}': {}", pid, e))
                })
            })
            .collect::<Result<BTreeSet<u32>>>()?;

        Ok(Self {
            updated_at,
            remaining,
            holders,
        })
    }

    /// Encode as the single state line (no trailing newline).
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Read and parse the state from the start of an open lock file.
    pub(crate) fn read_from(file: &mut File, capacity: u32) -> Result<Self> {
        let mut content = String::new();
        file.seek(SeekFrom::Start(0))
            .and_then(|_| file.read_to_string(&mut content))
            .map_err(|e| MutexError::Io(format!("failed to read semaphore state: {}", e)))?;

        let state = Self::parse(&content, capacity)?;
        tracing::debug!(state = %state, "Read semaphore state");
        Ok(state)
    }

    /// Overwrite the lock file in place with this state.
    ///
    /// The file is truncated to the written length so no stale bytes remain.
    pub(crate) fn write_to(&self, file: &mut File) -> Result<()> {
        let line = self.encode();
        file.seek(SeekFrom::Start(0))
            .and_then(|_| file.write_all(line.as_bytes()))
            .and_then(|_| file.flush())
            .and_then(|_| file.set_len(line.len() as u64))
            .map_err(|e| MutexError::Io(format!("failed to write semaphore state: {}", e)))?;

        tracing::debug!(state = %line, "Wrote semaphore state");
        Ok(())
    }
}

impl fmt::Display for SemaphoreState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let centis = (self.updated_at.timestamp_subsec_millis() / 10).min(99);
        let pids: Vec<String> = self.holders.iter().map(u32::to_string).collect();
        write!(
            f,
            "{}.{:02}|{}|{}",
            self.updated_at.format(TIMESTAMP_FORMAT),
            centis,
            self.remaining,
            pids.join(",")
        )
    }
}

/// Empty the lock file, which resets it to the initial state.
pub(crate) fn truncate(file: &mut File) -> Result<()> {
    file.seek(SeekFrom::Start(0))
        .and_then(|_| file.set_len(0))
        .map_err(|e| MutexError::Io(format!("failed to truncate semaphore state: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn test_empty_content_is_initial_state() {
        for content in ["", "\n", "   \n"] {
            let state = SemaphoreState::parse(content, 5).unwrap();
            assert_eq!(state, SemaphoreState::initial(5));
            assert_eq!(state.updated_at.timestamp(), 0);
        }
    }

    #[test]
    fn test_parse_documented_example() {
        let state = SemaphoreState::parse("2013-11-21 13:17:25.864069|5|12345,12346,12347", 9)
            .unwrap();

        assert_eq!(state.remaining, 5);
        assert_eq!(
            state.holders.iter().copied().collect::<Vec<_>>(),
            vec![12345, 12346, 12347]
        );
        assert_eq!(
            state.updated_at.with_nanosecond(0).unwrap(),
            Utc.with_ymd_and_hms(2013, 11, 21, 13, 17, 25).unwrap()
        );
        assert_eq!(state.updated_at.timestamp_subsec_micros(), 864_069);
    }

    #[test]
    fn test_parse_empty_pid_list() {
        let state = SemaphoreState::parse("1970-01-01 00:00:00.00|3|", 3).unwrap();
        assert_eq!(state.remaining, 3);
        assert!(state.holders.is_empty());
    }

    #[test]
    fn test_parse_ignores_trailing_lines_and_whitespace() {
        let state = SemaphoreState::parse("2020-01-01 10:00:00.50|1|42\ngarbage", 2).unwrap();
        assert_eq!(state.remaining, 1);
        assert!(state.holders.contains(&42));
    }

    #[test]
    fn test_parse_deduplicates_pids() {
        let state = SemaphoreState::parse("2020-01-01 10:00:00.50|0|7,7,8,", 2).unwrap();
        assert_eq!(state.holders.len(), 2);
    }

    #[test]
    fn test_parse_rejects_malformed_lines() {
        for bad in [
            "2020-01-01 10:00:00.50|1",
            "2020-01-01 10:00:00.50|1|2|3",
            "yesterday|1|",
            "2020-01-01 10:00:00.50|-1|",
            "2020-01-01 10:00:00.50|many|",
            "2020-01-01 10:00:00.50|1|abc",
        ] {
            let err = SemaphoreState::parse(bad, 2).unwrap_err();
            assert!(
                matches!(err, MutexError::StateFormat(_)),
                "'{}' gave {:?}",
                bad,
                err
            );
        }
    }

    #[test]
    fn test_encode_uses_centiseconds() {
        let state = SemaphoreState {
            updated_at: Utc
                .with_ymd_and_hms(2013, 11, 21, 13, 17, 25)
                .unwrap()
                .with_nanosecond(864_069_000)
                .unwrap(),
            remaining: 5,
            holders: [12347, 12345, 12346].into_iter().collect(),
        };

        assert_eq!(state.encode(), "2013-11-21 13:17:25.86|5|12345,12346,12347");
    }

    #[test]
    fn test_encode_initial_state() {
        assert_eq!(
            SemaphoreState::initial(4).encode(),
            "1970-01-01 00:00:00.00|4|"
        );
    }

    #[test]
    fn test_round_trip_keeps_count_and_pids() {
        let state = SemaphoreState::stamped(
            2,
            [100, 200].into_iter().collect(),
            300,
            Membership::Join,
        );
        let decoded = SemaphoreState::parse(&state.encode(), 9).unwrap();

        assert_eq!(decoded.remaining, state.remaining);
        assert_eq!(decoded.holders, state.holders);
        // Precision loss is limited to sub-centisecond digits and is stable
        assert_eq!(decoded.encode(), state.encode());
        assert!(state.updated_at - decoded.updated_at < chrono::Duration::milliseconds(10));
    }

    #[test]
    fn test_stamped_join_adds_pid_once() {
        let holders: BTreeSet<u32> = [5].into_iter().collect();
        let state = SemaphoreState::stamped(1, holders, 5, Membership::Join);
        assert_eq!(state.holders.len(), 1);

        let state = SemaphoreState::stamped(0, state.holders, 6, Membership::Join);
        assert_eq!(state.holders, [5, 6].into_iter().collect());
        assert!(Utc::now() - state.updated_at < chrono::Duration::seconds(5));
    }

    #[test]
    fn test_stamped_leave_drops_pid() {
        let holders: BTreeSet<u32> = [5, 6].into_iter().collect();
        let state = SemaphoreState::stamped(1, holders, 5, Membership::Leave);
        assert_eq!(state.holders, [6].into_iter().collect());

        // Leaving when not a member is harmless
        let state = SemaphoreState::stamped(2, state.holders, 99, Membership::Leave);
        assert_eq!(state.holders, [6].into_iter().collect());
    }

    #[test]
    fn test_write_truncates_stale_bytes() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        let mut file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(temp.path())
            .unwrap();

        let long = SemaphoreState::stamped(
            1,
            [1_000_001, 1_000_002, 1_000_003].into_iter().collect(),
            1_000_004,
            Membership::Join,
        );
        long.write_to(&mut file).unwrap();

        let short = SemaphoreState::stamped(3, BTreeSet::new(), 1, Membership::Leave);
        short.write_to(&mut file).unwrap();

        let on_disk = std::fs::read_to_string(temp.path()).unwrap();
        assert_eq!(on_disk, short.encode());

        let reread = SemaphoreState::read_from(&mut file, 3).unwrap();
        assert_eq!(reread.remaining, 3);
        assert!(reread.holders.is_empty());
    }

    #[test]
    fn test_truncate_resets_to_initial() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        let mut file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(temp.path())
            .unwrap();

        SemaphoreState::stamped(0, BTreeSet::new(), 12, Membership::Join)
            .write_to(&mut file)
            .unwrap();
        truncate(&mut file).unwrap();

        assert_eq!(std::fs::metadata(temp.path()).unwrap().len(), 0);
        assert_eq!(
            SemaphoreState::read_from(&mut file, 2).unwrap(),
            SemaphoreState::initial(2)
        );
    }
}
