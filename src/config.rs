use std::format;
use std::time::Duration;

use crate::errors::InvalidSegmentFileName;
use crate::num;
use crate::SegmentId;

/// Configuration for a journal and the raft node that replicates it.
///
/// Optional parameters are `Option<T>` in this struct, and default values is
/// evaluated when a getter method is called.
#[derive(Clone, Debug, Default)]
pub struct Config {
    /// Directory holding the segment files and the raft meta file.
    pub dir: String,

    /// Maximum size of a segment file in bytes, including its descriptor.
    pub segment_max_size: Option<u32>,

    /// Size of the read buffer used when scanning a segment on open.
    pub read_buffer_size: Option<usize>,

    /// Whether to truncate a damaged or half-written tail of the last
    /// segment when it is opened.
    ///
    /// If truncate, the segment is considered successfully opened.
    /// Otherwise, an io::Error will be returned.
    pub truncate_incomplete_record: Option<bool>,

    /// Extend every new segment file to `segment_max_size` when it is created.
    pub preallocate_segment_files: Option<bool>,

    /// Base election timeout in ticks.
    ///
    /// The effective timeout is chosen at random in `[base, 2 * base)`.
    pub election_timeout_ticks: Option<u64>,

    /// Number of ticks between two heartbeats sent by a leader.
    pub heartbeat_ticks: Option<u64>,

    /// Number of ticks before an unacknowledged append request is resent, and
    /// before a pending proposal is failed.
    pub request_timeout_ticks: Option<u64>,

    /// Whether a node polls its peers before it starts an election.
    ///
    /// A node only increments its term once a majority would vote for it, so
    /// a node that was cut off does not depose the leader when it returns.
    pub pre_vote: Option<bool>,

    /// Maximum number of entries carried by one append request.
    pub max_append_entries: Option<usize>,

    /// Interval of the tick timer driven by a partition.
    pub tick_interval_ms: Option<u64>,

    /// Seed for the election timeout randomization.
    ///
    /// A node derives its own seed from this and its node id, so that members
    /// sharing a config do not time out in lockstep.
    pub random_seed: Option<u64>,
}

impl Config {
    /// Creates a new Config with the specified directory and default values for
    /// other fields
    pub fn new(dir: impl ToString) -> Self {
        Self {
            dir: dir.to_string(),
            ..Default::default()
        }
    }

    /// Returns a copy of this config that stores its files in `dir`.
    pub fn with_dir(&self, dir: impl ToString) -> Self {
        Self {
            dir: dir.to_string(),
            ..self.clone()
        }
    }

    /// Returns the maximum size of a segment in bytes (defaults to 128MB)
    pub fn segment_max_size(&self) -> u32 {
        self.segment_max_size.unwrap_or(128 * 1024 * 1024)
    }

    /// Returns the size of read buffer in bytes (defaults to 64KB)
    pub fn read_buffer_size(&self) -> usize {
        self.read_buffer_size.unwrap_or(64 * 1024)
    }

    /// Returns whether to truncate incomplete records (defaults to true)
    pub fn truncate_incomplete_record(&self) -> bool {
        self.truncate_incomplete_record.unwrap_or(true)
    }

    /// Returns whether segment files are preallocated (defaults to false)
    pub fn preallocate_segment_files(&self) -> bool {
        self.preallocate_segment_files.unwrap_or(false)
    }

    /// Returns the base election timeout in ticks (defaults to 10, at least 1)
    pub fn election_timeout_ticks(&self) -> u64 {
        self.election_timeout_ticks.unwrap_or(10).max(1)
    }

    /// Returns the heartbeat interval in ticks (defaults to 2, at least 1)
    pub fn heartbeat_ticks(&self) -> u64 {
        self.heartbeat_ticks.unwrap_or(2).max(1)
    }

    /// Returns the request timeout in ticks (defaults to 30, at least 1)
    pub fn request_timeout_ticks(&self) -> u64 {
        self.request_timeout_ticks.unwrap_or(30).max(1)
    }

    /// Returns whether elections are preceded by a poll (defaults to true)
    pub fn pre_vote(&self) -> bool {
        self.pre_vote.unwrap_or(true)
    }

    /// Returns the max number of entries per append request (defaults to 64)
    pub fn max_append_entries(&self) -> usize {
        self.max_append_entries.unwrap_or(64).max(1)
    }

    /// Returns the tick interval (defaults to 50ms)
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.unwrap_or(50).max(1))
    }

    /// Returns the random seed (defaults to 0)
    pub fn random_seed(&self) -> u64 {
        self.random_seed.unwrap_or(0)
    }

    /// Returns the full path for a given segment ID
    pub fn segment_path(&self, segment_id: SegmentId) -> String {
        let file_name = Self::segment_file_name(segment_id);
        format!("{}/{}", self.dir, file_name)
    }

    /// Returns the path of the file holding the persisted term and vote.
    pub fn meta_path(&self) -> String {
        format!("{}/raft.meta", self.dir)
    }

    /// Generates the file name for a given segment ID
    ///
    /// The file name format is "j-{padded_segment_id}.log"
    pub(crate) fn segment_file_name(segment_id: SegmentId) -> String {
        let file_name = num::format_pad_u64(*segment_id);
        format!("j-{}.log", file_name)
    }

    /// Parses a segment file name and returns the segment ID
    pub(crate) fn parse_segment_file_name(
        file_name: &str,
    ) -> Result<SegmentId, InvalidSegmentFileName> {
        let stem = file_name
            .strip_suffix(".log")
            .ok_or_else(|| {
                InvalidSegmentFileName::new(file_name, "has no '.log' suffix")
            })?
            .strip_prefix("j-")
            .ok_or_else(|| {
                InvalidSegmentFileName::new(file_name, "has no 'j-' prefix")
            })?;

        let id = num::parse_pad_u64(stem).ok_or_else(|| {
            InvalidSegmentFileName::new(
                file_name,
                "is not a 20 digit id grouped by '_'",
            )
        })?;

        Ok(SegmentId(id))
    }
}

#[cfg(test)]
mod tests {
    use super::Config;
    use crate::SegmentId;

    #[test]
    fn test_segment_file_name() {
        assert_eq!(
            Config::segment_file_name(SegmentId(7)),
            "j-00_000_000_000_000_000_007.log"
        );

        let config = Config::new("/tmp/foo");
        assert_eq!(
            config.segment_path(SegmentId(7)),
            "/tmp/foo/j-00_000_000_000_000_000_007.log"
        );
    }

    #[test]
    fn test_parse_segment_file_name() {
        assert_eq!(
            Config::parse_segment_file_name("j-10_100_000_000_001_200_000.log"),
            Ok(SegmentId(10_100_000_000_001_200_000))
        );

        assert!(
            Config::parse_segment_file_name("j-10_100_000_000_001_200_000_1.log")
                .is_err()
        );
        assert!(Config::parse_segment_file_name("j-1000000000.log").is_err());
        assert!(
            Config::parse_segment_file_name("j-10_100_000_000_001_200_000.logg")
                .is_err()
        );
        assert!(
            Config::parse_segment_file_name("r-10_100_000_000_001_200_000.log")
                .is_err()
        );
        assert!(Config::parse_segment_file_name("raft.meta").is_err());
    }

    #[test]
    fn test_defaults() {
        let config = Config::new("foo");
        assert_eq!(config.segment_max_size(), 128 * 1024 * 1024);
        assert!(config.truncate_incomplete_record());
        assert!(!config.preallocate_segment_files());
        assert_eq!(config.election_timeout_ticks(), 10);
        assert_eq!(config.heartbeat_ticks(), 2);
        assert!(config.pre_vote());

        let sub = config.with_dir("bar");
        assert_eq!(sub.dir, "bar");
        assert_eq!(sub.election_timeout_ticks(), 10);
    }
}
