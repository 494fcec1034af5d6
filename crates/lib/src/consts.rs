/// Marker subdirectory identifying a snapshot repository root.
pub const VCS_MARKER: &str = ".git";

/// Suffix appended to a directory name to form its backup artifact name.
pub const BACKUP_SUFFIX: &str = ".old.zip";

/// Identity recorded as author and committer of every finalise commit.
pub const AGENT_NAME: &str = "Ensconce";
pub const AGENT_EMAIL: &str = "deployment@ensconce.local";
