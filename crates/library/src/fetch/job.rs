use derive_more::Display;
use uuid::Uuid;

/// Handle to a background fetch job.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(Uuid);
impl JobId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

/// Deduplication key of a job: the BLAKE3 hash of the canonical URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct JobKey(String);
impl JobKey {
    pub(crate) fn for_url(url: &str) -> Self {
        Self(blake3::hash(url.as_bytes()).to_hex().to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    Running,
    /// Linked to the Item with this uuid.
    Finished(Uuid),
    /// The error message. Failed jobs are never retried automatically.
    Failed(String),
}
impl JobStatus {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Finished(_) | Self::Failed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_key_is_stable() {
        let url = "https://books.example/item/1";
        assert_eq!(JobKey::for_url(url), JobKey::for_url(url));
        assert_ne!(JobKey::for_url(url), JobKey::for_url("https://books.example/item/2"));
        assert_eq!(JobKey::for_url(url).0.len(), 64);
    }

    #[test]
    fn test_is_done() {
        assert!(!JobStatus::Queued.is_done());
        assert!(!JobStatus::Running.is_done());
        assert!(JobStatus::Finished(Uuid::nil()).is_done());
        assert!(JobStatus::Failed("boom".to_string()).is_done());
    }
}
