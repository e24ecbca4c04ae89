use genq_core::{GenerationType, Job};

/// Store change notifications, broadcast to every subscriber.
#[derive(Debug, Clone)]
pub enum JobEvent {
    Queued(Job),
    /// First transition into `processing`
    Started(Job),
    Progress {
        job_id: String,
        generation_type: GenerationType,
        progress: u8,
        message: Option<String>,
    },
    Completed(Job),
    Failed(Job),
    Removed {
        job_id: String,
        generation_type: GenerationType,
    },
}

impl JobEvent {
    pub fn job_id(&self) -> &str {
        match self {
            Self::Queued(job) | Self::Started(job) | Self::Completed(job) | Self::Failed(job) => &job.job_id,
            Self::Progress { job_id, .. } | Self::Removed { job_id, .. } => job_id,
        }
    }

    /// Events worth persisting right away; progress ticks are not.
    pub fn is_durable(&self) -> bool {
        !matches!(self, Self::Progress { .. })
    }
}
