use serde::Serialize;

use crate::jobs::scheduler::{JobStatus, TriggerResult};

#[derive(Debug, Serialize)]
pub struct JobsResponse {
    pub jobs: Vec<JobStatus>,
}

#[derive(Debug, Serialize)]
pub struct RunJobResponse {
    pub job: String,
    #[serde(flatten)]
    pub result: TriggerResult,
}
