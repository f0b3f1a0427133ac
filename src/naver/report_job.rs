use chrono::NaiveDate;
use reqwest::Method;
use serde_json::json;
use tracing::info;

use crate::error::{AppError, Result};
use crate::http::poll::{PollError, PollOutcome, PollPolicy};
use crate::http::ApiClient;
use crate::types::{JobState, ReportJob, ReportType};

/// Drives the stat-report lifecycle: create → poll → download.
pub struct ReportJobClient<'a, C: ApiClient> {
    client: &'a C,
    poll: PollPolicy,
}

impl<'a, C: ApiClient> ReportJobClient<'a, C> {
    pub fn new(client: &'a C, poll: PollPolicy) -> Self {
        Self { client, poll }
    }

    /// Registers a report job. Any non-2xx response is returned as an error
    /// without retrying.
    pub async fn create_report(&self, report_type: ReportType, date: NaiveDate) -> Result<i64> {
        let body = json!({
            "reportTp": report_type,
            "statDt": date.format("%Y%m%d").to_string(),
        });
        let resp = self
            .client
            .request(Method::POST, "/stat-reports", Some(&body))
            .await?
            .error_for_status()?;
        let job: ReportJob = serde_json::from_str(&resp.body)?;
        info!(job_id = job.id, report = %report_type, date = %date, status = %job.status, "Report job created");
        Ok(job.id)
    }

    /// Polls the job until it is built or failed, or the attempt budget runs out.
    pub async fn await_completion(&self, job_id: i64) -> Result<ReportJob> {
        let path = format!("/stat-reports/{job_id}");
        let label = format!("stat-report {job_id}");
        let path = path.as_str();
        let client = self.client;

        let outcome = self
            .poll
            .run(&label, || async move {
                let resp = client.request(Method::GET, path, None).await?.error_for_status()?;
                let job: ReportJob = serde_json::from_str(&resp.body)?;
                Ok(match job.state() {
                    JobState::Complete | JobState::NoData => PollOutcome::Ready(job),
                    JobState::Failed => PollOutcome::Failed(job.status),
                    JobState::Pending => PollOutcome::Pending(job.status),
                })
            })
            .await;

        match outcome {
            Ok(job) => {
                info!(job_id, status = %job.status, "Report job ready");
                Ok(job)
            }
            Err(PollError::Failed { status, .. }) => {
                Err(AppError::ReportFailed { job_id: job_id.to_string(), status })
            }
            Err(PollError::TimedOut { attempts }) => {
                Err(AppError::ReportTimeout { job_id: job_id.to_string(), attempts })
            }
        }
    }

    /// Fetches the report body. A missing URL fails before any request is made.
    pub async fn download(&self, job_id: i64, url: Option<&str>) -> Result<String> {
        let url = url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| AppError::MissingDownloadUrl { job_id: job_id.to_string() })?;
        let resp = self.client.request(Method::GET, url, None).await?.error_for_status()?;
        info!(job_id, bytes = resp.body.len(), "Report downloaded");
        Ok(resp.body)
    }

    /// create → await → download for one report type and day. A job that
    /// finished with no data yields an empty report.
    pub async fn fetch_report(&self, report_type: ReportType, date: NaiveDate) -> Result<String> {
        let job_id = self.create_report(report_type, date).await?;
        let job = self.await_completion(job_id).await?;
        if job.state() == JobState::NoData {
            info!(job_id, report = %report_type, "Report job has no data for the day");
            return Ok(String::new());
        }
        self.download(job_id, job.download_url.as_deref()).await
    }
}
