use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    Predict,
    Notebook,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Predict => "predict",
            JobType::Notebook => "notebook",
        }
    }

    /// Whether the model fields must be parsed out of the filename.
    pub fn requires_fields(&self) -> bool {
        matches!(self, JobType::Predict)
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "predict" => Ok(JobType::Predict),
            "notebook" => Ok(JobType::Notebook),
            other => Err(format!(
                "Invalid job type: {}. Expected: predict or notebook",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    New,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::New => "new",
        }
    }
}

/// Fields encoded in a `predict` upload filename:
/// `directupload_<model>_<version>_<postprocess>_<cuts>_<rest>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictFields {
    pub model_name: String,
    pub model_version: u32,
    pub postprocess_function: String,
    pub cuts: u32,
}

/// The hash written to the store for one unit of downstream work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub job_type: JobType,
    pub status: JobStatus,
    /// Filename the store key is built from. Differs from the uploaded name
    /// for benchmark expansions.
    pub filename: String,
    pub url: String,
    pub input_file_name: String,
    pub identity_upload: String,
    pub fields: Option<PredictFields>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobDescriptor {
    /// Hash fields in the order consumers have always seen them.
    pub fn to_hash_fields(&self) -> Vec<(String, String)> {
        let mut out = vec![
            ("status".to_string(), self.status.as_str().to_string()),
            ("url".to_string(), self.url.clone()),
            ("input_file_name".to_string(), self.input_file_name.clone()),
            ("identity_upload".to_string(), self.identity_upload.clone()),
            ("created_at".to_string(), format_timestamp(self.created_at)),
            ("updated_at".to_string(), format_timestamp(self.updated_at)),
        ];
        if let Some(ref f) = self.fields {
            out.push(("model_name".to_string(), f.model_name.clone()));
            out.push(("model_version".to_string(), f.model_version.to_string()));
            out.push((
                "postprocess_function".to_string(),
                f.postprocess_function.clone(),
            ));
            out.push(("cuts".to_string(), f.cuts.to_string()));
        }
        out.push(("type".to_string(), self.job_type.as_str().to_string()));
        out
    }
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Store key of a job: `{job_type}:{unique_id}:{filename}`.
///
/// `unique_id` is a random UUID rendered as 32 lowercase hex digits, so two
/// replicas materializing the same upload never write to the same key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobKey {
    pub job_type: String,
    pub unique_id: String,
    pub filename: String,
}

impl JobKey {
    pub fn generate(job_type: JobType, filename: &str) -> Self {
        Self {
            job_type: job_type.as_str().to_string(),
            unique_id: Uuid::new_v4().simple().to_string(),
            filename: filename.to_string(),
        }
    }

    /// Parse a store key. Understands the current `:`-joined layout and the
    /// older `{type}_{hex}_{filename}` layout. Returns `None` for keys that
    /// were not written by a bucket monitor.
    pub fn parse(raw: &str) -> Option<Self> {
        if let Some((job_type, rest)) = raw.split_once(':') {
            if let Some((unique_id, filename)) = rest.split_once(':') {
                if !job_type.is_empty() && is_unique_id(unique_id) && !filename.is_empty() {
                    return Some(Self {
                        job_type: job_type.to_string(),
                        unique_id: unique_id.to_string(),
                        filename: filename.to_string(),
                    });
                }
            }
        }

        let (job_type, rest) = raw.split_once('_')?;
        let unique_id = rest.get(..32)?;
        let filename = rest.get(32..)?.strip_prefix('_')?;
        if job_type.is_empty() || !is_unique_id(unique_id) || filename.is_empty() {
            return None;
        }
        Some(Self {
            job_type: job_type.to_string(),
            unique_id: unique_id.to_string(),
            filename: filename.to_string(),
        })
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.job_type, self.unique_id, self.filename)
    }
}

fn is_unique_id(s: &str) -> bool {
    s.len() == 32 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
