//! Upload filename conventions.
//!
//! A direct upload lands at `<prefix>/directupload_<rest>`. For `predict`
//! jobs `<rest>` is `<model>_<version>_<postprocess>_<cuts>_<anything>`.
//! A `benchmarking<N>special` token anywhere in the name turns one object
//! into N jobs.

use std::sync::OnceLock;

use regex::Regex;

use crate::errors::{MonitorError, ParseError};
use crate::models::{JobType, PredictFields};

fn predict_fields_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"directupload_([^_]+)_([0-9]+)_([^_]+)_([0-9]+)_.+$")
            .expect("predict fields regex must compile")
    })
}

fn benchmark_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"benchmarking([0-9]+)special").expect("benchmark regex must compile")
    })
}

/// Largest benchmark expansion accepted unless configured otherwise.
pub const DEFAULT_MAX_BENCHMARK: u32 = 1000;

/// Normalize a bucket prefix to `segment/segment/` form.
pub fn normalize_prefix(raw: &str) -> String {
    let segments: Vec<&str> = raw.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return String::new();
    }
    format!("{}/", segments.join("/"))
}

/// Split a comma-separated prefix list, normalizing each entry and dropping
/// blanks.
pub fn parse_prefixes(csv: &str) -> Vec<String> {
    csv.split(',')
        .map(normalize_prefix)
        .filter(|p| !p.is_empty())
        .collect()
}

/// What one direct upload turns into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPlan {
    pub fields: Option<PredictFields>,
    /// One entry per job. A single element equal to the uploaded filename
    /// unless the upload is a benchmark.
    pub filenames: Vec<String>,
}

/// Recognizes direct uploads under one prefix.
#[derive(Debug, Clone)]
pub struct FilenameParser {
    prefix: String,
    direct_upload: Regex,
    max_benchmark: u32,
}

impl FilenameParser {
    pub fn new(prefix: &str) -> Result<Self, MonitorError> {
        let prefix = normalize_prefix(prefix);
        if prefix.is_empty() {
            return Err(MonitorError::Config("Prefix cannot be empty".to_string()));
        }
        let pattern = format!(
            r"(?:^|/){}(?:/|%2F)(directupload_.+)$",
            regex::escape(prefix.trim_end_matches('/'))
        );
        let direct_upload = Regex::new(&pattern)
            .map_err(|e| MonitorError::Config(format!("Invalid prefix '{}': {}", prefix, e)))?;
        Ok(Self {
            prefix,
            direct_upload,
            max_benchmark: DEFAULT_MAX_BENCHMARK,
        })
    }

    /// Cap on the N of a `benchmarking<N>special` upload. Larger counts are
    /// rejected as invalid.
    pub fn with_max_benchmark(mut self, max_benchmark: u32) -> Self {
        self.max_benchmark = max_benchmark;
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn max_benchmark(&self) -> u32 {
        self.max_benchmark
    }

    /// The `directupload_...` filename of `path`, or `None` when the object
    /// was not uploaded directly (web uploads, outputs, anything else).
    pub fn direct_upload_filename<'a>(&self, path: &'a str) -> Option<&'a str> {
        self.direct_upload
            .captures(path)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }

    /// Classify `path` and work out the jobs it should produce.
    pub fn plan(&self, path: &str, job_type: JobType) -> Result<(String, UploadPlan), ParseError> {
        let filename = self
            .direct_upload_filename(path)
            .ok_or(ParseError::NotDirectUpload)?;
        let plan = plan_upload(filename, job_type, self.max_benchmark)?;
        Ok((filename.to_string(), plan))
    }
}

/// The N of a `benchmarking<N>special` token, if present.
pub fn benchmark_count(filename: &str) -> Result<Option<u32>, ParseError> {
    let Some(caps) = benchmark_regex().captures(filename) else {
        return Ok(None);
    };
    let digits = &caps[1];
    match digits.parse::<u32>() {
        Ok(n) if n > 0 => Ok(Some(n)),
        _ => Err(ParseError::InvalidBenchmark(filename.to_string())),
    }
}

/// `{basename}{i}{ext}` for `i` in `0..count`.
pub fn expand_benchmark(filename: &str, count: u32) -> Vec<String> {
    let (base, ext) = split_extension(filename);
    (0..count).map(|i| format!("{}{}{}", base, i, ext)).collect()
}

/// Split off the final extension, dot included. Leading dots and dots in
/// directory segments do not count.
fn split_extension(filename: &str) -> (&str, &str) {
    let name_start = filename.rfind('/').map(|i| i + 1).unwrap_or(0);
    match filename[name_start..].rfind('.') {
        Some(0) | None => (filename, ""),
        Some(dot) => filename.split_at(name_start + dot),
    }
}

pub fn parse_predict_fields(filename: &str) -> Result<PredictFields, ParseError> {
    let invalid = || ParseError::InvalidFields(filename.to_string());
    let caps = predict_fields_regex().captures(filename).ok_or_else(invalid)?;
    Ok(PredictFields {
        model_name: caps[1].to_string(),
        model_version: caps[2].parse().map_err(|_| invalid())?,
        postprocess_function: caps[3].to_string(),
        cuts: caps[4].parse().map_err(|_| invalid())?,
    })
}

/// Fields and job filenames for `filename`. A benchmark count above
/// `max_benchmark` is `ParseError::InvalidBenchmark`.
pub fn plan_upload(
    filename: &str,
    job_type: JobType,
    max_benchmark: u32,
) -> Result<UploadPlan, ParseError> {
    let fields = if job_type.requires_fields() {
        Some(parse_predict_fields(filename)?)
    } else {
        None
    };
    let filenames = match benchmark_count(filename)? {
        Some(n) if n > max_benchmark => {
            return Err(ParseError::InvalidBenchmark(filename.to_string()));
        }
        Some(n) => expand_benchmark(filename, n),
        None => vec![filename.to_string()],
    };
    Ok(UploadPlan { fields, filenames })
}
