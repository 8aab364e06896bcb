pub mod config;
pub mod job;
pub mod object;

pub use config::{CloudProvider, RedisConfig, StaleMonitorConfig, UploadMonitorConfig};
pub use job::{JobDescriptor, JobKey, JobStatus, JobType, PredictFields};
pub use object::ObjectMeta;
