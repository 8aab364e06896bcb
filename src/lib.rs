pub mod cli;
pub mod clock;
pub mod errors;
pub mod logging;
pub mod models;
pub mod monitor;
pub mod parser;
pub mod storage;
pub mod store;
