pub mod config;
pub mod scan;

pub use config::ServerConfig;
pub use scan::{ScanId, ScanJob, ScanPathOption, ScanStatus};
