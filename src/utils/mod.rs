pub mod browser;
pub mod config;
pub mod disk;
pub mod log_buffer;
pub mod logging;
pub mod port;

pub use config::Config;
pub use log_buffer::LogBuffer;
