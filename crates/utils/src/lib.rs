pub mod logging;
pub mod response;
pub mod timestamp;
