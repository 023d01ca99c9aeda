pub mod application;
pub mod log_box;
pub mod panel;
pub mod style;
pub mod types;
