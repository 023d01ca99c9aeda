pub mod command;
pub mod throttle;
