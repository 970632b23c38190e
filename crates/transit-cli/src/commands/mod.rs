pub mod calibrate;
pub mod config;
pub mod detect;
pub mod pipeline;
pub mod stack;
