pub mod cache;
pub mod calibration;
pub mod consts;
pub mod detection;
pub mod error;
pub mod frame;
pub mod io;
pub mod lightcurve;
pub mod photometry;
pub mod pipeline;
pub mod recenter;
pub mod stack;
pub mod stats;
