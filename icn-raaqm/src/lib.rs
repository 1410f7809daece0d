//! Receiver-driven adaptive AQM for consumer-side transports.
//!
//! [`RaaqmDataPath`] tracks RTT and loss signals per path and
//! [`RaaqmController`] turns them into a download window.

pub mod config;
pub mod controller;
pub mod data_path;
pub mod error;

pub use config::RaaqmConfig;
pub use controller::{AccessNetwork, RaaqmController, DEFAULT_PATH_LABEL};
pub use data_path::{PathReport, PathState, RaaqmDataPath};
pub use error::{RaaqmError, Result};
