//! Packet capture ingestion
//!
//! Turns the capture tool's standard output into records on the hub:
//!
//! - [`reframer`] splits the byte stream into lines
//! - [`decoder`] turns a line into a [`Record`] or classifies why it is not one
//! - [`pipeline`] runs the reader and decoder tasks
//! - [`supervisor`] owns the capture process and its lifecycle

pub mod config;
pub mod decoder;
pub mod pipeline;
pub mod reframer;
pub mod supervisor;

pub use config::{CaptureConfig, OutputFormat};
pub use decoder::{decode, DecodeOutcome, Malformed, Record};
pub use reframer::{FrameError, LineReframer, OverflowPolicy};
pub use supervisor::{CaptureError, CaptureHandle, CaptureState, CaptureSupervisor};
