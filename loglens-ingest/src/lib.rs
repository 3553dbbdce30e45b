//! Access-log ingestion for loglens.

pub mod tailer;

pub use tailer::{
    Tailer, TailerHandle, TailerMonitor, TailerSettings, TailerState, TailerStats, TailerStatus,
};
