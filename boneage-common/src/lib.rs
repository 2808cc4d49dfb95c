//! # Bone Age Common Library
//!
//! Shared code for the bone age prediction workbench:
//! - Patient and prediction data model
//! - Chronological/bone age arithmetic
//! - Configuration loading
//! - Error type and timestamp helpers

pub mod age;
pub mod config;
pub mod error;
pub mod models;
pub mod time;

pub use error::{Error, Result};
pub use models::{HistoryEntry, PatientInfo, PatientInfoUpdate, PredictionResult};
