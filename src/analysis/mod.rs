//! The external analysis capability: trait, provider client and response
//! parsing. The core consumes `analyze(images, context, language)` as an
//! opaque call; everything here exists to implement and mock that contract.

pub mod client;
pub mod relay;
pub mod repair;

pub use client::{AnalysisClient, AnalysisContext, ImagePayload, MockAnalysisClient};
pub use relay::RelayClient;

use thiserror::Error;

/// Failures of one analysis call. Every variant's message is suitable as
/// the `summary` of a failed history item.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Cannot reach the analysis service at {0}")]
    Connection(String),

    #[error("Analysis request failed: {0}")]
    Http(String),

    #[error("Analysis service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Could not parse the analysis response (try fewer pages): {0}")]
    Parse(String),
}
