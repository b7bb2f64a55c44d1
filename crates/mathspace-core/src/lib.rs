//! MathSpace Core - Pipeline Controller
//!
//! Turns a natural-language instruction into a rendered Manim scene:
//! - Classifies intent against the live scene and recent history
//! - Drafts, critiques and revises the scene script
//! - Renders it with a bounded repair loop
//! - Persists each turn for the next request
//!
//! The model and the renderer sit behind [`LanguageModel`] and
//! [`ExecutionAdapter`], so tests can drive the whole pipeline with fakes.
//!
//! # Example
//!
//! ```rust,ignore
//! use mathspace_core::{MathSpaceConfig, Pipeline};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MathSpaceConfig::load(None)?;
//! let pipeline = Pipeline::from_config(config)?;
//!
//! let result = pipeline.handle("draw a red circle").await?;
//! println!("{:?}", result.outcome.locator());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod error;
pub mod executor;
pub mod llm;
pub mod pipeline;
pub mod prompts;
pub mod stages;
pub mod types;

// Re-exports for convenience
pub use config::{
    ConfigError, LlmConfig, MathSpaceConfig, PathsConfig, PipelineConfig, RenderConfig, API_KEY_ENV,
};
pub use error::{FailureReason, LlmError, PipelineError, PipelineFailure, StageFailure};
pub use executor::{
    locate_output, ExecutionAdapter, ExecutionReport, ManimRenderer, RenderFailure,
    SYNTHETIC_EXIT_CODE, TIMEOUT_MESSAGE,
};
pub use llm::{ChatCompletionsClient, CompletionRequest, LanguageModel};
pub use pipeline::{ContextOverview, Pipeline, OVERVIEW_TURNS};
pub use stages::{Stage, StageContext, StageOutcome, UNANALYZED};
pub use types::{PipelineRunResult, RequestId, RunOutcome, StageTimings};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with MathSpace Core
    pub use crate::{
        ExecutionAdapter, LanguageModel, MathSpaceConfig, Pipeline, PipelineFailure,
        PipelineRunResult, RunOutcome, Stage,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
