//! # evoclone: clone-group and method evolution tracking
//!
//! Tracks how methods and clone groups evolve across an ordered sequence of
//! code revisions: which methods survive, which clone groups split or
//! merge, and how long each lineage has lived.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        engine                                │
//! ├─────────────────────────────────────────────────────────────┤
//! │ group_detector │ method_matcher │ group_matcher │ classifier │
//! │ (union-find)   │ (exact+fuzzy)  │ (overlap)     │            │
//! ├─────────────────────────────────────────────────────────────┤
//! │ method_tracker │ group_tracker │ lsh │ similarity │ disjoint_set │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use evoclone::{EngineConfig, EvolutionEngine, InMemoryRevisionSource};
//!
//! let source = InMemoryRevisionSource::new(vec![]);
//! let mut engine = EvolutionEngine::new(EngineConfig::default())?;
//! let output = engine.run(&source)?;
//! println!("method rows: {}", output.method_trace.len());
//! # Ok::<(), evoclone::EvoError>(())
//! ```

#![warn(missing_docs)]
#![warn(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::suspicious)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::fn_params_excessive_bools)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

#[cfg(feature = "mimalloc")]
#[global_allocator]
static ALLOC: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Core data model, configuration, and error types.
pub mod core {
    //! Shared types: the data model, configuration surface, and error
    //! taxonomy every other module builds on.

    pub mod config;
    pub mod errors;
    pub mod model;
}

pub mod classifier;
pub mod disjoint_set;
pub mod engine;
pub mod group_detector;
pub mod group_matcher;
pub mod group_tracker;
pub mod lsh;
pub mod method_matcher;
pub mod method_tracker;
pub mod revision_source;
pub mod similarity;

pub use core::config::{EngineConfig, LshConfig, MatcherConfig, ParallelMode};
pub use core::errors::{EngineWarning, EvoError, RecordLocator, Result, ResultExt};
pub use core::model::{
    unordered_pair, CloneGroup, ClonePair, CodeBlock, GroupMatch, GroupState, GroupTraceRow,
    MatchType, MembershipRow, MethodMatch, MethodState, MethodStateDetail, MethodTraceRow,
    Parameter, Revision,
};
pub use engine::{EngineOutput, EvolutionEngine};
pub use revision_source::{InMemoryRevisionSource, RevisionSource};

/// Library version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build-time feature detection.
pub mod features {
    //! Runtime feature detection.

    /// Check if rayon-based parallelism is compiled in.
    #[must_use]
    pub const fn has_parallel() -> bool {
        cfg!(feature = "parallel")
    }

    /// Check if the benchmark harness is compiled in.
    #[must_use]
    pub const fn has_benchmarks() -> bool {
        cfg!(feature = "benchmarks")
    }
}
