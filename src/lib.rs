//! Signature gating and multi-model consensus labels for single-cell data.
//!
//! A run resolves a set of named gate models, classifies every cell once
//! per model ("Pure" / "Impure" / undefined), and combines the calls of the
//! consensus models into one label per cell:
//!
//! ```text
//! CellDataset ──► run_models ──► PurityTable ──► aggregate ──► ConsensusResult
//!                   ▲                                  ▲
//!            ModelRegistry                    rename / drop ambiguous
//! ```
//!
//! The input dataset is only borrowed; everything derived is returned in a
//! [`pipeline::GatingOutput`].

pub mod calls;
pub mod cli;
pub mod config;
pub mod consensus;
pub mod data;
pub mod error;
pub mod gate;
pub mod pipeline;
pub mod report;

pub use calls::{Purity, PurityTable};
pub use config::GateConfig;
pub use consensus::{aggregate, ConsensusOptions, ConsensusResult, LabelRename, LabelSet};
pub use data::model::{Cell, CellDataset, MetadataValue};
pub use error::GateError;
pub use gate::{GateModel, GateParams, ModelRegistry, PrecomputedCalls, PurityClassifier, SignatureGate};
pub use pipeline::{run, GatingOutput};
