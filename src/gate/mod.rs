//! Gate models and the classifiers that apply them.

pub mod classifier;
pub mod model;
pub mod registry;
pub mod runner;
pub mod scoring;

pub use classifier::{GateParams, PrecomputedCalls, PurityClassifier, SignatureGate, Thresholds};
pub use model::GateModel;
pub use registry::ModelRegistry;
pub use runner::run_models;
