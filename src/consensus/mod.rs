//! Consensus labels from multiple gate models.
//!
//! ```text
//!  PurityTable (model → Pure/Impure/NA per cell)
//!        │  eligible models called Pure
//!        ▼
//!   raw LabelSet per cell        {"Tcell.RM", "NK.RM"}
//!        │  rename (memoized per distinct set)
//!        ▼
//!   final LabelSet per cell      {"T_NK"}
//!        │  optional ambiguity drop
//!        ▼
//!   ConsensusResult + natural-ordered levels
//! ```

pub mod aggregate;
pub mod label;
pub mod natural;

pub use aggregate::{aggregate, ConsensusOptions, ConsensusResult};
pub use label::{LabelRename, LabelSet, LABEL_SEPARATOR};
