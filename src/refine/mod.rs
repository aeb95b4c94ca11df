//! Refinement module - the generate → execute → critique → refine loop.
//!
//! 1. The [`Generator`] drafts an artifact (SQL or chart code) in one call
//! 2. An [`ArtifactRunner`](crate::runner::ArtifactRunner) executes it
//! 3. The [`Critic`] reads the observed result and proposes version 2
//! 4. The runner executes version 2 and both rounds are reported

mod critic;
mod generator;
mod prompt;
mod refinement_loop;
mod types;

pub use critic::{parse_critique, Critic};
pub use generator::Generator;
pub use refinement_loop::{RefinementLoop, RefinementReport};
pub use types::{Artifact, ArtifactKind, Context, Feedback, Task};
