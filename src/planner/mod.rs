//! Query planner
//!
//! Turns the textual Phi spec into a validated, immutable plan.
//!
//! ## Pipeline
//!
//! ```text
//! spec text
//!   → Phi::build() → Phi
//!   → BoundPlan::bind(&phi, &schema) → BoundPlan   (executor)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use phiql::planner::{ExplainOutput, Phi};
//!
//! let phi = Phi::build(&spec)?;
//! println!("{}", ExplainOutput::format(&phi));
//! ```

pub mod error;
pub mod explain;
pub mod phi;

pub use error::{PlannerError, PlannerResult};
pub use explain::ExplainOutput;
pub use phi::{Phi, REQUIRED_SECTIONS};
