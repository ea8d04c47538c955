//! Buffer checks and layout planning that run before an engine call.

pub mod flatten;
pub mod split;
pub mod validate;

pub use flatten::{FlatLayout, flatten};
pub use split::SplitPlan;
