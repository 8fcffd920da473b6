//! Signal selection
//!
//! Group filtering and seeded sampling of rows that carry a target signal.

mod filter;
mod sampler;

pub use filter::filter_groups;
pub use sampler::{sample_groups, sample_signals, SeedStrategy};
