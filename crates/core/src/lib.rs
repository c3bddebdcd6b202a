// crates/core/src/lib.rs
pub mod activity;
pub mod cost;
pub mod entry;
pub mod error;
pub mod normalize;
pub mod scan;
pub mod tail;

pub use activity::*;
pub use cost::*;
pub use entry::*;
pub use error::*;
pub use normalize::*;
pub use scan::*;
pub use tail::*;
