//! Utility helpers: the generational arena, 2D math, object pooling, pair
//! bookkeeping, logging, and profiling.

pub mod allocator;
pub mod logging;
pub mod math;
pub mod pool;
pub mod profiling;
pub mod tuple_dictionary;

pub use allocator::{Arena, EntityId};
pub use pool::{Pool, Poolable};
pub use tuple_dictionary::TupleDictionary;
