//! Domain layer: pure types with no I/O.
//!
//! - [`region`] – screen rectangles and the pending dirty region.
//! - [`pool`] – the bounded connection pool used for broadcast fan-out.

pub mod pool;
pub mod region;

pub use pool::{ConnectionHandle, ConnectionPool, PoolError};
pub use region::{DirtyRegion, Rect};
