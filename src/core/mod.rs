//! Core building blocks: execution configuration, derived paths, and the
//! executor seam with its shared cell loop. These are internal primitives
//! consumed by the high-level `api` module.
pub mod executor;
pub mod params;
pub mod paths;
