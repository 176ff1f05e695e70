//! Gravitational lensing core
//!
//! A precomputed lookup table ([`LensingTable`]) plus the coordinate
//! mapping ([`mapper`]) that turns a (hole, vertex, observer) world
//! configuration into a normalized 3-parameter table lookup and back into a
//! world-space displacement. The WGSL vertex stage mirrors the CPU mapper
//! exactly; the CPU path is the authoritative one and the one the tests
//! pin down.

pub mod mapper;
pub mod math;
pub mod table;

pub use mapper::{displace_vertex, Displacement, LensingFrame, LensingSample, MapperError};
pub use table::{BlackHole, LensingTable, TableError};
