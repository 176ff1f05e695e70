//! Convenience re-exports for building scenes and simulations

pub use crate::app::{GravlensApp, InputState};
pub use crate::gfx::lensing::{displace_vertex, BlackHole, LensingFrame, LensingTable};
pub use crate::gfx::model::{Model, ModelId};
pub use crate::gfx::resources::material::{Material, MaterialKind};
pub use crate::gfx::scene::{Node, NodeId, NodeKind, Scene};
pub use crate::simulation::{Simulation, SimulationManager};
pub use crate::world::BlackHoleWorld;
