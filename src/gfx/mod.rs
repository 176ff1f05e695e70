//! Graphics: scene graph, lensing core, geometry, models, and rendering

pub mod geometry;
pub mod lensing;
pub mod model;
pub mod rendering;
pub mod resources;
pub mod scene;

pub use rendering::RenderEngine;
pub use scene::Scene;
