// src/lib.rs
//! Gravlens
//!
//! A stylized black-hole scene renderer built on wgpu and winit: a retained
//! scene graph with hierarchical transforms feeds a renderer whose vertex
//! stage displaces geometry through a precomputed gravitational-lensing
//! lookup table.

pub mod app;
pub mod gfx;
pub mod prelude;
pub mod simulation;
pub mod wgpu_utils;
pub mod world;

// Re-export main types for convenience
pub use app::GravlensApp;

/// Creates a default application instance
pub fn default() -> GravlensApp {
    pollster::block_on(GravlensApp::new())
}
