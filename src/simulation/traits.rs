//! Core simulation trait
//!
//! Defines the interface user simulations implement to integrate with the
//! engine's frame loop.

use crate::app::InputState;
use crate::gfx::scene::Scene;

/// Core trait for user-defined simulations
pub trait Simulation {
    /// Initialize the simulation
    ///
    /// Called once when the simulation is attached. Use this to load
    /// resources and build the scene.
    fn initialize(&mut self, scene: &mut Scene);

    /// Update simulation state
    ///
    /// Called every frame to advance the simulation by one time step.
    ///
    /// # Arguments
    /// * `delta_time` - Time elapsed since last update in seconds
    /// * `scene` - Scene to update (transforms, nodes, models)
    /// * `input` - Current input state (movement axes, toggles)
    fn update(&mut self, delta_time: f32, scene: &mut Scene, input: &InputState);

    /// Get simulation name for logging
    fn name(&self) -> &str;
}
