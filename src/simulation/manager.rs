//! Simulation manager
//!
//! Owns the attached simulation and drives its lifecycle from the main
//! loop.

use log::info;

use super::traits::Simulation;
use crate::app::InputState;
use crate::gfx::scene::Scene;

/// Manages the attached simulation
pub struct SimulationManager {
    simulation: Option<Box<dyn Simulation>>,
    is_paused: bool,
    time_scale: f32,
}

impl SimulationManager {
    /// Create a new simulation manager
    pub fn new() -> Self {
        Self {
            simulation: None,
            is_paused: false,
            time_scale: 1.0,
        }
    }

    /// Attach a user simulation, initializing it against the scene
    ///
    /// Replaces any previously attached simulation.
    pub fn attach_simulation(&mut self, mut simulation: Box<dyn Simulation>, scene: &mut Scene) {
        simulation.initialize(scene);
        info!("attached simulation '{}'", simulation.name());
        self.simulation = Some(simulation);
        self.is_paused = false;
    }

    /// Update the attached simulation (called every frame)
    pub fn update(&mut self, delta_time: f32, scene: &mut Scene, input: &InputState) {
        if self.is_paused {
            return;
        }
        if let Some(simulation) = &mut self.simulation {
            simulation.update(delta_time * self.time_scale, scene, input);
        }
    }

    /// Pause or resume the simulation
    pub fn set_paused(&mut self, paused: bool) {
        self.is_paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.is_paused
    }

    /// Scale simulation time (1.0 = real time)
    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.max(0.0);
    }
}

impl Default for SimulationManager {
    fn default() -> Self {
        Self::new()
    }
}
