use std::sync::Arc;
use std::time::Instant;

use cgmath::Vector3;
use log::warn;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::KeyCode,
    window::{CursorGrabMode, Window, WindowAttributes},
};

use crate::gfx::{rendering::RenderEngine, scene::Scene};
use crate::simulation::{Simulation, SimulationManager};

/// Pitch is clamped just short of straight up/down so the look-at up vector
/// never degenerates.
const PITCH_LIMIT: f32 = std::f32::consts::FRAC_PI_2 - 0.1;
const MOUSE_SENSITIVITY: f32 = 0.01;

/// Keyboard state and app toggles, read by the simulation each frame.
#[derive(Debug, Clone, Default)]
pub struct InputState {
    left_pressed: bool,
    right_pressed: bool,
    up_pressed: bool,
    down_pressed: bool,
    rise_pressed: bool,
    fall_pressed: bool,

    /// Strafe axis in [-1, 1] (A/D, left/right arrows).
    pub input_x: f32,
    /// Forward axis in [-1, 1] (W/S, up/down arrows).
    pub input_y: f32,
    /// Vertical axis in [-1, 1] (Q/E).
    pub input_z: f32,

    /// Free cam detaches the lensing observer from the camera.
    pub free_cam: bool,
    /// Player collisions are on unless free cam is.
    pub collisions: bool,
    /// Whether models are lensed this frame (the B toggle).
    pub lensing_active: bool,
}

impl InputState {
    pub fn new() -> Self {
        Self {
            collisions: true,
            ..Default::default()
        }
    }

    fn refresh_axes(&mut self) {
        self.input_x = (self.right_pressed as i32 - self.left_pressed as i32) as f32;
        self.input_y = (self.up_pressed as i32 - self.down_pressed as i32) as f32;
        self.input_z = (self.rise_pressed as i32 - self.fall_pressed as i32) as f32;
    }
}

pub struct GravlensApp {
    event_loop: Option<EventLoop<()>>,
    app_state: AppState,
}

struct AppState {
    window: Option<Arc<Window>>,
    render_engine: Option<RenderEngine>,
    scene: Scene,
    simulation_manager: SimulationManager,
    input: InputState,
    last_frame: Option<Instant>,
    cursor_captured: bool,
}

impl GravlensApp {
    /// Create a new application with an empty scene
    pub async fn new() -> Self {
        let event_loop = EventLoop::new().expect("Failed to create event loop");

        Self {
            event_loop: Some(event_loop),
            app_state: AppState {
                window: None,
                render_engine: None,
                scene: Scene::new(),
                simulation_manager: SimulationManager::new(),
                input: InputState::new(),
                last_frame: None,
                cursor_captured: false,
            },
        }
    }

    /// Attach a simulation; it is initialized against the scene immediately
    pub fn attach_simulation<S: Simulation + 'static>(&mut self, simulation: S) {
        self.app_state
            .simulation_manager
            .attach_simulation(Box::new(simulation), &mut self.app_state.scene);
    }

    /// Direct access to the scene, for setup before `run()`
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.app_state.scene
    }

    /// Run the application (consumes self and starts the event loop)
    pub fn run(mut self) {
        let event_loop = self.event_loop.take().expect("Event loop already consumed");
        event_loop.set_control_flow(ControlFlow::Poll);

        event_loop
            .run_app(&mut self.app_state)
            .expect("Failed to run event loop");
    }
}

impl AppState {
    fn set_cursor_captured(&mut self, captured: bool) {
        let Some(window) = self.window.as_ref() else {
            return;
        };
        if captured {
            let grabbed = window
                .set_cursor_grab(CursorGrabMode::Locked)
                .or_else(|_| window.set_cursor_grab(CursorGrabMode::Confined));
            if let Err(e) = grabbed {
                warn!("failed to grab cursor: {e}");
                return;
            }
            window.set_cursor_visible(false);
        } else {
            let _ = window.set_cursor_grab(CursorGrabMode::None);
            window.set_cursor_visible(true);
        }
        self.cursor_captured = captured;
    }

    fn handle_key(&mut self, key_code: KeyCode, state: ElementState, event_loop: &ActiveEventLoop) {
        let pressed = state == ElementState::Pressed;

        match key_code {
            KeyCode::Escape if pressed => event_loop.exit(),
            KeyCode::Tab if pressed => self.set_cursor_captured(false),
            KeyCode::KeyA | KeyCode::ArrowLeft => self.input.left_pressed = pressed,
            KeyCode::KeyD | KeyCode::ArrowRight => self.input.right_pressed = pressed,
            KeyCode::KeyW | KeyCode::ArrowUp => self.input.up_pressed = pressed,
            KeyCode::KeyS | KeyCode::ArrowDown => self.input.down_pressed = pressed,
            KeyCode::KeyE => self.input.rise_pressed = pressed,
            KeyCode::KeyQ => self.input.fall_pressed = pressed,
            KeyCode::KeyF if pressed => {
                self.input.free_cam = !self.input.free_cam;
                self.input.collisions = !self.input.free_cam;
            }
            KeyCode::KeyB if pressed => {
                self.input.lensing_active = !self.input.lensing_active;
                self.scene
                    .models
                    .set_all_use_black_hole(self.input.lensing_active);
            }
            _ => (),
        }
        self.input.refresh_axes();
    }

    fn redraw(&mut self) {
        let Some(render_engine) = self.render_engine.as_mut() else {
            return;
        };

        let now = Instant::now();
        let delta_time = self
            .last_frame
            .map(|last| (now - last).as_secs_f32())
            .unwrap_or(0.0);
        self.last_frame = Some(now);

        self.simulation_manager
            .update(delta_time, &mut self.scene, &self.input);
        render_engine.render_frame(&mut self.scene, self.input.free_cam);
    }
}

impl ApplicationHandler for AppState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        if let Ok(window) = event_loop.create_window(
            WindowAttributes::default()
                .with_title("gravlens")
                .with_inner_size(winit::dpi::LogicalSize::new(1200, 800)),
        ) {
            let window_handle = Arc::new(window);
            self.window = Some(window_handle.clone());

            let (width, height) = window_handle.inner_size().into();

            let window_clone = window_handle.clone();
            let mut renderer = pollster::block_on(async move {
                RenderEngine::new(window_clone, width, height).await
            });

            self.scene
                .init_gpu_resources(renderer.device(), renderer.queue());
            renderer.upload_lensing_table(&self.scene.black_hole.table);
            self.scene
                .set_camera_aspect(width as f32 / height.max(1) as f32);

            self.render_engine = Some(renderer);

            self.set_cursor_captured(true);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::KeyboardInput {
                event:
                    winit::event::KeyEvent {
                        physical_key: winit::keyboard::PhysicalKey::Code(key_code),
                        state,
                        ..
                    },
                ..
            } => {
                self.handle_key(key_code, state, event_loop);
            }
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                ..
            } => {
                self.set_cursor_captured(true);
            }
            WindowEvent::Resized(PhysicalSize { width, height }) => {
                self.scene
                    .set_camera_aspect(width as f32 / height.max(1) as f32);
                if let Some(render_engine) = self.render_engine.as_mut() {
                    render_engine.resize(width, height);
                }
            }
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                self.redraw();
            }
            _ => (),
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: winit::event::DeviceId,
        event: winit::event::DeviceEvent,
    ) {
        if let winit::event::DeviceEvent::MouseMotion { delta } = event {
            if !self.cursor_captured {
                return;
            }
            let Some(camera_id) = self.scene.active_camera() else {
                return;
            };
            if let Some(camera) = self.scene.node_mut(camera_id) {
                let pitch = (camera.rotation.x - delta.1 as f32 * MOUSE_SENSITIVITY)
                    .clamp(-PITCH_LIMIT, PITCH_LIMIT);
                let yaw = camera.rotation.y - delta.0 as f32 * MOUSE_SENSITIVITY;
                camera.rotation = Vector3::new(pitch, yaw, 0.0);
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }
}
