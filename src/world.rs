//! The black-hole world
//!
//! Scene construction (planets, lights, claw, island, pillars, chains,
//! skybox, player) and the per-frame animation, movement, and collision
//! pass, packaged as a [`Simulation`].

use std::f32::consts::PI;
use std::path::PathBuf;

use cgmath::{InnerSpace, Vector2, Vector3};
use log::error;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::app::InputState;
use crate::gfx::geometry::{
    generate_cube, generate_cylinder, generate_sphere, generate_torus, GeometryData,
};
use crate::gfx::lensing::{BlackHole, LensingTable};
use crate::gfx::model::Model;
use crate::gfx::resources::material::{Material, MaterialKind};
use crate::gfx::scene::{Node, NodeId, Scene};
use crate::simulation::Simulation;

const SQRT_2_OVER_2: f32 = 0.707_106_78;
const PLAYER_SPEED: f32 = 3.0;
const BLACK_HOLE_KEEP_OUT: f32 = 3.5;
const ISLAND_RADIUS: f32 = 10.0;

/// XZ centers of the eight boundary pillars (matching their node layout).
const PILLAR_LOCATIONS: [[f32; 2]; 8] = [
    [0.0, 8.0],
    [8.0 * SQRT_2_OVER_2, 8.0 * SQRT_2_OVER_2],
    [8.0, 0.0],
    [8.0 * SQRT_2_OVER_2, -8.0 * SQRT_2_OVER_2],
    [0.0, -8.0],
    [-8.0 * SQRT_2_OVER_2, -8.0 * SQRT_2_OVER_2],
    [-8.0, 0.0],
    [-8.0 * SQRT_2_OVER_2, 8.0 * SQRT_2_OVER_2],
];

/// The black-hole scene: content plus its animation state.
pub struct BlackHoleWorld {
    table_path: PathBuf,
    time_since_start: f32,

    planet_parent: Option<NodeId>,
    light1_parent: Option<NodeId>,
    light2_parent: Option<NodeId>,
    player: Option<NodeId>,
    fps_camera: Option<NodeId>,
    /// Arm segments with their fixed yaw about the claw base.
    claw_arms: Vec<(NodeId, f32)>,
    /// Tip segments, all sharing one animated joint angle.
    claw_tips: Vec<NodeId>,
}

impl BlackHoleWorld {
    pub fn new(table_path: impl Into<PathBuf>) -> Self {
        Self {
            table_path: table_path.into(),
            time_since_start: 0.0,
            planet_parent: None,
            light1_parent: None,
            light2_parent: None,
            player: None,
            fps_camera: None,
            claw_arms: Vec::new(),
            claw_tips: Vec::new(),
        }
    }

    fn load_black_hole(&self, scene: &mut Scene) {
        let table = match LensingTable::load_from_path(&self.table_path) {
            Ok(table) => table,
            Err(e) => {
                error!(
                    "failed to load lensing table {}: {e}; running with lensing disabled",
                    self.table_path.display()
                );
                LensingTable::default()
            }
        };
        scene.black_hole = BlackHole::new(Vector3::new(0.0, 2.5, 0.0), 0.4, table);
    }

    fn build_materials(&self, scene: &mut Scene) {
        let materials = &mut scene.materials;
        materials.add_material(Material::new(
            "white",
            MaterialKind::BlinnPhong {
                ambient: [1.0, 1.0, 1.0],
                diffuse: [0.0, 0.0, 0.0],
                specular: [0.0, 0.0, 0.0],
                spec_intensity: 30.0,
            },
        ));
        materials.add_material(Material::new(
            "blue_water",
            MaterialKind::BlinnPhong {
                ambient: [0.1, 0.1, 0.2],
                diffuse: [0.3, 0.4, 0.7],
                specular: [1.0, 1.0, 1.0],
                spec_intensity: 40.0,
            },
        ));
        materials.add_material(Material::new(
            "red_water",
            MaterialKind::BlinnPhong {
                ambient: [0.2, 0.1, 0.1],
                diffuse: [0.3, 0.0, 0.0],
                specular: [1.0, 0.5, 0.5],
                spec_intensity: 100.0,
            },
        ));
        materials.add_material(Material::new(
            "metal",
            MaterialKind::BlinnPhong {
                ambient: [0.05, 0.05, 0.07],
                diffuse: [0.4, 0.4, 0.5],
                specular: [1.0, 1.0, 1.0],
                spec_intensity: 50.0,
            },
        ));
        materials.add_material(Material::new(
            "marble",
            MaterialKind::BlinnPhong {
                ambient: [0.4, 0.4, 0.4],
                diffuse: [1.0, 1.0, 1.0],
                specular: [1.0, 1.0, 1.0],
                spec_intensity: 20.0,
            },
        ));
        materials.add_material(
            Material::new(
                "skybox",
                MaterialKind::TexturedBlinnPhong {
                    ambient: 1.0,
                    diffuse: 0.0,
                    specular: 0.0,
                    spec_intensity: 5.0,
                },
            )
            .with_texture(starfield_pixels(512, 256), 512, 256),
        );
        materials.add_material(
            Material::new(
                "rock",
                MaterialKind::TexturedBlinnPhong {
                    ambient: 0.1,
                    diffuse: 0.7,
                    specular: 0.3,
                    spec_intensity: 5.0,
                },
            )
            .with_texture(speckle_pixels(256, 256), 256, 256),
        );
    }
}

impl Simulation for BlackHoleWorld {
    fn initialize(&mut self, scene: &mut Scene) {
        self.load_black_hole(scene);
        self.build_materials(scene);

        let sphere = scene
            .models
            .add(Model::from_geometry("sphere", &generate_sphere(16, 12)));
        let sphere_hires = scene
            .models
            .add(Model::from_geometry("sphere_hires", &generate_sphere(32, 24)));
        let island = scene
            .models
            .add(Model::from_geometry("island", &island_geometry()));
        let pillar = scene
            .models
            .add(Model::from_geometry("pillar", &pillar_geometry()));
        let chain = scene
            .models
            .add(Model::from_geometry("chain", &chain_geometry()));
        let claw_base = scene
            .models
            .add(Model::from_geometry("claw_base", &claw_base_geometry()));
        let claw_part = scene
            .models
            .add(Model::from_geometry("claw_part", &claw_part_geometry()));

        // The skybox is seen from inside, and lensing never applies to it
        // until the B toggle flips everything on at once.
        if let Some(skybox) = scene.models.get_mut(sphere_hires) {
            skybox.flip_normals = true;
        }
        scene.models.set_all_use_black_hole(false);

        // planets
        let planet_parent =
            scene.spawn(Node::empty().with_translation(Vector3::new(0.0, 2.5, 0.0)));
        self.planet_parent = Some(planet_parent);

        scene
            .spawn_child(
                planet_parent,
                Node::mesh(sphere, "blue_water")
                    .with_translation(Vector3::new(2.0, 0.0, 0.0))
                    .with_uniform_scale(0.2),
            )
            .unwrap();
        scene
            .spawn_child(
                planet_parent,
                Node::mesh(sphere, "red_water")
                    .with_translation(Vector3::new(-2.0, 0.0, 0.0))
                    .with_uniform_scale(0.2),
            )
            .unwrap();

        // first light: a tilted rig orbiting the hole, with a marker sphere
        let light1_angler = scene.spawn(
            Node::empty()
                .with_translation(Vector3::new(0.0, 2.5, 0.0))
                .with_rotation(Vector3::new(0.5, 0.0, 0.0)),
        );
        let light1_parent = scene.spawn_child(light1_angler, Node::empty()).unwrap();
        self.light1_parent = Some(light1_parent);
        let light1 = scene
            .spawn_child(
                light1_parent,
                Node::point_light(5.0).with_translation(Vector3::new(2.5, 0.0, 0.0)),
            )
            .unwrap();
        scene
            .spawn_child(
                light1,
                Node::mesh(sphere, "white").with_uniform_scale(0.2),
            )
            .unwrap();

        // second light, mirrored
        let light2_angler = scene.spawn(
            Node::empty()
                .with_translation(Vector3::new(0.0, 2.5, 0.0))
                .with_rotation(Vector3::new(-0.5, 0.0, 0.0)),
        );
        let light2_parent = scene.spawn_child(light2_angler, Node::empty()).unwrap();
        self.light2_parent = Some(light2_parent);
        let light2 = scene
            .spawn_child(
                light2_parent,
                Node::point_light(5.0).with_translation(Vector3::new(-2.5, 0.0, 0.0)),
            )
            .unwrap();
        scene
            .spawn_child(
                light2,
                Node::mesh(sphere, "white").with_uniform_scale(0.2),
            )
            .unwrap();

        // player and camera
        let player = scene.spawn(Node::empty().with_translation(Vector3::new(0.0, 0.05, 5.0)));
        self.player = Some(player);
        let fps_camera = scene
            .spawn_child(
                player,
                Node::camera(45.0, 1.0, 0.01, 400.0)
                    .with_translation(Vector3::new(0.0, 1.5, 0.0)),
            )
            .unwrap();
        self.fps_camera = Some(fps_camera);
        scene.set_active_camera(fps_camera).unwrap();

        // claw: a base with four two-segment arms
        let base = scene.spawn(Node::mesh(claw_base, "metal").with_uniform_scale(0.5));
        self.claw_arms.clear();
        self.claw_tips.clear();
        for (arm_translation, arm_yaw) in [
            (Vector3::new(0.5, 0.0, 0.0), 0.0),
            (Vector3::new(0.0, 0.0, -0.5), PI / 2.0),
            (Vector3::new(-0.5, 0.0, 0.0), PI),
            (Vector3::new(0.0, 0.0, 0.5), 3.0 * PI / 2.0),
        ] {
            let arm = scene
                .spawn_child(
                    base,
                    Node::mesh(claw_part, "metal")
                        .with_translation(arm_translation)
                        .with_rotation(Vector3::new(0.0, arm_yaw, 0.0)),
                )
                .unwrap();
            let tip = scene
                .spawn_child(
                    arm,
                    Node::mesh(claw_part, "metal")
                        .with_translation(Vector3::new(1.0, 1.0, 0.0))
                        .with_rotation(Vector3::new(0.0, 0.0, PI / 2.0)),
                )
                .unwrap();
            self.claw_arms.push((arm, arm_yaw));
            self.claw_tips.push(tip);
        }

        // island
        scene.spawn(Node::mesh(island, "rock").with_uniform_scale(10.0));

        // boundary pillars; every other one yawed a quarter turn
        let mut pillar_nodes = Vec::new();
        for (i, location) in PILLAR_LOCATIONS.iter().enumerate() {
            let rotation = if i % 2 == 1 {
                Vector3::new(0.0, PI / 4.0, 0.0)
            } else {
                Vector3::new(0.0, 0.0, 0.0)
            };
            let node = scene.spawn(
                Node::mesh(pillar, "marble")
                    .with_translation(Vector3::new(location[0], 0.0, location[1]))
                    .with_rotation(rotation)
                    .with_uniform_scale(2.0),
            );
            pillar_nodes.push(node);
        }

        // chains hanging from two of the pillars
        scene
            .spawn_child(
                pillar_nodes[4],
                Node::mesh(chain, "metal")
                    .with_translation(Vector3::new(1.35, -0.6, 0.0))
                    .with_rotation(Vector3::new(0.0, PI, 0.0)),
            )
            .unwrap();
        scene
            .spawn_child(
                pillar_nodes[5],
                Node::mesh(chain, "metal")
                    .with_translation(Vector3::new(-1.35, -0.6, 0.0)),
            )
            .unwrap();

        // skybox, scaled to the table's outermost vertex radius
        let skybox_scale = if scene.black_hole.is_active() {
            scene.black_hole.size * scene.black_hole.table.vr_range().1
        } else {
            40.0
        };
        scene.spawn(
            Node::mesh(sphere_hires, "skybox")
                .with_rotation(Vector3::new(0.0, 0.0, 0.8))
                .with_uniform_scale(skybox_scale),
        );
    }

    fn update(&mut self, delta_time: f32, scene: &mut Scene, input: &InputState) {
        scene.evaluate_all();

        self.time_since_start += delta_time;
        let t = self.time_since_start;

        if let Some(node) = self.planet_parent.and_then(|id| scene.node_mut(id)) {
            node.rotation = Vector3::new(0.0, t * 0.3, 0.0);
        }
        if let Some(node) = self.light1_parent.and_then(|id| scene.node_mut(id)) {
            node.rotation = Vector3::new(0.0, -t * 0.5, 0.0);
        }
        if let Some(node) = self.light2_parent.and_then(|id| scene.node_mut(id)) {
            node.rotation = Vector3::new(0.0, t * 0.5, 0.0);
        }

        let primary_claw_rotation = t.sin() * 0.1 - 0.2;
        let secondary_claw_rotation = (t - PI / 2.0).sin() * 0.2 + PI / 2.0;
        for (arm, yaw) in &self.claw_arms {
            if let Some(node) = scene.node_mut(*arm) {
                node.rotation = Vector3::new(0.0, *yaw, primary_claw_rotation);
            }
        }
        for tip in &self.claw_tips {
            if let Some(node) = scene.node_mut(*tip) {
                node.rotation = Vector3::new(0.0, 0.0, secondary_claw_rotation);
            }
        }

        // player movement, steered by the camera's isolated orientation
        let (Some(player_id), Some(camera_id)) = (self.player, self.fps_camera) else {
            return;
        };
        let Some(camera) = scene.node(camera_id) else {
            return;
        };
        let up = Vector3::unit_y();
        let facing = camera.facing();
        let strafe = camera.strafe(up);

        let step = PLAYER_SPEED * delta_time;
        let hole_position = scene.black_hole.position;
        if let Some(player) = scene.node_mut(player_id) {
            player.translation += facing * (input.input_y * step);
            player.translation += strafe * (input.input_x * step);
            player.translation += up * (input.input_z * step);

            if input.collisions {
                if player.translation.y < 0.0 {
                    player.translation.y = 0.0;
                }

                let to_black_hole = hole_position - player.translation;
                if to_black_hole.magnitude() < BLACK_HOLE_KEEP_OUT {
                    player.translation =
                        hole_position - to_black_hole.normalize() * BLACK_HOLE_KEEP_OUT;
                }

                let from_center = player.translation;
                if from_center.magnitude() > ISLAND_RADIUS {
                    player.translation = from_center.normalize() * ISLAND_RADIUS;
                }

                for pillar in PILLAR_LOCATIONS {
                    let pillar = Vector2::new(pillar[0], pillar[1]);
                    let mut player_2d =
                        Vector2::new(player.translation.x, player.translation.z);
                    let to_pillar = pillar - player_2d;
                    if to_pillar.magnitude() < 1.0 {
                        player_2d = pillar - to_pillar.normalize();
                    }
                    player.translation.x = player_2d.x;
                    player.translation.z = player_2d.y;
                }
            }
        }
    }

    fn name(&self) -> &str {
        "black hole world"
    }
}

// --- procedural geometry for the world's models ---

/// Bake a scale-then-translate into a geometry's vertices.
fn transformed(mut geometry: GeometryData, scale: [f32; 3], translate: [f32; 3]) -> GeometryData {
    for v in &mut geometry.vertices {
        v[0] = v[0] * scale[0] + translate[0];
        v[1] = v[1] * scale[1] + translate[1];
        v[2] = v[2] * scale[2] + translate[2];
    }
    geometry
}

/// Concatenate geometries, offsetting indices.
fn merged(parts: Vec<GeometryData>) -> GeometryData {
    let mut out = GeometryData::new();
    for part in parts {
        let base = out.vertices.len() as u32;
        out.vertices.extend(part.vertices);
        out.normals.extend(part.normals);
        out.tex_coords.extend(part.tex_coords);
        out.indices.extend(part.indices.iter().map(|i| i + base));
    }
    out
}

/// Flat disc whose top face sits at y = 0 so the player walks on it.
fn island_geometry() -> GeometryData {
    transformed(generate_cylinder(1.0, 0.04, 32), [1.0, 1.0, 1.0], [0.0, -0.02, 0.0])
}

/// Column with its base at y = 0; 1.5 tall before node scaling.
fn pillar_geometry() -> GeometryData {
    transformed(generate_cylinder(0.175, 1.5, 12), [1.0, 1.0, 1.0], [0.0, 0.75, 0.0])
}

/// Four torus links hanging downward with alternating orientation.
fn chain_geometry() -> GeometryData {
    let mut links = Vec::new();
    for i in 0..4 {
        let link = generate_torus(0.12, 0.035, 12, 8);
        let link = if i % 2 == 0 {
            link
        } else {
            // Quarter turn about Y: swap the ring into the ZY plane.
            let mut rotated = link;
            for v in &mut rotated.vertices {
                let (x, z) = (v[0], v[2]);
                v[0] = z;
                v[2] = -x;
            }
            for n in &mut rotated.normals {
                let (x, z) = (n[0], n[2]);
                n[0] = z;
                n[2] = -x;
            }
            rotated
        };
        links.push(transformed(link, [1.0, 1.0, 1.0], [0.0, -0.2 * i as f32, 0.0]));
    }
    merged(links)
}

/// Squat cylinder the claw arms mount on.
fn claw_base_geometry() -> GeometryData {
    transformed(generate_cylinder(0.6, 0.4, 16), [1.0, 1.0, 1.0], [0.0, 0.2, 0.0])
}

/// One claw segment: an L of two bars, reaching +X then up +Y, so the next
/// joint lands at (1, 1, 0) in this segment's space.
fn claw_part_geometry() -> GeometryData {
    merged(vec![
        transformed(generate_cube(), [1.1, 0.25, 0.25], [0.5, 0.0, 0.0]),
        transformed(generate_cube(), [0.25, 1.1, 0.25], [1.0, 0.5, 0.0]),
    ])
}

// --- procedural textures ---

/// Star field: black space with a scattering of white-to-blue points.
fn starfield_pixels(width: u32, height: u32) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(0x5747_4c45);
    let mut pixels = vec![0u8; (width * height * 4) as usize];
    for pixel in pixels.chunks_exact_mut(4) {
        pixel[3] = 255;
    }

    let star_count = (width * height) / 160;
    for _ in 0..star_count {
        let x = rng.random_range(0..width);
        let y = rng.random_range(0..height);
        let brightness = rng.random_range(80..=255) as u8;
        let blue_shift = rng.random_range(0..=40) as u8;
        let offset = ((y * width + x) * 4) as usize;
        pixels[offset] = brightness.saturating_sub(blue_shift);
        pixels[offset + 1] = brightness.saturating_sub(blue_shift / 2);
        pixels[offset + 2] = brightness;
    }

    pixels
}

/// Rock speckle: mid-grey with random lighter and darker grains.
fn speckle_pixels(width: u32, height: u32) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(0x524f_434b);
    let mut pixels = Vec::with_capacity((width * height * 4) as usize);
    for _ in 0..(width * height) {
        let base = 110i32;
        let grain = rng.random_range(-35..=35);
        let value = (base + grain).clamp(0, 255) as u8;
        pixels.extend_from_slice(&[value, value.saturating_sub(8), value.saturating_sub(16), 255]);
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_builds_expected_scene() {
        let mut world = BlackHoleWorld::new("does-not-exist.txt");
        let mut scene = Scene::new();
        world.initialize(&mut scene);

        // Missing table leaves the hole inactive but the world intact.
        assert!(!scene.black_hole.is_active());
        assert_eq!(scene.black_hole.position, Vector3::new(0.0, 2.5, 0.0));

        // Two orbiting point lights, an active camera, a populated graph.
        assert_eq!(scene.lights().len(), 2);
        assert!(scene.active_camera().is_some());
        assert_eq!(world.claw_arms.len(), 4);
        assert_eq!(world.claw_tips.len(), 4);
        assert!(scene.len() > 20);
        assert!(scene.models.len() >= 7);
    }

    #[test]
    fn test_camera_rides_the_player() {
        let mut world = BlackHoleWorld::new("does-not-exist.txt");
        let mut scene = Scene::new();
        world.initialize(&mut scene);
        scene.evaluate_all();

        let camera = scene.active_camera().unwrap();
        let eye = scene.global_position(camera).unwrap();
        // Player (0, 0.05, 5) + eye height (0, 1.5, 0).
        assert!((eye - Vector3::new(0.0, 1.55, 5.0)).magnitude() < 1e-5);
    }

    #[test]
    fn test_black_hole_keep_out_collision() {
        let mut world = BlackHoleWorld::new("does-not-exist.txt");
        let mut scene = Scene::new();
        world.initialize(&mut scene);

        // Drive the player forward into the hole's keep-out radius.
        let mut input = InputState::new();
        input.input_y = 1.0;
        for _ in 0..400 {
            world.update(1.0 / 60.0, &mut scene, &input);
        }

        let player = world.player.unwrap();
        let position = scene.node(player).unwrap().translation;
        let distance = (scene.black_hole.position - position).magnitude();
        assert!(
            distance >= BLACK_HOLE_KEEP_OUT - 1e-4,
            "player at {position:?} breached the keep-out radius ({distance})"
        );
    }

    #[test]
    fn test_island_boundary_collision() {
        let mut world = BlackHoleWorld::new("does-not-exist.txt");
        let mut scene = Scene::new();
        world.initialize(&mut scene);

        // Strafe outward for a long time; the island edge stops the player.
        let mut input = InputState::new();
        input.input_x = 1.0;
        for _ in 0..2000 {
            world.update(1.0 / 60.0, &mut scene, &input);
        }

        let player = world.player.unwrap();
        let position = scene.node(player).unwrap().translation;
        assert!(position.magnitude() <= ISLAND_RADIUS + 1e-4);
    }

    #[test]
    fn test_free_cam_skips_collisions() {
        let mut world = BlackHoleWorld::new("does-not-exist.txt");
        let mut scene = Scene::new();
        world.initialize(&mut scene);

        let mut input = InputState::new();
        input.collisions = false;
        input.input_y = 1.0;
        for _ in 0..2000 {
            world.update(1.0 / 60.0, &mut scene, &input);
        }

        // Without collisions the player sails past the island boundary.
        let player = world.player.unwrap();
        let position = scene.node(player).unwrap().translation;
        assert!(position.magnitude() > ISLAND_RADIUS);
    }

    #[test]
    fn test_claw_joint_animation_uses_fixed_rotation_order() {
        let mut world = BlackHoleWorld::new("does-not-exist.txt");
        let mut scene = Scene::new();
        world.initialize(&mut scene);

        world.update(0.5, &mut scene, &InputState::new());

        let t = 0.5f32;
        let expected_primary = t.sin() * 0.1 - 0.2;
        let (arm, yaw) = world.claw_arms[1];
        let rotation = scene.node(arm).unwrap().rotation;
        assert!((rotation.y - yaw).abs() < 1e-6);
        assert!((rotation.z - expected_primary).abs() < 1e-6);

        let expected_secondary = (t - PI / 2.0).sin() * 0.2 + PI / 2.0;
        let tip_rotation = scene.node(world.claw_tips[0]).unwrap().rotation;
        assert!((tip_rotation.z - expected_secondary).abs() < 1e-6);
    }

    #[test]
    fn test_texture_generators_are_deterministic() {
        assert_eq!(starfield_pixels(32, 16), starfield_pixels(32, 16));
        assert_eq!(speckle_pixels(16, 16), speckle_pixels(16, 16));
        assert_eq!(starfield_pixels(32, 16).len(), 32 * 16 * 4);
    }
}
