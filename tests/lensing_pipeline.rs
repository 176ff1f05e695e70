//! End-to-end lensing scenario: a scene-graph-driven observer pushed
//! through the full frame construction, polar decomposition, table lookup,
//! and reconstruction pipeline.

use cgmath::{InnerSpace, Vector3};
use gravlens::gfx::lensing::{displace_vertex, BlackHole, LensingFrame, LensingTable, MapperError};
use gravlens::gfx::scene::{Node, Scene};

const TOLERANCE: f32 = 1e-5;

fn vec3(x: f32, y: f32, z: f32) -> Vector3<f32> {
    Vector3::new(x, y, z)
}

fn uniform_table(deflection: f32, emission: f32, distance: f32) -> LensingTable {
    let mut text = String::from("4 8 4\n1.0 9.0\n1.0 9.0\n");
    let triple = format!("{deflection} {emission} {distance} ");
    text.push_str(&triple.repeat(4 * 8 * 4));
    LensingTable::parse(&text).unwrap()
}

#[test]
fn test_reference_configuration_is_deterministic() {
    let hole = vec3(0.0, 0.0, 0.0);
    let vertex = vec3(3.0, 0.0, 0.0);
    let observer = vec3(0.0, 0.0, -5.0);

    // Two independent constructions agree exactly.
    let a = LensingFrame::new(hole, vertex, observer).unwrap();
    let b = LensingFrame::new(hole, vertex, observer).unwrap();
    assert_eq!(a, b);

    assert!((a.x_axis - vec3(0.0, 0.0, -1.0)).magnitude() < TOLERANCE);
    assert!((a.normal - vec3(0.0, -1.0, 0.0)).magnitude() < TOLERANCE);
    assert!((a.y_axis - vec3(1.0, 0.0, 0.0)).magnitude() < TOLERANCE);

    let vertex_2d = a.project(hole, vertex);
    assert!((vertex_2d.magnitude() - 3.0).abs() < TOLERANCE);
    let observer_2d = a.project(hole, observer);
    assert!((observer_2d.magnitude() - 5.0).abs() < TOLERANCE);
}

#[test]
fn test_scene_camera_feeds_the_mapper() {
    // Player root with a camera child at eye height; the camera's evaluated
    // global position is the lensing observer.
    let mut scene = Scene::new();
    let player = scene.spawn(Node::empty().with_translation(vec3(0.0, 0.05, 5.0)));
    let camera = scene
        .spawn_child(
            player,
            Node::camera(45.0, 1.0, 0.01, 400.0).with_translation(vec3(0.0, 1.5, 0.0)),
        )
        .unwrap();
    scene.set_active_camera(camera).unwrap();
    scene.evaluate_all();
    scene.compute_camera_matrices(false);

    let observer = scene.lensing_observer;
    assert!((observer - vec3(0.0, 1.55, 5.0)).magnitude() < TOLERANCE);

    let black_hole = BlackHole::new(vec3(0.0, 2.5, 0.0), 0.4, uniform_table(0.2, 0.4, 3.0));
    let vertex = vec3(2.0, 2.5, 0.0);

    let displacement = displace_vertex(&black_hole, vertex, observer).unwrap();

    // With a uniform table the sample is known, so the reconstruction is
    // exactly the frame arithmetic.
    let frame = LensingFrame::new(black_hole.position, vertex, observer).unwrap();
    let expected =
        observer + (frame.x_axis * 0.4_f32.cos() + frame.y_axis * 0.4_f32.sin()) * 3.0;
    assert!((displacement.position - expected).magnitude() < TOLERANCE);
}

#[test]
fn test_orbiting_vertex_stays_in_range() {
    // Sweep a vertex around the hole and check every step resolves without
    // degenerating, except exact collinear crossings which are reported as
    // errors.
    let black_hole = BlackHole::new(vec3(0.0, 0.0, -5.0), 0.4, uniform_table(0.1, 0.2, 1.0));
    let observer = vec3(0.0, 0.0, 0.0);

    let mut resolved = 0;
    for step in 0..64 {
        let t = step as f32 * 0.1;
        let vertex = vec3(3.0 * t.cos(), 0.0, -5.0 - 3.0 * t.sin());
        match displace_vertex(&black_hole, vertex, observer) {
            Ok(d) => {
                assert!(d.position.x.is_finite());
                assert!(d.position.y.is_finite());
                assert!(d.position.z.is_finite());
                resolved += 1;
            }
            Err(err) => {
                // Only the degenerate-frame case is acceptable here.
                assert_eq!(err, MapperError::DegenerateFrame);
            }
        }
    }
    assert!(
        resolved >= 60,
        "expected almost all steps to resolve, got {resolved}"
    );
}

#[test]
fn test_secondary_image_lands_opposite_the_primary() {
    let black_hole = BlackHole::new(vec3(0.0, 2.5, 0.0), 0.4, uniform_table(0.2, 0.4, 3.0));
    let observer = vec3(0.0, 1.55, 5.0);
    let vertex = vec3(2.0, 2.5, 0.0);

    let frame = LensingFrame::new(black_hole.position, vertex, observer).unwrap();
    let secondary = frame.secondary();

    let sample = gravlens::gfx::lensing::LensingSample {
        deflection_angle: 0.2,
        emission_angle: 0.4,
        distance: 3.0,
    };
    let primary_position = frame.displaced_position(observer, &sample);
    let secondary_position = secondary.displaced_position(observer, &sample);

    // Both images sit on the same cone about the hole-observer axis, on
    // opposite sides of the lensing plane.
    let primary_offset = primary_position - observer;
    let secondary_offset = secondary_position - observer;
    assert!((primary_offset.dot(frame.x_axis) - secondary_offset.dot(frame.x_axis)).abs()
        < TOLERANCE);
    assert!(
        (primary_offset.dot(frame.y_axis) + secondary_offset.dot(frame.y_axis)).abs() < TOLERANCE
    );
}
