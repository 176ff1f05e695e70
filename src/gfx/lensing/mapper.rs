//! World-space to table-space coordinate mapping

use cgmath::{InnerSpace, Matrix4, Rad, Vector2, Vector3};

use super::math::{value_map, wrap_angle};
use super::table::{BlackHole, LensingTable, TableError};

/// Frames with a cross product shorter than this are treated as degenerate.
const DEGENERACY_EPSILON: f32 = 1e-10;

/// Errors from the coordinate mapper.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MapperError {
    /// Hole, vertex, and observer are collinear (or coincident); the
    /// lensing plane is undefined. Callers skip displacement for such
    /// vertices.
    #[error("hole, vertex, and observer are collinear; lensing frame is undefined")]
    DegenerateFrame,

    #[error(transparent)]
    Table(#[from] TableError),
}

/// Orthonormal 2D frame in the plane spanned by the hole-observer axis and
/// the hole-vertex direction.
///
/// `x_axis` points from the hole toward the observer; `normal` is
/// perpendicular to the lensing plane; `y_axis` completes the right-handed
/// set. Light paths in this approximation stay inside the plane, which is
/// what lets a 3-parameter table describe them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LensingFrame {
    pub x_axis: Vector3<f32>,
    pub y_axis: Vector3<f32>,
    pub normal: Vector3<f32>,
}

/// One precomputed table cell, unpacked.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LensingSample {
    /// Angle the light left the vertex at, relative to the frame's x-axis.
    pub deflection_angle: f32,
    /// Angle the light arrives at the observer from.
    pub emission_angle: f32,
    /// Path-length-like scalar from the observer to the apparent position.
    pub distance: f32,
}

impl From<Vector3<f32>> for LensingSample {
    fn from(triple: Vector3<f32>) -> Self {
        Self {
            deflection_angle: triple.x,
            emission_angle: triple.y,
            distance: triple.z,
        }
    }
}

/// Result of pushing one vertex through the lensing pipeline: where the
/// vertex appears from the observer, and the rotation to apply to its
/// normal.
#[derive(Debug, Clone, Copy)]
pub struct Displacement {
    pub position: Vector3<f32>,
    pub normal_rotation: Matrix4<f32>,
}

impl LensingFrame {
    /// Build the frame for a (hole, vertex, observer) configuration.
    ///
    /// Fails when the three points are collinear or the observer sits on
    /// the hole: the cross product vanishes and no plane is defined.
    pub fn new(
        hole: Vector3<f32>,
        vertex: Vector3<f32>,
        observer: Vector3<f32>,
    ) -> Result<Self, MapperError> {
        let to_observer = observer - hole;
        if to_observer.magnitude2() < DEGENERACY_EPSILON {
            return Err(MapperError::DegenerateFrame);
        }
        let x_axis = to_observer.normalize();

        let cross = x_axis.cross(vertex - hole);
        if cross.magnitude2() < DEGENERACY_EPSILON {
            return Err(MapperError::DegenerateFrame);
        }
        let normal = cross.normalize();
        let y_axis = normal.cross(x_axis);

        Ok(Self {
            x_axis,
            y_axis,
            normal,
        })
    }

    /// The secondary-image frame: the lensing plane reflected across the
    /// hole-observer axis. This is where the second image of a lensed
    /// source forms.
    pub fn secondary(&self) -> Self {
        Self {
            x_axis: self.x_axis,
            y_axis: -self.y_axis,
            normal: -self.normal,
        }
    }

    /// Project a world point into the frame's 2D plane, relative to the
    /// hole.
    pub fn project(&self, hole: Vector3<f32>, point: Vector3<f32>) -> Vector2<f32> {
        let relative = point - hole;
        Vector2::new(relative.dot(self.x_axis), relative.dot(self.y_axis))
    }

    /// Normalized (vr, vphi, or) lookup coordinates for the vertex and
    /// observer, using the table's ranges.
    ///
    /// The vertex decomposes to polar (radius, angle in `[0, 2π)`); only
    /// the observer's radius matters downstream. Outputs outside `[0, 1)`
    /// are left as-is; the table clamps on sampling.
    pub fn lookup_coords(
        &self,
        hole: Vector3<f32>,
        vertex: Vector3<f32>,
        observer: Vector3<f32>,
        table: &LensingTable,
    ) -> (f32, f32, f32) {
        let vertex_2d = self.project(hole, vertex);
        let observer_2d = self.project(hole, observer);

        let vertex_radius = vertex_2d.magnitude();
        let vertex_angle = wrap_angle(vertex_2d.y.atan2(vertex_2d.x));
        let observer_radius = observer_2d.magnitude();

        let (vr_min, vr_max) = table.vr_range();
        let (or_min, or_max) = table.or_range();
        (
            value_map(vertex_radius, vr_min, vr_max, 0.0, 1.0),
            value_map(vertex_angle, 0.0, std::f32::consts::TAU, 0.0, 1.0),
            value_map(observer_radius, or_min, or_max, 0.0, 1.0),
        )
    }

    /// Where the vertex appears to sit, seen from the observer.
    pub fn displaced_position(
        &self,
        observer: Vector3<f32>,
        sample: &LensingSample,
    ) -> Vector3<f32> {
        let direction = self.x_axis * sample.emission_angle.cos()
            + self.y_axis * sample.emission_angle.sin();
        observer + direction * sample.distance
    }

    /// Axis-angle rotation to apply to the vertex's normal: about the frame
    /// normal by `(emission + π) − deflection`.
    pub fn normal_rotation(&self, sample: &LensingSample) -> Matrix4<f32> {
        let amount = (sample.emission_angle + std::f32::consts::PI) - sample.deflection_angle;
        Matrix4::from_axis_angle(self.normal, Rad(amount))
    }
}

/// Push one vertex through the whole pipeline: frame construction, polar
/// decomposition, table lookup, and world-space reconstruction.
///
/// This is the CPU mirror of the shader's vertex path, kept as the
/// standalone routine for headless verification.
pub fn displace_vertex(
    black_hole: &BlackHole,
    vertex: Vector3<f32>,
    observer: Vector3<f32>,
) -> Result<Displacement, MapperError> {
    let frame = LensingFrame::new(black_hole.position, vertex, observer)?;
    let (vr, vphi, or) =
        frame.lookup_coords(black_hole.position, vertex, observer, &black_hole.table);
    let sample = LensingSample::from(black_hole.table.sample(vr, vphi, or)?);

    Ok(Displacement {
        position: frame.displaced_position(observer, &sample),
        normal_rotation: frame.normal_rotation(&sample),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, PI};

    const TOLERANCE: f32 = 1e-5;

    fn vec3(x: f32, y: f32, z: f32) -> Vector3<f32> {
        Vector3::new(x, y, z)
    }

    fn assert_vec3_eq(a: Vector3<f32>, b: Vector3<f32>) {
        assert!((a - b).magnitude() < TOLERANCE, "{a:?} != {b:?}");
    }

    /// The reference configuration: hole at the origin, vertex at (3,0,0),
    /// observer at (0,0,-5). Axes and polar values are worked out by hand.
    #[test]
    fn test_frame_axes_for_reference_configuration() {
        let frame =
            LensingFrame::new(vec3(0.0, 0.0, 0.0), vec3(3.0, 0.0, 0.0), vec3(0.0, 0.0, -5.0))
                .unwrap();

        assert_vec3_eq(frame.x_axis, vec3(0.0, 0.0, -1.0));
        assert_vec3_eq(frame.normal, vec3(0.0, -1.0, 0.0));
        assert_vec3_eq(frame.y_axis, vec3(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_polar_decomposition_for_reference_configuration() {
        let hole = vec3(0.0, 0.0, 0.0);
        let vertex = vec3(3.0, 0.0, 0.0);
        let observer = vec3(0.0, 0.0, -5.0);
        let frame = LensingFrame::new(hole, vertex, observer).unwrap();

        let vertex_2d = frame.project(hole, vertex);
        assert!((vertex_2d - Vector2::new(0.0, 3.0)).magnitude() < TOLERANCE);
        assert!((vertex_2d.magnitude() - 3.0).abs() < TOLERANCE);
        assert!((wrap_angle(vertex_2d.y.atan2(vertex_2d.x)) - FRAC_PI_2).abs() < TOLERANCE);

        let observer_2d = frame.project(hole, observer);
        assert!((observer_2d - Vector2::new(5.0, 0.0)).magnitude() < TOLERANCE);
    }

    #[test]
    fn test_lookup_coords_use_table_ranges() {
        let table = LensingTable::parse(&{
            let mut t = String::from("2 2 2\n1.0 5.0\n2.0 10.0\n");
            t.push_str(&"0.0 ".repeat(24));
            t
        })
        .unwrap();
        let hole = vec3(0.0, 0.0, 0.0);
        let vertex = vec3(3.0, 0.0, 0.0);
        let observer = vec3(0.0, 0.0, -5.0);
        let frame = LensingFrame::new(hole, vertex, observer).unwrap();

        let (vr, vphi, or) = frame.lookup_coords(hole, vertex, observer, &table);
        // radius 3 in [1, 5] -> 0.5; angle pi/2 in [0, 2pi) -> 0.25;
        // radius 5 in [2, 10] -> 0.375.
        assert!((vr - 0.5).abs() < TOLERANCE);
        assert!((vphi - 0.25).abs() < TOLERANCE);
        assert!((or - 0.375).abs() < TOLERANCE);
    }

    #[test]
    fn test_collinear_configuration_is_degenerate() {
        // Vertex on the hole-observer axis.
        let result = LensingFrame::new(
            vec3(0.0, 0.0, 0.0),
            vec3(0.0, 0.0, 2.0),
            vec3(0.0, 0.0, -5.0),
        );
        assert_eq!(result.unwrap_err(), MapperError::DegenerateFrame);

        // Vertex on the hole itself.
        let result = LensingFrame::new(
            vec3(0.0, 0.0, 0.0),
            vec3(0.0, 0.0, 0.0),
            vec3(0.0, 0.0, -5.0),
        );
        assert_eq!(result.unwrap_err(), MapperError::DegenerateFrame);

        // Observer on the hole: no x-axis.
        let result = LensingFrame::new(
            vec3(0.0, 0.0, 0.0),
            vec3(1.0, 0.0, 0.0),
            vec3(0.0, 0.0, 0.0),
        );
        assert_eq!(result.unwrap_err(), MapperError::DegenerateFrame);
    }

    #[test]
    fn test_secondary_frame_reflects_across_hole_observer_axis() {
        let frame =
            LensingFrame::new(vec3(0.0, 0.0, 0.0), vec3(3.0, 0.0, 0.0), vec3(0.0, 0.0, -5.0))
                .unwrap();
        let secondary = frame.secondary();
        assert_vec3_eq(secondary.x_axis, frame.x_axis);
        assert_vec3_eq(secondary.y_axis, -frame.y_axis);
        assert_vec3_eq(secondary.normal, -frame.normal);

        // A vertex at angle phi in the primary frame sits at -phi in the
        // secondary, so the two lookups land in different table cells.
        let vertex_2d = frame.project(vec3(0.0, 0.0, 0.0), vec3(3.0, 0.0, 0.0));
        let vertex_2d_secondary = secondary.project(vec3(0.0, 0.0, 0.0), vec3(3.0, 0.0, 0.0));
        assert!((vertex_2d.y + vertex_2d_secondary.y).abs() < TOLERANCE);
    }

    #[test]
    fn test_displaced_position_reconstruction() {
        let frame =
            LensingFrame::new(vec3(0.0, 0.0, 0.0), vec3(3.0, 0.0, 0.0), vec3(0.0, 0.0, -5.0))
                .unwrap();
        let observer = vec3(0.0, 0.0, -5.0);

        // Emission angle 0 walks along the x-axis from the observer.
        let along_x = LensingSample {
            deflection_angle: 0.0,
            emission_angle: 0.0,
            distance: 2.0,
        };
        assert_vec3_eq(
            frame.displaced_position(observer, &along_x),
            observer + frame.x_axis * 2.0,
        );

        // Emission angle pi/2 walks along the y-axis.
        let along_y = LensingSample {
            deflection_angle: 0.0,
            emission_angle: FRAC_PI_2,
            distance: 3.0,
        };
        assert_vec3_eq(
            frame.displaced_position(observer, &along_y),
            observer + frame.y_axis * 3.0,
        );
    }

    #[test]
    fn test_normal_rotation_axis_and_amount() {
        let frame =
            LensingFrame::new(vec3(0.0, 0.0, 0.0), vec3(3.0, 0.0, 0.0), vec3(0.0, 0.0, -5.0))
                .unwrap();
        let sample = LensingSample {
            deflection_angle: 0.3,
            emission_angle: 0.1,
            distance: 1.0,
        };

        let rotation = frame.normal_rotation(&sample);
        let expected = Matrix4::from_axis_angle(frame.normal, Rad((0.1 + PI) - 0.3));
        for col in 0..4 {
            for row in 0..4 {
                assert!((rotation[col][row] - expected[col][row]).abs() < TOLERANCE);
            }
        }

        // The rotation axis is the frame normal, so the normal itself is
        // unchanged by it.
        let rotated = (rotation * frame.normal.extend(0.0)).truncate();
        assert_vec3_eq(rotated, frame.normal);
    }

    #[test]
    fn test_displace_vertex_end_to_end() {
        // Table whose every cell is (0.3, 0.1, 4.0): deflection, emission,
        // distance are then known regardless of which cell the lookup hits.
        let mut text = String::from("2 2 2\n1.0 5.0\n2.0 10.0\n");
        text.push_str(&"0.3 0.1 4.0 ".repeat(8));
        let table = LensingTable::parse(&text).unwrap();
        let black_hole = BlackHole::new(vec3(0.0, 0.0, 0.0), 0.4, table);

        let observer = vec3(0.0, 0.0, -5.0);
        let displacement =
            displace_vertex(&black_hole, vec3(3.0, 0.0, 0.0), observer).unwrap();

        let frame =
            LensingFrame::new(vec3(0.0, 0.0, 0.0), vec3(3.0, 0.0, 0.0), observer).unwrap();
        let expected = observer
            + (frame.x_axis * 0.1_f32.cos() + frame.y_axis * 0.1_f32.sin()) * 4.0;
        assert_vec3_eq(displacement.position, expected);
    }

    #[test]
    fn test_displace_vertex_with_empty_table_fails() {
        let black_hole = BlackHole::default();
        let result = displace_vertex(
            &black_hole,
            vec3(3.0, 0.0, 0.0),
            vec3(0.0, 0.0, -5.0),
        );
        assert_eq!(
            result.unwrap_err(),
            MapperError::Table(TableError::EmptyTable)
        );
    }
}
