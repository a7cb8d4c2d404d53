use glam::{Mat4, Vec3};

use super::transform::{ProjectionMode, TransformState};

/// Fixed camera parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraConfig {
    /// Vertical field of view of the perspective projection.
    pub fov_y_degrees: f32,
    /// Angle of the eye above the ground plane, seen from the centroid.
    pub elevation_degrees: f32,
    /// Lower bound for the framing radius so an empty or flat scene still gets a usable frustum.
    pub min_radius: f32,
    /// Extra depth range around the scene sphere, as a fraction of the radius.
    pub depth_margin: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_y_degrees: 45.0,
            elevation_degrees: 35.0,
            min_radius: 1.0,
            depth_margin: 0.1,
        }
    }
}

/// What the camera frames: the vertex centroid and a sphere around it holding every vertex.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct SceneBounds {
    pub centroid: Vec3,
    pub radius: f32,
}

/// Per-layer transform uniforms.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Matrices {
    pub model: Mat4,
    pub view: Mat4,
    pub projection: Mat4,
}

/// Rotation about the vertical (Z) axis pivoted at `centroid`.
pub fn model_matrix(centroid: Vec3, rotation_degrees: i32) -> Mat4 {
    Mat4::from_translation(centroid)
        * Mat4::from_rotation_z((rotation_degrees as f32).to_radians())
        * Mat4::from_translation(-centroid)
}

impl CameraConfig {
    #[inline]
    fn half_fov(&self) -> f32 {
        self.fov_y_degrees.to_radians() / 2.0
    }

    #[inline]
    fn radius(&self, bounds: &SceneBounds) -> f32 {
        bounds.radius.max(self.min_radius)
    }

    /// Eye-to-centroid distance. At zoom 1 the bounding sphere exactly fits the vertical FOV.
    pub fn eye_distance(&self, bounds: &SceneBounds, zoom: f32) -> f32 {
        self.radius(bounds) / self.half_fov().sin() / zoom
    }

    /// Look-at from above and in front of the centroid (toward -Y), Z up.
    pub fn view_matrix(&self, bounds: &SceneBounds, zoom: f32) -> Mat4 {
        let elevation = self.elevation_degrees.to_radians();
        let direction = Vec3::new(0.0, -elevation.cos(), elevation.sin());
        let eye = bounds.centroid + direction * self.eye_distance(bounds, zoom);
        Mat4::look_at_rh(eye, bounds.centroid, Vec3::Z)
    }

    /// Perspective or orthographic projection with depth range `[0, 1]`.
    ///
    /// The orthographic half-height equals the perspective frustum's half-height at
    /// the centroid's depth, so toggling modes keeps the centroid plane at the same
    /// on-screen scale for every zoom level.
    pub fn projection_matrix(
        &self,
        mode: ProjectionMode,
        bounds: &SceneBounds,
        zoom: f32,
        aspect: f32,
    ) -> Mat4 {
        let distance = self.eye_distance(bounds, zoom);
        let reach = self.radius(bounds) * (1.0 + self.depth_margin);
        let near = (distance - reach).max(distance * 0.01);
        let far = distance + reach;

        match mode {
            ProjectionMode::Perspective => {
                Mat4::perspective_rh(self.fov_y_degrees.to_radians(), aspect, near, far)
            }
            ProjectionMode::Orthographic => {
                let half_h = distance * self.half_fov().tan();
                let half_w = half_h * aspect;
                Mat4::orthographic_rh(-half_w, half_w, -half_h, half_h, near, far)
            }
        }
    }

    /// Derives all three matrices for one draw.
    pub fn matrices(&self, bounds: &SceneBounds, transform: &TransformState, aspect: f32) -> Matrices {
        let zoom = transform.zoom();
        Matrices {
            model: model_matrix(bounds.centroid, transform.rotation_degrees()),
            view: self.view_matrix(bounds, zoom),
            projection: self.projection_matrix(transform.projection(), bounds, zoom, aspect),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4Swizzles;

    fn bounds() -> SceneBounds {
        SceneBounds {
            centroid: Vec3::new(120.0, -40.0, 75.0),
            radius: 800.0,
        }
    }

    fn project(m: &Matrices, p: Vec3) -> Vec3 {
        let clip = m.projection * m.view * m.model * p.extend(1.0);
        clip.xyz() / clip.w
    }

    #[test]
    fn model_rotation_pivots_on_centroid() {
        let c = Vec3::new(10.0, 20.0, 5.0);
        let m = model_matrix(c, 90);

        assert!(m.transform_point3(c).abs_diff_eq(c, 1e-4));
        let p = m.transform_point3(c + Vec3::X);
        assert!(p.abs_diff_eq(c + Vec3::Y, 1e-4), "{p:?}");
    }

    #[test]
    fn zero_rotation_is_identity() {
        assert!(model_matrix(Vec3::new(3.0, 4.0, 5.0), 0).abs_diff_eq(Mat4::IDENTITY, 1e-5));
    }

    #[test]
    fn centroid_projects_to_screen_center_in_both_modes() {
        let camera = CameraConfig::default();
        for zoom in [0.5, 1.0, 3.0] {
            for projection in [ProjectionMode::Perspective, ProjectionMode::Orthographic] {
                let t = TransformState::new(30, zoom, projection);
                let m = camera.matrices(&bounds(), &t, 16.0 / 9.0);
                let ndc = project(&m, bounds().centroid);
                assert!(ndc.x.abs() < 1e-4 && ndc.y.abs() < 1e-4, "{projection:?} {ndc:?}");
                assert!((0.0..=1.0).contains(&ndc.z), "{projection:?} depth {}", ndc.z);
            }
        }
    }

    #[test]
    fn switching_modes_keeps_centroid_plane_scale() {
        let camera = CameraConfig::default();
        let aspect = 4.0 / 3.0;
        let p = bounds().centroid + Vec3::new(250.0, 0.0, 0.0);

        let persp = camera.matrices(&bounds(), &TransformState::default(), aspect);
        let ortho = camera.matrices(
            &bounds(),
            &TransformState::new(0, 1.0, ProjectionMode::Orthographic),
            aspect,
        );

        let a = project(&persp, p);
        let b = project(&ortho, p);
        assert!((a.x - b.x).abs() < 1e-4, "{a:?} vs {b:?}");
        assert!(a.x > 0.0);
    }

    #[test]
    fn zoom_moves_eye_closer() {
        let camera = CameraConfig::default();
        let far = camera.eye_distance(&bounds(), 1.0);
        let near = camera.eye_distance(&bounds(), 2.0);
        assert!((far / near - 2.0).abs() < 1e-5);
    }

    #[test]
    fn whole_scene_sphere_is_inside_depth_range() {
        let camera = CameraConfig::default();
        let m = camera.matrices(&bounds(), &TransformState::default(), 1.0);
        let b = bounds();
        for dir in [Vec3::X, -Vec3::X, Vec3::Y, -Vec3::Y, Vec3::Z, -Vec3::Z] {
            let ndc = project(&m, b.centroid + dir * b.radius);
            assert!((0.0..=1.0).contains(&ndc.z), "{dir:?} -> {}", ndc.z);
        }
    }
}
