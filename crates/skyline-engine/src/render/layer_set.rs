use std::collections::BTreeMap;
use std::rc::Rc;

use glam::{DVec3, Vec3};

use crate::camera::{CameraConfig, SceneBounds, TransformState};
use crate::error::Result;
use crate::geometry::Mesh;

use super::context::RenderContext;
use super::layer::Layer;
use super::program::ShaderProgram;

/// Owning registry of named layers.
///
/// All layers share one `ShaderProgram`. The set is the only place layers are
/// created and destroyed, so GPU release is centralized here.
///
/// Draw order is the lexical order of layer names: stable across frames, with
/// no back-to-front sorting for transparency.
#[derive(Debug)]
pub struct LayerSet {
    program: Rc<ShaderProgram>,
    layers: BTreeMap<String, Layer>,
    bounds: SceneBounds,
}

impl LayerSet {
    pub fn new(program: ShaderProgram) -> Self {
        Self {
            program: Rc::new(program),
            layers: BTreeMap::new(),
            bounds: SceneBounds::default(),
        }
    }

    /// Uploads `mesh` as layer `name`, replacing (and releasing) any layer of that name.
    ///
    /// If the upload fails, the previous layer under `name` is left untouched.
    pub fn add_layer(&mut self, ctx: &mut dyn RenderContext, name: &str, mesh: &Mesh) -> Result<()> {
        let layer = Layer::create(ctx, mesh, Rc::clone(&self.program))?;

        if let Some(mut previous) = self.layers.insert(name.to_string(), layer) {
            previous.destroy(ctx);
            log::info!("replaced layer `{name}`");
        } else {
            log::info!(
                "added layer `{name}` ({} vertices, {} indices)",
                mesh.vertex_count(),
                mesh.index_count()
            );
        }

        self.recompute_bounds();
        Ok(())
    }

    /// Destroys and removes layer `name`. Absent names are ignored.
    pub fn remove_layer(&mut self, ctx: &mut dyn RenderContext, name: &str) {
        let Some(mut layer) = self.layers.remove(name) else {
            log::debug!("remove_layer: no layer named `{name}`");
            return;
        };
        layer.destroy(ctx);
        log::info!("removed layer `{name}`");
        self.recompute_bounds();
    }

    /// Draws every layer with the current bounds and transform.
    pub fn draw(&self, ctx: &mut dyn RenderContext, transform: &TransformState, camera: &CameraConfig) {
        for layer in self.layers.values() {
            layer.draw(ctx, &self.bounds, transform, camera);
        }
    }

    /// Componentwise mean of every vertex in every layer; `(0, 0, 0)` when there are none.
    #[inline]
    pub fn centroid(&self) -> Vec3 {
        self.bounds.centroid
    }

    #[inline]
    pub fn bounds(&self) -> &SceneBounds {
        &self.bounds
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.layers.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Layer> {
        self.layers.get(name)
    }

    /// Program shared by every layer of this set.
    #[inline]
    pub fn program(&self) -> &ShaderProgram {
        &self.program
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.layers.keys().map(String::as_str)
    }

    /// Destroys every layer, then the shared program.
    pub fn release(&mut self, ctx: &mut dyn RenderContext) {
        for (name, mut layer) in std::mem::take(&mut self.layers) {
            layer.destroy(ctx);
            log::debug!("released layer `{name}`");
        }
        self.recompute_bounds();

        match Rc::get_mut(&mut self.program) {
            Some(program) => program.destroy(ctx),
            None => log::warn!("layer program still shared at release; not destroyed"),
        }
    }

    fn recompute_bounds(&mut self) {
        let (count, sum) = self
            .layers
            .values()
            .map(Layer::stats)
            .fold((0usize, DVec3::ZERO), |(n, s), st| (n + st.count, s + st.sum));

        if count == 0 {
            self.bounds = SceneBounds::default();
            return;
        }

        let centroid = (sum / count as f64).as_vec3();

        // Farthest AABB corner from the centroid bounds every vertex.
        let radius = self
            .layers
            .values()
            .map(Layer::stats)
            .filter(|st| st.count > 0)
            .flat_map(|st| {
                (0..8).map(move |i| {
                    Vec3::new(
                        if i & 1 == 0 { st.min.x } else { st.max.x },
                        if i & 2 == 0 { st.min.y } else { st.max.y },
                        if i & 4 == 0 { st.min.z } else { st.max.z },
                    )
                })
            })
            .map(|corner| corner.distance(centroid))
            .fold(0.0, f32::max);

        self.bounds = SceneBounds { centroid, radius };
    }
}
