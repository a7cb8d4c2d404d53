use std::collections::BTreeMap;

use naga::{AddressSpace, Binding, Module, ResourceBinding, ScalarKind, TypeInner, VectorSize};

use crate::error::{Error, Result};
use crate::render::ShaderStage;

/// A validated single-stage module and the entry point it provides.
#[derive(Debug)]
pub struct StageModule {
    pub stage: ShaderStage,
    pub module: Module,
    pub entry_point: String,
}

/// Shape of a uniform struct member the context can write.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum UniformKind {
    Mat4,
    Vec4,
    /// `u32` or `i32`; written as 0/1.
    Flag,
}

impl UniformKind {
    pub fn size(self) -> usize {
        match self {
            Self::Mat4 => 64,
            Self::Vec4 => 16,
            Self::Flag => 4,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct UniformMember {
    pub offset: u32,
    pub kind: UniformKind,
}

/// Interface of a linked vertex + fragment pair.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramLayout {
    /// Vertex inputs by name. Every input is `vec3<f32>`.
    pub vertex_inputs: BTreeMap<String, u32>,
    /// Members of the uniform block at `@group(0) @binding(0)`, by name.
    pub uniforms: BTreeMap<String, UniformMember>,
    /// Byte size of the uniform block.
    pub uniform_size: u32,
}

impl ProgramLayout {
    /// Input locations in ascending order; the pipeline's vertex buffer slots follow it.
    pub fn input_locations(&self) -> Vec<u32> {
        let mut locations: Vec<u32> = self.vertex_inputs.values().copied().collect();
        locations.sort_unstable();
        locations
    }

    /// Uniform member at `offset`, if the offset names one.
    pub fn uniform_at(&self, offset: u32) -> Option<UniformMember> {
        self.uniforms.values().copied().find(|m| m.offset == offset)
    }
}

const UNIFORM_BINDING: ResourceBinding = ResourceBinding { group: 0, binding: 0 };

fn naga_stage(stage: ShaderStage) -> naga::ShaderStage {
    match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Fragment => naga::ShaderStage::Fragment,
    }
}

/// Parses and validates WGSL for one stage.
///
/// Diagnostics are rendered against `source` so the log points at the offending line.
pub fn compile_stage(stage: ShaderStage, source: &str) -> Result<StageModule> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| Error::Compile {
        stage,
        log: e.emit_to_string(source),
    })?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::empty(),
    );
    validator.validate(&module).map_err(|e| Error::Compile {
        stage,
        log: e.emit_to_string(source),
    })?;

    let entry_point = module
        .entry_points
        .iter()
        .find(|ep| ep.stage == naga_stage(stage))
        .map(|ep| ep.name.clone())
        .ok_or_else(|| Error::Compile {
            stage,
            log: format!("no @{} entry point", stage_attr(stage)),
        })?;

    Ok(StageModule {
        stage,
        module,
        entry_point,
    })
}

fn stage_attr(stage: ShaderStage) -> &'static str {
    match stage {
        ShaderStage::Vertex => "vertex",
        ShaderStage::Fragment => "fragment",
    }
}

/// Checks that two stages fit together and reflects the program interface.
pub fn link(vertex: &StageModule, fragment: &StageModule) -> Result<ProgramLayout> {
    if vertex.stage != ShaderStage::Vertex || fragment.stage != ShaderStage::Fragment {
        return Err(Error::Link(format!(
            "expected vertex + fragment, got {:?} + {:?}",
            vertex.stage, fragment.stage
        )));
    }

    let vs = entry(vertex)?;
    let fs = entry(fragment)?;

    let vertex_inputs = vertex_inputs(&vertex.module, vs)?;

    let produced = result_locations(&vertex.module, vs);
    let consumed = argument_locations(&fragment.module, fs);
    if let Some(missing) = consumed.iter().find(|l| !produced.contains(l)) {
        return Err(Error::Link(format!(
            "fragment input @location({missing}) is not written by the vertex stage"
        )));
    }

    let vertex_block = uniform_block(&vertex.module)?;
    let fragment_block = uniform_block(&fragment.module)?;
    let (uniforms, uniform_size) = match (vertex_block, fragment_block) {
        (Some(v), Some(f)) if v != f => {
            return Err(Error::Link(
                "vertex and fragment declare different uniform blocks at @group(0) @binding(0)"
                    .to_string(),
            ));
        }
        (Some(block), _) | (None, Some(block)) => block,
        (None, None) => {
            return Err(Error::Link(
                "no uniform block at @group(0) @binding(0)".to_string(),
            ));
        }
    };

    Ok(ProgramLayout {
        vertex_inputs,
        uniforms,
        uniform_size,
    })
}

fn entry(stage: &StageModule) -> Result<&naga::Function> {
    stage
        .module
        .entry_points
        .iter()
        .find(|ep| ep.name == stage.entry_point)
        .map(|ep| &ep.function)
        .ok_or_else(|| Error::Link(format!("entry point `{}` vanished", stage.entry_point)))
}

fn location(binding: Option<&Binding>) -> Option<u32> {
    match binding {
        Some(Binding::Location { location, .. }) => Some(*location),
        _ => None,
    }
}

fn is_vec3_f32(inner: &TypeInner) -> bool {
    matches!(
        inner,
        TypeInner::Vector { size: VectorSize::Tri, scalar } if *scalar == naga::Scalar::F32
    )
}

/// Every located vertex input, flattening struct arguments.
fn vertex_inputs(module: &Module, function: &naga::Function) -> Result<BTreeMap<String, u32>> {
    let mut inputs = BTreeMap::new();
    let mut add = |name: Option<&String>, ty: naga::Handle<naga::Type>, loc: u32| {
        if !is_vec3_f32(&module.types[ty].inner) {
            return Err(Error::Link(format!(
                "vertex input @location({loc}) must be vec3<f32>"
            )));
        }
        let name = name.cloned().unwrap_or_else(|| format!("location{loc}"));
        inputs.insert(name, loc);
        Ok(())
    };

    for arg in &function.arguments {
        if let Some(loc) = location(arg.binding.as_ref()) {
            add(arg.name.as_ref(), arg.ty, loc)?;
        } else if let TypeInner::Struct { members, .. } = &module.types[arg.ty].inner {
            for member in members {
                if let Some(loc) = location(member.binding.as_ref()) {
                    add(member.name.as_ref(), member.ty, loc)?;
                }
            }
        }
    }
    Ok(inputs)
}

fn result_locations(module: &Module, function: &naga::Function) -> Vec<u32> {
    let Some(result) = function.result.as_ref() else {
        return Vec::new();
    };
    if let Some(loc) = location(result.binding.as_ref()) {
        return vec![loc];
    }
    match &module.types[result.ty].inner {
        TypeInner::Struct { members, .. } => members
            .iter()
            .filter_map(|m| location(m.binding.as_ref()))
            .collect(),
        _ => Vec::new(),
    }
}

fn argument_locations(module: &Module, function: &naga::Function) -> Vec<u32> {
    let mut locations = Vec::new();
    for arg in &function.arguments {
        if let Some(loc) = location(arg.binding.as_ref()) {
            locations.push(loc);
        } else if let TypeInner::Struct { members, .. } = &module.types[arg.ty].inner {
            locations.extend(members.iter().filter_map(|m| location(m.binding.as_ref())));
        }
    }
    locations
}

type UniformBlock = (BTreeMap<String, UniformMember>, u32);

fn uniform_kind(inner: &TypeInner) -> Option<UniformKind> {
    match inner {
        TypeInner::Matrix {
            columns: VectorSize::Quad,
            rows: VectorSize::Quad,
            scalar,
        } if *scalar == naga::Scalar::F32 => Some(UniformKind::Mat4),
        TypeInner::Vector {
            size: VectorSize::Quad,
            scalar,
        } if *scalar == naga::Scalar::F32 => Some(UniformKind::Vec4),
        TypeInner::Scalar(s)
            if s.width == 4 && matches!(s.kind, ScalarKind::Uint | ScalarKind::Sint) =>
        {
            Some(UniformKind::Flag)
        }
        _ => None,
    }
}

fn uniform_block(module: &Module) -> Result<Option<UniformBlock>> {
    let Some((_, global)) = module
        .global_variables
        .iter()
        .find(|(_, g)| g.space == AddressSpace::Uniform && g.binding == Some(UNIFORM_BINDING))
    else {
        return Ok(None);
    };

    let TypeInner::Struct { members, span } = &module.types[global.ty].inner else {
        return Err(Error::Link(
            "uniform at @group(0) @binding(0) must be a struct".to_string(),
        ));
    };

    // Members of other shapes stay in the block but get no slot.
    let uniforms = members
        .iter()
        .filter_map(|m| {
            let name = m.name.clone()?;
            let kind = uniform_kind(&module.types[m.ty].inner)?;
            Some((name, UniformMember { offset: m.offset, kind }))
        })
        .collect();

    Ok(Some((uniforms, *span)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOCK: &str = r#"
struct LayerUniforms {
    model: mat4x4<f32>,
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
    color: vec4<f32>,
    has_normals: u32,
}

@group(0) @binding(0) var<uniform> uniforms: LayerUniforms;
"#;

    fn vertex_src() -> String {
        format!(
            "{BLOCK}
struct VertexOut {{
    @builtin(position) clip: vec4<f32>,
    @location(0) normal: vec3<f32>,
}}

@vertex
fn vs_main(@location(0) position: vec3<f32>, @location(1) normal: vec3<f32>) -> VertexOut {{
    var vout: VertexOut;
    vout.clip = uniforms.projection * uniforms.view * uniforms.model * vec4<f32>(position, 1.0);
    vout.normal = normal;
    return vout;
}}
"
        )
    }

    fn fragment_src(input_location: u32) -> String {
        format!(
            "{BLOCK}
@fragment
fn fs_main(@location({input_location}) normal: vec3<f32>) -> @location(0) vec4<f32> {{
    if (uniforms.has_normals == 0u) {{
        return uniforms.color;
    }}
    return vec4<f32>(uniforms.color.rgb * max(normal.z, 0.2), uniforms.color.a);
}}
"
        )
    }

    #[test]
    fn reflects_inputs_and_uniform_offsets() {
        let vs = compile_stage(ShaderStage::Vertex, &vertex_src()).unwrap();
        let fs = compile_stage(ShaderStage::Fragment, &fragment_src(0)).unwrap();
        assert_eq!(vs.entry_point, "vs_main");

        let layout = link(&vs, &fs).unwrap();
        assert_eq!(layout.vertex_inputs["position"], 0);
        assert_eq!(layout.vertex_inputs["normal"], 1);
        assert_eq!(layout.input_locations(), vec![0, 1]);

        assert_eq!(layout.uniforms["model"], UniformMember { offset: 0, kind: UniformKind::Mat4 });
        assert_eq!(layout.uniforms["projection"].offset, 128);
        assert_eq!(layout.uniforms["color"], UniformMember { offset: 192, kind: UniformKind::Vec4 });
        assert_eq!(layout.uniforms["has_normals"], UniformMember { offset: 208, kind: UniformKind::Flag });
        assert_eq!(layout.uniform_size, 224);
        assert_eq!(layout.uniform_at(192).map(|m| m.kind), Some(UniformKind::Vec4));
        assert_eq!(layout.uniform_at(4), None);
    }

    #[test]
    fn syntax_error_is_a_compile_error_for_that_stage() {
        let err = compile_stage(ShaderStage::Fragment, "fn broken( {").unwrap_err();
        match err {
            Error::Compile { stage, log } => {
                assert_eq!(stage, ShaderStage::Fragment);
                assert!(!log.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn wrong_stage_entry_point_is_rejected() {
        let err = compile_stage(ShaderStage::Vertex, &fragment_src(0)).unwrap_err();
        assert!(matches!(err, Error::Compile { stage: ShaderStage::Vertex, .. }));
    }

    #[test]
    fn unmatched_fragment_input_fails_link() {
        let vs = compile_stage(ShaderStage::Vertex, &vertex_src()).unwrap();
        let fs = compile_stage(ShaderStage::Fragment, &fragment_src(3)).unwrap();
        assert!(matches!(link(&vs, &fs), Err(Error::Link(_))));
    }

    #[test]
    fn swapped_stages_fail_link() {
        let vs = compile_stage(ShaderStage::Vertex, &vertex_src()).unwrap();
        let fs = compile_stage(ShaderStage::Fragment, &fragment_src(0)).unwrap();
        assert!(matches!(link(&fs, &vs), Err(Error::Link(_))));
    }
}
