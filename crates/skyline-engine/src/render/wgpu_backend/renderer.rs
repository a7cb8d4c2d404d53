use std::collections::{BTreeSet, HashMap};
use std::num::NonZeroU64;

use wgpu::util::DeviceExt;

use crate::coords::{ColorRgba, Viewport};
use crate::device::{Gpu, SurfaceErrorAction, DEPTH_FORMAT};
use crate::error::{Error, Result};
use crate::render::{
    AttributeSlot, BindingHandle, BufferHandle, BufferKind, FrameStatus, ProgramHandle,
    RenderContext, ResourceCounts, ShaderHandle, ShaderStage, UniformSlot, VertexAttribute,
};

use super::reflect::{self, ProgramLayout, StageModule, UniformKind};

/// Every vertex attribute is tightly packed `f32 x 3`.
const ATTRIBUTE_STRIDE: u64 = 12;

struct GpuBuffer {
    kind: BufferKind,
    buffer: wgpu::Buffer,
}

struct CompiledStage {
    reflected: StageModule,
    module: wgpu::ShaderModule,
}

struct LinkedProgram {
    vertex: wgpu::ShaderModule,
    fragment: wgpu::ShaderModule,
    vertex_entry: String,
    fragment_entry: String,
    layout: ProgramLayout,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    /// CPU copy of the uniform block; `set_uniform_*` writes here, draws snapshot it.
    staging: Vec<u8>,
    /// Keyed by the attribute locations a binding supplies and the target format.
    pipelines: HashMap<(Vec<u32>, wgpu::TextureFormat), wgpu::RenderPipeline>,
}

struct VertexBinding {
    program: ProgramHandle,
    /// Supplied attributes sorted by location.
    attributes: Vec<(u32, BufferHandle)>,
}

struct RecordedDraw {
    program: ProgramHandle,
    binding: BindingHandle,
    index_buffer: BufferHandle,
    index_count: u32,
    uniform_offset: u32,
}

struct FrameRecording {
    frame: crate::device::GpuFrame,
    clear: ColorRgba,
    viewport: Viewport,
    draws: Vec<RecordedDraw>,
    uniforms: Vec<u8>,
}

/// Persistent wgpu-side state behind [`WgpuContext`].
///
/// Lives for the whole window session; a `WgpuContext` borrows it together with
/// the `Gpu` for the duration of one tick. Draws are recorded as issued and
/// encoded into a single depth-tested render pass at `end_frame`.
#[derive(Default)]
pub struct WgpuRenderer {
    next_id: u64,
    buffers: HashMap<BufferHandle, GpuBuffer>,
    shaders: HashMap<ShaderHandle, CompiledStage>,
    programs: HashMap<ProgramHandle, LinkedProgram>,
    bindings: HashMap<BindingHandle, VertexBinding>,

    current_program: Option<ProgramHandle>,
    current_binding: Option<BindingHandle>,
    current_index: Option<BufferHandle>,

    frame: Option<FrameRecording>,
    uniform_buffer: Option<wgpu::Buffer>,
    uniform_capacity: u64,
    zero_attribute: Option<wgpu::Buffer>,

    lost: bool,
}

impl std::fmt::Debug for WgpuRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuRenderer")
            .field("resources", &self.counts())
            .field("recording", &self.frame.is_some())
            .field("lost", &self.lost)
            .finish()
    }
}

impl WgpuRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrows this state and `gpu` as a [`RenderContext`] for one tick.
    pub fn context<'a, 'w>(&'a mut self, gpu: &'a mut Gpu<'w>) -> WgpuContext<'a, 'w> {
        WgpuContext { gpu, state: self }
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn counts(&self) -> ResourceCounts {
        ResourceCounts {
            buffers: self.buffers.len(),
            shaders: self.shaders.len(),
            programs: self.programs.len(),
            bindings: self.bindings.len(),
        }
    }

    fn current_program_mut(&mut self) -> Option<&mut LinkedProgram> {
        let handle = self.current_program?;
        self.programs.get_mut(&handle)
    }

    fn write_uniform(&mut self, slot: UniformSlot, kind: UniformKind, bytes: &[u8]) {
        let Some(program) = self.current_program_mut() else {
            log::warn!("uniform write with no program in use");
            return;
        };
        match program.layout.uniform_at(slot.0) {
            Some(member) if member.kind == kind => {
                let start = member.offset as usize;
                program.staging[start..start + kind.size()].copy_from_slice(bytes);
            }
            _ => log::warn!("uniform slot {slot:?} is not a {kind:?} member; write ignored"),
        }
    }
}

/// [`RenderContext`] over a live wgpu surface.
pub struct WgpuContext<'a, 'w> {
    gpu: &'a mut Gpu<'w>,
    state: &'a mut WgpuRenderer,
}

impl WgpuContext<'_, '_> {
    fn ensure_zero_attribute(&mut self) {
        if self.state.zero_attribute.is_some() {
            return;
        }
        self.state.zero_attribute = Some(self.gpu.device().create_buffer_init(
            &wgpu::util::BufferInitDescriptor {
                label: Some("skyline zero attribute"),
                contents: &[0u8; ATTRIBUTE_STRIDE as usize],
                usage: wgpu::BufferUsages::VERTEX,
            },
        ));
    }

    fn ensure_uniform_capacity(&mut self, required: u64) {
        if required <= self.state.uniform_capacity && self.state.uniform_buffer.is_some() {
            return;
        }
        let capacity = required.next_power_of_two().max(4096);
        self.state.uniform_buffer = Some(self.gpu.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some("skyline layer uniforms"),
            size: capacity,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }));
        self.state.uniform_capacity = capacity;
    }

    fn ensure_pipeline(&mut self, program: ProgramHandle, supplied: Vec<u32>) {
        let format = self.gpu.surface_format();
        let device = self.gpu.device();
        let Some(linked) = self.state.programs.get_mut(&program) else { return };
        if linked.pipelines.contains_key(&(supplied.clone(), format)) {
            return;
        }

        // Inputs without a bound buffer read one zero vertex via instance stepping.
        let attributes: Vec<[wgpu::VertexAttribute; 1]> = linked
            .layout
            .input_locations()
            .into_iter()
            .map(|location| {
                [wgpu::VertexAttribute {
                    format: wgpu::VertexFormat::Float32x3,
                    offset: 0,
                    shader_location: location,
                }]
            })
            .collect();
        let buffers: Vec<wgpu::VertexBufferLayout<'_>> = attributes
            .iter()
            .map(|attr| wgpu::VertexBufferLayout {
                array_stride: ATTRIBUTE_STRIDE,
                step_mode: if supplied.contains(&attr[0].shader_location) {
                    wgpu::VertexStepMode::Vertex
                } else {
                    wgpu::VertexStepMode::Instance
                },
                attributes: attr,
            })
            .collect();

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("skyline layer pipeline"),
            layout: Some(&linked.pipeline_layout),

            vertex: wgpu::VertexState {
                module: &linked.vertex,
                entry_point: Some(linked.vertex_entry.as_str()),
                compilation_options: Default::default(),
                buffers: &buffers,
            },

            fragment: Some(wgpu::FragmentState {
                module: &linked.fragment,
                entry_point: Some(linked.fragment_entry.as_str()),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),

            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },

            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),

            multiview_mask: None,
            cache: None,
        });

        log::debug!("created pipeline for {program:?} with attributes {supplied:?}");
        linked.pipelines.insert((supplied, format), pipeline);
    }

    fn uniform_stride(&self, size: u32) -> u64 {
        let align = u64::from(self.gpu.device().limits().min_uniform_buffer_offset_alignment);
        u64::from(size).div_ceil(align) * align
    }

    /// Latches a device loss reported by wgpu into this state.
    fn device_lost(&mut self) -> bool {
        if !self.state.lost && self.gpu.is_lost() {
            log::error!("gpu device lost; rendering stops");
            self.state.lost = true;
        }
        self.state.lost
    }

    fn encode(&mut self, recording: FrameRecording) {
        let FrameRecording {
            mut frame,
            clear,
            viewport,
            draws,
            uniforms,
        } = recording;

        let format = self.gpu.surface_format();
        if !draws.is_empty() {
            self.ensure_zero_attribute();
            self.ensure_uniform_capacity(uniforms.len() as u64);
            for draw in &draws {
                let supplied = self
                    .state
                    .bindings
                    .get(&draw.binding)
                    .map(|b| b.attributes.iter().map(|(loc, _)| *loc).collect())
                    .unwrap_or_default();
                self.ensure_pipeline(draw.program, supplied);
            }
        }

        let state = &*self.state;
        let bind_groups: HashMap<ProgramHandle, wgpu::BindGroup> = match &state.uniform_buffer {
            Some(ubo) if !draws.is_empty() => {
                self.gpu.queue().write_buffer(ubo, 0, &uniforms);
                programs_in(&draws)
                    .into_iter()
                    .filter_map(|handle| {
                        let program = state.programs.get(&handle)?;
                        let bind_group = self.gpu.device().create_bind_group(&wgpu::BindGroupDescriptor {
                            label: Some("skyline layer bind group"),
                            layout: &program.bind_group_layout,
                            entries: &[wgpu::BindGroupEntry {
                                binding: 0,
                                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                                    buffer: ubo,
                                    offset: 0,
                                    size: NonZeroU64::new(u64::from(program.layout.uniform_size)),
                                }),
                            }],
                        });
                        Some((handle, bind_group))
                    })
                    .collect()
            }
            _ => HashMap::new(),
        };

        let size = self.gpu.size();
        {
            let mut rpass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("skyline layer pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frame.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: f64::from(clear.r),
                            g: f64::from(clear.g),
                            b: f64::from(clear.b),
                            a: f64::from(clear.a),
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: self.gpu.depth_view(),
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            let width = viewport.width.clamp(1.0, size.width.max(1) as f32);
            let height = viewport.height.clamp(1.0, size.height.max(1) as f32);
            rpass.set_viewport(0.0, 0.0, width, height, 0.0, 1.0);

            for draw in &draws {
                let Some(program) = state.programs.get(&draw.program) else { continue };
                let Some(binding) = state.bindings.get(&draw.binding) else { continue };
                let Some(index) = state.buffers.get(&draw.index_buffer) else { continue };
                let Some(bind_group) = bind_groups.get(&draw.program) else { continue };
                let Some(zero) = state.zero_attribute.as_ref() else { continue };

                let supplied: Vec<u32> = binding.attributes.iter().map(|(loc, _)| *loc).collect();
                let Some(pipeline) = program.pipelines.get(&(supplied, format)) else { continue };

                rpass.set_pipeline(pipeline);
                rpass.set_bind_group(0, bind_group, &[draw.uniform_offset]);

                for (slot, location) in program.layout.input_locations().into_iter().enumerate() {
                    let source = binding
                        .attributes
                        .iter()
                        .find(|(loc, _)| *loc == location)
                        .and_then(|(_, buffer)| state.buffers.get(buffer))
                        .map_or(zero, |b| &b.buffer);
                    rpass.set_vertex_buffer(slot as u32, source.slice(..));
                }

                rpass.set_index_buffer(index.buffer.slice(..), wgpu::IndexFormat::Uint32);
                rpass.draw_indexed(0..draw.index_count, 0, 0..1);
            }
        }

        self.gpu.submit(frame);
    }
}

impl RenderContext for WgpuContext<'_, '_> {
    fn create_buffer(&mut self, kind: BufferKind, contents: &[u8]) -> Result<BufferHandle> {
        let max = self.gpu.device().limits().max_buffer_size;
        if contents.len() as u64 > max {
            return Err(Error::ResourceAllocation(format!(
                "{} bytes exceeds the device buffer limit of {max}",
                contents.len()
            )));
        }

        // Buffers must be non-empty and a multiple of 4 bytes long.
        let padded_len = contents.len().max(4).next_multiple_of(4);
        let mut bytes = contents.to_vec();
        bytes.resize(padded_len, 0);

        let usage = match kind {
            BufferKind::Vertex => wgpu::BufferUsages::VERTEX,
            BufferKind::Index => wgpu::BufferUsages::INDEX,
        };
        let buffer = scoped(self.gpu.device(), "buffer", |device| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(match kind {
                    BufferKind::Vertex => "skyline vertex buffer",
                    BufferKind::Index => "skyline index buffer",
                }),
                contents: &bytes,
                usage,
            })
        })?;

        let handle = BufferHandle(self.state.next_id());
        self.state.buffers.insert(handle, GpuBuffer { kind, buffer });
        Ok(handle)
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        if let Some(b) = self.state.buffers.remove(&buffer) {
            b.buffer.destroy();
        }
        if self.state.current_index == Some(buffer) {
            self.state.current_index = None;
        }
    }

    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderHandle> {
        let reflected = reflect::compile_stage(stage, source)?;
        let module = scoped(self.gpu.device(), "shader module", |device| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(match stage {
                    ShaderStage::Vertex => "skyline vertex shader",
                    ShaderStage::Fragment => "skyline fragment shader",
                }),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
        })?;

        let handle = ShaderHandle(self.state.next_id());
        self.state.shaders.insert(handle, CompiledStage { reflected, module });
        Ok(handle)
    }

    fn destroy_shader(&mut self, shader: ShaderHandle) {
        self.state.shaders.remove(&shader);
    }

    fn link_program(&mut self, vertex: ShaderHandle, fragment: ShaderHandle) -> Result<ProgramHandle> {
        let (Some(vs), Some(fs)) = (self.state.shaders.get(&vertex), self.state.shaders.get(&fragment)) else {
            return Err(Error::Link("unknown shader handle".to_string()));
        };
        let layout = reflect::link(&vs.reflected, &fs.reflected)?;

        let (bind_group_layout, pipeline_layout) = scoped(self.gpu.device(), "program layout", |device| {
            let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("skyline layer bgl"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: NonZeroU64::new(u64::from(layout.uniform_size)),
                    },
                    count: None,
                }],
            });
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("skyline layer pipeline layout"),
                bind_group_layouts: &[&bind_group_layout],
                immediate_size: 0,
            });
            (bind_group_layout, pipeline_layout)
        })?;

        let program = LinkedProgram {
            vertex: vs.module.clone(),
            fragment: fs.module.clone(),
            vertex_entry: vs.reflected.entry_point.clone(),
            fragment_entry: fs.reflected.entry_point.clone(),
            staging: vec![0; layout.uniform_size as usize],
            layout,
            bind_group_layout,
            pipeline_layout,
            pipelines: HashMap::new(),
        };

        let handle = ProgramHandle(self.state.next_id());
        self.state.programs.insert(handle, program);
        Ok(handle)
    }

    fn destroy_program(&mut self, program: ProgramHandle) {
        self.state.programs.remove(&program);
        if self.state.current_program == Some(program) {
            self.state.current_program = None;
        }
    }

    fn attribute_slot(&self, program: ProgramHandle, name: &str) -> Option<AttributeSlot> {
        let linked = self.state.programs.get(&program)?;
        linked.layout.vertex_inputs.get(name).copied().map(AttributeSlot)
    }

    fn uniform_slot(&self, program: ProgramHandle, name: &str) -> Option<UniformSlot> {
        let linked = self.state.programs.get(&program)?;
        linked.layout.uniforms.get(name).map(|m| UniformSlot(m.offset))
    }

    fn create_vertex_binding(
        &mut self,
        program: ProgramHandle,
        attributes: &[VertexAttribute],
    ) -> Result<BindingHandle> {
        let Some(linked) = self.state.programs.get(&program) else {
            return Err(Error::ResourceAllocation(format!("unknown program {program:?}")));
        };

        let mut supplied = Vec::with_capacity(attributes.len());
        for attr in attributes {
            if !linked.layout.vertex_inputs.values().any(|&loc| loc == attr.slot.0) {
                return Err(Error::ResourceAllocation(format!(
                    "program has no vertex input at {:?}",
                    attr.slot
                )));
            }
            match self.state.buffers.get(&attr.buffer) {
                Some(b) if b.kind == BufferKind::Vertex => supplied.push((attr.slot.0, attr.buffer)),
                _ => {
                    return Err(Error::ResourceAllocation(format!(
                        "{:?} is not a live vertex buffer",
                        attr.buffer
                    )));
                }
            }
        }
        supplied.sort_unstable_by_key(|(loc, _)| *loc);

        let handle = BindingHandle(self.state.next_id());
        self.state.bindings.insert(
            handle,
            VertexBinding {
                program,
                attributes: supplied,
            },
        );
        Ok(handle)
    }

    fn destroy_vertex_binding(&mut self, binding: BindingHandle) {
        self.state.bindings.remove(&binding);
        if self.state.current_binding == Some(binding) {
            self.state.current_binding = None;
        }
    }

    fn use_program(&mut self, program: ProgramHandle) {
        self.state.current_program = Some(program);
    }

    fn set_uniform_mat4(&mut self, slot: UniformSlot, value: &[f32; 16]) {
        self.state
            .write_uniform(slot, UniformKind::Mat4, bytemuck::cast_slice(value));
    }

    fn set_uniform_vec4(&mut self, slot: UniformSlot, value: [f32; 4]) {
        self.state
            .write_uniform(slot, UniformKind::Vec4, bytemuck::cast_slice(&value));
    }

    fn set_uniform_bool(&mut self, slot: UniformSlot, value: bool) {
        self.state
            .write_uniform(slot, UniformKind::Flag, bytemuck::bytes_of(&u32::from(value)));
    }

    fn bind_vertex_binding(&mut self, binding: BindingHandle) {
        self.state.current_binding = Some(binding);
    }

    fn bind_index_buffer(&mut self, buffer: BufferHandle) {
        self.state.current_index = Some(buffer);
    }

    fn draw_indexed(&mut self, index_count: u32) {
        let stride = match self.state.current_program.and_then(|p| self.state.programs.get(&p)) {
            Some(p) => self.uniform_stride(p.layout.uniform_size),
            None => {
                log::warn!("draw with no program in use; ignored");
                return;
            }
        };

        let state = &mut *self.state;
        let (Some(program), Some(binding), Some(index_buffer)) =
            (state.current_program, state.current_binding, state.current_index)
        else {
            log::warn!("draw with incomplete vertex/index bindings; ignored");
            return;
        };
        if state.bindings.get(&binding).map(|b| b.program) != Some(program) {
            log::warn!("vertex binding {binding:?} was built for another program; draw ignored");
            return;
        }
        let Some(frame) = state.frame.as_mut() else {
            log::warn!("draw outside begin_frame/end_frame; ignored");
            return;
        };
        let Some(staging) = state.programs.get(&program).map(|p| &p.staging) else { return };

        let uniform_offset = frame.uniforms.len() as u64;
        frame.uniforms.extend_from_slice(staging);
        frame.uniforms.resize((uniform_offset + stride) as usize, 0);

        frame.draws.push(RecordedDraw {
            program,
            binding,
            index_buffer,
            index_count,
            uniform_offset: uniform_offset as u32,
        });
    }

    fn begin_frame(&mut self, clear: ColorRgba) -> FrameStatus {
        if self.device_lost() {
            self.state.frame = None;
            return FrameStatus::ContextLost;
        }
        if let Some(stale) = self.state.frame.take() {
            log::warn!("begin_frame without end_frame; dropping {} recorded draws", stale.draws.len());
        }

        match self.gpu.begin_frame() {
            Ok(frame) => {
                self.state.frame = Some(FrameRecording {
                    frame,
                    clear,
                    viewport: self.viewport(),
                    draws: Vec::new(),
                    uniforms: Vec::new(),
                });
                FrameStatus::Ready
            }
            Err(err) => match self.gpu.handle_surface_error(err) {
                SurfaceErrorAction::Reconfigured | SurfaceErrorAction::SkipFrame => FrameStatus::Skipped,
                SurfaceErrorAction::Fatal => {
                    self.state.lost = true;
                    FrameStatus::ContextLost
                }
            },
        }
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        if let Some(frame) = self.state.frame.as_mut() {
            frame.viewport = viewport;
        }
    }

    fn end_frame(&mut self) -> FrameStatus {
        if self.device_lost() {
            self.state.frame = None;
            return FrameStatus::ContextLost;
        }
        let Some(recording) = self.state.frame.take() else {
            return FrameStatus::Skipped;
        };
        self.encode(recording);
        FrameStatus::Ready
    }

    fn viewport(&self) -> Viewport {
        let size = self.gpu.size();
        Viewport::new(size.width as f32, size.height as f32)
    }

    fn live_resources(&self) -> ResourceCounts {
        self.state.counts()
    }
}

/// Distinct programs used by a frame's draws, one bind group each.
fn programs_in(draws: &[RecordedDraw]) -> BTreeSet<ProgramHandle> {
    draws.iter().map(|d| d.program).collect()
}

/// Runs `create` under out-of-memory and validation error scopes so a failed
/// allocation comes back as an error instead of reaching the uncaptured handler.
fn scoped<T>(device: &wgpu::Device, what: &str, create: impl FnOnce(&wgpu::Device) -> T) -> Result<T> {
    let validation = device.push_error_scope(wgpu::ErrorFilter::Validation);
    let out_of_memory = device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    let value = create(device);
    let out_of_memory = pollster::block_on(out_of_memory.pop());
    let validation = pollster::block_on(validation.pop());
    allocation_outcome(what, out_of_memory.or(validation)).map(|()| value)
}

fn allocation_outcome(what: &str, error: Option<wgpu::Error>) -> Result<()> {
    match error {
        None => Ok(()),
        Some(e) => Err(Error::ResourceAllocation(format!("{what}: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draw(program: u64) -> RecordedDraw {
        RecordedDraw {
            program: ProgramHandle(program),
            binding: BindingHandle(program + 100),
            index_buffer: BufferHandle(program + 200),
            index_count: 3,
            uniform_offset: 0,
        }
    }

    #[test]
    fn one_bind_group_per_distinct_program() {
        let draws = [draw(2), draw(1), draw(2), draw(2), draw(1)];
        let programs: Vec<_> = programs_in(&draws).into_iter().collect();
        assert_eq!(programs, vec![ProgramHandle(1), ProgramHandle(2)]);
        assert!(programs_in(&[]).is_empty());
    }

    #[test]
    fn captured_errors_become_allocation_failures() {
        assert!(allocation_outcome("buffer", None).is_ok());

        let oom = wgpu::Error::OutOfMemory {
            source: Box::new(std::fmt::Error),
        };
        match allocation_outcome("buffer", Some(oom)) {
            Err(Error::ResourceAllocation(msg)) => assert!(msg.starts_with("buffer: "), "{msg}"),
            other => panic!("unexpected {other:?}"),
        }

        let invalid = wgpu::Error::Validation {
            source: Box::new(std::fmt::Error),
            description: "bad layout".to_string(),
        };
        assert!(matches!(
            allocation_outcome("program layout", Some(invalid)),
            Err(Error::ResourceAllocation(_))
        ));
    }
}
