//! Kernel program - compile-time flags, the six entry points, and dispatch.
//!
//! The program is plain WGSL. Compile-time flags are emitted as a block of
//! `const` declarations in front of the source, the WGSL counterpart of
//! preprocessor defines. Every dispatch binds its buffers explicitly, so no
//! argument state survives between calls.

use std::fmt::Write as _;
use std::path::Path;

use log::{info, warn};

use super::{ComputeContext, GpuError};
use crate::compute::{
    BASE_VELOCITY, BUOYANCY, DRAG, EMITTER_COLOR, EMITTER_POSITION, EMITTER_RADIUS,
    LIFETIME_RANGE, MIN_LIFETIME, SATURATION_LIMIT, VELOCITY_JITTER, VELOCITY_SPREAD,
};
use crate::schema::{Palette, RenderConfig};

/// Embedded kernel program.
pub const PARTICLE_PROGRAM: &str = include_str!("shaders/particles.wgsl");

/// Binding slot of the particle array.
pub const PARTICLES_BINDING: u32 = 0;
/// Binding slot of the seed array.
pub const SEEDS_BINDING: u32 = 1;
/// Binding slot of the canvas accumulators.
pub const CANVAS_BINDING: u32 = 2;

/// Shape of the index range a kernel runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeShape {
    /// One invocation per particle (or a single invocation).
    Linear,
    /// One invocation per canvas cell.
    Grid,
}

/// Index range of one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexRange {
    Linear(u32),
    Grid(u32, u32),
}

impl IndexRange {
    pub fn shape(&self) -> RangeShape {
        match self {
            IndexRange::Linear(_) => RangeShape::Linear,
            IndexRange::Grid(..) => RangeShape::Grid,
        }
    }

    /// Workgroup counts covering the range.
    pub fn workgroups(&self, workgroup_size: (u32, u32)) -> (u32, u32, u32) {
        match *self {
            IndexRange::Linear(n) => (n.div_ceil(workgroup_size.0), 1, 1),
            IndexRange::Grid(w, h) => (
                w.div_ceil(workgroup_size.0),
                h.div_ceil(workgroup_size.1),
                1,
            ),
        }
    }
}

/// The six entry points of the kernel program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelId {
    InitParticles,
    UpdateParticles,
    ClearCanvas,
    DrawParticles,
    Saturate,
    DrawEmitter,
}

impl KernelId {
    /// All kernels, in discriminant order.
    pub const ALL: [KernelId; 6] = [
        KernelId::InitParticles,
        KernelId::UpdateParticles,
        KernelId::ClearCanvas,
        KernelId::DrawParticles,
        KernelId::Saturate,
        KernelId::DrawEmitter,
    ];

    pub fn entry_point(self) -> &'static str {
        match self {
            KernelId::InitParticles => "initParticles",
            KernelId::UpdateParticles => "updateParticles",
            KernelId::ClearCanvas => "clearCanvas",
            KernelId::DrawParticles => "drawParticles",
            // `saturate` is a WGSL built-in.
            KernelId::Saturate => "saturateCanvas",
            KernelId::DrawEmitter => "drawEmitter",
        }
    }

    /// Binding slots of the positional buffer arguments.
    pub fn bindings(self) -> &'static [u32] {
        match self {
            KernelId::InitParticles => &[PARTICLES_BINDING, SEEDS_BINDING],
            KernelId::UpdateParticles => &[PARTICLES_BINDING],
            KernelId::ClearCanvas | KernelId::Saturate | KernelId::DrawEmitter => {
                &[CANVAS_BINDING]
            }
            KernelId::DrawParticles => &[PARTICLES_BINDING, CANVAS_BINDING],
        }
    }

    /// Address space the program must declare for a binding slot.
    pub fn binding_space(binding: u32) -> naga::AddressSpace {
        let access = if binding == SEEDS_BINDING {
            naga::StorageAccess::LOAD
        } else {
            naga::StorageAccess::LOAD | naga::StorageAccess::STORE
        };
        naga::AddressSpace::Storage { access }
    }

    fn layout_entries(self) -> Vec<wgpu::BindGroupLayoutEntry> {
        self.bindings()
            .iter()
            .map(|&binding| wgpu::BindGroupLayoutEntry {
                binding,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage {
                        read_only: binding == SEEDS_BINDING,
                    },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            })
            .collect()
    }

    pub fn range_shape(self) -> RangeShape {
        match self {
            KernelId::ClearCanvas | KernelId::Saturate => RangeShape::Grid,
            _ => RangeShape::Linear,
        }
    }

    /// Must match the `@workgroup_size` attributes in the program.
    pub fn workgroup_size(self) -> (u32, u32) {
        match self {
            KernelId::ClearCanvas | KernelId::Saturate => (8, 8),
            KernelId::DrawEmitter => (1, 1),
            _ => (64, 1),
        }
    }
}

/// Compile-time flags of the kernel program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramFlags {
    /// Canvas edge length.
    pub window_size: u32,
    /// Palette variant.
    pub palette: Palette,
}

impl ProgramFlags {
    pub fn from_config(config: &RenderConfig) -> Self {
        Self {
            window_size: config.window_size,
            palette: config.palette,
        }
    }

    /// WGSL constant block defining the flags and the motion parameters.
    pub fn prelude(&self) -> String {
        let vec2 = |v: [f32; 2]| format!("vec2<f32>({:?}, {:?})", v[0], v[1]);
        let [r, g, b, a] = EMITTER_COLOR;

        let mut out = String::new();
        // Writing to a String cannot fail.
        let _ = writeln!(out, "const WINDOW_SIZE: u32 = {}u;", self.window_size);
        let _ = writeln!(
            out,
            "const FIRE_COLORS: bool = {};",
            self.palette == Palette::Fire
        );
        let _ = writeln!(out, "const EMITTER_POS: vec2<f32> = {};", vec2(EMITTER_POSITION));
        let _ = writeln!(out, "const BASE_VELOCITY: vec2<f32> = {};", vec2(BASE_VELOCITY));
        let _ = writeln!(out, "const VELOCITY_SPREAD: vec2<f32> = {};", vec2(VELOCITY_SPREAD));
        let _ = writeln!(out, "const VELOCITY_JITTER: f32 = {VELOCITY_JITTER:?};");
        let _ = writeln!(out, "const BUOYANCY: vec2<f32> = {};", vec2(BUOYANCY));
        let _ = writeln!(out, "const DRAG: f32 = {DRAG:?};");
        let _ = writeln!(out, "const MIN_LIFETIME: f32 = {MIN_LIFETIME:?};");
        let _ = writeln!(out, "const LIFETIME_RANGE: f32 = {LIFETIME_RANGE:?};");
        let _ = writeln!(out, "const SATURATION_LIMIT: i32 = {SATURATION_LIMIT};");
        let _ = writeln!(out, "const EMITTER_RADIUS: i32 = {EMITTER_RADIUS};");
        let _ = writeln!(
            out,
            "const EMITTER_COLOR: vec4<i32> = vec4<i32>({r}, {g}, {b}, {a});"
        );
        out
    }

    /// Full program text: flag prelude followed by the kernel source.
    pub fn assemble(&self, body: &str) -> String {
        format!("{}\n{}", self.prelude(), body)
    }
}

/// Parse and validate program text, and check the entry-point contract.
///
/// Every kernel must be a compute entry point with the workgroup size the
/// host dispatches with, and may only use the bindings it is given, declared
/// with the expected access mode.
///
/// With `diagnostics` a compiler error carries the full compiler output;
/// otherwise a one-line summary. Contract violations always name the kernel.
pub fn validate_program(source: &str, diagnostics: bool) -> Result<naga::Module, GpuError> {
    let summarize = |full: String| {
        if diagnostics {
            full
        } else {
            "compiler reported errors (enable diagnostics for details)".to_string()
        }
    };

    let module = naga::front::wgsl::parse_str(source)
        .map_err(|e| GpuError::ProgramBuild(summarize(e.emit_to_string(source))))?;

    let info = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::empty(),
    )
    .validate(&module)
    .map_err(|e| GpuError::ProgramBuild(summarize(e.emit_to_string(source))))?;

    for kernel in KernelId::ALL {
        check_entry_point(&module, &info, kernel)?;
    }

    Ok(module)
}

/// Check one entry point against the host's dispatch and binding contract.
fn check_entry_point(
    module: &naga::Module,
    info: &naga::valid::ModuleInfo,
    kernel: KernelId,
) -> Result<(), GpuError> {
    let name = kernel.entry_point();
    let (index, ep) = module
        .entry_points
        .iter()
        .enumerate()
        .find(|(_, ep)| ep.name == name)
        .ok_or(GpuError::MissingEntryPoint(name))?;

    if ep.stage != naga::ShaderStage::Compute {
        return Err(GpuError::ProgramBuild(format!(
            "`{name}` is a {:?} entry point, expected Compute",
            ep.stage
        )));
    }

    let (x, y) = kernel.workgroup_size();
    if ep.workgroup_size != [x, y, 1] {
        return Err(GpuError::ProgramBuild(format!(
            "`{name}` has workgroup size {:?}, expected [{x}, {y}, 1]",
            ep.workgroup_size
        )));
    }

    let uses = info.get_entry_point(index);
    for (handle, global) in module.global_variables.iter() {
        let Some(binding) = &global.binding else {
            continue;
        };
        if uses[handle].is_empty() {
            continue;
        }
        if binding.group != 0 || !kernel.bindings().contains(&binding.binding) {
            return Err(GpuError::ProgramBuild(format!(
                "`{name}` uses @group({}) @binding({}), which it is not given",
                binding.group, binding.binding
            )));
        }
        let expected = KernelId::binding_space(binding.binding);
        if global.space != expected {
            return Err(GpuError::ProgramBuild(format!(
                "`{name}` declares @binding({}) as {:?}, expected {:?}",
                binding.binding, global.space, expected
            )));
        }
    }

    Ok(())
}

fn summarize_pipeline_error(error: &wgpu::Error, diagnostics: bool) -> String {
    if diagnostics {
        error.to_string()
    } else {
        "pipeline creation failed (enable diagnostics for details)".to_string()
    }
}

struct Kernel {
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
}

/// Compiled kernel program with one pipeline per entry point.
pub struct KernelProgram {
    kernels: Vec<Kernel>,
}

impl KernelProgram {
    /// Compile `body` with the given flags.
    pub fn build(
        ctx: &ComputeContext,
        flags: ProgramFlags,
        body: &str,
        diagnostics: bool,
    ) -> Result<Self, GpuError> {
        let source = flags.assemble(body);
        validate_program(&source, diagnostics)?;

        // Backend validation errors surface as `ProgramBuild`.
        let scope = ctx.device().push_error_scope(wgpu::ErrorFilter::Validation);
        let module = ctx
            .device()
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Particle Kernels"),
                source: wgpu::ShaderSource::Wgsl(source.as_str().into()),
            });

        if diagnostics {
            let compilation = pollster::block_on(module.get_compilation_info());
            for message in &compilation.messages {
                warn!("kernel compiler: {:?}: {}", message.message_type, message.message);
            }
        }

        let kernels: Vec<Kernel> = KernelId::ALL
            .iter()
            .map(|&id| {
                let layout =
                    ctx.device()
                        .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                            label: Some(id.entry_point()),
                            entries: &id.layout_entries(),
                        });
                let pipeline_layout =
                    ctx.device()
                        .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                            label: Some(id.entry_point()),
                            bind_group_layouts: &[&layout],
                            ..Default::default()
                        });
                let pipeline =
                    ctx.device()
                        .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                            label: Some(id.entry_point()),
                            layout: Some(&pipeline_layout),
                            module: &module,
                            entry_point: Some(id.entry_point()),
                            compilation_options: Default::default(),
                            cache: None,
                        });
                Kernel { pipeline, layout }
            })
            .collect();
        if let Some(error) = pollster::block_on(scope.pop()) {
            return Err(GpuError::ProgramBuild(summarize_pipeline_error(
                &error,
                diagnostics,
            )));
        }

        info!(
            "Compiled kernel program: {}x{} canvas, {:?} palette",
            flags.window_size, flags.window_size, flags.palette
        );

        Ok(Self { kernels })
    }

    /// Compile the program from `path`, or the embedded program if `None`.
    pub fn load(
        ctx: &ComputeContext,
        flags: ProgramFlags,
        path: Option<&Path>,
        diagnostics: bool,
    ) -> Result<Self, GpuError> {
        match path {
            Some(path) => {
                let body =
                    std::fs::read_to_string(path).map_err(|source| GpuError::KernelSource {
                        path: path.to_path_buf(),
                        source,
                    })?;
                Self::build(ctx, flags, &body, diagnostics)
            }
            None => Self::build(ctx, flags, PARTICLE_PROGRAM, diagnostics),
        }
    }

    /// Record one dispatch of `kernel` over `range` with `args` bound to its
    /// positional slots.
    pub fn enqueue(
        &self,
        ctx: &ComputeContext,
        encoder: &mut wgpu::CommandEncoder,
        kernel: KernelId,
        args: &[&wgpu::Buffer],
        range: IndexRange,
    ) -> Result<(), GpuError> {
        let slots = kernel.bindings();
        if args.len() != slots.len() {
            return Err(GpuError::ArgumentCount {
                kernel: kernel.entry_point(),
                expected: slots.len(),
                found: args.len(),
            });
        }
        if range.shape() != kernel.range_shape() {
            return Err(GpuError::IndexRangeShape {
                kernel: kernel.entry_point(),
                expected: kernel.range_shape(),
            });
        }

        let compiled = &self.kernels[kernel as usize];
        let entries: Vec<wgpu::BindGroupEntry> = slots
            .iter()
            .zip(args)
            .map(|(&binding, buffer)| wgpu::BindGroupEntry {
                binding,
                resource: buffer.as_entire_binding(),
            })
            .collect();
        let bind_group = ctx.device().create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(kernel.entry_point()),
            layout: &compiled.layout,
            entries: &entries,
        });

        let (x, y, z) = range.workgroups(kernel.workgroup_size());
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(kernel.entry_point()),
            timestamp_writes: None,
        });
        pass.set_pipeline(&compiled.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(x, y, z);

        Ok(())
    }
}
