//! Render and compute pipelines built against the shared [`ResourceLayout`].

use super::ResourceLayout;
use crate::compute::WorkgroupSize;

// Embed shader sources at compile time
const CELL_SHADER: &str = include_str!("shaders/cell.wgsl");
const LIFE_SHADER: &str = include_str!("shaders/life.wgsl");

/// Background colour the target is cleared to before each draw.
pub const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.0,
    g: 0.0,
    b: 0.4,
    a: 1.0,
};

/// Two triangles covering one cell in cell-local clip space.
const QUAD_VERTICES: [[f32; 2]; 6] = [
    [-1.0, -1.0],
    [1.0, -1.0],
    [1.0, 1.0],
    [-1.0, -1.0],
    [1.0, 1.0],
    [-1.0, 1.0],
];

/// Instanced cell renderer.
pub struct RenderPipeline {
    pub pipeline: wgpu::RenderPipeline,
    pub vertex_buffer: wgpu::Buffer,
    format: wgpu::TextureFormat,
}

impl RenderPipeline {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &ResourceLayout,
        format: wgpu::TextureFormat,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Cell Shader"),
            source: wgpu::ShaderSource::Wgsl(CELL_SHADER.into()),
        });

        let vertex_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Cell Vertices"),
            size: std::mem::size_of_val(&QUAD_VERTICES) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(&vertex_buffer, 0, bytemuck::cast_slice(&QUAD_VERTICES));

        let vertex_layout = wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<[f32; 2]>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[wgpu::VertexAttribute {
                format: wgpu::VertexFormat::Float32x2,
                offset: 0,
                shader_location: 0,
            }],
        };

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Cell Pipeline"),
            layout: Some(&layout.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vertex_main"),
                compilation_options: Default::default(),
                buffers: &[vertex_layout],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fragment_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        Self {
            pipeline,
            vertex_buffer,
            format,
        }
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    /// Number of vertices per cell instance.
    pub fn vertex_count(&self) -> u32 {
        QUAD_VERTICES.len() as u32
    }
}

/// Transition-rule compute pipeline, specialised for one workgroup tile.
pub struct ComputePipeline {
    pub pipeline: wgpu::ComputePipeline,
    tile: (u32, u32),
}

impl ComputePipeline {
    pub fn new(device: &wgpu::Device, layout: &ResourceLayout, workgroups: &WorkgroupSize) -> Self {
        let tile = (workgroups.x, workgroups.y);
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Life Simulation Shader"),
            source: wgpu::ShaderSource::Wgsl(life_shader_source(tile).into()),
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Simulation Pipeline"),
            layout: Some(&layout.pipeline_layout),
            module: &shader,
            entry_point: Some("compute_main"),
            compilation_options: Default::default(),
            cache: None,
        });

        log::debug!("Built simulation pipeline with {}x{} workgroups", tile.0, tile.1);
        Self { pipeline, tile }
    }

    /// Workgroup tile the kernel was compiled for.
    pub fn tile(&self) -> (u32, u32) {
        self.tile
    }
}

/// Both pipelines of one device context.
pub struct Pipelines {
    pub render: RenderPipeline,
    pub compute: ComputePipeline,
}

impl Pipelines {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &ResourceLayout,
        format: wgpu::TextureFormat,
        workgroups: &WorkgroupSize,
    ) -> Self {
        Self {
            render: RenderPipeline::new(device, queue, layout, format),
            compute: ComputePipeline::new(device, layout, workgroups),
        }
    }

    /// Rebuild the compute pipeline if `workgroups` needs a different tile.
    ///
    /// Returns whether a rebuild happened.
    pub fn ensure_tile(
        &mut self,
        device: &wgpu::Device,
        layout: &ResourceLayout,
        workgroups: &WorkgroupSize,
    ) -> bool {
        if self.compute.tile() == (workgroups.x, workgroups.y) {
            return false;
        }
        self.compute = ComputePipeline::new(device, layout, workgroups);
        true
    }
}

/// Substitute the workgroup tile into the simulation shader.
fn life_shader_source(tile: (u32, u32)) -> String {
    LIFE_SHADER
        .replace("{{TILE_X}}", &tile.0.to_string())
        .replace("{{TILE_Y}}", &tile.1.to_string())
}
