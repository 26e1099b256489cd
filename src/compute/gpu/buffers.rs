//! Buffer Manager - Grid uniform, ping-pong state buffers and their bind groups.

use super::{DeviceContext, GpuError, ResourceLayout};
use crate::compute::StateRoles;
use crate::schema::Grid;

/// Uniform buffer struct for the grid dimensions.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GridUniform {
    pub width: u32,
    pub height: u32,
    _pad0: u32,
    _pad1: u32,
}

impl GridUniform {
    pub fn new(grid: Grid) -> Self {
        Self {
            width: grid.width,
            height: grid.height,
            _pad0: 0,
            _pad1: 0,
        }
    }
}

/// GPU resources sized for one grid.
///
/// Bind group `i` reads state buffer `StateRoles::for_step(i).input` and
/// writes the other one, so selecting `bind_groups[step % 2]` is all the
/// frame loop ever does.
pub struct GridBuffers {
    grid: Grid,
    config_buffer: Option<wgpu::Buffer>,
    state_buffers: Option<[wgpu::Buffer; 2]>,
    bind_groups: Option<[wgpu::BindGroup; 2]>,
}

impl GridBuffers {
    /// Size in bytes of one state buffer.
    pub fn state_buffer_size(grid: Grid) -> u64 {
        grid.cell_count() as u64 * std::mem::size_of::<u32>() as u64
    }

    /// Allocate the uniform and both state buffers and pair them into bind
    /// groups.
    pub fn create(
        context: &DeviceContext,
        layout: &ResourceLayout,
        grid: Grid,
    ) -> Result<Self, GpuError> {
        let device = &context.device;
        let bytes = Self::state_buffer_size(grid);
        let limits = context.limits();
        let limit = (limits.max_storage_buffer_binding_size as u64).min(limits.max_buffer_size);
        if bytes > limit {
            return Err(GpuError::GridTooLarge {
                width: grid.width,
                height: grid.height,
                bytes,
                limit,
            });
        }

        let config_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Grid Uniforms"),
            size: std::mem::size_of::<GridUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        context
            .queue
            .write_buffer(&config_buffer, 0, bytemuck::bytes_of(&GridUniform::new(grid)));

        let state_buffers = ["Cell State A", "Cell State B"].map(|label| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: bytes,
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_DST
                    | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            })
        });

        let bind_groups = [0u64, 1].map(|step| {
            let roles = StateRoles::for_step(step);
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(if step == 0 {
                    "Cell Bind Group A->B"
                } else {
                    "Cell Bind Group B->A"
                }),
                layout: &layout.bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: ResourceLayout::GRID_BINDING,
                        resource: config_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: ResourceLayout::STATE_IN_BINDING,
                        resource: state_buffers[roles.input].as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: ResourceLayout::STATE_OUT_BINDING,
                        resource: state_buffers[roles.output].as_entire_binding(),
                    },
                ],
            })
        });

        log::debug!(
            "Allocated grid buffers for {}x{} ({} bytes each)",
            grid.width,
            grid.height,
            bytes
        );

        Ok(Self {
            grid,
            config_buffer: Some(config_buffer),
            state_buffers: Some(state_buffers),
            bind_groups: Some(bind_groups),
        })
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    pub fn is_destroyed(&self) -> bool {
        self.state_buffers.is_none()
    }

    /// Write seeded cell values into state buffer A.
    ///
    /// Buffer B is left as is; the first step overwrites every cell of it.
    pub fn upload(&self, queue: &wgpu::Queue, cells: &[u32]) -> Result<(), GpuError> {
        if cells.len() != self.grid.cell_count() {
            return Err(GpuError::SeedSizeMismatch {
                expected: self.grid.cell_count(),
                actual: cells.len(),
            });
        }
        let [state_a, _] = self
            .state_buffers
            .as_ref()
            .ok_or(GpuError::BuffersDestroyed)?;
        queue.write_buffer(state_a, 0, bytemuck::cast_slice(cells));
        Ok(())
    }

    /// Bind group to use at `step`.
    pub fn bind_group(&self, step: u64) -> Result<&wgpu::BindGroup, GpuError> {
        let groups = self.bind_groups.as_ref().ok_or(GpuError::BuffersDestroyed)?;
        Ok(&groups[StateRoles::bind_group_index(step)])
    }

    /// Copy the state that is current at `step` back to the host.
    pub fn read_cells(&self, context: &DeviceContext, step: u64) -> Result<Vec<u32>, GpuError> {
        let state_buffers = self
            .state_buffers
            .as_ref()
            .ok_or(GpuError::BuffersDestroyed)?;
        let source = &state_buffers[StateRoles::for_step(step).input];
        let size = Self::state_buffer_size(self.grid);

        let staging_buffer = context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Staging Buffer"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_buffer_to_buffer(source, 0, &staging_buffer, 0, size);
        context.queue.submit(std::iter::once(encoder.finish()));

        let buffer_slice = staging_buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });

        context.wait_idle();
        rx.recv().map_err(|_| GpuError::ReadbackCancelled)??;

        let cells = {
            let data = buffer_slice.get_mapped_range();
            bytemuck::cast_slice::<u8, u32>(&data).to_vec()
        };
        staging_buffer.unmap();

        Ok(cells)
    }

    /// Release all buffers. Safe to call repeatedly.
    pub fn destroy(&mut self) {
        self.bind_groups = None;
        if let Some(state_buffers) = self.state_buffers.take() {
            for buffer in &state_buffers {
                buffer.destroy();
            }
        }
        if let Some(config_buffer) = self.config_buffer.take() {
            config_buffer.destroy();
        }
    }
}

impl Drop for GridBuffers {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> Option<DeviceContext> {
        match pollster::block_on(DeviceContext::headless(32, 32)) {
            Ok(c) => Some(c),
            Err(GpuError::NoAdapter | GpuError::UnsupportedPlatform) => {
                eprintln!("Skipping GPU test: no adapter available");
                None
            }
            Err(e) => panic!("Failed to acquire GPU context: {:?}", e),
        }
    }

    #[test]
    fn test_grid_uniform_layout() {
        let uniform = GridUniform::new(Grid::new(640, 360).unwrap());
        assert_eq!(std::mem::size_of::<GridUniform>(), 16);
        assert_eq!(&bytemuck::cast_slice::<GridUniform, u32>(&[uniform])[..2], &[640, 360]);
    }

    #[test]
    fn test_state_buffer_size() {
        let grid = Grid::new(100, 50).unwrap();
        assert_eq!(GridBuffers::state_buffer_size(grid), 20_000);
    }

    #[test]
    fn test_upload_and_read_back() {
        let Some(context) = context() else { return };
        let layout = ResourceLayout::build(&context.device);
        let grid = Grid::new(7, 5).unwrap();
        let buffers = GridBuffers::create(&context, &layout, grid).unwrap();

        let cells: Vec<u32> = (0..35).map(|i| (i % 3 == 0) as u32).collect();
        buffers.upload(&context.queue, &cells).unwrap();

        assert_eq!(buffers.read_cells(&context, 0).unwrap(), cells);
        assert_eq!(buffers.read_cells(&context, 2).unwrap(), cells);
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let Some(context) = context() else { return };
        let layout = ResourceLayout::build(&context.device);
        let mut buffers = GridBuffers::create(&context, &layout, Grid::new(8, 8).unwrap()).unwrap();

        assert!(buffers.bind_group(0).is_ok());
        buffers.destroy();
        buffers.destroy();
        assert!(buffers.is_destroyed());
        assert!(matches!(buffers.bind_group(0), Err(GpuError::BuffersDestroyed)));
        assert!(matches!(
            buffers.upload(&context.queue, &[0; 64]),
            Err(GpuError::BuffersDestroyed)
        ));
    }

    #[test]
    fn test_upload_rejects_wrong_length() {
        let Some(context) = context() else { return };
        let layout = ResourceLayout::build(&context.device);
        let buffers = GridBuffers::create(&context, &layout, Grid::new(4, 4).unwrap()).unwrap();

        assert!(matches!(
            buffers.upload(&context.queue, &[1; 15]),
            Err(GpuError::SeedSizeMismatch { expected: 16, actual: 15 })
        ));
    }

    #[test]
    fn test_oversized_grid_is_rejected() {
        let Some(context) = context() else { return };
        let layout = ResourceLayout::build(&context.device);
        let grid = Grid::new(u32::MAX, 16).unwrap();
        assert!(matches!(
            GridBuffers::create(&context, &layout, grid),
            Err(GpuError::GridTooLarge { .. })
        ));
    }
}
