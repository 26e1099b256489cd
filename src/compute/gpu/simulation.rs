//! GPU Simulation - Owns every GPU resource and drives the frame loop.
//!
//! Resources are built in dependency order: device context, resource
//! layout, grid buffers (seeded), workgroup tiling, pipelines. A grid resize
//! tears down and rebuilds only what depends on the grid; pattern, interval
//! and play changes take lighter paths.

use std::time::Instant;

use super::{CLEAR_COLOR, DeviceContext, GpuError, GridBuffers, Pipelines, ResourceLayout};
use crate::compute::{Scheduler, TickAction, WorkgroupSize};
use crate::schema::{ControlChange, Controls, Grid, PatternSelection, seed_cells};

/// Result of one call to [`GpuSimulation::frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A frame showing the state current at `step` was presented.
    Presented { step: u64, stepped: bool },
    /// No frame could be acquired; any compute step was still submitted.
    Skipped { step: u64, stepped: bool },
    /// Nothing was due this tick.
    Waiting,
    /// Scheduling is stopped (shut down, or halted after a resource error).
    Stopped,
}

/// GPU-resident Life simulation.
pub struct GpuSimulation {
    context: DeviceContext,
    layout: ResourceLayout,
    pipelines: Pipelines,
    buffers: Option<GridBuffers>,
    workgroups: WorkgroupSize,
    scheduler: Scheduler,
}

impl GpuSimulation {
    /// Build all resources for the grid and pattern currently in `controls`.
    pub fn new<C: Controls + ?Sized>(context: DeviceContext, controls: &C) -> Result<Self, GpuError> {
        let grid = controls.grid();
        let layout = ResourceLayout::build(&context.device);
        let workgroups = workgroups_for(grid, &context.limits())?;

        let buffers = GridBuffers::create(&context, &layout, grid)?;
        buffers.upload(&context.queue, &seed_cells(&controls.pattern(), grid))?;

        let pipelines = Pipelines::new(
            &context.device,
            &context.queue,
            &layout,
            context.format(),
            &workgroups,
        );

        log::debug!(
            "Simulation ready: {}x{} grid, {}x{} tiles",
            grid.width,
            grid.height,
            workgroups.x,
            workgroups.y
        );

        Ok(Self {
            context,
            layout,
            pipelines,
            buffers: Some(buffers),
            workgroups,
            scheduler: Scheduler::new(),
        })
    }

    pub fn context(&self) -> &DeviceContext {
        &self.context
    }

    /// Grid of the live buffers, if any.
    pub fn grid(&self) -> Option<Grid> {
        self.buffers.as_ref().map(GridBuffers::grid)
    }

    pub fn workgroups(&self) -> &WorkgroupSize {
        &self.workgroups
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Steps dispatched since the last rebuild or reseed.
    pub fn step(&self) -> u64 {
        self.scheduler.step()
    }

    /// Whether scheduling is stopped until the next grid change.
    pub fn is_halted(&self) -> bool {
        self.buffers.is_none() || self.scheduler.is_cancelled()
    }

    /// React to one control change.
    pub fn handle_change<C: Controls + ?Sized>(
        &mut self,
        change: ControlChange,
        controls: &C,
    ) -> Result<(), GpuError> {
        match change {
            ControlChange::GridResized(grid) => self.rebuild(grid, &controls.pattern()),
            ControlChange::PatternSelected(selection) => self.reseed(&selection),
            // Read live by the scheduler on every tick
            ControlChange::IntervalChanged(_) | ControlChange::PlayingChanged(_) => Ok(()),
        }
    }

    /// Tear down the grid buffers and rebuild them for `grid`.
    ///
    /// On error the simulation stays halted until the next successful
    /// rebuild.
    pub fn rebuild(&mut self, grid: Grid, selection: &PatternSelection) -> Result<(), GpuError> {
        log::debug!("Rebuilding for {}x{} grid", grid.width, grid.height);

        self.scheduler.cancel();
        // Nothing already submitted may still reference the old buffers
        self.context.wait_idle();
        if let Some(mut buffers) = self.buffers.take() {
            buffers.destroy();
        }

        let workgroups = workgroups_for(grid, &self.context.limits())?;
        let buffers = GridBuffers::create(&self.context, &self.layout, grid)?;
        buffers.upload(&self.context.queue, &seed_cells(selection, grid))?;

        self.workgroups = workgroups;
        self.pipelines
            .ensure_tile(&self.context.device, &self.layout, &self.workgroups);

        self.buffers = Some(buffers);
        self.scheduler.reset();
        Ok(())
    }

    /// Write a freshly seeded state into buffer A and restart from step 0.
    pub fn reseed(&mut self, selection: &PatternSelection) -> Result<(), GpuError> {
        let Some(buffers) = &self.buffers else {
            log::warn!("Ignoring pattern change while halted");
            return Ok(());
        };
        log::debug!("Reseeding with {:?}", selection.pattern);

        // Queue writes land after all previously submitted work
        buffers.upload(&self.context.queue, &seed_cells(selection, buffers.grid()))?;
        self.scheduler.reset();
        Ok(())
    }

    /// Follow a change of the presentation target's pixel size.
    pub fn resize_target(&mut self, width: u32, height: u32) {
        self.context.resize(width, height);
        self.scheduler.request_repaint();
    }

    /// Run one scheduler tick for the frame presented at `now`.
    ///
    /// Any compute step and the draw that shows its result go out in one
    /// command buffer, compute first.
    pub fn frame<C: Controls + ?Sized>(
        &mut self,
        now: Instant,
        controls: &C,
    ) -> Result<FrameOutcome, GpuError> {
        let Some(buffers) = &self.buffers else {
            return Ok(FrameOutcome::Stopped);
        };

        let (dispatch_from, draw_step) = match self.scheduler.tick(now, controls) {
            TickAction::Stopped => return Ok(FrameOutcome::Stopped),
            TickAction::Wait => return Ok(FrameOutcome::Waiting),
            TickAction::Draw { step } => (None, step),
            TickAction::StepAndDraw { from } => (Some(from), from + 1),
        };

        let frame = self.context.acquire_frame()?;

        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        if let Some(from) = dispatch_from {
            let (groups_x, groups_y) = self.workgroups.dispatch_counts();
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Simulation Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipelines.compute.pipeline);
            pass.set_bind_group(0, buffers.bind_group(from)?, &[]);
            pass.dispatch_workgroups(groups_x, groups_y, 1);
        }

        if let Some(frame) = &frame {
            let render = &self.pipelines.render;
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Cell Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: frame.view(),
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                ..Default::default()
            });
            pass.set_pipeline(&render.pipeline);
            pass.set_bind_group(0, buffers.bind_group(draw_step)?, &[]);
            pass.set_vertex_buffer(0, render.vertex_buffer.slice(..));
            pass.draw(0..render.vertex_count(), 0..buffers.grid().cell_count() as u32);
        }

        self.context.queue.submit(std::iter::once(encoder.finish()));

        let stepped = dispatch_from.is_some();
        Ok(match frame {
            Some(frame) => {
                frame.present();
                FrameOutcome::Presented {
                    step: draw_step,
                    stepped,
                }
            }
            None => self.skip_draw(draw_step, stepped),
        })
    }

    /// Record a frame that could not be drawn. The next tick repaints the
    /// current step even when paused.
    fn skip_draw(&mut self, step: u64, stepped: bool) -> FrameOutcome {
        self.scheduler.request_repaint();
        FrameOutcome::Skipped { step, stepped }
    }

    /// Copy the current state back to the host.
    pub fn read_cells(&self) -> Result<Vec<u32>, GpuError> {
        let buffers = self.buffers.as_ref().ok_or(GpuError::BuffersDestroyed)?;
        buffers.read_cells(&self.context, self.scheduler.step())
    }

    /// Stop scheduling and release the grid buffers once the queue is idle.
    pub fn shutdown(&mut self) {
        self.scheduler.cancel();
        if let Some(mut buffers) = self.buffers.take() {
            self.context.wait_idle();
            buffers.destroy();
        }
    }
}

/// Tile `grid` for the device, rejecting grids that need more workgroups
/// along one axis than a single dispatch allows.
fn workgroups_for(grid: Grid, limits: &wgpu::Limits) -> Result<WorkgroupSize, GpuError> {
    let workgroups = WorkgroupSize::for_limits(grid, limits);
    let (groups_x, groups_y) = workgroups.dispatch_counts();
    let limit = limits.max_compute_workgroups_per_dimension;
    if groups_x > limit || groups_y > limit {
        return Err(GpuError::TooManyWorkgroups {
            width: grid.width,
            height: grid.height,
            groups_x,
            groups_y,
            limit,
        });
    }
    Ok(workgroups)
}

impl Drop for GpuSimulation {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::{CpuPropagator, LifeState};
    use crate::schema::{ControlStore, Pattern, SimulationConfig, live_count};
    use std::time::Duration;

    fn store(width: u32, height: u32, pattern: Pattern, playing: bool) -> ControlStore {
        ControlStore::new(&SimulationConfig {
            grid: Grid::new(width, height).unwrap(),
            update_interval_ms: 100,
            playing,
            pattern,
        })
        .unwrap()
    }

    fn simulation(controls: &ControlStore) -> Option<GpuSimulation> {
        let context = match pollster::block_on(DeviceContext::headless(64, 64)) {
            Ok(c) => c,
            Err(GpuError::NoAdapter | GpuError::UnsupportedPlatform) => {
                eprintln!("Skipping GPU test: no adapter available");
                return None;
            }
            Err(e) => panic!("Failed to acquire GPU context: {:?}", e),
        };
        Some(GpuSimulation::new(context, controls).unwrap())
    }

    fn ticks(start: Instant, interval: Duration, n: u32) -> impl Iterator<Item = Instant> {
        (1..=n).map(move |i| start + interval * i)
    }

    #[test]
    fn test_frame_zero_paints_seed() {
        let controls = store(16, 16, Pattern::Glider { count: 3 }, true);
        let Some(mut sim) = simulation(&controls) else { return };

        let seed = sim.read_cells().unwrap();
        assert!(live_count(&seed) > 0);

        let outcome = sim.frame(Instant::now(), &controls).unwrap();
        assert_eq!(outcome, FrameOutcome::Presented { step: 0, stepped: false });
        assert_eq!(sim.step(), 0);
        assert_eq!(sim.read_cells().unwrap(), seed);
    }

    #[test]
    fn test_gpu_cpu_equivalence() {
        // Not a multiple of any tile, so partial workgroups are exercised
        let controls = store(37, 23, Pattern::Random, true);
        let Some(mut sim) = simulation(&controls) else { return };

        let grid = controls.grid();
        let mut cpu_state = LifeState::from_cells(grid, sim.read_cells().unwrap()).unwrap();
        let mut cpu = CpuPropagator::new(grid);

        let t0 = Instant::now();
        sim.frame(t0, &controls).unwrap();

        for (i, now) in ticks(t0, controls.update_interval(), 12).enumerate() {
            let outcome = sim.frame(now, &controls).unwrap();
            assert_eq!(
                outcome,
                FrameOutcome::Presented {
                    step: i as u64 + 1,
                    stepped: true
                }
            );
            cpu.step(&mut cpu_state);
            assert_eq!(sim.read_cells().unwrap(), cpu_state.cells, "step {}", i + 1);
        }
    }

    #[test]
    fn test_wraparound_on_gpu() {
        // Block split over the four corners is stable only on a torus
        let controls = store(9, 6, Pattern::Blank, true);
        let Some(mut sim) = simulation(&controls) else { return };
        let grid = controls.grid();

        let block = LifeState::with_live_cells(grid, &[(0, 0), (8, 0), (0, 5), (8, 5)]);
        sim.buffers.as_ref().unwrap().upload(&sim.context.queue, &block.cells).unwrap();

        let t0 = Instant::now();
        sim.frame(t0, &controls).unwrap();
        for now in ticks(t0, controls.update_interval(), 3) {
            sim.frame(now, &controls).unwrap();
        }
        assert_eq!(sim.step(), 3);
        assert_eq!(sim.read_cells().unwrap(), block.cells);
    }

    #[test]
    fn test_paused_never_dispatches() {
        let controls = store(16, 16, Pattern::Random, false);
        let Some(mut sim) = simulation(&controls) else { return };
        let seed = sim.read_cells().unwrap();

        let t0 = Instant::now();
        sim.frame(t0, &controls).unwrap();
        for now in ticks(t0, Duration::from_secs(1), 5) {
            assert_eq!(sim.frame(now, &controls).unwrap(), FrameOutcome::Waiting);
        }
        assert_eq!(sim.step(), 0);
        assert_eq!(sim.read_cells().unwrap(), seed);
    }

    #[test]
    fn test_grid_resize_rebuilds_and_resets() {
        let mut controls = store(16, 16, Pattern::Random, true);
        let Some(mut sim) = simulation(&controls) else { return };

        let t0 = Instant::now();
        sim.frame(t0, &controls).unwrap();
        for now in ticks(t0, controls.update_interval(), 3) {
            sim.frame(now, &controls).unwrap();
        }
        assert_eq!(sim.step(), 3);

        controls.select_pattern(Pattern::Blank);
        controls.set_grid(Grid::new(5, 3).unwrap()).unwrap();
        for change in controls.take_changes() {
            sim.handle_change(change, &controls).unwrap();
        }

        assert_eq!(sim.grid(), Some(Grid::new(5, 3).unwrap()));
        assert_eq!(sim.step(), 0);
        assert_eq!((sim.workgroups().x, sim.workgroups().y), (5, 3));
        assert_eq!(sim.read_cells().unwrap(), vec![0; 15]);

        let t1 = t0 + Duration::from_secs(10);
        assert_eq!(
            sim.frame(t1, &controls).unwrap(),
            FrameOutcome::Presented { step: 0, stepped: false }
        );
    }

    #[test]
    fn test_pattern_change_reseeds_without_rebuild() {
        let mut controls = store(12, 12, Pattern::Random, true);
        let Some(mut sim) = simulation(&controls) else { return };

        let t0 = Instant::now();
        sim.frame(t0, &controls).unwrap();
        sim.frame(t0 + controls.update_interval(), &controls).unwrap();
        assert_eq!(sim.step(), 1);

        controls.select_pattern(Pattern::Blank);
        for change in controls.take_changes() {
            sim.handle_change(change, &controls).unwrap();
        }
        assert_eq!(sim.step(), 0);
        assert_eq!(live_count(&sim.read_cells().unwrap()), 0);
        assert_eq!(sim.grid(), Some(controls.grid()));
    }

    #[test]
    fn test_interval_and_play_changes_need_no_gpu_work() {
        let mut controls = store(8, 8, Pattern::Random, false);
        let Some(mut sim) = simulation(&controls) else { return };

        controls.set_playing(true);
        controls.set_update_interval(Duration::from_millis(500));
        for change in controls.take_changes() {
            sim.handle_change(change, &controls).unwrap();
        }
        assert_eq!(sim.step(), 0);
        assert_eq!(sim.scheduler().phase(), crate::compute::SchedulerPhase::Idle);
    }

    #[test]
    fn test_failed_rebuild_halts_until_next_resize() {
        let controls = store(8, 8, Pattern::Random, true);
        let Some(mut sim) = simulation(&controls) else { return };

        // Tiles fine, but one state buffer exceeds the storage binding limit
        let huge = Grid::new(16384, 8192).unwrap();
        assert!(matches!(
            sim.rebuild(huge, &controls.pattern()),
            Err(GpuError::GridTooLarge { .. })
        ));
        assert!(sim.is_halted());
        assert_eq!(
            sim.frame(Instant::now(), &controls).unwrap(),
            FrameOutcome::Stopped
        );

        sim.rebuild(Grid::new(8, 8).unwrap(), &controls.pattern()).unwrap();
        assert!(!sim.is_halted());
        assert_eq!(
            sim.frame(Instant::now(), &controls).unwrap(),
            FrameOutcome::Presented { step: 0, stepped: false }
        );
    }

    #[test]
    fn test_workgroups_for_rejects_oversized_dispatch() {
        let limits = wgpu::Limits::default();
        let max = limits.max_compute_workgroups_per_dimension;

        let fits = workgroups_for(Grid::new(1024, 1024).unwrap(), &limits).unwrap();
        let (gx, gy) = fits.dispatch_counts();
        assert!(gx <= max && gy <= max);

        // One row is tiled one cell high, so the width alone sets the dispatch
        let thin = Grid::new(1 << 24, 1).unwrap();
        assert!(matches!(
            workgroups_for(thin, &limits),
            Err(GpuError::TooManyWorkgroups { height: 1, groups_y: 1, .. })
        ));
    }

    #[test]
    fn test_thin_grid_is_rejected_before_dispatch() {
        let controls = store(8, 8, Pattern::Blank, true);
        let Some(mut sim) = simulation(&controls) else { return };

        let thin = Grid::new(1 << 24, 1).unwrap();
        assert!(matches!(
            sim.rebuild(thin, &controls.pattern()),
            Err(GpuError::TooManyWorkgroups { .. })
        ));
        assert!(sim.is_halted());
        assert_eq!(
            sim.frame(Instant::now(), &controls).unwrap(),
            FrameOutcome::Stopped
        );

        let context = match pollster::block_on(DeviceContext::headless(16, 16)) {
            Ok(c) => c,
            Err(e) => panic!("Failed to acquire GPU context: {:?}", e),
        };
        let thin_controls = store(1 << 24, 1, Pattern::Blank, true);
        assert!(matches!(
            GpuSimulation::new(context, &thin_controls),
            Err(GpuError::TooManyWorkgroups { .. })
        ));
    }

    #[test]
    fn test_skipped_draw_is_retried_while_paused() {
        let controls = store(12, 12, Pattern::Glider { count: 2 }, false);
        let Some(mut sim) = simulation(&controls) else { return };

        let t0 = Instant::now();
        assert_eq!(sim.scheduler.tick(t0, &controls), TickAction::Draw { step: 0 });
        assert_eq!(
            sim.skip_draw(0, false),
            FrameOutcome::Skipped { step: 0, stepped: false }
        );

        let t1 = t0 + Duration::from_secs(5);
        assert_eq!(
            sim.frame(t1, &controls).unwrap(),
            FrameOutcome::Presented { step: 0, stepped: false }
        );
        assert_eq!(
            sim.frame(t1 + Duration::from_secs(5), &controls).unwrap(),
            FrameOutcome::Waiting
        );
        assert_eq!(sim.step(), 0);
    }

    #[test]
    fn test_shutdown_stops_scheduling() {
        let controls = store(8, 8, Pattern::Random, true);
        let Some(mut sim) = simulation(&controls) else { return };

        sim.shutdown();
        sim.shutdown();
        assert_eq!(
            sim.frame(Instant::now(), &controls).unwrap(),
            FrameOutcome::Stopped
        );
        assert!(matches!(sim.read_cells(), Err(GpuError::BuffersDestroyed)));
    }
}
