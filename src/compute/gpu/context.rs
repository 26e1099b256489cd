//! Device Context - Adapter, device and presentation target acquisition.

use super::GpuError;

/// Colour format of the offscreen target used without a window.
const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// Where rendered frames go.
pub enum RenderTarget {
    /// A window surface, configured once at acquisition.
    Surface {
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
    },
    /// An offscreen colour texture (headless runs and tests).
    Offscreen { texture: wgpu::Texture },
}

/// A frame acquired from the render target.
pub struct Frame {
    view: wgpu::TextureView,
    surface_texture: Option<wgpu::SurfaceTexture>,
}

impl Frame {
    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    /// Present the frame. A no-op for offscreen targets.
    pub fn present(self) {
        if let Some(texture) = self.surface_texture {
            texture.present();
        }
    }
}

/// GPU device, queue and render target.
pub struct DeviceContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    adapter_info: wgpu::AdapterInfo,
    target: RenderTarget,
}

impl DeviceContext {
    /// Acquire a device able to present to `target`.
    pub async fn acquire(
        target: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
    ) -> Result<Self, GpuError> {
        let instance = create_instance()?;

        let surface = instance
            .create_surface(target)
            .map_err(|e| GpuError::SurfaceUnavailable(e.to_string()))?;

        let adapter = request_adapter(&instance, Some(&surface)).await?;
        let (device, queue) = request_device(&adapter).await?;

        let config = surface
            .get_default_config(&adapter, width.max(1), height.max(1))
            .ok_or_else(|| {
                GpuError::SurfaceUnavailable("surface is not supported by the adapter".into())
            })?;
        surface.configure(&device, &config);
        log::debug!(
            "Configured surface {}x{} as {:?}",
            config.width,
            config.height,
            config.format
        );

        Ok(Self {
            device,
            queue,
            adapter_info: adapter.get_info(),
            target: RenderTarget::Surface { surface, config },
        })
    }

    /// Acquire a device rendering into an offscreen texture.
    pub async fn headless(width: u32, height: u32) -> Result<Self, GpuError> {
        let instance = create_instance()?;
        let adapter = request_adapter(&instance, None).await?;
        let (device, queue) = request_device(&adapter).await?;
        let texture = create_offscreen_texture(&device, width, height);

        Ok(Self {
            device,
            queue,
            adapter_info: adapter.get_info(),
            target: RenderTarget::Offscreen { texture },
        })
    }

    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.adapter_info
    }

    /// Device capability limits.
    pub fn limits(&self) -> wgpu::Limits {
        self.device.limits()
    }

    /// Colour format of the render target.
    pub fn format(&self) -> wgpu::TextureFormat {
        match &self.target {
            RenderTarget::Surface { config, .. } => config.format,
            RenderTarget::Offscreen { texture } => texture.format(),
        }
    }

    /// Pixel size of the render target.
    pub fn size(&self) -> (u32, u32) {
        match &self.target {
            RenderTarget::Surface { config, .. } => (config.width, config.height),
            RenderTarget::Offscreen { texture } => (texture.width(), texture.height()),
        }
    }

    /// Follow a change of the host window's pixel size. The format is kept.
    pub fn resize(&mut self, width: u32, height: u32) {
        let (width, height) = (width.max(1), height.max(1));
        match &mut self.target {
            RenderTarget::Surface { surface, config } => {
                config.width = width;
                config.height = height;
                surface.configure(&self.device, config);
            }
            RenderTarget::Offscreen { texture } => {
                *texture = create_offscreen_texture(&self.device, width, height);
            }
        }
    }

    /// Acquire the next frame.
    ///
    /// Returns `Ok(None)` when the surface could not provide a frame this
    /// time; the caller skips drawing and retries on the next tick.
    pub fn acquire_frame(&self) -> Result<Option<Frame>, GpuError> {
        match &self.target {
            RenderTarget::Surface { surface, config } => match surface.get_current_texture() {
                Ok(texture) => {
                    let view = texture
                        .texture
                        .create_view(&wgpu::TextureViewDescriptor::default());
                    Ok(Some(Frame {
                        view,
                        surface_texture: Some(texture),
                    }))
                }
                Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                    log::warn!("Surface lost or outdated, reconfiguring");
                    surface.configure(&self.device, config);
                    Ok(None)
                }
                Err(wgpu::SurfaceError::OutOfMemory) => Err(GpuError::OutOfMemory),
                Err(e) => {
                    log::warn!("Skipping frame: {}", e);
                    Ok(None)
                }
            },
            RenderTarget::Offscreen { texture } => Ok(Some(Frame {
                view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
                surface_texture: None,
            })),
        }
    }

    /// Block until all submitted work has finished.
    pub fn wait_idle(&self) {
        if let Err(e) = self.device.poll(wgpu::PollType::wait_indefinitely()) {
            log::warn!("Device poll failed: {}", e);
        }
    }
}

fn create_instance() -> Result<wgpu::Instance, GpuError> {
    if wgpu::Instance::enabled_backend_features().is_empty() {
        return Err(GpuError::UnsupportedPlatform);
    }
    Ok(wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    }))
}

async fn request_adapter(
    instance: &wgpu::Instance,
    surface: Option<&wgpu::Surface<'static>>,
) -> Result<wgpu::Adapter, GpuError> {
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: surface,
            force_fallback_adapter: false,
        })
        .await
        .map_err(|_| GpuError::NoAdapter)?;

    let info = adapter.get_info();
    log::info!("Using adapter {} ({:?})", info.name, info.backend);
    Ok(adapter)
}

async fn request_device(adapter: &wgpu::Adapter) -> Result<(wgpu::Device, wgpu::Queue), GpuError> {
    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("Life GPU"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            ..Default::default()
        })
        .await?;
    Ok((device, queue))
}

fn create_offscreen_texture(device: &wgpu::Device, width: u32, height: u32) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Offscreen Target"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: OFFSCREEN_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    })
}
