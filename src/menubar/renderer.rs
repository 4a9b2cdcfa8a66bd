//! GPU renderer for the settings window using wgpu and egui.

use anyhow::{Context, Result};
use std::sync::Arc;
use tao::window::Window;

/// Settings panel background (#1e1e1e) in linear space.
const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.0128,
    g: 0.0128,
    b: 0.0128,
    a: 1.0,
};

/// Encapsulates wgpu device, surface, and egui renderer.
pub struct Renderer {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    egui_ctx: egui::Context,
    egui_renderer: egui_wgpu::Renderer,
    scale_factor: f64,
}

impl Renderer {
    /// Create a new renderer for the given window.
    pub fn new(window: &Window) -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        // Create surface from window. The window outlives the renderer:
        // both live in the settings window struct
        let surface = unsafe {
            instance.create_surface_unsafe(wgpu::SurfaceTargetUnsafe::from_window(window)?)
        }?;

        // Request adapter
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::LowPower,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("Failed to find suitable GPU adapter")?;

        // Request device and queue
        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("mdpaste device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
            },
            None,
        ))
        .context("Failed to create GPU device")?;

        let device = Arc::new(device);
        let queue = Arc::new(queue);

        let physical_size = window.inner_size();
        let scale_factor = window.scale_factor();

        // Configure surface, preferring an sRGB format
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .or_else(|| surface_caps.formats.first().copied())
            .context("Surface reports no supported formats")?;

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: physical_size.width.max(1),
            height: physical_size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        // Initialize egui
        let egui_ctx = egui::Context::default();
        egui_ctx.set_pixels_per_point(scale_factor as f32);

        // Dark theme, matching the settings panel colors
        let mut style = (*egui_ctx.style()).clone();
        style.visuals = egui::Visuals::dark();
        egui_ctx.set_style(style);

        // Create egui-wgpu renderer
        let egui_renderer = egui_wgpu::Renderer::new(&device, surface_format, None, 1, false);

        Ok(Self {
            device,
            queue,
            surface,
            surface_config,
            egui_ctx,
            egui_renderer,
            scale_factor,
        })
    }

    /// Get the current scale factor.
    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    /// Resize the surface when the window changes size.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.surface_config.width = width;
            self.surface_config.height = height;
            self.surface.configure(&self.device, &self.surface_config);
        }
    }

    /// Update the scale factor (e.g., when moving between displays).
    pub fn set_scale_factor(&mut self, scale_factor: f64) {
        self.scale_factor = scale_factor;
        self.egui_ctx.set_pixels_per_point(scale_factor as f32);
    }

    /// Render a frame using the provided draw function.
    /// Returns (result, repaint_after) where repaint_after is the duration
    /// egui requests before the next repaint (Duration::MAX if no repaint needed).
    pub fn render<T, F>(
        &mut self,
        input: egui::RawInput,
        draw_fn: F,
    ) -> Result<(T, std::time::Duration)>
    where
        F: FnOnce(&egui::Context) -> T,
    {
        // Get surface texture
        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.surface_config);
                return Err(anyhow::anyhow!("Surface lost, reconfigured"));
            }
            Err(e) => {
                return Err(anyhow::anyhow!("Surface error: {:?}", e));
            }
        };

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        // Run the settings UI for one pass
        self.egui_ctx.begin_pass(input);
        let result = draw_fn(&self.egui_ctx);
        let full_output = self.egui_ctx.end_pass();

        // When egui wants the next repaint (slider drags, hover fades)

        let repaint_after = full_output
            .viewport_output
            .get(&egui::ViewportId::ROOT)
            .map(|vo| vo.repaint_delay)
            .unwrap_or(std::time::Duration::MAX);

        let paint_jobs = self
            .egui_ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);

        // Update textures
        for (id, delta) in &full_output.textures_delta.set {
            self.egui_renderer
                .update_texture(&self.device, &self.queue, *id, delta);
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("settings encoder"),
            });

        // Prepare screen descriptor
        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.surface_config.width, self.surface_config.height],
            pixels_per_point: self.scale_factor as f32,
        };

        // Update buffers
        self.egui_renderer.update_buffers(
            &self.device,
            &self.queue,
            &mut encoder,
            &paint_jobs,
            &screen_descriptor,
        );

        // Render over the panel background color
        {
            let render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("settings render pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            let mut render_pass = render_pass.forget_lifetime();
            self.egui_renderer
                .render(&mut render_pass, &paint_jobs, &screen_descriptor);
        }

        // Submit
        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        // Free textures
        for id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }

        Ok((result, repaint_after))
    }

    /// Perform a warmup render to initialize GPU resources.
    /// This prevents delay the first time Settings... is chosen.
    pub fn warmup<F>(&mut self, draw_fn: F) -> Result<()>
    where
        F: FnOnce(&egui::Context),
    {
        let input = self.create_input();
        let _ = self.render(input, draw_fn)?;
        Ok(())
    }

    /// Create a RawInput with the current screen rect.
    pub fn create_input(&self) -> egui::RawInput {
        egui::RawInput {
            screen_rect: Some(egui::Rect::from_min_size(
                egui::Pos2::ZERO,
                egui::vec2(
                    self.surface_config.width as f32 / self.scale_factor as f32,
                    self.surface_config.height as f32 / self.scale_factor as f32,
                ),
            )),
            ..Default::default()
        }
    }
}
