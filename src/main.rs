//! meshdust viewer.
//!
//! Three particle systems: a checkered globe in the middle and two rainbow
//! rings circling it. The rings' model is built on a worker thread and
//! delivered a moment after startup.
//!
//! Controls: drag to orbit, scroll to zoom, Up/Down for influence,
//! Left/Right for strength, `[`/`]` for frequency, `-`/`=` for particle
//! size, Space to pause, S to save the parameters.
//!
//! Pass a JSON file as the first argument to start from saved parameters.

use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use meshdust::gpu::{create_depth_texture, DEPTH_FORMAT};
use meshdust::prelude::*;
use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

const PARAMS_FILE: &str = "meshdust.json";
const GLOBE: &str = "globe";
const RINGS: &str = "rings";

fn demo_params() -> FlowFieldParams {
    FlowFieldParams::default()
        .with_particle_size(0.9)
        .with_influence(0.5)
        .with_strength(4.0)
        .with_frequency(0.5)
}

fn globe() -> ModelAsset {
    let checker = SourceTexture::checkerboard(256, 32, [240, 180, 60, 255], [40, 90, 200, 255]);
    let sphere = primitives::uv_sphere(GLOBE, 1.0, 96, 64)
        .with_material(SourceMaterial::textured(Arc::new(checker)));
    ModelAsset::new(GLOBE).with_mesh(sphere)
}

fn rings() -> ModelAsset {
    let ring = primitives::torus(RINGS, 0.6, 0.15, 128, 32);
    let colors = primitives::rainbow_colors(ring.vertex_count(), 0.8, 1.0);
    ModelAsset::new(RINGS).with_mesh(ring.with_colors(colors))
}

/// Orbit of a ring around the globe at `time`.
fn ring_transform(phase: f32, time: f32) -> Mat4 {
    let angle = time * 0.3 + phase;
    Mat4::from_rotation_y(angle)
        * Mat4::from_translation(Vec3::new(2.2, 0.0, 0.0))
        * Mat4::from_rotation_x(std::f32::consts::FRAC_PI_2)
}

struct Renderer {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    context: Arc<GpuContext>,
    depth: wgpu::TextureView,
}

impl Renderer {
    fn new(window: Arc<Window>) -> Result<Self, GpuError> {
        let size = window.inner_size();
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance.create_surface(window)?;
        let context = Arc::new(pollster::block_on(GpuContext::for_surface(&instance, &surface))?);

        let caps = surface.get_capabilities(&context.adapter);
        let format = caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&context.device, &config);
        let depth = create_depth_texture(&context.device, config.width, config.height);

        Ok(Self {
            surface,
            config,
            context,
            depth,
        })
    }

    fn target(&self) -> RenderTarget {
        RenderTarget::new(self.config.format).with_depth(DEPTH_FORMAT)
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.context.device, &self.config);
            self.depth = create_depth_texture(&self.context.device, width, height);
        }
    }
}

struct App {
    window: Option<Arc<Window>>,
    renderer: Option<Renderer>,
    systems: Vec<ParticleSystem<GpuBackend>>,
    deliveries: Option<Receiver<ModelAsset>>,
    camera: Camera,
    time: Time,
    params: FlowFieldParams,
    mouse_pressed: bool,
    last_mouse_pos: Option<(f64, f64)>,
}

impl App {
    fn new(params: FlowFieldParams) -> Self {
        Self {
            window: None,
            renderer: None,
            systems: Vec::new(),
            deliveries: None,
            camera: Camera::new(),
            time: Time::new(),
            params,
            mouse_pressed: false,
            last_mouse_pos: None,
        }
    }

    fn spawn_systems(&mut self, renderer: &Renderer) {
        let params = self.params;
        let system = |config: ParticleConfig| {
            let backend = GpuBackend::new(renderer.context.clone(), renderer.target());
            ParticleSystem::new(config, backend).with_params(params)
        };

        self.systems = vec![
            system(ParticleConfig::new(GLOBE)),
            system(ParticleConfig::new(RINGS).with_decay_rate(0.5)),
            system(ParticleConfig::new(RINGS).with_decay_rate(0.5)),
        ];

        self.deliver(&globe());

        let (sender, receiver) = mpsc::channel();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(500));
            // The viewer may already be gone.
            let _ = sender.send(rings());
        });
        self.deliveries = Some(receiver);
    }

    fn deliver(&mut self, asset: &ModelAsset) {
        log::info!("model '{}' delivered", asset.handle);
        let viewport = self.viewport();
        for system in &mut self.systems {
            match system.on_asset(asset) {
                Ok(_) | Err(InitError::AssetMismatch { .. }) => {}
                Err(err) => log::error!("{}", err),
            }
            if let Some(viewport) = viewport {
                system.resize(viewport);
            }
        }
    }

    fn viewport(&self) -> Option<Viewport> {
        let window = self.window.as_ref()?;
        let size = window.inner_size();
        Some(Viewport::from_physical(size.width, size.height, window.scale_factor()))
    }

    fn set_params(&mut self, params: FlowFieldParams) {
        if let Err(err) = params.validate() {
            log::warn!("rejected parameters: {}", err);
            return;
        }
        self.params = params;
        for system in &mut self.systems {
            // Already validated above.
            let _ = system.set_params(params);
        }
        log::info!(
            "influence {:.2}, strength {:.2}, frequency {:.2}, size {:.2}",
            params.influence,
            params.strength,
            params.frequency,
            params.particle_size
        );
    }

    fn handle_key(&mut self, code: KeyCode) {
        let p = self.params;
        match code {
            KeyCode::ArrowUp => self.set_params(p.with_influence((p.influence + 0.05).min(1.0))),
            KeyCode::ArrowDown => self.set_params(p.with_influence((p.influence - 0.05).max(0.0))),
            KeyCode::ArrowRight => self.set_params(p.with_strength(p.strength + 0.25)),
            KeyCode::ArrowLeft => self.set_params(p.with_strength((p.strength - 0.25).max(0.0))),
            KeyCode::BracketRight => self.set_params(p.with_frequency(p.frequency * 1.25)),
            KeyCode::BracketLeft => self.set_params(p.with_frequency(p.frequency / 1.25)),
            KeyCode::Equal => self.set_params(p.with_particle_size(p.particle_size * 1.25)),
            KeyCode::Minus => self.set_params(p.with_particle_size(p.particle_size / 1.25)),
            KeyCode::Space => self.time.toggle_pause(),
            KeyCode::KeyS => match self.params.save(PARAMS_FILE) {
                Ok(()) => log::info!("saved parameters to {}", PARAMS_FILE),
                Err(err) => log::error!("{}", err),
            },
            _ => {}
        }
    }

    fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        if let Some(asset) = self.deliveries.as_ref().and_then(|rx| rx.try_recv().ok()) {
            self.deliver(&asset);
        }

        let Some(renderer) = &self.renderer else {
            return Ok(());
        };

        self.time.update();
        let elapsed = self.time.elapsed();
        let rings = self.systems.iter_mut().filter(|s| s.asset().as_str() == RINGS);
        for (i, ring) in rings.enumerate() {
            ring.set_transform(ring_transform(i as f32 * std::f32::consts::PI, elapsed));
        }

        let view_proj = self
            .camera
            .view_proj(renderer.config.width as f32, renderer.config.height as f32);
        for system in &mut self.systems {
            system.frame(&self.time, view_proj);
        }

        let output = renderer.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = renderer
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("meshdust_frame"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("meshdust_render_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.02,
                            g: 0.02,
                            b: 0.05,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &renderer.depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for system in &mut self.systems {
                system.draw(&mut pass);
            }
        }

        renderer.context.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        if let Some(renderer) = &mut self.renderer {
            renderer.resize(width, height);
        }
        if let Some(viewport) = self.viewport() {
            for system in &mut self.systems {
                system.resize(viewport);
            }
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let window_attrs = Window::default_attributes()
            .with_title("meshdust")
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                log::error!("failed to create window: {}", err);
                event_loop.exit();
                return;
            }
        };
        self.window = Some(window.clone());

        match Renderer::new(window) {
            Ok(renderer) => {
                self.spawn_systems(&renderer);
                self.renderer = Some(renderer);
            }
            Err(err) => {
                log::error!("{}", err);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(physical_size) => {
                self.resize(physical_size.width, physical_size.height);
            }
            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(window) = &self.window {
                    let size = window.inner_size();
                    self.resize(size.width, size.height);
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                if code == KeyCode::Escape {
                    event_loop.exit();
                } else {
                    self.handle_key(code);
                }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                if button == MouseButton::Left {
                    self.mouse_pressed = state == ElementState::Pressed;
                    if !self.mouse_pressed {
                        self.last_mouse_pos = None;
                    }
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                if self.mouse_pressed {
                    if let Some((last_x, last_y)) = self.last_mouse_pos {
                        let dx = (position.x - last_x) as f32;
                        let dy = (position.y - last_y) as f32;
                        self.camera.orbit(-dx * 0.005, dy * 0.005);
                    }
                    self.last_mouse_pos = Some((position.x, position.y));
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let scroll = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 * 0.1,
                };
                self.camera.zoom(1.0 - scroll * 0.1);
            }
            WindowEvent::RedrawRequested => {
                match self.render() {
                    Ok(()) => {}
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        if let Some(renderer) = &mut self.renderer {
                            let (width, height) = (renderer.config.width, renderer.config.height);
                            renderer.resize(width, height);
                        }
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => event_loop.exit(),
                    Err(e) => log::warn!("render error: {:?}", e),
                }
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let params = match std::env::args().nth(1) {
        Some(path) => FlowFieldParams::load(&path).unwrap_or_else(|err| {
            log::warn!("{}; using defaults", err);
            demo_params()
        }),
        None => demo_params(),
    };

    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(err) => {
            log::error!("failed to create event loop: {}", err);
            return;
        }
    };
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(params);
    if let Err(err) = event_loop.run_app(&mut app) {
        log::error!("event loop error: {}", err);
    }
}
