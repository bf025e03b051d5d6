//! Application event loop.
//!
//! [`App`] owns the tokio runtime, the window's GPU [`Context`], the
//! [`SceneContext`] and the [`Renderer`]. winit drives it through
//! [`ApplicationHandler`]; the asset loader runs on the runtime and reports
//! back through the event loop proxy, so the scene is only ever mutated on
//! the event loop thread.
//!
//! # Lifecycle
//!
//! 1. `resumed` creates the window, bootstraps the scene and the GPU context,
//!    then spawns [`load_assets`]
//! 2. `window_event` feeds input to the orbit controls and handles resizes
//! 3. `RedrawRequested` advances one frame (spin, controls) and renders it
//! 4. `user_event` applies loader progress; precompiled models go straight to
//!    the renderer

use std::sync::Arc;

use instant::{Duration, Instant};
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    window::{Window, WindowId},
};

use crate::{
    config::SceneConfig,
    context::{Context, InitContext},
    data_structures::model::GpuModel,
    loading::{AssetEvent, AssetSink, load_assets},
    render::Renderer,
    resources::FsSource,
    scene::SceneContext,
};

/// Custom events delivered through the winit event loop.
#[derive(Debug)]
pub enum AppEvent {
    Asset(AssetEvent<GpuModel>),
}

/// The loader's end of the asset channel.
#[derive(Clone, Debug)]
pub struct AssetProxy(EventLoopProxy<AppEvent>);

impl AssetSink<GpuModel> for AssetProxy {
    fn send(&self, event: AssetEvent<GpuModel>) -> anyhow::Result<()> {
        self.0
            .send_event(AppEvent::Asset(event))
            .map_err(|_| anyhow::anyhow!("event loop closed"))
    }
}

/// Counts frames and reports the rate once per interval.
#[derive(Debug)]
pub struct FrameTimer {
    interval: Duration,
    window_start: Instant,
    frames: u32,
}

impl FrameTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            window_start: Instant::now(),
            frames: 0,
        }
    }

    /// Record a frame. Returns frames per second whenever an interval elapses.
    pub fn tick(&mut self) -> Option<f64> {
        self.frames += 1;
        let elapsed = self.window_start.elapsed();
        if elapsed < self.interval {
            return None;
        }
        let fps = self.frames as f64 / elapsed.as_secs_f64();
        self.frames = 0;
        self.window_start = Instant::now();
        Some(fps)
    }
}

#[derive(Debug)]
struct AppState {
    ctx: Context,
    scene: SceneContext,
    renderer: Renderer,
}

impl AppState {
    fn resize(&mut self, width: u32, height: u32) {
        match self.scene.resize(width, height) {
            Ok(()) => self.ctx.resize(width, height),
            Err(e) => log::debug!("Ignoring resize: {}", e),
        }
    }
}

pub struct App {
    async_runtime: tokio::runtime::Runtime,
    proxy: EventLoopProxy<AppEvent>,
    config: SceneConfig,
    state: Option<AppState>,
    timer: FrameTimer,
}

impl App {
    fn new(event_loop: &EventLoop<AppEvent>, config: SceneConfig) -> anyhow::Result<Self> {
        let proxy = event_loop.create_proxy();
        let async_runtime = tokio::runtime::Runtime::new()?;
        Ok(Self {
            async_runtime,
            proxy,
            config,
            state: None,
            timer: FrameTimer::new(Duration::from_secs(1)),
        })
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<AppState> {
        let window_attributes = Window::default_attributes().with_title("orbit-demo");
        let window = Arc::new(event_loop.create_window(window_attributes)?);
        let size = window.inner_size();

        let scene = SceneContext::bootstrap(&self.config, size.width, size.height);
        let ctx = self
            .async_runtime
            .block_on(Context::new(window, &self.config, &scene))?;
        let renderer = Renderer::new(&ctx, &scene)?;

        let source = FsSource::new(self.config.assets.root.clone());
        log::info!("Loading assets from {}", source.root().display());
        self.async_runtime.spawn(load_assets(
            source,
            self.config.assets.clone(),
            InitContext::from(&ctx),
            AssetProxy(self.proxy.clone()),
        ));

        ctx.window().request_redraw();
        Ok(AppState {
            ctx,
            scene,
            renderer,
        })
    }
}

impl ApplicationHandler<AppEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        match self.init(event_loop) {
            Ok(state) => self.state = Some(state),
            Err(e) => {
                log::error!("App initialization failed: {:#}", e);
                event_loop.exit();
            }
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: AppEvent) {
        let Some(state) = &mut self.state else {
            return;
        };
        match event {
            AppEvent::Asset(event) => {
                if let Some((id, model)) = state.scene.apply_asset_event(event) {
                    state.renderer.insert_model(id, model);
                }
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        let Some(state) = &mut self.state else {
            return;
        };

        state.scene.handle_input(&event);

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => state.resize(size.width, size.height),
            WindowEvent::RedrawRequested => {
                state.scene.advance_frame();
                match state.renderer.render(&mut state.ctx, &state.scene) {
                    Ok(()) => {
                        if let Some(fps) = self.timer.tick() {
                            log::debug!("{:.1} fps (frame {})", fps, state.scene.frame_count());
                        }
                    }
                    // Reconfigure the surface if it's lost or outdated
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let size = state.ctx.window().inner_size();
                        state.resize(size.width, size.height);
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        log::error!("Out of GPU memory, exiting");
                        event_loop.exit();
                    }
                    Err(e) => {
                        log::error!("Unable to render {}", e);
                    }
                }
                state.ctx.window().request_redraw();
            }
            _ => {}
        }
    }
}

/// Open the window and run until it is closed.
/// Install the `RUST_LOG`-driven logger, defaulting to `info`.
///
/// Call before anything that logs, configuration parsing included.
pub fn init_logger() {
    let env = env_logger::Env::default().default_filter_or("info");
    if let Err(e) = env_logger::Builder::from_env(env).try_init() {
        println!("Warning: Could not initialize logger: {}", e);
    };
}

pub fn run(config: SceneConfig) -> anyhow::Result<()> {
    let event_loop: EventLoop<AppEvent> = EventLoop::with_user_event().build()?;
    let mut app = App::new(&event_loop, config)?;

    event_loop.run_app(&mut app)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_reports_after_each_interval() {
        let mut timer = FrameTimer::new(Duration::from_millis(20));
        assert_eq!(timer.tick(), None);
        std::thread::sleep(Duration::from_millis(25));
        let fps = timer.tick().expect("interval elapsed");
        assert!(fps > 0.0);
        assert_eq!(timer.tick(), None);
    }

    #[test]
    fn logger_accepts_warnings_once_installed() {
        init_logger();
        init_logger();
        assert!(log::log_enabled!(log::Level::Warn));
    }
}
