//! GPU context: surface, device and queue plus the resources every frame needs.
//!
//! [`Context`] is owned by the event loop. [`InitContext`] is a cheap clone of
//! the parts the loading task needs to upload models off the main thread; it
//! implements [`Precompile`] so the loader can hand it decoded glTF data.

use std::sync::Arc;

use anyhow::Context as _;
use winit::window::Window;

use crate::{
    camera::CameraResources,
    config::SceneConfig,
    data_structures::{
        fragment::ModelFragment,
        model::{GpuModel, material_layout},
        texture::Texture,
    },
    loading::Precompile,
    pipelines::{
        Layouts, Pipelines,
        background::environment_layout,
        light::{LightResources, LightUniform},
    },
    scene::SceneContext,
};

#[derive(Debug)]
pub struct Context {
    pub(crate) window: Arc<Window>,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub sample_count: u32,
    pub(crate) depth_texture: Texture,
    /// Only present when multisampling.
    pub(crate) msaa_target: Option<Texture>,
    pub camera: CameraResources,
    pub light: LightResources,
    pub pipelines: Pipelines,
    pub material_layout: wgpu::BindGroupLayout,
    pub environment_layout: wgpu::BindGroupLayout,
    pub white: Texture,
    pub clear_colour: wgpu::Color,
}

impl Context {
    pub async fn new(window: Arc<Window>, config: &SceneConfig, scene: &SceneContext) -> anyhow::Result<Self> {
        let viewport = scene.viewport();

        log::info!("WGPU setup");
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .context("cannot create a surface for the window")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no graphics adapter can present to this window")?;
        log::info!("device and queue");
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .context("cannot open the graphics device")?;

        log::info!("Surface");
        let surface_caps = surface.get_capabilities(&adapter);
        // Shaders output linear colour and rely on the surface for sRGB encoding.
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("the surface reports no texture formats")?;
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: viewport.width(),
            height: viewport.height(),
            present_mode: surface_caps.present_modes[0],
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let sample_count = if config.antialias {
            let flags = adapter.get_texture_format_features(surface_format).flags;
            if flags.sample_count_supported(4) {
                4
            } else {
                log::warn!("{:?} cannot be multisampled, antialiasing disabled", surface_format);
                1
            }
        } else {
            1
        };

        let camera = CameraResources::new(&device, &scene.camera);
        let light = LightResources::new(&device, LightUniform::from_scene(&scene.scene));
        let material_layout = material_layout(&device);
        let environment_layout = environment_layout(&device);
        let pipelines = Pipelines::new(
            &device,
            surface_format,
            sample_count,
            &Layouts {
                material: &material_layout,
                camera: &camera.bind_group_layout,
                light: &light.bind_group_layout,
                environment: &environment_layout,
            },
        );

        let depth_texture = Texture::create_depth_texture(
            &device,
            [surface_config.width, surface_config.height],
            sample_count,
            "depth_texture",
        );
        let msaa_target =
            (sample_count > 1).then(|| Texture::create_msaa_target(&device, &surface_config, sample_count));
        let white = Texture::white(&device, &queue);

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config: surface_config,
            sample_count,
            depth_texture,
            msaa_target,
            camera,
            light,
            pipelines,
            material_layout,
            environment_layout,
            white,
            clear_colour: config.clear_colour,
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Reconfigure the surface and rebuild the size-dependent targets.
    ///
    /// Zero sizes are ignored; the surface keeps its previous configuration.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.depth_texture =
            Texture::create_depth_texture(&self.device, [width, height], self.sample_count, "depth_texture");
        if self.sample_count > 1 {
            self.msaa_target = Some(Texture::create_msaa_target(
                &self.device,
                &self.config,
                self.sample_count,
            ));
        }
    }
}

/// Handles needed to upload resources from the loading task.
#[derive(Clone, Debug)]
pub struct InitContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub material_layout: wgpu::BindGroupLayout,
    pub white: Texture,
}

impl From<&Context> for InitContext {
    // wgpu handles are reference counted, so this only clones pointers
    fn from(ctx: &Context) -> Self {
        Self {
            device: ctx.device.clone(),
            queue: ctx.queue.clone(),
            material_layout: ctx.material_layout.clone(),
            white: ctx.white.clone(),
        }
    }
}

impl Precompile for InitContext {
    type Output = GpuModel;

    /// Upload `model` and wait until the queue has executed the uploads.
    async fn precompile(&self, model: &ModelFragment) -> anyhow::Result<GpuModel> {
        let gpu = GpuModel::upload(&self.device, &self.queue, &self.material_layout, &self.white, model)?;

        let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
        self.queue.submit([]);
        self.queue.on_submitted_work_done(move || {
            let _ = tx.send(());
        });
        let device = self.device.clone();
        tokio::task::spawn_blocking(move || device.poll(wgpu::PollType::Wait))
            .await
            .context("device poll task panicked")?
            .context("device lost while uploading a model")?;
        rx.receive()
            .await
            .context("queue dropped before the model upload finished")?;

        log::debug!("Uploaded {} ({} parts)", gpu.name, gpu.parts.len());
        Ok(gpu)
    }
}
