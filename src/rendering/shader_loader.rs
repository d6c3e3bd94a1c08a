use std::{
    path::Path,
    sync::{
        mpsc::{self, channel, Sender},
        Arc, RwLock,
    },
    time::Duration,
};

use anyhow::Context;
use id_arena::{Arena, Id};
use naga::{
    back::wgsl::WriterFlags,
    valid::{Capabilities, ValidationFlags},
};
use naga_oil::compose::{
    ComposableModuleDescriptor, Composer, NagaModuleDescriptor, ShaderLanguage,
};
use notify_debouncer_mini::{
    new_debouncer_opt,
    notify::{RecommendedWatcher, RecursiveMode, Watcher},
    DebounceEventResult, DebouncedEventKind, Debouncer,
};
use pollster::block_on;
use wgpu::PollType;

pub const SHADER_FOLDER: &'static str = "assets/shaders";
const SHADER_SHADER_MODULES_FOLDER: &'static str = "assets/shaders/shared";

pub type PipelineFactory<P> =
    Box<dyn Sync + Send + Fn(&wgpu::Device, &ShaderDefinition, &str) -> anyhow::Result<P>>;

#[derive(Debug, Clone)]
pub struct ShaderDefinition {
    pub name: &'static str,
    pub path: &'static str,
}

pub struct ShaderEntry<P> {
    pipeline_id: PipelineId<P>,
    def: ShaderDefinition,
    factory: PipelineFactory<P>,
}

impl<P> ShaderEntry<P> {
    pub fn new(
        pipeline_id: PipelineId<P>,
        def: ShaderDefinition,
        factory: PipelineFactory<P>,
    ) -> Self {
        Self {
            pipeline_id,
            def,
            factory,
        }
    }
}

pub type PipelineId<P> = Id<PipelineCacheEntry<P>>;
pub type RenderPipelineId = PipelineId<wgpu::RenderPipeline>;
pub type ComputePipelineId = PipelineId<wgpu::ComputePipeline>;

pub struct PipelineCacheEntry<P>(Option<P>);

impl<P> Default for PipelineCacheEntry<P> {
    fn default() -> Self {
        Self(None)
    }
}

impl<P> PipelineCacheEntry<P> {
    pub fn set_pipeline(&mut self, pipeline: P) {
        self.0 = Some(pipeline);
    }
}

pub struct PipelineCacheBuilder<P> {
    shaders: Arena<ShaderEntry<P>>,
    pipelines: Arena<PipelineCacheEntry<P>>,
}

impl<P> PipelineCacheBuilder<P> {
    pub fn new() -> Self {
        Self {
            shaders: Arena::new(),
            pipelines: Arena::new(),
        }
    }

    pub fn add_shader(
        &mut self,
        shader_def: ShaderDefinition,
        factory: PipelineFactory<P>,
    ) -> PipelineId<P> {
        let pipeline_id = self.pipelines.alloc(PipelineCacheEntry::default());
        let shader_entry = ShaderEntry::new(pipeline_id, shader_def, factory);
        self.shaders.alloc(shader_entry);
        pipeline_id
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn build(self) -> PipelineCache<P> {
        PipelineCache {
            shaders: Arc::new(self.shaders),
            pipelines: self.pipelines,
        }
    }
}

pub struct PipelineCache<P> {
    shaders: Arc<Arena<ShaderEntry<P>>>,
    pipelines: Arena<PipelineCacheEntry<P>>,
}

pub type RenderPipelineCache = PipelineCache<wgpu::RenderPipeline>;
pub type ComputePipelineCache = PipelineCache<wgpu::ComputePipeline>;

impl<P> PipelineCache<P> {
    /// Returns `None` until the pipeline has been compiled successfully at least once.
    pub fn get(&self, id: PipelineId<P>) -> Option<&P> {
        self.pipelines.get(id).and_then(|entry| entry.0.as_ref())
    }

    fn set(&mut self, id: PipelineId<P>, pipeline: P) {
        if let Some(entry) = self.pipelines.get_mut(id) {
            entry.set_pipeline(pipeline);
        }
    }

    pub fn iter_shaders_and_pipelines_mut(
        &mut self,
    ) -> impl Iterator<Item = (&ShaderEntry<P>, &mut PipelineCacheEntry<P>)> {
        // Both arenas are filled by add_shader in lockstep, so their indices line up.
        self.shaders
            .iter()
            .map(|(_, shader_entry)| shader_entry)
            .zip(
                self.pipelines
                    .iter_mut()
                    .map(|(_, pipeline_entry)| pipeline_entry),
            )
    }
}

type ReloadedPipeline<P> = (&'static str, PipelineId<P>, P);

// Loads and compiles shaders to pipelines, recompiling them in the watcher thread when
// the files change.
pub struct ShaderLoader {
    pub render_cache: RenderPipelineCache,
    pub compute_cache: ComputePipelineCache,
    device: wgpu::Device,
    render_receiver: mpsc::Receiver<ReloadedPipeline<wgpu::RenderPipeline>>,
    compute_receiver: mpsc::Receiver<ReloadedPipeline<wgpu::ComputePipeline>>,
    composer: Arc<RwLock<Composer>>,
    _debouncer: Debouncer<RecommendedWatcher>,
}

impl ShaderLoader {
    pub fn new(
        device: wgpu::Device,
        render_builder: PipelineCacheBuilder<wgpu::RenderPipeline>,
        compute_builder: PipelineCacheBuilder<wgpu::ComputePipeline>,
    ) -> anyhow::Result<Self> {
        let render_cache = render_builder.build();
        let compute_cache = compute_builder.build();

        let (send_render, recv_render) = channel();
        let (send_compute, recv_compute) = channel();

        let composer = Arc::new(RwLock::new(create_composer()?));

        let device_loader = device.clone();
        let render_shaders = render_cache.shaders.clone();
        let compute_shaders = compute_cache.shaders.clone();
        let composer_clone = composer.clone();

        let mut debouncer: Debouncer<RecommendedWatcher> = new_debouncer_opt(
            notify_debouncer_mini::Config::default().with_timeout(Duration::from_millis(100)),
            move |res: DebounceEventResult| match res {
                Ok(events) => {
                    for event in events {
                        if event.kind != DebouncedEventKind::Any {
                            continue;
                        }

                        recompile_matching(
                            &device_loader,
                            &render_shaders,
                            &event.path,
                            &composer_clone,
                            &send_render,
                        );
                        recompile_matching(
                            &device_loader,
                            &compute_shaders,
                            &event.path,
                            &composer_clone,
                            &send_compute,
                        );
                    }
                }
                Err(e) => log::error!("Error debouncing shader changes: {}", e),
            },
        )
        .context("Failed to create shader file watcher")?;

        let absolute_shader_folder = Path::new(SHADER_FOLDER)
            .canonicalize()
            .context("Shader folder not found")?;

        debouncer
            .watcher()
            .watch(&absolute_shader_folder, RecursiveMode::Recursive)
            .context("Failed to watch shader folder")?;

        let mut shader_loader = Self {
            device,
            render_cache,
            compute_cache,
            render_receiver: recv_render,
            compute_receiver: recv_compute,
            composer,
            _debouncer: debouncer,
        };

        shader_loader.create_all_pipelines()?;

        Ok(shader_loader)
    }

    pub fn create_all_pipelines(&mut self) -> anyhow::Result<()> {
        create_pipelines(&self.device, &mut self.render_cache, &self.composer)?;
        create_pipelines(&self.device, &mut self.compute_cache, &self.composer)?;
        Ok(())
    }

    pub fn load_pending_shaders(&mut self) {
        while let Ok((name, pipeline_id, pipeline)) = self.render_receiver.try_recv() {
            log::info!("Shader reloaded: {}", name);
            self.render_cache.set(pipeline_id, pipeline);
        }

        while let Ok((name, pipeline_id, pipeline)) = self.compute_receiver.try_recv() {
            log::info!("Compute shader reloaded: {}", name);
            self.compute_cache.set(pipeline_id, pipeline);
        }
    }
}

fn create_pipelines<P>(
    device: &wgpu::Device,
    cache: &mut PipelineCache<P>,
    composer: &Arc<RwLock<Composer>>,
) -> anyhow::Result<()> {
    for (shader, pipeline_entry) in cache.iter_shaders_and_pipelines_mut() {
        let pipeline = compile_file(device, &shader.def, &shader.factory, composer)
            .context(format!("Failed to compile shader: {}", shader.def.name))?;
        pipeline_entry.set_pipeline(pipeline);
    }
    Ok(())
}

fn recompile_matching<P>(
    device: &wgpu::Device,
    shaders: &Arena<ShaderEntry<P>>,
    changed_path: &Path,
    composer: &Arc<RwLock<Composer>>,
    sender: &Sender<ReloadedPipeline<P>>,
) {
    // One file can back several pipelines (material passes, kernels).
    for (_, entry) in shaders
        .iter()
        .filter(|(_, entry)| changed_path.ends_with(entry.def.path))
    {
        match compile_file(device, &entry.def, &entry.factory, composer) {
            Ok(pipeline) => {
                if sender
                    .send((entry.def.name, entry.pipeline_id, pipeline))
                    .is_err()
                {
                    return;
                }
            }
            Err(e) => log::error!("Failed to load shader: {:?}", e),
        }
    }
}

fn compose_module(
    shader_def: &ShaderDefinition,
    composer: &mut Composer,
) -> anyhow::Result<naga::Module> {
    let path = Path::new(SHADER_FOLDER).join(shader_def.path);
    let shader_code = std::fs::read_to_string(&path)
        .map_err(|e| anyhow::anyhow!("Failed to read shader file {}: {}", path.display(), e))?;

    let file_path = path.to_string_lossy().to_string();

    composer
        .make_naga_module(NagaModuleDescriptor {
            file_path: &file_path,
            source: &shader_code,
            ..Default::default()
        })
        .context("Failed to create Naga module from shader code")
}

/// Composes a shader with the shared modules and returns the resulting naga module.
pub fn parse_shader(shader_def: &ShaderDefinition) -> anyhow::Result<naga::Module> {
    let mut composer = create_composer()?;
    compose_module(shader_def, &mut composer)
}

fn compile_file<P>(
    device: &wgpu::Device,
    shader_def: &ShaderDefinition,
    factory: &PipelineFactory<P>,
    composer: &Arc<RwLock<Composer>>,
) -> anyhow::Result<P> {
    let module = {
        let mut composer = composer
            .write()
            .map_err(|_| anyhow::anyhow!("Shader composer lock poisoned"))?;
        compose_module(shader_def, &mut composer)?
    };

    // We don't need to validate, because wgpu runs the validator internally.
    let validation_flags = ValidationFlags::empty();
    let info = naga::valid::Validator::new(validation_flags, Capabilities::all())
        .validate(&module)
        .context("Failed to validate Naga module")?;

    let shader_code = naga::back::wgsl::write_string(&module, &info, WriterFlags::empty())
        .context("Failed to convert Naga module to WGSL string")?;

    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let pipeline = factory(device, shader_def, &shader_code);

    device
        .poll(PollType::Wait)
        .context("Failed to poll device after shader compilation.")?;

    let error = block_on(device.pop_error_scope());

    if let Some(error) = error {
        return Err(anyhow::anyhow!(
            "Shader compilation failed for {}: {}",
            shader_def.name,
            error
        ));
    };

    pipeline
}

fn create_composer() -> anyhow::Result<Composer> {
    let shared_files = std::fs::read_dir(SHADER_SHADER_MODULES_FOLDER)
        .context("Failed to read shared shader modules directory")?;
    let mut composer = Composer::default();

    for entry in shared_files {
        let entry = entry.context("Failed to read entry in shared shader modules directory")?;
        let path = entry.path();

        if !path.is_file() || path.extension().map_or(true, |ext| ext != "wgsl") {
            continue;
        }

        let source = std::fs::read_to_string(&path)
            .context("Failed to read shared shader module file")?;

        let file_path = path.to_string_lossy().to_string();

        composer
            .add_composable_module(ComposableModuleDescriptor {
                source: &source,
                file_path: &file_path,
                language: ShaderLanguage::Wgsl,
                ..Default::default()
            })
            .context(format!("Failed to add shared shader module: {}", file_path))?;
    }

    Ok(composer)
}

#[cfg(test)]
mod tests {
    use super::*;

    const INSTANCE_UPDATE: ShaderDefinition = ShaderDefinition {
        name: "Instance update",
        path: "instance_update.wgsl",
    };

    fn unused_factory() -> PipelineFactory<wgpu::ComputePipeline> {
        Box::new(|_: &wgpu::Device, _: &ShaderDefinition, _: &str| {
            Err(anyhow::anyhow!("never compiled in this test"))
        })
    }

    #[test]
    fn builder_hands_out_distinct_ids() {
        let mut builder = PipelineCacheBuilder::<wgpu::ComputePipeline>::new();
        let a = builder.add_shader(INSTANCE_UPDATE, unused_factory());
        let b = builder.add_shader(INSTANCE_UPDATE, unused_factory());

        assert_ne!(a, b);
        assert_eq!(builder.len(), 2);

        let cache = builder.build();
        assert!(cache.get(a).is_none());
    }

    #[test]
    fn composes_kernel_with_shared_modules() {
        let module = parse_shader(&INSTANCE_UPDATE).expect("kernel should compose");
        assert!(module
            .entry_points
            .iter()
            .any(|entry| entry.name == "CSMain" && entry.stage == naga::ShaderStage::Compute));
    }
}
