use anyhow::Result;

mod asset_pipeline;
mod camera;
mod config;
mod demo;
mod engine;
mod mesh;
mod rendering;
mod window;

fn main() -> Result<()> {
    pretty_env_logger::init();

    pollster::block_on(window::run())?;

    Ok(())
}
