pub mod bindings;
pub mod command_buffer;
pub mod compute_program;
pub mod global_uniform;
pub mod imgui_renderer;
pub mod instancing;
pub mod material;
pub mod passes;
pub mod render_camera;
pub mod render_common;
pub mod renderer;
pub mod shader_loader;
pub mod texture;

#[cfg(test)]
pub mod test_support;
