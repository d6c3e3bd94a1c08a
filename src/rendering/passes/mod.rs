pub mod background_pass;
pub mod ground_pass;

pub use background_pass::BackgroundPass;
pub use ground_pass::GroundPass;
