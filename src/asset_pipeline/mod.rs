pub mod generate_tangents;
