pub mod collisions;
pub mod list;
pub mod status;
