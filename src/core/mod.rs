pub mod bounds;
pub mod config;
pub mod constants;
pub mod geo;
pub mod map;
pub mod map_core;
pub mod viewport;
