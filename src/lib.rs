pub mod app;
pub mod audio;
pub mod capture;
pub mod classify;
pub mod config;
pub mod pipeline;
pub mod visualizer;
