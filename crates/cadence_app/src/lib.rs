pub mod app;
pub mod timeline;
