pub mod service;

pub use service::PipelineService;
