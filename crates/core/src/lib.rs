pub mod bundle;
pub mod config;
pub mod engine;
pub mod metrics;
pub mod pool;
pub mod scratch;
pub mod testing;
pub mod transcoder;

pub use bundle::{BundleError, Bundler};
pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config, Config,
    ConfigError, ServerConfig,
};
pub use engine::{
    BatchReport, BatchRequest, BatchResult, Download, EngineConfig, EngineError, JobEngine,
    JobError, JobReport, JobResult, RetryConfig, ValidationError, VideoAsset, WatermarkAsset,
};
pub use pool::{PoolError, PoolStatus, WorkerPool};
pub use scratch::{BatchScratch, JobScratch, ScratchManager};
pub use transcoder::{
    FfmpegTranscoder, OverlayExpr, OverlayRequest, Position, TranscodeError, Transcoder,
    TranscoderConfig,
};
