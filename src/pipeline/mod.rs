pub mod driver;

pub use driver::{CancelToken, FramePair, OnReadError, PipelineDriver, PipelineStats};
