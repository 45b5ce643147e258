//! AI 解析批量生成：错误分类与分批执行。

pub mod batch;
pub mod classify;

pub use batch::{run_job, should_alert, BatchConfig};
pub use classify::FailureKind;
