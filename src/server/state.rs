use std::sync::Arc;

use crate::job::JobStore;

/// 应用状态
pub struct AppState {
    /// 扫描任务注册表
    pub jobs: Arc<JobStore>,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(jobs: Arc<JobStore>) -> Arc<Self> {
        Arc::new(AppState { jobs })
    }
}
