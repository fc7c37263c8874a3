//! 性能统计：指令总数、成功数、平均 / 最近一次响应耗时

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub total_commands: u64,
    pub successful_commands: u64,
    pub average_response_time_ms: f64,
    pub last_command_time_ms: u64,
}

impl PerformanceMetrics {
    /// 每条指令结束后调用（成功或失败都计入平均值）
    pub fn record(&mut self, elapsed_ms: u64, success: bool) {
        self.total_commands += 1;
        if success {
            self.successful_commands += 1;
        }
        let n = self.total_commands as f64;
        self.average_response_time_ms =
            (self.average_response_time_ms * (n - 1.0) + elapsed_ms as f64) / n;
        self.last_command_time_ms = elapsed_ms;
    }

    /// 成功率（百分比），无指令时为 0
    pub fn success_rate(&self) -> f64 {
        if self.total_commands == 0 {
            0.0
        } else {
            self.successful_commands as f64 * 100.0 / self.total_commands as f64
        }
    }
}
