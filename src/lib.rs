//! BizPilot - 自然语言业务指令编排
//!
//! 一条自然语言指令经推理引擎规划为若干远端业务工具调用，并发执行（单个失败互不影响），
//! 最后合成一条业务报告并更新性能统计。
//!
//! 模块划分：
//! - **config**: 应用配置（TOML + 环境变量）与持久化的助手设置
//! - **core**: 错误分类、连接状态机、性能统计、指令编排器
//! - **llm**: 推理引擎抽象与实现（OpenAI 兼容 / 脚本化）
//! - **memory**: 对话记忆、用户上下文、消息日志、键值持久化与导出
//! - **planner**: 指令规划
//! - **protocol**: JSON-RPC 信封与远端错误翻译
//! - **suggestions**: 示例指令
//! - **synthesis**: 实体抽取、业务洞察与报告合成
//! - **tools**: 工具目录、参数增强与并发分发

pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod planner;
pub mod protocol;
pub mod suggestions;
pub mod synthesis;
pub mod tools;

pub use crate::core::{AgentError, CommandOrchestrator};
