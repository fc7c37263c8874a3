//! 应用配置：从 config/default.toml 与环境变量加载；另含用户可编辑、持久化的助手设置
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `BIZPILOT__*` 覆盖（双下划线表示嵌套，如 `BIZPILOT__REMOTE__TIMEOUT_SECS=10`）。
//! AssistantSettings（令牌、租户、开关）经 KeyValueStore 持久化，不进 TOML。

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub remote: RemoteSection,
    pub llm: LlmSection,
    pub dispatch: DispatchSection,
    pub synthesis: SynthesisSection,
}

/// [app] 段：数据目录、对话记忆上限、prompt 窗口
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: Option<String>,
    /// 持久化目录，未设置时用 ./data
    pub data_dir: Option<PathBuf>,
    /// 对话记忆最多保留的条目数
    pub history_limit: usize,
    /// 规划 / 合成 prompt 中带入的最近条目数
    pub prompt_window: usize,
    /// UserContext 中每类实体最多保留数
    pub context_entity_cap: usize,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            data_dir: None,
            history_limit: 20,
            prompt_window: 6,
            context_entity_cap: 5,
        }
    }
}

pub const DEFAULT_REMOTE_ENDPOINT: &str = "https://services.leadconnectorhq.com/mcp/";

/// [remote] 段：业务系统端点、协议版本、单次调用超时、租户头名
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RemoteSection {
    pub endpoint: String,
    pub protocol_version: String,
    pub timeout_secs: u64,
    pub tenant_header: String,
}

impl Default for RemoteSection {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_REMOTE_ENDPOINT.to_string(),
            protocol_version: "2.0".to_string(),
            timeout_secs: 30,
            tenant_header: "locationId".to_string(),
        }
    }
}

/// [llm] 段：推理端点、模型、超时与采样参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub base_url: Option<String>,
    pub model: String,
    pub request_timeout_secs: u64,
    pub planner_temperature: f32,
    pub planner_max_tokens: u32,
    pub synthesis_temperature: f32,
    pub synthesis_max_tokens: u32,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            base_url: None,
            model: "gpt-4".to_string(),
            request_timeout_secs: 60,
            planner_temperature: 0.1,
            planner_max_tokens: 1000,
            synthesis_temperature: 0.3,
            synthesis_max_tokens: 600,
        }
    }
}

/// [dispatch] 段：分页默认值
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatchSection {
    pub default_limit: u64,
    pub default_offset: u64,
}

impl Default for DispatchSection {
    fn default() -> Self {
        Self {
            default_limit: 50,
            default_offset: 0,
        }
    }
}

/// [synthesis] 段：是否用推理引擎生成报告、「近期」天数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SynthesisSection {
    pub use_engine: bool,
    pub recency_days: i64,
}

impl Default for SynthesisSection {
    fn default() -> Self {
        Self {
            use_engine: true,
            recency_days: 7,
        }
    }
}

/// 从 config 目录加载配置，环境变量 BIZPILOT__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 BIZPILOT__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("BIZPILOT")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

/// 用户设置（持久化于 KeyValueStore，camelCase JSON）
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AssistantSettings {
    pub business_token: String,
    pub tenant_id: String,
    pub reasoning_api_key: String,
    pub voice_enabled: bool,
    pub auto_confirm: bool,
    pub theme: String,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            business_token: String::new(),
            tenant_id: String::new(),
            reasoning_api_key: String::new(),
            voice_enabled: true,
            auto_confirm: false,
            theme: "dark".to_string(),
        }
    }
}

impl fmt::Debug for AssistantSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssistantSettings")
            .field("business_token", &redact(&self.business_token))
            .field("tenant_id", &self.tenant_id)
            .field("reasoning_api_key", &redact(&self.reasoning_api_key))
            .field("voice_enabled", &self.voice_enabled)
            .field("auto_confirm", &self.auto_confirm)
            .field("theme", &self.theme)
            .finish()
    }
}

/// 设置的部分更新：None 表示保持原值
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SettingsPatch {
    pub business_token: Option<String>,
    pub tenant_id: Option<String>,
    pub reasoning_api_key: Option<String>,
    pub voice_enabled: Option<bool>,
    pub auto_confirm: Option<bool>,
    pub theme: Option<String>,
}

impl AssistantSettings {
    /// 业务令牌与推理 Key 均已配置
    pub fn is_configured(&self) -> bool {
        !self.business_token.trim().is_empty() && !self.reasoning_api_key.trim().is_empty()
    }

    pub fn apply(&mut self, patch: SettingsPatch) {
        if let Some(v) = patch.business_token {
            self.business_token = v;
        }
        if let Some(v) = patch.tenant_id {
            self.tenant_id = v;
        }
        if let Some(v) = patch.reasoning_api_key {
            self.reasoning_api_key = v;
        }
        if let Some(v) = patch.voice_enabled {
            self.voice_enabled = v;
        }
        if let Some(v) = patch.auto_confirm {
            self.auto_confirm = v;
        }
        if let Some(v) = patch.theme {
            self.theme = v;
        }
    }

    /// 用环境变量填充空字段（BIZPILOT_BUSINESS_TOKEN / BIZPILOT_TENANT_ID / OPENAI_API_KEY）
    pub fn fill_from_env(&mut self) {
        fill(&mut self.business_token, "BIZPILOT_BUSINESS_TOKEN");
        fill(&mut self.tenant_id, "BIZPILOT_TENANT_ID");
        fill(&mut self.reasoning_api_key, "OPENAI_API_KEY");
    }

    /// 当前设置的凭据快照（指令执行期间只读）
    pub fn credentials(&self) -> Credentials {
        Credentials {
            business_token: non_empty(&self.business_token),
            tenant_id: non_empty(&self.tenant_id),
            reasoning_key: non_empty(&self.reasoning_api_key),
        }
    }
}

fn fill(field: &mut String, var: &str) {
    if field.trim().is_empty() {
        if let Ok(v) = std::env::var(var) {
            *field = v;
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn redact(s: &str) -> &'static str {
    if s.is_empty() {
        "<unset>"
    } else {
        "[REDACTED]"
    }
}

/// 单条指令使用的凭据快照
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    business_token: Option<String>,
    tenant_id: Option<String>,
    reasoning_key: Option<String>,
}

impl Credentials {
    pub fn new(
        business_token: Option<&str>,
        tenant_id: Option<&str>,
        reasoning_key: Option<&str>,
    ) -> Self {
        Self {
            business_token: business_token.and_then(non_empty),
            tenant_id: tenant_id.and_then(non_empty),
            reasoning_key: reasoning_key.and_then(non_empty),
        }
    }

    pub fn business_token(&self) -> Option<&str> {
        self.business_token.as_deref()
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    pub fn reasoning_key(&self) -> Option<&str> {
        self.reasoning_key.as_deref()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("business_token", &self.business_token.as_deref().map(redact))
            .field("tenant_id", &self.tenant_id)
            .field("reasoning_key", &self.reasoning_key.as_deref().map(redact))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.app.history_limit, 20);
        assert_eq!(cfg.app.prompt_window, 6);
        assert_eq!(cfg.remote.timeout_secs, 30);
        assert_eq!(cfg.dispatch.default_limit, 50);
        assert_eq!(cfg.remote.protocol_version, "2.0");
    }

    #[test]
    fn test_settings_patch_and_configured() {
        let mut s = AssistantSettings::default();
        assert!(!s.is_configured());
        s.apply(SettingsPatch {
            business_token: Some("pit-123".into()),
            reasoning_api_key: Some("sk-abc".into()),
            ..Default::default()
        });
        assert!(s.is_configured());
        assert_eq!(s.theme, "dark");
        assert_eq!(s.credentials().business_token(), Some("pit-123"));
        assert_eq!(s.credentials().tenant_id(), None);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut s = AssistantSettings::default();
        s.business_token = "pit-secret".into();
        let out = format!("{:?} {:?}", s, s.credentials());
        assert!(!out.contains("pit-secret"));
        assert!(out.contains("[REDACTED]"));
    }

    #[test]
    fn test_settings_json_is_camel_case_and_tolerant() {
        let s: AssistantSettings =
            serde_json::from_str(r#"{"businessToken":"t","tenantId":"loc1"}"#).unwrap();
        assert_eq!(s.business_token, "t");
        assert_eq!(s.tenant_id, "loc1");
        assert!(s.voice_enabled);
    }
}
