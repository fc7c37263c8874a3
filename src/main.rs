//! BizPilot 控制台
//!
//! 入口：初始化日志、加载配置与设置、组装编排器，然后逐行读取指令。
//! 以 `/` 开头的是控制台命令，其余内容作为业务指令交给编排器。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use bizpilot::config::{load_config, AppConfig, SettingsPatch};
use bizpilot::core::{AgentError, CommandOrchestrator, ConnectionState};
use bizpilot::llm::{OpenAiEngine, ReasoningEngine};
use bizpilot::memory::persistence::load_settings;
use bizpilot::memory::{ExportBundle, FileStore, KeyValueStore, Message};
use bizpilot::observability;
use bizpilot::protocol::{HttpRemoteClient, RemoteClient};
use bizpilot::suggestions::{suggestions, SuggestionCategory};
use bizpilot::tools::ToolCatalog;
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "\
Commands:
  /probe                 test the business-system connection
  /clear                 clear messages and conversation memory
  /export [path]         export the conversation as JSON
  /import <path>         replace messages with an exported conversation
  /metrics               show performance metrics
  /summary               show conversation summary
  /suggest [category]    show example commands
  /tools                 list available tools by category
  /set <field> <value>   update settings (token, tenant, key, voice, autoconfirm, theme)
  /quit                  exit
Anything else is sent as a business command.";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });

    let data_dir = cfg.app.data_dir.clone().unwrap_or_else(|| PathBuf::from("data"));
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(&data_dir));
    let mut settings = load_settings(store.as_ref()).context("Failed to load settings")?;
    settings.fill_from_env();

    let engine = Arc::new(
        OpenAiEngine::new(cfg.llm.base_url.as_deref(), &cfg.llm.model, cfg.llm.request_timeout_secs)
            .context("Failed to create reasoning engine")?,
    );
    let remote: Arc<dyn RemoteClient> =
        Arc::new(HttpRemoteClient::new(&cfg.remote).context("Failed to create business-system client")?);

    let orchestrator = CommandOrchestrator::new(
        &cfg,
        ToolCatalog::business_default(),
        Arc::clone(&engine) as Arc<dyn ReasoningEngine>,
        remote,
        store,
        settings,
    );

    let mut status_rx = orchestrator.subscribe();
    tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            let s = status_rx.borrow().clone();
            tracing::debug!(
                processing = s.processing,
                connection = s.connection.label(),
                messages = s.message_count,
                "status"
            );
        }
    });

    println!("BizPilot ready. Type /help for commands.");
    if !orchestrator.settings_snapshot().is_configured() {
        println!("Credentials are not configured yet: use /set token <value> and /set key <value>.");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read input")? {
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if let Some(rest) = input.strip_prefix('/') {
            let mut parts = rest.splitn(2, char::is_whitespace);
            let cmd = parts.next().unwrap_or_default();
            let arg = parts.next().map(str::trim).filter(|a| !a.is_empty());
            match cmd {
                "quit" | "exit" => break,
                "help" => println!("{HELP}"),
                "probe" => {
                    match orchestrator.probe().await {
                        ConnectionState::Error(reason) => println!("Connection: error\n  {reason}"),
                        state => println!("Connection: {}", state.label()),
                    }
                }
                "clear" => match orchestrator.clear().await {
                    Ok(()) => println!("Conversation cleared."),
                    Err(e) => println!("{e}"),
                },
                "export" => {
                    let bundle = orchestrator.export().await;
                    let path = arg.map(PathBuf::from).unwrap_or_else(|| PathBuf::from(bundle.file_name()));
                    std::fs::write(&path, bundle.to_json()?)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("Exported {} messages to {}", bundle.messages.len(), path.display());
                }
                "import" => match arg {
                    None => println!("Usage: /import <path>"),
                    Some(path) => match import_file(&orchestrator, path).await {
                        Ok(n) => println!("Imported {n} messages."),
                        Err(e) => println!("Import failed: {e:#}"),
                    },
                },
                "metrics" => {
                    let m = orchestrator.metrics().await;
                    let (prompt, completion, total) = engine.token_usage();
                    println!(
                        "Commands: {} ({} successful, {:.1}%)\nAverage response: {:.0} ms, last: {} ms\nTokens: {} prompt, {} completion, {} total",
                        m.total_commands,
                        m.successful_commands,
                        m.success_rate(),
                        m.average_response_time_ms,
                        m.last_command_time_ms,
                        prompt,
                        completion,
                        total
                    );
                }
                "summary" => {
                    let s = orchestrator.conversation_summary().await;
                    println!(
                        "Messages: {} ({} user, {} assistant)\nCommands: {} successful, {} failed",
                        s.total_messages, s.user_messages, s.assistant_messages, s.successful_commands, s.failed_commands
                    );
                }
                "suggest" => {
                    let category = match arg.map(str::parse::<SuggestionCategory>) {
                        Some(Err(e)) => {
                            println!("{e}");
                            continue;
                        }
                        Some(Ok(c)) => Some(c),
                        None => None,
                    };
                    for s in suggestions(category) {
                        println!("  • {s}");
                    }
                }
                "tools" => {
                    let info = orchestrator.endpoint_info();
                    println!("{} ({}, {} tools)", info.url, info.protocol, info.total_tools);
                    for (category, tools) in orchestrator.catalog().tools_by_category() {
                        println!("{category}:");
                        for t in tools {
                            println!("  {} - {}", t.name, t.description);
                        }
                    }
                }
                "set" => match arg.and_then(parse_setting) {
                    Some(patch) => match orchestrator.update_settings(patch) {
                        Ok(s) => println!("Settings saved (configured: {}).", s.is_configured()),
                        Err(e) => println!("{e}"),
                    },
                    None => println!("Usage: /set <token|tenant|key|voice|autoconfirm|theme> <value>"),
                },
                other => println!("Unknown command /{other}. Type /help."),
            }
            continue;
        }

        match orchestrator.process_command(input).await {
            Ok(message) => print_message(&message),
            Err(AgentError::Busy) => println!("Still processing the previous command."),
            Err(e) => println!("{e}"),
        }
    }

    Ok(())
}

async fn import_file(orchestrator: &CommandOrchestrator, path: &str) -> anyhow::Result<usize> {
    let data = std::fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))?;
    let bundle = ExportBundle::from_json(&data).context("Not a valid conversation export")?;
    Ok(orchestrator.import_messages(bundle).await?)
}

fn parse_setting(arg: &str) -> Option<SettingsPatch> {
    let mut parts = arg.splitn(2, char::is_whitespace);
    let field = parts.next()?.to_lowercase();
    let value = parts.next().map(str::trim).unwrap_or_default().to_string();
    let flag = matches!(value.as_str(), "on" | "true" | "yes" | "1");
    let mut patch = SettingsPatch::default();
    match field.as_str() {
        "token" => patch.business_token = Some(value),
        "tenant" => patch.tenant_id = Some(value),
        "key" => patch.reasoning_api_key = Some(value),
        "voice" => patch.voice_enabled = Some(flag),
        "autoconfirm" => patch.auto_confirm = Some(flag),
        "theme" if !value.is_empty() => patch.theme = Some(value),
        _ => return None,
    }
    Some(patch)
}

fn print_message(message: &Message) {
    println!();
    println!("{}", message.content);
    if let Some(metrics) = &message.metrics {
        println!(
            "\n[{}/{} actions succeeded in {} ms]",
            metrics.successful_actions, metrics.total_actions, metrics.execution_time_ms
        );
    }
    println!();
}
