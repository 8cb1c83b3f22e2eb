//! Action execution, dispatched by action type.

use crate::model::{
    Action, ActionType, HttpCallConfig, InfrastructureToolConfig, NotificationConfig, ScriptConfig,
};
use async_trait::async_trait;
use driftkit_spi::{DriftError, DriftResult};
use serde_json::json;
use std::process::Stdio;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// External notification transport (the webhook dispatcher lives behind
/// this seam).
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one message.
    async fn send(&self, channel: &str, message: &str, severity: &str) -> DriftResult<()>;
}

/// Output of an infrastructure tool run.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    /// Process-style exit code; non-zero means the run failed
    pub exit_code: i32,
    /// Tool output
    pub output: serde_json::Value,
}

/// External infrastructure tool runner (terraform etc.).
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Run one tool operation.
    async fn run(
        &self,
        tool: &str,
        operation: &str,
        arguments: &serde_json::Value,
        context: &serde_json::Value,
    ) -> DriftResult<ToolOutcome>;
}

/// Dispatches actions by type and derives success from each backend's
/// native signal: HTTP status, exit code, or notifier acknowledgement.
pub struct ActionExecutor {
    http: reqwest::Client,
    notifier: Option<Arc<dyn Notifier>>,
    tools: Option<Arc<dyn ToolRunner>>,
}

impl ActionExecutor {
    /// Create an executor with no external collaborators wired.
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            notifier: None,
            tools: None,
        }
    }

    /// Wire the notification transport.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Wire the infrastructure tool runner.
    pub fn with_tool_runner(mut self, tools: Arc<dyn ToolRunner>) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Validate an action's configuration against its schema.
    pub fn validate(&self, action: &Action) -> DriftResult<()> {
        action.validate()
    }

    /// Run one action with the execution context.
    ///
    /// The context is exposed to scripts via `DRIFTKIT_CONTEXT` and to
    /// tool runners as an argument; HTTP and notification actions use
    /// their configuration as-is.
    pub async fn execute(
        &self,
        ctx: &CancellationToken,
        action: &Action,
        context: &serde_json::Value,
    ) -> DriftResult<serde_json::Value> {
        if ctx.is_cancelled() {
            return Err(DriftError::Cancelled);
        }
        match action.action_type {
            ActionType::HttpCall => {
                let config: HttpCallConfig = parse_config(action)?;
                self.execute_http(ctx, &config).await
            }
            ActionType::Script => {
                let config: ScriptConfig = parse_config(action)?;
                self.execute_script(ctx, &config, context).await
            }
            ActionType::Notification => {
                let config: NotificationConfig = parse_config(action)?;
                let notifier = self.notifier.as_ref().ok_or_else(|| {
                    DriftError::Validation("no notification service configured".to_string())
                })?;
                notifier
                    .send(&config.channel, &config.message, &config.severity)
                    .await?;
                Ok(json!({ "delivered": true, "channel": config.channel }))
            }
            ActionType::InfrastructureTool => {
                let config: InfrastructureToolConfig = parse_config(action)?;
                let tools = self.tools.as_ref().ok_or_else(|| {
                    DriftError::Validation("no infrastructure tool runner configured".to_string())
                })?;
                let outcome = tools
                    .run(&config.tool, &config.operation, &config.arguments, context)
                    .await?;
                if outcome.exit_code != 0 {
                    return Err(DriftError::Internal(format!(
                        "{} {} exited with code {}",
                        config.tool, config.operation, outcome.exit_code
                    )));
                }
                Ok(outcome.output)
            }
        }
    }

    async fn execute_http(
        &self,
        ctx: &CancellationToken,
        config: &HttpCallConfig,
    ) -> DriftResult<serde_json::Value> {
        let method: reqwest::Method = config
            .method
            .to_uppercase()
            .parse()
            .map_err(|_| DriftError::Validation(format!("invalid HTTP method: {}", config.method)))?;

        let mut request = self.http.request(method, &config.url);
        for (name, value) in &config.headers {
            request = request.header(name, value);
        }
        if let Some(body) = &config.body {
            request = request.json(body);
        }

        let response = tokio::select! {
            _ = ctx.cancelled() => return Err(DriftError::Cancelled),
            response = request.send() => response?,
        };

        let status = response.status().as_u16();
        let body: serde_json::Value = response
            .text()
            .await
            .map(|text| serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text)))
            .unwrap_or(serde_json::Value::Null);

        let failed = match config.expected_status {
            Some(expected) => status != expected,
            None => status >= 400,
        };
        if failed {
            return Err(DriftError::Internal(format!(
                "HTTP {} from {}",
                status, config.url
            )));
        }
        Ok(json!({ "status": status, "body": body }))
    }

    async fn execute_script(
        &self,
        ctx: &CancellationToken,
        config: &ScriptConfig,
        context: &serde_json::Value,
    ) -> DriftResult<serde_json::Value> {
        let mut command = tokio::process::Command::new(&config.command);
        command
            .args(&config.args)
            .envs(&config.env)
            .env("DRIFTKIT_CONTEXT", context.to_string())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &config.working_dir {
            command.current_dir(dir);
        }

        let child = command
            .spawn()
            .map_err(|e| DriftError::Internal(format!("spawn {}: {}", config.command, e)))?;

        let output = child.wait_with_output();
        tokio::pin!(output);

        let output = tokio::select! {
            // Dropping the pinned future kills the child
            _ = ctx.cancelled() => return Err(DriftError::Cancelled),
            output = &mut output => output
                .map_err(|e| DriftError::Internal(format!("wait {}: {}", config.command, e)))?,
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let exit_code = output.status.code().unwrap_or(-1);

        if !output.status.success() {
            return Err(DriftError::Internal(format!(
                "{} exited with code {}: {}",
                config.command,
                exit_code,
                stderr.trim()
            )));
        }
        Ok(json!({ "exit_code": exit_code, "stdout": stdout, "stderr": stderr }))
    }
}

impl Default for ActionExecutor {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_config<T: serde::de::DeserializeOwned>(action: &Action) -> DriftResult<T> {
    serde_json::from_value(action.configuration.clone()).map_err(|e| {
        DriftError::Validation(format!(
            "action '{}' configuration invalid: {}",
            action.name, e
        ))
    })
}
