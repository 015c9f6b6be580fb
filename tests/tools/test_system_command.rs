// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use desk_assistant::tools::{
    CapabilityRegistry, InvocationStatus, SessionContext, SystemCommandTool, Tool, ToolError,
    TurnContext,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn turn_with_ttl(ttl: Duration) -> TurnContext {
    TurnContext::new(Arc::new(SessionContext::new("ops", ttl)))
}

fn turn() -> TurnContext {
    turn_with_ttl(Duration::from_secs(60))
}

#[cfg(unix)]
#[tokio::test]
async fn test_successful_command_output() {
    let tool = SystemCommandTool::default();
    let out = tool
        .execute(&turn(), &json!({"command": "echo hello"}))
        .await
        .unwrap();
    assert_eq!(out, "✅ Command succeeded:\n\nhello");

    let out = tool
        .execute(&turn(), &json!({"command": "true"}))
        .await
        .unwrap();
    assert_eq!(out, "✅ Command succeeded with no output: true");
}

#[cfg(unix)]
#[tokio::test]
async fn test_failing_command_reports_stderr_or_code() {
    let tool = SystemCommandTool::default();

    let err = tool
        .execute(&turn(), &json!({"command": "echo oops 1>&2; exit 2"}))
        .await
        .unwrap_err();
    assert!(matches!(err, ToolError::Execution { ref message, .. } if message == "oops"));

    let err = tool
        .execute(&turn(), &json!({"command": "exit 3"}))
        .await
        .unwrap_err();
    assert!(matches!(err, ToolError::Execution { ref message, .. } if message == "exit code 3"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_timeout_is_reported_as_failure() {
    let mut registry = CapabilityRegistry::new();
    registry
        .register(Arc::new(SystemCommandTool::new(Duration::from_secs(1))))
        .unwrap();
    let turn = turn();

    let started = std::time::Instant::now();
    let outcome = registry
        .call_tool(&turn, "system_command", &json!({"command": "sleep 5"}))
        .await;

    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(outcome.status, InvocationStatus::Failed);
    assert!(outcome.output.contains("timed out after 1s"));
    assert_eq!(turn.len(), 1);
}

#[tokio::test]
async fn test_denylisted_commands_are_blocked() {
    let tool = SystemCommandTool::default();
    for command in ["rm -rf /tmp/whatever", "FORMAT D:", "taskkill /F /IM x.exe", "del /s *"] {
        let err = tool
            .execute(&turn(), &json!({ "command": command }))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("blocked"), "{}", command);
    }
}

#[cfg(unix)]
#[tokio::test]
async fn test_shutdown_needs_confirmation_in_same_session() {
    let tool = SystemCommandTool::default();
    let session = Arc::new(SessionContext::new("s1", Duration::from_secs(60)));
    let other = Arc::new(SessionContext::new("s2", Duration::from_secs(60)));

    // `echo` keeps the test harmless while still mentioning shutdown
    let input = json!({"command": "echo shutdown now"});

    let first = tool
        .execute(&TurnContext::new(Arc::clone(&session)), &input)
        .await
        .unwrap();
    assert!(first.contains("Send the same command again"));

    let elsewhere = tool
        .execute(&TurnContext::new(other), &input)
        .await
        .unwrap();
    assert!(elsewhere.contains("Send the same command again"));

    // The next turn of the same session confirms it
    let confirmed = tool
        .execute(&TurnContext::new(Arc::clone(&session)), &input)
        .await
        .unwrap();
    assert_eq!(confirmed, "✅ Shutdown command executed: echo shutdown now");

    // The token was consumed
    let again = tool
        .execute(&TurnContext::new(session), &input)
        .await
        .unwrap();
    assert!(again.contains("Send the same command again"));
}

#[tokio::test]
async fn test_expired_confirmation_is_reissued() {
    let tool = SystemCommandTool::default();
    let turn = turn_with_ttl(Duration::from_millis(5));
    let input = json!({"command": "shutdown -h now"});

    let first = tool.execute(&turn, &input).await.unwrap();
    assert!(first.contains("About to run a shutdown command"));

    tokio::time::sleep(Duration::from_millis(30)).await;
    let second = tool.execute(&turn, &input).await.unwrap();
    assert!(second.contains("About to run a shutdown command"));
}

#[tokio::test]
async fn test_empty_command_is_invalid() {
    let err = SystemCommandTool::default()
        .execute(&turn(), &json!({"command": "   "}))
        .await
        .unwrap_err();
    assert!(matches!(err, ToolError::InvalidInput { .. }));
}
