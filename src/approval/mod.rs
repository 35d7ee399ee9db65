//! Tool confirmation gate.
//!
//! The client manager asks a [`ConfirmationGate`] before every tool call.
//! [`StoreBackedGate`] is the reference policy: approvals already recorded in
//! the [`AllowedToolsStore`] pass straight through, anything else goes to a
//! [`ConfirmationPrompter`] (the surrounding UI or an automatic policy), and
//! only decisions that ask to be remembered are written back.

mod allowed;

pub use allowed::AllowedToolsStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{ApprovalConfig, ApprovalMode};
use crate::error::Result;

/// A pending tool call awaiting a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationRequest {
    pub tool_name: String,
    pub args: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl ConfirmationRequest {
    pub fn new(tool_name: &str, args: Value, session_id: Option<&str>) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            args,
            session_id: session_id.map(str::to_string),
        }
    }
}

/// How long an approval should last.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalScope {
    /// This call only.
    #[default]
    Once,
    /// Every later call in the same session.
    Session,
    /// Every later call in any session.
    Global,
}

/// Answer from a [`ConfirmationPrompter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationDecision {
    pub approved: bool,
    #[serde(default)]
    pub remember: ApprovalScope,
}

impl ConfirmationDecision {
    pub fn approve_once() -> Self {
        Self {
            approved: true,
            remember: ApprovalScope::Once,
        }
    }

    pub fn approve(remember: ApprovalScope) -> Self {
        Self {
            approved: true,
            remember,
        }
    }

    pub fn deny() -> Self {
        Self {
            approved: false,
            remember: ApprovalScope::Once,
        }
    }
}

/// Decides whether a tool call may proceed.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConfirmationGate: Send + Sync {
    /// `Ok(true)` approves, `Ok(false)` denies.
    async fn request_confirmation(&self, request: &ConfirmationRequest) -> Result<bool>;
}

/// External source of decisions for calls not covered by a stored approval.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConfirmationPrompter: Send + Sync {
    async fn decide(&self, request: &ConfirmationRequest) -> Result<ConfirmationDecision>;
}

/// Fixed policy that approves or denies everything without asking.
#[derive(Debug, Clone, Copy)]
pub struct AutoPolicy {
    approve: bool,
}

impl AutoPolicy {
    pub fn approve_all() -> Self {
        Self { approve: true }
    }

    pub fn deny_all() -> Self {
        Self { approve: false }
    }
}

#[async_trait]
impl ConfirmationGate for AutoPolicy {
    async fn request_confirmation(&self, request: &ConfirmationRequest) -> Result<bool> {
        debug!(tool = %request.tool_name, approved = self.approve, "Auto policy decision");
        Ok(self.approve)
    }
}

#[async_trait]
impl ConfirmationPrompter for AutoPolicy {
    async fn decide(&self, _request: &ConfirmationRequest) -> Result<ConfirmationDecision> {
        Ok(if self.approve {
            ConfirmationDecision::approve_once()
        } else {
            ConfirmationDecision::deny()
        })
    }
}

/// Store lookup first, prompter second, persistence on request.
pub struct StoreBackedGate {
    store: Arc<AllowedToolsStore>,
    prompter: Arc<dyn ConfirmationPrompter>,
}

impl StoreBackedGate {
    pub fn new(store: Arc<AllowedToolsStore>, prompter: Arc<dyn ConfirmationPrompter>) -> Self {
        Self { store, prompter }
    }

    pub fn store(&self) -> &Arc<AllowedToolsStore> {
        &self.store
    }
}

#[async_trait]
impl ConfirmationGate for StoreBackedGate {
    async fn request_confirmation(&self, request: &ConfirmationRequest) -> Result<bool> {
        let session = request.session_id.as_deref();
        if self.store.is_tool_allowed(&request.tool_name, session).await? {
            debug!(tool = %request.tool_name, "Tool pre-approved");
            return Ok(true);
        }

        let decision = self.prompter.decide(request).await?;
        if !decision.approved {
            info!(tool = %request.tool_name, "Tool call denied");
            return Ok(false);
        }

        match decision.remember {
            ApprovalScope::Once => {}
            // Without a session there is nothing narrower than global.
            ApprovalScope::Session => {
                self.store.allow_tool(&request.tool_name, session).await?;
            }
            ApprovalScope::Global => {
                self.store.allow_tool(&request.tool_name, None).await?;
            }
        }
        Ok(true)
    }
}

/// Build the gate selected by `config.mode`.
///
/// `always_allow` entries are seeded into the global scope. In prompt mode a
/// missing prompter denies everything the store does not already cover.
pub async fn build_gate(
    config: &ApprovalConfig,
    store: Arc<AllowedToolsStore>,
    prompter: Option<Arc<dyn ConfirmationPrompter>>,
) -> Result<Arc<dyn ConfirmationGate>> {
    for tool in &config.always_allow {
        store.allow_tool(tool, None).await?;
    }

    let gate: Arc<dyn ConfirmationGate> = match config.mode {
        ApprovalMode::AutoApprove => Arc::new(AutoPolicy::approve_all()),
        ApprovalMode::AutoDeny => Arc::new(AutoPolicy::deny_all()),
        ApprovalMode::Prompt => {
            let prompter = prompter.unwrap_or_else(|| Arc::new(AutoPolicy::deny_all()));
            Arc::new(StoreBackedGate::new(store, prompter))
        }
    };
    Ok(gate)
}
