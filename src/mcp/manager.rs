//! Client manager: registry of protocol clients, routing caches and the
//! confirmation-gated execution entry point.
//!
//! Clients live in an id-keyed arena. The three routing maps (tool name,
//! prompt name, resource URI) store [`ClientId`]s, and each record keeps the
//! set of keys it owns, so removing a client only walks its own keys and
//! drops those whose current owner id still matches.

use futures::future::join_all;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use super::client::{ClientFactory, ProtocolClient};
use super::types::{ClientId, ClientState, ClientStatus, ToolSet};
use crate::approval::{ConfirmationGate, ConfirmationRequest};
use crate::config::{InitMode, McpConfig, McpServerConfig};
use crate::error::{HostError, Result};

#[derive(Default)]
struct OwnedRoutes {
    tools: HashSet<String>,
    prompts: HashSet<String>,
    resources: HashSet<String>,
}

struct ClientRecord {
    name: String,
    client: Arc<dyn ProtocolClient>,
    routes: OwnedRoutes,
}

#[derive(Default)]
struct ManagerState {
    next_id: u64,
    clients: HashMap<ClientId, ClientRecord>,
    names: HashMap<String, ClientId>,
    tool_routes: HashMap<String, ClientId>,
    prompt_routes: HashMap<String, ClientId>,
    resource_routes: HashMap<String, ClientId>,
    /// Lifecycle of every name ever seen, including failed ones.
    statuses: HashMap<String, ClientState>,
}

impl ManagerState {
    fn set_status(&mut self, name: &str, status: ClientStatus, last_error: Option<String>) {
        self.statuses.insert(
            name.to_string(),
            ClientState {
                name: name.to_string(),
                status,
                last_error,
            },
        );
    }

    /// Drop every route owned by `id` and forget its route keys.
    fn purge_routes(&mut self, id: ClientId) {
        let Some(record) = self.clients.get_mut(&id) else {
            return;
        };
        let owned = std::mem::take(&mut record.routes);
        purge_map(&mut self.tool_routes, owned.tools, id);
        purge_map(&mut self.prompt_routes, owned.prompts, id);
        purge_map(&mut self.resource_routes, owned.resources, id);
    }

    fn client_for(
        &self,
        routes: &HashMap<String, ClientId>,
        key: &str,
    ) -> Option<Arc<dyn ProtocolClient>> {
        routes
            .get(key)
            .and_then(|id| self.clients.get(id))
            .map(|r| r.client.clone())
    }
}

fn purge_map(map: &mut HashMap<String, ClientId>, keys: HashSet<String>, id: ClientId) {
    for key in keys {
        if map.get(&key) == Some(&id) {
            map.remove(&key);
        }
    }
}

fn as_connection_error(name: &str, e: HostError) -> HostError {
    match e {
        HostError::Connection { .. } => e,
        other => HostError::Connection {
            server: name.to_string(),
            message: other.to_string(),
        },
    }
}

#[derive(Clone, Copy)]
enum RouteKind {
    Tool,
    Prompt,
    Resource,
}

/// Owns the protocol clients and routes calls to them.
pub struct ClientManager {
    state: RwLock<ManagerState>,
    factory: Arc<dyn ClientFactory>,
    gate: Arc<dyn ConfirmationGate>,
}

impl ClientManager {
    pub fn new(factory: Arc<dyn ClientFactory>, gate: Arc<dyn ConfirmationGate>) -> Self {
        Self {
            state: RwLock::new(ManagerState::default()),
            factory,
            gate,
        }
    }

    /// Connect the configured servers with the configured threshold.
    pub async fn initialize(&self, config: &McpConfig) -> Result<usize> {
        self.initialize_from_config(&config.servers, config.mode).await
    }

    /// Connect every enabled server concurrently, then apply the threshold.
    ///
    /// Individual failures are recorded and never short-circuit the others.
    /// `Strict` requires all enabled servers, `Lenient` at least one; no
    /// enabled servers always succeeds. Returns the number connected.
    pub async fn initialize_from_config(
        &self,
        configs: &[McpServerConfig],
        mode: InitMode,
    ) -> Result<usize> {
        let enabled: Vec<&McpServerConfig> = configs.iter().filter(|c| c.enabled).collect();
        let skipped = configs.len() - enabled.len();
        if skipped > 0 {
            debug!(skipped, "Skipping disabled MCP servers");
        }
        if enabled.is_empty() {
            return Ok(0);
        }

        let attempts = enabled
            .iter()
            .map(|cfg| async move { self.connect_server(&cfg.name, cfg).await });
        let results = join_all(attempts).await;

        let configured = enabled.len();
        let mut connected = 0;
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(()) => connected += 1,
                Err(e) => failures.push(e.to_string()),
            }
        }

        let satisfied = match mode {
            InitMode::Strict => connected == configured,
            InitMode::Lenient => connected > 0,
        };
        if !satisfied {
            error!(%mode, connected, configured, "MCP initialization failed");
            return Err(HostError::InitializationFailed {
                connected,
                configured,
                mode,
                failures,
            });
        }

        info!(%mode, connected, configured, "MCP servers initialized");
        Ok(connected)
    }

    /// Connect and register one server, then refresh its routes.
    ///
    /// A name already registered (or mid-connect) is left alone and reported
    /// as success.
    pub async fn connect_server(&self, name: &str, config: &McpServerConfig) -> Result<()> {
        {
            let mut state = self.state.write().await;
            let busy = state.names.contains_key(name)
                || matches!(
                    state.statuses.get(name).map(|s| s.status),
                    Some(ClientStatus::Connecting)
                );
            if busy {
                info!(server = %name, "MCP server already registered, skipping");
                return Ok(());
            }
            state.set_status(name, ClientStatus::Connecting, None);
        }

        let client = match self.open(name, config).await {
            Ok(client) => client,
            Err(e) => {
                error!(server = %name, error = %e, "MCP server connection failed");
                let mut state = self.state.write().await;
                state.set_status(name, ClientStatus::Failed, Some(e.to_string()));
                return Err(e);
            }
        };

        let id = {
            let mut state = self.state.write().await;
            state.next_id += 1;
            let id = ClientId(state.next_id);
            state.clients.insert(
                id,
                ClientRecord {
                    name: name.to_string(),
                    client: client.clone(),
                    routes: OwnedRoutes::default(),
                },
            );
            state.names.insert(name.to_string(), id);
            state.set_status(name, ClientStatus::Connected, None);
            id
        };
        info!(server = %name, id = %id, "MCP server connected");

        if let Err(e) = self.refresh(id, name, client).await {
            warn!(server = %name, error = %e, "MCP tool discovery failed");
        }
        Ok(())
    }

    async fn open(&self, name: &str, config: &McpServerConfig) -> Result<Arc<dyn ProtocolClient>> {
        let client = self
            .factory
            .create(name, config)
            .map_err(|e| as_connection_error(name, e))?;
        let connecting = client.connect(name, config);
        let outcome = if config.timeout_secs > 0 {
            match tokio::time::timeout(Duration::from_secs(config.timeout_secs), connecting).await {
                Ok(r) => r,
                Err(_) => Err(HostError::Connection {
                    server: name.to_string(),
                    message: format!("timed out after {}s", config.timeout_secs),
                }),
            }
        } else {
            connecting.await
        };

        match outcome {
            Ok(()) => Ok(client),
            Err(e) => {
                if let Err(de) = client.disconnect().await {
                    debug!(server = %name, error = %de, "Disconnect after failed connect");
                }
                Err(as_connection_error(name, e))
            }
        }
    }

    /// Re-run discovery for a registered server and replace its routes.
    pub async fn refresh_client(&self, name: &str) -> Result<()> {
        let (id, client) = {
            let state = self.state.read().await;
            let id = *state
                .names
                .get(name)
                .ok_or_else(|| HostError::Mcp(format!("Unknown MCP server '{}'", name)))?;
            let client = state
                .clients
                .get(&id)
                .map(|r| r.client.clone())
                .ok_or_else(|| HostError::Mcp(format!("Unknown MCP server '{}'", name)))?;
            (id, client)
        };
        self.refresh(id, name, client).await
    }

    async fn refresh(
        &self,
        id: ClientId,
        name: &str,
        client: Arc<dyn ProtocolClient>,
    ) -> Result<()> {
        let tools = match client.get_tools().await {
            Ok(tools) => tools,
            Err(e) => {
                let mut state = self.state.write().await;
                if state.clients.contains_key(&id) {
                    state.set_status(name, ClientStatus::Connected, Some(e.to_string()));
                }
                return Err(e);
            }
        };
        let prompts = client.list_prompts().await.unwrap_or_else(|e| {
            debug!(server = %name, error = %e, "Prompts not available");
            Vec::new()
        });
        let resources = client.list_resources().await.unwrap_or_else(|e| {
            debug!(server = %name, error = %e, "Resources not available");
            Vec::new()
        });

        let mut state = self.state.write().await;
        if !state.clients.contains_key(&id) {
            debug!(server = %name, "Client removed during refresh, dropping routes");
            return Ok(());
        }
        state.purge_routes(id);

        for tool in tools.keys() {
            Self::claim(&mut state, RouteKind::Tool, tool, id, name);
        }
        for prompt in &prompts {
            Self::claim(&mut state, RouteKind::Prompt, prompt, id, name);
        }
        for uri in &resources {
            Self::claim(&mut state, RouteKind::Resource, uri, id, name);
        }
        state.set_status(name, ClientStatus::Connected, None);

        debug!(
            server = %name,
            tools = tools.len(),
            prompts = prompts.len(),
            resources = resources.len(),
            "Routes refreshed"
        );
        Ok(())
    }

    /// Point `key` at `id`, taking it away from any previous owner.
    fn claim(state: &mut ManagerState, kind: RouteKind, key: &str, id: ClientId, name: &str) {
        let routes = match kind {
            RouteKind::Tool => &mut state.tool_routes,
            RouteKind::Prompt => &mut state.prompt_routes,
            RouteKind::Resource => &mut state.resource_routes,
        };
        let previous = routes.insert(key.to_string(), id);

        if let Some(prev) = previous.filter(|p| *p != id) {
            if let Some(prev_record) = state.clients.get_mut(&prev) {
                let owned = match kind {
                    RouteKind::Tool => &mut prev_record.routes.tools,
                    RouteKind::Prompt => &mut prev_record.routes.prompts,
                    RouteKind::Resource => &mut prev_record.routes.resources,
                };
                owned.remove(key);
                if matches!(kind, RouteKind::Tool) {
                    warn!(
                        tool = %key,
                        previous = %prev_record.name,
                        server = %name,
                        "Tool name collision, last registered server wins"
                    );
                }
            }
        }

        if let Some(record) = state.clients.get_mut(&id) {
            let owned = match kind {
                RouteKind::Tool => &mut record.routes.tools,
                RouteKind::Prompt => &mut record.routes.prompts,
                RouteKind::Resource => &mut record.routes.resources,
            };
            owned.insert(key.to_string());
        }
    }

    /// Remove a server, purge its routes and disconnect it.
    ///
    /// Returns `false` if the name was not registered.
    pub async fn remove_client(&self, name: &str) -> bool {
        let record = {
            let mut state = self.state.write().await;
            let Some(id) = state.names.remove(name) else {
                return false;
            };
            state.purge_routes(id);
            state.set_status(name, ClientStatus::Disconnected, None);
            state.clients.remove(&id)
        };

        if let Some(record) = record {
            if let Err(e) = record.client.disconnect().await {
                warn!(server = %name, error = %e, "MCP disconnect failed");
            }
        }
        info!(server = %name, "MCP server removed");
        true
    }

    /// Union of all routed tools resolved through each owner's live tool set.
    ///
    /// Tools that vanished from their server since the last refresh, and
    /// servers whose live query fails, are silently omitted.
    pub async fn get_all_tools(&self) -> ToolSet {
        let groups: Vec<(String, Arc<dyn ProtocolClient>, Vec<String>)> = {
            let state = self.state.read().await;
            let mut by_owner: HashMap<ClientId, Vec<String>> = HashMap::new();
            for (tool, id) in &state.tool_routes {
                by_owner.entry(*id).or_default().push(tool.clone());
            }
            by_owner
                .into_iter()
                .filter_map(|(id, tools)| {
                    state
                        .clients
                        .get(&id)
                        .map(|r| (r.name.clone(), r.client.clone(), tools))
                })
                .collect()
        };

        let queries = groups.into_iter().map(|(name, client, tools)| async move {
            match client.get_tools().await {
                Ok(live) => tools
                    .into_iter()
                    .filter_map(|t| live.get(&t).cloned().map(|def| (t, def)))
                    .collect::<Vec<_>>(),
                Err(e) => {
                    warn!(server = %name, error = %e, "Live tool query failed");
                    Vec::new()
                }
            }
        });

        join_all(queries).await.into_iter().flatten().collect()
    }

    /// Client currently owning `tool`.
    pub async fn get_tool_client(&self, tool: &str) -> Option<Arc<dyn ProtocolClient>> {
        let state = self.state.read().await;
        state.client_for(&state.tool_routes, tool)
    }

    /// Name of the server currently owning `tool`.
    pub async fn tool_owner(&self, tool: &str) -> Option<String> {
        let state = self.state.read().await;
        state
            .tool_routes
            .get(tool)
            .and_then(|id| state.clients.get(id))
            .map(|r| r.name.clone())
    }

    /// Route a tool call through the confirmation gate to its owner.
    ///
    /// A denied call never reaches the client.
    pub async fn execute_tool(
        &self,
        name: &str,
        args: Value,
        session_id: Option<&str>,
    ) -> Result<Value> {
        let client = self
            .get_tool_client(name)
            .await
            .ok_or_else(|| HostError::ToolNotFound(name.to_string()))?;

        let request = ConfirmationRequest::new(name, args, session_id);
        if !self.gate.request_confirmation(&request).await? {
            return Err(HostError::ToolExecutionDenied(name.to_string()));
        }

        client
            .call_tool(name, request.args)
            .await
            .map_err(|e| HostError::ToolExecution {
                tool: name.to_string(),
                message: e.to_string(),
            })
    }

    pub async fn get_prompt(&self, name: &str, args: Value) -> Result<Value> {
        let client = {
            let state = self.state.read().await;
            state.client_for(&state.prompt_routes, name)
        }
        .ok_or_else(|| HostError::PromptNotFound(name.to_string()))?;
        client.get_prompt(name, args).await
    }

    pub async fn read_resource(&self, uri: &str) -> Result<Value> {
        let client = {
            let state = self.state.read().await;
            state.client_for(&state.resource_routes, uri)
        }
        .ok_or_else(|| HostError::ResourceNotFound(uri.to_string()))?;
        client.read_resource(uri).await
    }

    /// Routed prompt names, sorted.
    pub async fn list_prompts(&self) -> Vec<String> {
        let state = self.state.read().await;
        let mut names: Vec<String> = state.prompt_routes.keys().cloned().collect();
        names.sort();
        names
    }

    /// Routed resource URIs, sorted.
    pub async fn list_resources(&self) -> Vec<String> {
        let state = self.state.read().await;
        let mut uris: Vec<String> = state.resource_routes.keys().cloned().collect();
        uris.sort();
        uris
    }

    /// Disconnect every client in parallel and clear all state.
    ///
    /// Local state is cleared before the disconnects run, so it is empty
    /// afterwards whatever the individual outcomes. Calling it again is a no-op.
    pub async fn disconnect_all(&self) {
        let records: Vec<ClientRecord> = {
            let mut state = self.state.write().await;
            state.tool_routes.clear();
            state.prompt_routes.clear();
            state.resource_routes.clear();
            state.names.clear();
            let records: Vec<ClientRecord> = state.clients.drain().map(|(_, r)| r).collect();
            for record in &records {
                state.set_status(&record.name, ClientStatus::Disconnected, None);
            }
            records
        };
        if records.is_empty() {
            return;
        }

        let count = records.len();
        let disconnects = records.into_iter().map(|record| async move {
            if let Err(e) = record.client.disconnect().await {
                warn!(server = %record.name, error = %e, "MCP disconnect failed");
            }
        });
        join_all(disconnects).await;
        info!(count, "All MCP servers disconnected");
    }

    /// Registered server names, sorted.
    pub async fn client_names(&self) -> Vec<String> {
        let state = self.state.read().await;
        let mut names: Vec<String> = state.names.keys().cloned().collect();
        names.sort();
        names
    }

    /// Lifecycle snapshot of every known name, sorted by name.
    pub async fn client_states(&self) -> Vec<ClientState> {
        let state = self.state.read().await;
        let mut states: Vec<ClientState> = state.statuses.values().cloned().collect();
        states.sort_by(|a, b| a.name.cmp(&b.name));
        states
    }

    /// `None` means the name was never registered.
    pub async fn client_state(&self, name: &str) -> Option<ClientState> {
        self.state.read().await.statuses.get(name).cloned()
    }

    #[cfg(test)]
    async fn assert_routes_consistent(&self) {
        let state = self.state.read().await;
        for map in [&state.tool_routes, &state.prompt_routes, &state.resource_routes] {
            for (key, id) in map {
                let record = state.clients.get(id);
                assert!(record.is_some(), "dangling route {} -> {}", key, id);
            }
        }
        for (id, record) in &state.clients {
            assert_eq!(state.names.get(&record.name), Some(id));
            for tool in &record.routes.tools {
                assert_eq!(state.tool_routes.get(tool), Some(id));
            }
        }
    }
}
