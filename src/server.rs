//! MCP Server implementation
//!
//! Exposes the six device tools. Every call goes through the [`Dispatcher`]
//! and comes back as one compact text blob from the [`Renderer`].

use std::sync::Arc;

use rmcp::{
    handler::server::ServerHandler,
    model::*,
    service::{RequestContext, RoleServer},
    ErrorData as McpError,
};
use tracing::{debug, info};

use crate::compact::{CompactEncoder, Renderer, TokenCounter};
use crate::config::Config;
use crate::device::TestbedSessions;
use crate::dispatch::{CommandRequest, Dispatcher, ResultEnvelope};
use crate::tools::{parse_params, CommandParams, ConfigureParams, DeviceParams, ToolName};

/// Network device MCP Server
#[derive(Clone)]
pub struct NetdevMcpServer {
    config: Arc<Config>,
    dispatcher: Dispatcher,
    renderer: Renderer,
}

impl NetdevMcpServer {
    pub fn new(config: Arc<Config>, dispatcher: Dispatcher, renderer: Renderer) -> Self {
        Self {
            config,
            dispatcher,
            renderer,
        }
    }

    /// Wire the testbed-backed dispatcher and the TOON renderer
    ///
    /// Nothing connects until a tool is called.
    pub fn from_config(config: Arc<Config>, tokens: Option<Arc<dyn TokenCounter>>) -> Self {
        let sessions = TestbedSessions::new(&config.testbed, config.command_timeout);
        let dispatcher = Dispatcher::new(
            Arc::new(sessions),
            config.connect_timeout,
            config.max_chars,
        );
        let renderer = Renderer::new(
            CompactEncoder::new(&config.compact_program, config.compact_args.clone()),
            tokens,
        );
        Self::new(config, dispatcher, renderer)
    }

    /// Tools currently offered
    pub fn tools(&self) -> Vec<Tool> {
        ToolName::ALL
            .into_iter()
            .filter(|tool| !(self.config.disable_configure && *tool == ToolName::ConfigureDevice))
            .map(ToolName::definition)
            .collect()
    }

    /// Run one tool with its raw arguments
    pub async fn run_tool(
        &self,
        tool: ToolName,
        args: JsonObject,
    ) -> std::result::Result<CallToolResult, McpError> {
        let envelope = match tool {
            ToolName::RunShowCommand => {
                let params: CommandParams = parse_params(args).map_err(invalid_params)?;
                self.dispatcher
                    .execute(CommandRequest::show(params.device_name, params.command))
                    .await
            }
            ToolName::ConfigureDevice => {
                if self.config.disable_configure {
                    return Err(McpError::invalid_params(
                        "configure_device tool is disabled",
                        None,
                    ));
                }
                let params: ConfigureParams = parse_params(args).map_err(invalid_params)?;
                self.dispatcher
                    .configure(&params.device_name, &params.config_commands)
                    .await
            }
            ToolName::ShowRunningConfig => {
                let params: DeviceParams = parse_params(args).map_err(invalid_params)?;
                self.dispatcher.learn_config(&params.device_name).await
            }
            ToolName::ShowLogging => {
                let params: DeviceParams = parse_params(args).map_err(invalid_params)?;
                self.dispatcher.learn_logging(&params.device_name).await
            }
            ToolName::PingFromNetworkDevice => {
                let params: CommandParams = parse_params(args).map_err(invalid_params)?;
                self.dispatcher
                    .execute(CommandRequest::ping(params.device_name, params.command))
                    .await
            }
            ToolName::RunLinuxCommand => {
                let params: CommandParams = parse_params(args).map_err(invalid_params)?;
                self.dispatcher
                    .execute(CommandRequest::linux(params.device_name, params.command))
                    .await
            }
        };

        Ok(self.respond(&envelope).await)
    }

    async fn respond(&self, envelope: &ResultEnvelope) -> CallToolResult {
        let text = self.renderer.render(envelope).await;
        if envelope.is_error() {
            CallToolResult::error(vec![Content::text(text)])
        } else {
            CallToolResult::success(vec![Content::text(text)])
        }
    }
}

fn invalid_params(message: String) -> McpError {
    McpError::invalid_params(message, None)
}

impl ServerHandler for NetdevMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(format!(
                "Network device MCP Server v{} - guarded commands on devices from testbed {}",
                env!("CARGO_PKG_VERSION"),
                self.config.testbed.display(),
            )),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> std::result::Result<ListToolsResult, McpError> {
        debug!("list_tools called");

        Ok(ListToolsResult {
            tools: self.tools(),
            next_cursor: None,
            meta: Default::default(),
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> std::result::Result<CallToolResult, McpError> {
        let tool_name: &str = request.name.as_ref();
        info!("call_tool: {}", tool_name);

        let tool = ToolName::from_name(tool_name).ok_or_else(|| {
            McpError::invalid_params(format!("Unknown tool: {}", tool_name), None)
        })?;

        self.run_tool(tool, request.arguments.unwrap_or_default())
            .await
    }
}
