//! MCP server exposing the exploration session to AI assistants.

mod types;

pub use types::*;

use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use serde::Serialize;
use uuid::Uuid;

use crate::error::ExploreError;
use crate::models::ExplorationSummary;
use crate::render::render_tree;
use crate::session::Explorer;

#[derive(Clone)]
pub struct McpServer {
    explorer: Explorer,
    tool_router: ToolRouter<Self>,
}

impl McpServer {
    pub fn new(explorer: Explorer) -> Self {
        Self {
            explorer,
            tool_router: Self::tool_router(),
        }
    }

    fn parse_uuid(s: &str) -> Result<Uuid, McpError> {
        Uuid::parse_str(s)
            .map_err(|e| McpError::invalid_params(format!("Invalid UUID: {}", e), None))
    }

    fn explore_err(e: ExploreError) -> McpError {
        match e {
            ExploreError::NotFound(_) | ExploreError::ImportMalformed(_) => {
                McpError::invalid_params(e.to_string(), None)
            }
            _ => McpError::internal_error(e.to_string(), None),
        }
    }

    fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
        let json = serde_json::to_string_pretty(value)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    // ============================================================
    // Tool logic, shared with tests
    // ============================================================

    pub async fn explore_item(
        &self,
        query: &str,
        parent_id: Option<&str>,
    ) -> Result<ItemInfo, McpError> {
        let parent_id = parent_id.map(Self::parse_uuid).transpose()?;
        let item = self
            .explorer
            .explore(query, parent_id, None)
            .await
            .map_err(Self::explore_err)?;
        Ok(ItemInfo::from(&item))
    }

    pub fn navigate_item(&self, item_id: &str) -> Result<ItemInfo, McpError> {
        let id = Self::parse_uuid(item_id)?;
        let item = self.explorer.navigate_to(id).map_err(Self::explore_err)?;
        Ok(ItemInfo::from(&item))
    }

    pub fn current(&self) -> CurrentItemResponse {
        let state = self.explorer.snapshot();
        CurrentItemResponse {
            breadcrumb: state.history.iter().map(|item| item.name.clone()).collect(),
            item: state.current_item.as_ref().map(ItemInfo::from),
            stage: state.status.stage.as_str().to_string(),
            message: state.status.message,
        }
    }

    pub fn summaries(&self) -> Vec<ExplorationSummary> {
        self.explorer
            .collection()
            .iter()
            .map(ExplorationSummary::from)
            .collect()
    }

    pub fn rendered_tree(&self, root_id: Option<&str>) -> Result<String, McpError> {
        let root_id = match root_id {
            Some(id) => Self::parse_uuid(id)?,
            None => self
                .explorer
                .history()
                .first()
                .map(|root| root.id)
                .ok_or_else(|| McpError::invalid_params("No exploration is open", None))?,
        };
        let root = self
            .explorer
            .collection()
            .into_iter()
            .find(|root| root.id == root_id)
            .ok_or_else(|| McpError::invalid_params("Exploration not found", None))?;
        let current = self.explorer.current_item().map(|item| item.id);
        Ok(render_tree(&[root], current))
    }
}

#[tool_router]
impl McpServer {
    #[tool(
        description = "Break an object down into its parts. Without parent_id this starts a new exploration. With parent_id it explores one part of that item in context (exploring 'Seed' under 'Avocado' analyzes an avocado seed). Parts already explored are reused instantly. Returns the item with its parts, facts and characteristics. Fails while another exploration is running or when no API key is configured."
    )]
    async fn explore(
        &self,
        params: Parameters<ExploreRequest>,
    ) -> Result<CallToolResult, McpError> {
        let req = params.0;
        let info = self
            .explore_item(&req.query, req.parent_id.as_deref())
            .await?;
        Self::json_result(&info)
    }

    #[tool(
        description = "Move to another item in a stored exploration, such as a parent from the breadcrumb. Returns that item."
    )]
    async fn navigate_to(
        &self,
        params: Parameters<NavigateRequest>,
    ) -> Result<CallToolResult, McpError> {
        let info = self.navigate_item(&params.0.item_id)?;
        Self::json_result(&info)
    }

    #[tool(
        description = "Show the item being viewed, the breadcrumb from its exploration root, and the progress of any running exploration."
    )]
    async fn current_item(&self) -> Result<CallToolResult, McpError> {
        Self::json_result(&self.current())
    }

    #[tool(description = "List stored explorations, newest first, with how many items each holds.")]
    async fn list_explorations(&self) -> Result<CallToolResult, McpError> {
        Self::json_result(&self.summaries())
    }

    #[tool(
        description = "Render an exploration as an ASCII tree. Filled markers are parts that have been broken down further; the arrow marks the item being viewed."
    )]
    async fn render_tree(
        &self,
        params: Parameters<RenderTreeRequest>,
    ) -> Result<CallToolResult, McpError> {
        let rendered = self.rendered_tree(params.0.root_id.as_deref())?;
        Ok(CallToolResult::success(vec![Content::text(rendered)]))
    }

    #[tool(description = "Close the current exploration and clear any error. Stored explorations are kept.")]
    async fn reset(&self) -> Result<CallToolResult, McpError> {
        self.explorer.reset();
        Ok(CallToolResult::success(vec![Content::text(
            "Session reset to idle",
        )]))
    }
}

#[tool_handler]
impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: rmcp::model::Implementation {
                name: "teardown".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                title: None,
                icons: None,
                website_url: None,
            },
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            instructions: Some(
                r#"teardown explores objects by recursively breaking them into parts.

WORKFLOW:
1. explore with a query and no parent_id to start, e.g. "Espresso machine"
2. Read the returned parts; explore one of them with parent_id set to the item id
3. navigate_to any item id to move back up; current_item shows the breadcrumb
4. render_tree shows everything explored so far

Exploring a part that was already explored under the same parent is instant and
does not generate anything new. Only one exploration runs at a time."#
                    .into(),
            ),
            ..Default::default()
        }
    }
}

pub async fn run_stdio_server(explorer: Explorer) -> anyhow::Result<()> {
    use tokio::io::{stdin, stdout};

    tracing::info!("Starting MCP server via stdio");

    let service = McpServer::new(explorer.clone());
    let server = service.serve((stdin(), stdout())).await?;

    let quit_reason = server.waiting().await?;
    tracing::info!("MCP server stopped: {:?}", quit_reason);

    explorer.settle().await;
    Ok(())
}
