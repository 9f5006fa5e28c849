//! MCP server - stdio transport

use anyhow::{Context, Result};
use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::sync::Arc;

use super::protocol::{
    Request, Response, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND,
    PARSE_ERROR, PROTOCOL_VERSION,
};
use super::tools;
use crate::config::Config;
use crate::search::{SearchRequest, SmartSearch};
use crate::slack::{SlackApi, SlackClient};

/// Tool state shared by every request
pub struct McpServer {
    slack: Option<Arc<dyn SlackApi>>,
    search: Option<SmartSearch>,
    mode: String,
}

impl McpServer {
    /// `search` should wrap the same Slack client as `slack`
    pub fn new(slack: Option<Arc<dyn SlackApi>>, search: Option<SmartSearch>) -> Self {
        let mode = match &search {
            Some(s) if s.is_semantic() => "semantic",
            _ => "keyword",
        }
        .to_string();
        Self { slack, search, mode }
    }

    /// Wire up Slack, the model capability and semantic ranking from config
    pub fn from_config(config: &Config) -> Self {
        let slack: Option<Arc<dyn SlackApi>> = match SlackClient::from_config(&config.slack) {
            Ok(Some(client)) => Some(Arc::new(client)),
            Ok(None) => {
                tracing::warn!("SLACK_BOT_TOKEN not set, Slack tools disabled");
                None
            }
            Err(e) => {
                tracing::warn!("Slack client unavailable: {e}");
                None
            }
        };

        let search = slack
            .as_ref()
            .map(|slack| SmartSearch::from_config(Arc::clone(slack), config));

        Self::new(slack, search)
    }

    /// Response for one request; `None` for notifications
    pub fn handle(&self, req: &Request) -> Option<Response> {
        if req.jsonrpc != "2.0" {
            return Some(Response::error(
                req.id.clone(),
                INVALID_REQUEST,
                &format!(
                    "Invalid JSON-RPC version: expected 2.0, got {}",
                    req.jsonrpc
                ),
            ));
        }
        if req.is_notification() {
            tracing::debug!(method = %req.method, "notification");
            return None;
        }
        Some(self.dispatch(req))
    }

    fn dispatch(&self, req: &Request) -> Response {
        match req.method.as_str() {
            "initialize" => self.handle_initialize(req),
            "ping" => Response::success(req.id.clone(), json!({})),
            "tools/list" => Response::success(req.id.clone(), tools::tool_definitions()),
            "tools/call" => self.handle_tool_call(req),
            "resources/list" => Response::success(req.id.clone(), tools::resource_definitions()),
            "resources/read" => self.handle_resource_read(req),
            _ => Response::error(req.id.clone(), METHOD_NOT_FOUND, "Method not found"),
        }
    }

    fn handle_initialize(&self, req: &Request) -> Response {
        Response::success(
            req.id.clone(),
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {
                    "tools": {},
                    "resources": {}
                },
                "serverInfo": {
                    "name": "slack-mcp",
                    "version": env!("CARGO_PKG_VERSION"),
                    "slack": self.slack.is_some(),
                    "ranking": self.mode
                }
            }),
        )
    }

    fn handle_tool_call(&self, req: &Request) -> Response {
        let Some(name) = req.params.get("name").and_then(|v| v.as_str()) else {
            return Response::error(req.id.clone(), INVALID_PARAMS, "Missing tool name");
        };
        let missing = |param: &str| {
            Response::error(
                req.id.clone(),
                INVALID_PARAMS,
                &format!("Missing required parameter: {}", param),
            )
        };

        let known = matches!(
            name,
            "slack_list_channels"
                | "slack_get_channel_messages"
                | "slack_search_messages"
                | "slack_get_user_info"
                | "slack_send_message"
                | "slack_smart_search"
        );
        if !known {
            return Response::error(
                req.id.clone(),
                INVALID_PARAMS,
                &format!("Unknown tool: {}", name),
            );
        }
        let Some(slack) = self.slack.as_deref() else {
            return Response::text(req.id.clone(), tools::NOT_INITIALIZED);
        };

        let text = match name {
            "slack_list_channels" => tools::list_channels(slack),
            "slack_get_channel_messages" => {
                let Some(channel) = req.arg_str("channel_id") else {
                    return missing("channel_id");
                };
                tools::channel_messages(slack, channel, req.arg_u64("limit"))
            }
            "slack_search_messages" => {
                let Some(query) = req.arg_str("query") else {
                    return missing("query");
                };
                tools::search_messages(
                    slack,
                    query,
                    req.arg_str("channel_id").filter(|c| !c.is_empty()),
                    req.arg_u64("limit"),
                )
            }
            "slack_get_user_info" => {
                let Some(user) = req.arg_str("user_id") else {
                    return missing("user_id");
                };
                tools::user_info(slack, user)
            }
            "slack_send_message" => {
                let (Some(channel), Some(text)) = (req.arg_str("channel_id"), req.arg_str("text"))
                else {
                    return missing("channel_id and text");
                };
                tools::send_message(slack, channel, text)
            }
            "slack_smart_search" => {
                let Some(query) = req.arg_str("query") else {
                    return missing("query");
                };
                let Some(search) = &self.search else {
                    return Response::text(req.id.clone(), tools::NOT_INITIALIZED);
                };
                let request = SearchRequest {
                    query: query.to_string(),
                    channel_id: req
                        .arg_str("channel_id")
                        .filter(|c| !c.is_empty())
                        .map(String::from),
                    max_results: req
                        .arg_u64("max_results")
                        .map(|n| usize::try_from(n).unwrap_or(usize::MAX))
                        .unwrap_or(10),
                    include_summary: req.arg_bool("include_summary").unwrap_or(true),
                };
                search.search(&request)
            }
            _ => {
                return Response::error(req.id.clone(), INTERNAL_ERROR, "Unhandled tool");
            }
        };

        Response::text(req.id.clone(), text)
    }

    fn handle_resource_read(&self, req: &Request) -> Response {
        let Some(uri) = req.params.get("uri").and_then(|v| v.as_str()) else {
            return Response::error(req.id.clone(), INVALID_PARAMS, "Missing required parameter: uri");
        };

        let text = match uri {
            "slack://channels" => match self.slack.as_deref() {
                Some(slack) => tools::list_channels(slack),
                None => tools::NOT_INITIALIZED.to_string(),
            },
            "slack://status" => tools::status(self.slack.is_some()),
            other => {
                return Response::error(
                    req.id.clone(),
                    INVALID_PARAMS,
                    &format!("Unknown Slack resource: {}", other),
                )
            }
        };

        Response::success(
            req.id.clone(),
            json!({
                "contents": [{ "uri": uri, "mimeType": "text/plain", "text": text }]
            }),
        )
    }
}

/// Serve newline-delimited JSON-RPC from `reader` to `writer`
pub fn serve<R: BufRead, W: Write>(server: &McpServer, reader: R, mut writer: W) -> Result<()> {
    for line in reader.lines() {
        let line = line.context("Failed to read request")?;
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => server.handle(&request),
            Err(e) => Some(Response::error(
                None,
                PARSE_ERROR,
                &format!("Parse error: {}", e),
            )),
        };

        if let Some(response) = response {
            writeln!(writer, "{}", serde_json::to_string(&response)?)?;
            writer.flush()?;
        }
    }
    Ok(())
}

/// Run MCP server over stdio
pub fn run_mcp_server(config: &Config) -> Result<()> {
    let server = McpServer::from_config(config);
    tracing::info!(ranking = %server.mode, "slack-mcp: MCP server ready");

    let stdin = std::io::stdin();
    let reader = BufReader::new(stdin.lock());
    serve(&server, reader, std::io::stdout())
}
