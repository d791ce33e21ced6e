use anyhow::{Context, Result};
use rmcp::{
    ServerHandler, ServiceExt,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

use crate::bot::PrintBot;
use crate::config::Config;
use crate::page_range::{self, PageSpec};

// Request structs for tools

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UserRequest {
    #[schemars(description = "Identifier of the chat user")]
    pub user_id: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UploadRequest {
    #[schemars(description = "Identifier of the chat user")]
    pub user_id: String,
    #[schemars(description = "Path of the received PDF or DOCX file, inside the inbox directory")]
    pub path: String,
    #[schemars(description = "Original file name (default: file name of path)")]
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SelectRequest {
    #[schemars(description = "Identifier of the chat user")]
    pub user_id: String,
    #[schemars(description = "Index of the file as shown by list_documents")]
    pub index: usize,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct PrintPagesRequest {
    #[schemars(description = "Identifier of the chat user")]
    pub user_id: String,
    #[schemars(description = "Pages to print (e.g., '1-5', '1,3,5' or 'all')")]
    pub pages: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CheckPagesRequest {
    #[schemars(description = "Page range to check (e.g., '1-5', '1,3,5' or 'all')")]
    pub pages: String,
    #[schemars(description = "Page count of the document to validate against")]
    #[serde(default)]
    pub total: Option<u32>,
}

#[derive(Clone)]
pub struct PrintServer {
    tool_router: ToolRouter<Self>,
    bot: Arc<PrintBot>,
    inbox: PathBuf,
}

impl PrintServer {
    /// `inbox` must exist; uploads are only read from below it.
    pub fn new(bot: PrintBot, inbox: &Path) -> Result<Self> {
        let inbox = inbox
            .canonicalize()
            .with_context(|| format!("Failed to resolve inbox directory: {}", inbox.display()))?;
        Ok(Self {
            tool_router: Self::tool_router(),
            bot: Arc::new(bot),
            inbox,
        })
    }

    /// Resolve `path` and make sure it names a file inside the inbox.
    async fn inbox_file(&self, path: &str) -> Result<PathBuf, String> {
        let resolved = tokio::fs::canonicalize(path)
            .await
            .map_err(|e| format!("could not read {}: {}", path, e))?;
        if !resolved.starts_with(&self.inbox) {
            return Err(format!("{} is outside the inbox directory", path));
        }
        Ok(resolved)
    }
}

#[tool_router]
impl PrintServer {
    #[tool(description = "Greet a user and explain how to upload and print documents")]
    fn start(&self, Parameters(UserRequest { user_id }): Parameters<UserRequest>) -> String {
        self.bot.start(&user_id)
    }

    #[tool(description = "Store a PDF or DOCX file a user sent so it can be printed later")]
    async fn upload_document(&self, Parameters(req): Parameters<UploadRequest>) -> String {
        let name = match req.name {
            Some(name) => name,
            None => Path::new(&req.path)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };

        let path = match self.inbox_file(&req.path).await {
            Ok(path) => path,
            Err(e) => {
                error!(user = %req.user_id, path = %req.path, "upload rejected: {}", e);
                return format!("Error: {}", e);
            }
        };

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(user = %req.user_id, path = %req.path, "failed to read upload: {}", e);
                return format!("Error: could not read {}: {}", req.path, e);
            }
        };

        self.bot.upload(&req.user_id, &name, bytes).await
    }

    #[tool(description = "List the files a user has uploaded, with the index used to select them")]
    async fn list_documents(&self, Parameters(UserRequest { user_id }): Parameters<UserRequest>) -> String {
        self.bot.list(&user_id).await
    }

    #[tool(description = "Select which uploaded file the next page range applies to")]
    async fn select_document(&self, Parameters(req): Parameters<SelectRequest>) -> String {
        self.bot.select(&req.user_id, req.index).await
    }

    #[tool(description = "Print pages of the selected file. Use page range syntax like '1-5,7' or 'all'. The file is deleted after a successful print.")]
    async fn print_pages(&self, Parameters(req): Parameters<PrintPagesRequest>) -> String {
        self.bot.print(&req.user_id, &req.pages).await
    }

    #[tool(description = "Expand a page range without printing, optionally checking it against a page count")]
    fn check_pages(&self, Parameters(req): Parameters<CheckPagesRequest>) -> String {
        let mut result = CheckPagesResult {
            input: req.pages.clone(),
            all: false,
            pages: Vec::new(),
            count: 0,
            total: req.total,
            valid: None,
            error: None,
        };

        match page_range::parse(&req.pages) {
            Ok(spec) => {
                if let PageSpec::Pages(pages) = &spec {
                    result.count = pages.len();
                    result.pages = pages.clone();
                } else {
                    result.all = true;
                }
                if let Some(total) = req.total {
                    match page_range::check(&spec, total) {
                        Ok(()) => result.valid = Some(true),
                        Err(e) => {
                            result.valid = Some(false);
                            result.error = Some(e.to_string());
                        }
                    }
                }
            }
            Err(e) => result.error = Some(e.to_string()),
        }

        serde_json::to_string_pretty(&result).unwrap_or_else(|e| format!("Error: {}", e))
    }

    #[tool(description = "Show which printer jobs are sent to")]
    async fn printer_status(&self) -> String {
        self.bot.printer_status().await
    }
}

// Result types for MCP tools

#[derive(Debug, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CheckPagesResult {
    pub input: String,
    pub all: bool,
    pub pages: Vec<u32>,
    pub count: usize,
    pub total: Option<u32>,
    pub valid: Option<bool>,
    pub error: Option<String>,
}

#[tool_handler]
impl ServerHandler for PrintServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Print bot. Use start to greet a user, upload_document when they send a file, \
                 list_documents and select_document to choose a file, and print_pages with the \
                 page range they want printed. check_pages previews a range without printing."
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

pub async fn run_server(config: &Config) -> Result<()> {
    let store = config.upload_store();
    let pipeline = config.pipeline()?;
    let inbox = config.inbox_dir();
    std::fs::create_dir_all(&inbox)
        .with_context(|| format!("Failed to create directory: {}", inbox.display()))?;
    info!(
        storage = %store.root().display(),
        inbox = %inbox.display(),
        "starting MCP server"
    );

    let server = PrintServer::new(PrintBot::new(store, Arc::new(pipeline)), &inbox)?;

    // Serve using stdin/stdout as a tuple
    let service = server.serve((tokio::io::stdin(), tokio::io::stdout())).await?;

    service.waiting().await?;

    Ok(())
}
