use crate::config::Config;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "printdrop")]
#[command(about = "Print uploaded PDF and DOCX documents, with an MCP chat front-end")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub config: Config,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run as MCP server (chat front-end)
    #[command(alias = "mcp")]
    Serve,

    /// Print pages of a local PDF or DOCX file
    Print {
        /// Document to print
        path: PathBuf,

        /// Pages to print (e.g., "1-5,7" or "all")
        #[arg(short, long, default_value = "all")]
        pages: String,

        /// Job name shown in the print queue (default: file name)
        #[arg(short = 'n', long)]
        job_name: Option<String>,
    },

    /// Show format and page count of a document
    Info {
        /// Document to inspect
        path: PathBuf,
    },

    /// Check a page specification without printing
    Check {
        /// Page specification (e.g., "1-3,5")
        pages: String,

        /// Validate against a document with this many pages
        #[arg(short, long)]
        total: Option<u32>,
    },

    /// Show the printer jobs would be sent to
    Printers,
}
