//! Simple MCP - SSE tool server and client
//!
//! `serve` runs the server with the demo tools; `tools`, `hello`, and
//! `add` drive it as a client. With no subcommand the client starts an
//! interactive prompt loop.

use std::io::Write;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::json;

use simple_mcp::client::SseClient;
use simple_mcp::config::Config;
use simple_mcp::error::{Result, SimpleMcpError};
use simple_mcp::server::{self, AppState, Dispatcher};

const SERVER_NAME: &str = "simple-mcp";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Simple MCP server and client over an SSE transport
#[derive(Parser)]
#[command(name = "simple-mcp")]
#[command(author, version, about = "Tool-invocation server and client over an event stream")]
struct Cli {
    /// Event-stream URL for client commands
    #[arg(long, global = true)]
    url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the tool server
    Serve {
        /// Bind host (overrides SIMPLE_MCP_HOST)
        #[arg(long)]
        host: Option<String>,

        /// Bind port (overrides SIMPLE_MCP_PORT)
        #[arg(long)]
        port: Option<u16>,
    },

    /// List the tools the server exposes
    Tools,

    /// Call the hello_world tool
    Hello {
        /// Name to greet
        name: Option<String>,
    },

    /// Call the add tool
    Add { a: i64, b: i64 },
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::new()?;

    // DEBUG_LEVEL drives verbosity, matching the reference server.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&config.debug_level)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve { host, port }) => {
            let mut config = config;
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            run_server(&config).await
        }
        Some(Commands::Tools) => run_tools(&config, cli.url.as_deref()).await,
        Some(Commands::Hello { name }) => run_hello(&config, cli.url.as_deref(), name).await,
        Some(Commands::Add { a, b }) => run_add(&config, cli.url.as_deref(), a, b).await,
        None => interactive_mode(&config, cli.url.as_deref()).await,
    }
}

async fn run_server(config: &Config) -> Result<()> {
    let mut registry = server::ToolRegistry::new();
    server::tools::register_builtins(&mut registry)?;

    let dispatcher = Dispatcher::new(Arc::new(registry), SERVER_NAME, SERVER_VERSION);
    let state = AppState::new(dispatcher);

    eprintln!("Starting server on {}:{}...", config.host, config.port);
    server::serve(config.bind_addr()?, state).await
}

fn make_client(config: &Config, url: Option<&str>) -> Result<SseClient> {
    let url = url.unwrap_or(&config.server_url);
    Ok(SseClient::new(url)?.with_default_timeout(config.call_timeout))
}

async fn run_tools(config: &Config, url: Option<&str>) -> Result<()> {
    let client = make_client(config, url)?;
    let tools = client.list_tools().await.map_err(SimpleMcpError::Call)?;

    println!("Available tools:");
    for tool in tools {
        println!(" - {}: {}", tool.name, tool.description.unwrap_or_default());
    }
    Ok(())
}

async fn run_hello(config: &Config, url: Option<&str>, name: Option<String>) -> Result<()> {
    let client = make_client(config, url)?;
    let arguments = match name {
        Some(name) => json!({ "name": name }),
        None => json!({}),
    };

    let result = client
        .call("hello_world", arguments, config.call_timeout)
        .await
        .map_err(SimpleMcpError::Call)?;
    println!("{}", result);
    Ok(())
}

async fn run_add(config: &Config, url: Option<&str>, a: i64, b: i64) -> Result<()> {
    let client = make_client(config, url)?;
    let result = client
        .call("add", json!({ "a": a, "b": b }), config.call_timeout)
        .await
        .map_err(SimpleMcpError::Call)?;
    println!("{}", result);
    Ok(())
}

async fn interactive_mode(config: &Config, url: Option<&str>) -> Result<()> {
    let client = make_client(config, url)?;
    let timeout = config.call_timeout;

    println!("Interactive mode");
    println!("Type 'exit' to quit, 'tools' to list available tools");

    loop {
        let command = prompt("\nEnter command (hello, add, tools, exit): ")?;

        match command.as_str() {
            "exit" => {
                println!("Goodbye!");
                break;
            }
            "tools" => match client.list_tools().await {
                Ok(tools) => {
                    println!("\nAvailable tools:");
                    for tool in tools {
                        println!(" - {}: {}", tool.name, tool.description.unwrap_or_default());
                    }
                }
                Err(e) => println!("Error listing tools: {}", e),
            },
            "hello" => {
                let name = prompt("Enter name (or press Enter for default): ")?;
                let arguments = if name.is_empty() {
                    json!({})
                } else {
                    json!({ "name": name })
                };
                match client.call("hello_world", arguments, timeout).await {
                    Ok(result) => println!("\nResult: {}", result),
                    Err(e) => println!("Error calling hello_world: {}", e),
                }
            }
            "add" => {
                let a = prompt("Enter first number: ")?;
                let b = prompt("Enter second number: ")?;
                match (a.parse::<i64>(), b.parse::<i64>()) {
                    (Ok(a), Ok(b)) => {
                        match client.call("add", json!({ "a": a, "b": b }), timeout).await {
                            Ok(result) => println!("\nResult: {}", result),
                            Err(e) => println!("Error calling add: {}", e),
                        }
                    }
                    _ => println!("Error: Please enter valid numbers"),
                }
            }
            "" => {}
            other => {
                println!(
                    "Unknown command: {}. Available commands: hello, add, tools, exit",
                    other
                );
            }
        }
    }

    Ok(())
}

fn prompt(message: &str) -> Result<String> {
    print!("{}", message);
    std::io::stdout().flush()?;

    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
