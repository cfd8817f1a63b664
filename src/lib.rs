pub mod agent;
pub mod models;
pub mod server;
pub mod config;
pub mod llm;
pub mod cli;
pub mod history;
pub mod session;
pub mod error;

use agent::ChatAgent;
use cli::Args;
use cli::repl::Repl;
use error::ConfigError;
use log::info;
use server::Server;
use session::{ ChatSession, TurnOutcome };
use std::error::Error;
use std::net::SocketAddr;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Chat Model: {}", args.chat_model);
    info!("Chat Base URL: {}", args.chat_base_url);
    info!(
        "System Instruction: {}",
        args.system_instruction_path.as_deref().unwrap_or("built-in")
    );
    info!("API Key Set: {}", !args.api_key.is_empty());
    if args.serve {
        info!("Mode: WebSocket server on {}", args.server_addr);
    } else if args.prompt.is_some() {
        info!("Mode: one-shot");
    } else {
        info!("Mode: interactive terminal");
    }
    info!("-------------------------");

    let agent = ChatAgent::new(&args)?;

    if args.serve {
        args.server_addr
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidAddr(args.server_addr.clone()))?;
        info!("Starting server on: {}", args.server_addr);
        let server = Server::new(args.server_addr.clone(), agent);
        return server.run().await;
    }

    if let Some(question) = args.prompt.as_deref() {
        return ask_once(&agent, question).await;
    }

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut repl = Repl::new(agent, stdin, std::io::stdout());
    repl.run().await?;
    Ok(())
}

async fn ask_once(agent: &ChatAgent, question: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
    let mut session = ChatSession::new();
    match agent.submit_without_streaming(&mut session, question, |_| {}).await {
        TurnOutcome::Rejected => Err("Prompt is empty".into()),
        TurnOutcome::Completed { content, .. } => {
            println!("{}", content);
            Ok(())
        }
        TurnOutcome::Failed { message, .. } => {
            eprintln!("{}", message);
            Err("Provider request failed".into())
        }
    }
}
