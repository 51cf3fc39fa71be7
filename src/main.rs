use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;

use agora::config::{ActionMode, NodeConfig};
use agora::decider::{LlmClient, LlmDecider};
use agora::platform::GitHubPlatform;
use agora::GovernanceNode;

#[derive(Parser, Debug)]
#[command(author, version, about = "Agora governance node")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Only cast votes
    #[arg(long)]
    vote_only: bool,

    /// Only respond to discussions
    #[arg(long)]
    respond_only: bool,

    /// Only create new proposals
    #[arg(long)]
    propose: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::from_default_env().add_directive(LevelFilter::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(LevelFilter::INFO.into())
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = if let Some(path) = &args.config {
        NodeConfig::from_file(path)?
    } else {
        NodeConfig::from_env()?
    };

    // CLI flags override the configured action mode.
    if args.vote_only {
        config.action_mode = ActionMode::VoteOnly;
    } else if args.respond_only {
        config.action_mode = ActionMode::Respond;
    } else if args.propose {
        config.action_mode = ActionMode::Propose;
    }

    info!(
        "starting agora node {} (mode: {})",
        config.node_name,
        config.action_mode.as_str()
    );

    let platform = Arc::new(GitHubPlatform::new(&config.main_repo, config.platform_token.clone())?);
    let decider = Arc::new(LlmDecider::new(LlmClient::from_config(&config)));

    let node = GovernanceNode::new(&config, platform, decider)?;
    let report = node.run_once().await?;

    info!(
        "invocation complete: {} proposals, {} decided, {} merged, action: {}",
        report.proposals_seen,
        report.outcomes.len(),
        report.merged.len(),
        report.action
    );
    Ok(())
}
