use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// `llmrelay` - one client over OpenAI-style chat-completion backends.
#[derive(Parser, Debug)]
#[command(name = "llmrelay")]
#[command(version = "0.1.0")]
#[command(about = "Ask any configured chat-completion backend.", long_about = None)]
pub struct Cli {
    /// Config file (defaults to $LLMRELAY_CONFIG, then ~/.llmrelay/config.toml)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send one prompt and print the reply
    Ask {
        /// The user message
        message: String,

        /// Print text as it arrives
        #[arg(long)]
        stream: bool,

        /// Model spec, `provider:model`
        #[arg(short, long)]
        model: Option<String>,

        /// Chat whose stored model and params apply
        #[arg(long, default_value_t = 0)]
        chat: i64,

        /// Named prompt whose params apply
        #[arg(long)]
        prompt: Option<String>,

        /// System message
        #[arg(long)]
        system: Option<String>,

        /// Attach the web-search plugin
        #[arg(long)]
        web: bool,

        /// Temperature (0.0 - 2.0)
        #[arg(short, long)]
        temperature: Option<f64>,

        #[arg(long)]
        max_tokens: Option<u32>,

        /// JSON file of tool declarations
        #[arg(long)]
        tools: Option<PathBuf>,
    },

    /// List models from one provider or all of them
    Models {
        #[arg(short, long)]
        provider: Option<String>,

        /// Only zero-priced models
        #[arg(long)]
        free: bool,

        /// Bypass the cached catalog
        #[arg(long)]
        fresh: bool,
    },

    /// Show which provider and model a spec resolves to
    Resolve {
        /// Model spec, `provider:model`; omit to use the chat or default
        spec: Option<String>,

        #[arg(long, default_value_t = 0)]
        chat: i64,
    },

    /// Find which provider serves a model name or alias
    Find {
        model: String,

        #[arg(short, long)]
        provider: Option<String>,
    },

    /// Pick a random free model
    RandomFree {
        #[arg(short, long)]
        provider: Option<String>,
    },
}
