use super::commands::{Cli, Commands};
use anyhow::{Context, Result};
use futures_util::StreamExt;
use llmrelay::config::Config;
use llmrelay::llm::{
    AskOptions, MemoryChatSettings, Message, ModelInfo, ModelParams, ProviderRegistry,
};
use llmrelay::tools::ToolRegistry;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

pub async fn dispatch(cli: Cli, config: Config) -> Result<()> {
    let registry = ProviderRegistry::from_config(&config)?
        .with_chat_settings(Arc::new(MemoryChatSettings::new()));

    match cli.command {
        Commands::Ask {
            message,
            stream,
            model,
            chat,
            prompt,
            system,
            web,
            temperature,
            max_tokens,
            tools,
        } => {
            let options = AskOptions {
                chat_id: chat,
                model_spec: model,
                prompt,
                params: ModelParams {
                    temperature,
                    max_tokens,
                    ..ModelParams::default()
                },
                web_search: web,
                ..AskOptions::default()
            };
            let mut messages = Vec::with_capacity(2);
            if let Some(system) = system {
                messages.push(Message::system(system));
            }
            messages.push(Message::user(message));
            let tools = load_tools(tools.as_ref())?;

            if stream {
                ask_streaming(&registry, messages, &tools, &options).await
            } else {
                let completion = registry
                    .ask(messages, tools.as_request_tools(), &options)
                    .await?;
                println!("{}", completion.content);
                for call in &completion.tool_calls {
                    println!("[tool] {}({})", call.function.name, call.function.arguments);
                }
                if let Some(usage) = completion.usage {
                    tracing::info!(
                        model = %completion.model.id,
                        prompt_tokens = usage.prompt_tokens,
                        completion_tokens = usage.completion_tokens,
                        "Completion finished"
                    );
                }
                Ok(())
            }
        }
        Commands::Models {
            provider,
            free,
            fresh,
        } => {
            let models = registry.models(provider.as_deref(), free, fresh).await?;
            for model in &models {
                println!("{}", describe(model));
            }
            Ok(())
        }
        Commands::Resolve { spec, chat } => {
            let resolved = registry.resolve_model(spec.as_deref(), chat).await?;
            println!("{}:{}", resolved.provider.name(), resolved.model.id);
            Ok(())
        }
        Commands::Find { model, provider } => {
            let found = registry
                .get_formatted_model(&model, provider.as_deref())
                .await?;
            println!("{found}");
            Ok(())
        }
        Commands::RandomFree { provider } => {
            let spec = registry.random_free_model(provider.as_deref()).await?;
            println!("{spec}");
            Ok(())
        }
    }
}

fn load_tools(path: Option<&PathBuf>) -> Result<ToolRegistry> {
    match path {
        Some(path) => ToolRegistry::from_json_file(path),
        None => Ok(ToolRegistry::default()),
    }
}

async fn ask_streaming(
    registry: &ProviderRegistry,
    messages: Vec<Message>,
    tools: &ToolRegistry,
    options: &AskOptions,
) -> Result<()> {
    let (mut stream, model) = registry
        .ask_stream(messages, tools.as_request_tools(), options)
        .await?;
    tracing::debug!(model = %model.id, "Streaming reply");

    let mut stdout = std::io::stdout().lock();
    while let Some(chunk) = stream.next().await {
        if let Some(err) = chunk.error {
            writeln!(stdout)?;
            return Err(err).context("Stream ended with an error");
        }
        if !chunk.text.is_empty() {
            write!(stdout, "{}", chunk.text)?;
            stdout.flush()?;
        }
        for call in &chunk.tool_calls {
            writeln!(stdout, "\n[tool] {}({})", call.function.name, call.function.arguments)?;
        }
    }
    writeln!(stdout)?;
    Ok(())
}

fn describe(model: &ModelInfo) -> String {
    let mut line = format!("{}:{}", model.provider, model.id);
    if let Some(context) = model.context_length {
        line.push_str(&format!("  ctx={context}"));
    }
    if model.is_free() {
        line.push_str("  (free)");
    }
    line
}
