use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use console::Style;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use resume_agents::cli::{Cli, Command, ProfileCommand};
use resume_agents::config::RunConfig;
use resume_agents::context::RunInput;
use resume_agents::evaluation::LlmJudge;
use resume_agents::llm::AnthropicClient;
use resume_agents::orchestrator::{OrchestrationGraph, RunResult};
use resume_agents::retrieval::{EmbeddingProvider, HashingEmbedder, JsonProfileStore, ProfileService};
use resume_agents::state_machine::Node;
use resume_agents::ui::{RunProgress, print_search};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = RunConfig::load()?;
    cli.apply(&mut config);
    config.validate()?;

    match &cli.command {
        Command::Run {
            input,
            profile,
            output,
        } => run(&config, input, profile.clone(), output.as_deref()).await,
        Command::Profile { action } => profile_command(&config, action),
        Command::Search {
            profile,
            query,
            top_k,
        } => {
            let service = profile_service(&config);
            service.load(profile)?;
            let evidence = service.evidence(
                config.retrieval.mode,
                config.retrieval.alpha,
                top_k.unwrap_or(config.retrieval.top_k),
            );
            print_search(&evidence.lookup(query));
            Ok(())
        }
        Command::Status => status(&config),
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn profile_service(config: &RunConfig) -> ProfileService<JsonProfileStore> {
    let embedder: Option<Arc<dyn EmbeddingProvider>> = if config.retrieval.advanced {
        Some(Arc::new(HashingEmbedder::default()))
    } else {
        None
    };
    ProfileService::new(JsonProfileStore::new(&config.profiles_dir), embedder)
}

async fn run(
    config: &RunConfig,
    input: &Path,
    profile: Option<String>,
    output: Option<&Path>,
) -> Result<()> {
    let raw = std::fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let run_input: RunInput = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {}", input.display()))?;
    let profile = profile.or_else(|| run_input.profile.clone());
    let context = run_input.into_context();

    if config.api_key.is_empty() {
        bail!("ANTHROPIC_API_KEY is not set (environment or resume-agents.toml)");
    }
    let llm = AnthropicClient::new(config.api_key.clone());

    // A profile that cannot be loaded leaves the run without evidence.
    let service = profile_service(config);
    let has_profile = match &profile {
        Some(name) => match service.load(name) {
            Ok(status) => {
                info!(profile = %name, vectors = %status, "profile loaded");
                true
            }
            Err(e) => {
                warn!(profile = %name, error = %e, "continuing without experience evidence");
                false
            }
        },
        None => false,
    };
    let evidence = service.evidence(
        config.retrieval.mode,
        config.retrieval.alpha,
        config.retrieval.top_k,
    );

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, stopping at the next checkpoint");
                cancel.cancel();
            }
        });
    }

    let progress = RunProgress::start(&context.company_name);
    let judge = LlmJudge::new(&llm, config, &cancel);
    let mut graph =
        OrchestrationGraph::new(&llm, judge, config, cancel.clone()).with_observer(&progress);
    if has_profile {
        graph = graph.with_evidence(&evidence);
    }
    let result = graph.run(context).await;
    progress.print_report(&result.report);

    if let Some(dir) = output {
        write_outputs(dir, &result)?;
    }
    match result.report.terminal {
        Node::Aborted => bail!("run aborted: required input is missing"),
        Node::Cancelled => bail!("run cancelled"),
        _ => Ok(()),
    }
}

fn write_json<T: serde::Serialize>(dir: &Path, name: &str, value: &T) -> Result<()> {
    let path = dir.join(name);
    std::fs::write(&path, serde_json::to_string_pretty(value)?)
        .with_context(|| format!("failed to write {}", path.display()))
}

fn write_outputs(dir: &Path, result: &RunResult) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let final_state = &result.final_state;
    write_json(dir, "report.json", &result.report)?;
    write_json(dir, "analysis_result.json", &final_state.analysis_result())?;
    write_json(dir, "question_guides.json", &final_state.question_guides())?;
    write_json(dir, "experience_matches.json", &final_state.experience_matches())?;

    let fragments = final_state.document_fragments();
    if !fragments.is_empty() {
        write_json(dir, "document_fragments.json", &fragments)?;
    }
    if let Some(doc) = final_state.combined_document() {
        std::fs::write(dir.join("document.md"), doc)?;
    }
    println!("  resultados gravados em {}", dir.display());
    Ok(())
}

fn profile_command(config: &RunConfig, action: &ProfileCommand) -> Result<()> {
    let green = Style::new().green().bold();
    match action {
        ProfileCommand::Save { name, file } => {
            let raw = std::fs::read_to_string(file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let value: serde_json::Value = serde_json::from_str(&raw)?;
            let service = profile_service(config);
            let status = service.save(name, &value)?;
            println!(
                "  {} perfil `{name}` salvo: {} registros, vetores {status}",
                green.apply_to("✓"),
                service.index().snapshot().len()
            );
        }
        ProfileCommand::List => {
            let store = JsonProfileStore::new(&config.profiles_dir);
            for name in store.list()? {
                println!("  {name}");
            }
        }
    }
    Ok(())
}

fn status(config: &RunConfig) -> Result<()> {
    let bold = Style::new().bold();
    println!("{}", bold.apply_to("resume-agents"));
    println!(
        "  chave API: {}",
        if config.api_key.is_empty() { "ausente" } else { "configurada" }
    );
    println!("  revisões por categoria: {}", config.analysis_depth.revision_budget());
    println!(
        "  categorias: {}",
        config
            .route()
            .plan()
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(" → ")
    );
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
