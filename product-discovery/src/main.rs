use anyhow::{bail, Context, Result};
use clap::Parser;
use futures::StreamExt;
use product_discovery::config::{
    AgentRegistry, TaskRegistry, DEFAULT_AGENTS_YAML, DEFAULT_TASKS_YAML,
};
use product_discovery::executor::LlmExecutor;
use product_discovery::pipeline::{interpret, Pipeline, RunInput};
use product_discovery::tools::ToolSet;
use product_discovery_sdk::{log_banner, log_info, progress_channel, RunStatus};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Validate a product idea with a multi-agent research pipeline
#[derive(Parser, Debug)]
#[command(name = "product-discovery")]
struct Args {
    /// Product idea to validate
    #[arg(short, long)]
    idea: Option<String>,

    /// Target customer description
    #[arg(short, long)]
    customer: Option<String>,

    /// Constraints (budget, timeline, compliance)
    #[arg(long)]
    constraints: Option<String>,

    /// Industry or market category (e.g. fintech, healthcare, edtech)
    #[arg(long)]
    industry: Option<String>,

    /// Business model (e.g. B2C SaaS, B2B Enterprise)
    #[arg(long)]
    vertical: Option<String>,

    /// Render progressive partial views instead of a plain event log
    #[arg(long)]
    stream: bool,

    /// Abort the whole run after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Agents YAML overriding the built-in definitions
    #[arg(long)]
    agents_config: Option<PathBuf>,

    /// Tasks YAML overriding the built-in definitions
    #[arg(long)]
    tasks_config: Option<PathBuf>,
}

fn prompt(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn read_config(path: Option<PathBuf>, default: &str) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file {}", path.display())),
        None => Ok(default.to_string()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    log_banner!("Product Discovery AI");

    let idea = match args.idea {
        Some(idea) => idea,
        None => prompt("Product Idea")?,
    };
    let customer = match args.customer {
        Some(customer) => customer,
        None => prompt("Target Customer")?,
    };

    let input = RunInput::new(idea, customer, args.constraints, args.industry, args.vertical);
    if input.validate().is_err() {
        bail!("product idea and target customer are required");
    }

    let agents_yaml = read_config(args.agents_config, DEFAULT_AGENTS_YAML)?;
    let tasks_yaml = read_config(args.tasks_config, DEFAULT_TASKS_YAML)?;
    let agents = AgentRegistry::from_yaml(&agents_yaml)?;
    let tasks = TaskRegistry::from_yaml(&tasks_yaml)?;

    let tool_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;
    let model_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(300))
        .build()?;

    let mut pipeline = Pipeline::new(
        agents,
        tasks,
        ToolSet::standard(tool_client),
        Arc::new(LlmExecutor::from_env(model_client)),
    )?;
    if let Some(secs) = args.timeout_secs {
        pipeline = pipeline.with_timeout(Duration::from_secs(secs));
    }
    let pipeline = Arc::new(pipeline);

    log_info!(
        "Running {} research tasks... this may take a few minutes.",
        pipeline.task_count()
    );

    if args.stream {
        run_streaming(pipeline, input).await
    } else {
        run_oneshot(pipeline, input).await
    }
}

/// Blocking mode: live event log, then the terminal narrative
async fn run_oneshot(pipeline: Arc<Pipeline>, input: RunInput) -> Result<()> {
    let (sink, channel) = progress_channel();

    let printer = tokio::spawn(async move {
        loop {
            let finished = channel.is_finished();
            for event in channel.drain() {
                println!("{}", event.render());
            }
            if finished {
                break;
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    });

    let state = pipeline.execute(&input, sink).await;
    printer.await.ok();

    if state.status != RunStatus::Completed {
        bail!(
            "analysis failed: {}",
            state.error.as_deref().unwrap_or("unknown failure")
        );
    }

    let narrative = state.terminal_narrative().unwrap_or("");
    let summary = interpret(narrative);

    println!();
    log_banner!("FINAL PRODUCT RECOMMENDATION");
    println!("{}\n", narrative);
    if !summary.recommendation.is_empty() {
        println!("Recommendation: {}", summary.recommendation);
    }
    if !summary.confidence.is_empty() {
        println!("Confidence:     {}", summary.confidence);
    }
    if !summary.market_size_estimate.is_empty() {
        println!("Projected SOM:  {}", summary.market_size_estimate);
    }
    Ok(())
}

/// Streaming mode: re-render on every partial view, as a UI would
async fn run_streaming(pipeline: Arc<Pipeline>, input: RunInput) -> Result<()> {
    let stream = pipeline.execute_streaming(input);
    futures::pin_mut!(stream);

    let mut printed = 0usize;
    let mut last = None;
    while let Some(view) = stream.next().await {
        // The log only ever grows; print the new tail
        if view.activity_log.len() > printed {
            print!("{}", &view.activity_log[printed..]);
            io::stdout().flush().ok();
            printed = view.activity_log.len();
        }
        last = Some(view);
    }

    let Some(view) = last else {
        bail!("streaming run yielded no views");
    };

    println!();
    log_banner!("ANALYSIS RESULT");
    println!("{}\n", view.summary);
    if view.is_final && !view.full_report.is_empty() {
        println!("--- Full report ---\n{}", view.full_report);
    }
    Ok(())
}
