use std::io::{self, Write};
use std::path::PathBuf;

use rand::SeedableRng;
use rand::rngs::StdRng;

use trackside::config::Config;
use trackside::prompt::{PromptStrategy, STRATEGY_NAMES};
use trackside::report::{ReportPipeline, persist_report};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    dotenvy::dotenv().ok();

    let config = Config::load();
    tracing::info!(model = %config.model, "trackside starting");

    let data_path = prompt_line("Enter the path to the data file: ")?;
    let data = std::fs::read_to_string(data_path.trim())?;

    let strategy_input = prompt_line(&format!(
        "Enter the type of prompt engineering to use ({}): ",
        STRATEGY_NAMES.join(", ")
    ))?;
    // Validated before anything else happens: an unknown strategy must
    // fail without touching the examples directory or the network.
    let strategy: PromptStrategy = match strategy_input.trim().parse() {
        Ok(strategy) => strategy,
        Err(e) => {
            eprintln!("{}", e.user_message());
            std::process::exit(1);
        }
    };

    let save_path = PathBuf::from(prompt_line("Enter the path to save the report: ")?.trim());

    let pipeline = ReportPipeline::new(config);
    let mut rng = StdRng::from_entropy();

    let report = match pipeline.run(&data, strategy, &mut rng).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("report generation failed: {e}");
            eprintln!("{}", e.user_message());
            std::process::exit(1);
        }
    };

    persist_report(&save_path, &report.text).await?;

    println!("Report saved to: {}", save_path.display());
    println!("Token estimate: {}", report.token_estimate);

    Ok(())
}

fn prompt_line(label: &str) -> io::Result<String> {
    print!("{label}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line)
}
