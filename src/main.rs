use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

use penmanship::config::GeneratorConfig;
use penmanship::request::WorksheetRequest;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    penmanship::logging::init().context("init logging")?;

    let cli = penmanship::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    let request = cli.request().context("validate request")?;
    let config = GeneratorConfig::from_env()
        .context("load config from env")?
        .with_cli(&cli)
        .context("apply cli options")?;

    print_banner(&request);

    let worksheet = match penmanship::generator::generate(&request, &config).await {
        Ok(worksheet) => worksheet,
        Err(err) => {
            let category = err.category();
            eprintln!("✗ Worksheet generation failed ({category} error)");
            for hint in category.hints() {
                eprintln!("  - {hint}");
            }
            return Err(err).context("generate worksheet");
        }
    };

    let size = std::fs::metadata(&worksheet.path)
        .with_context(|| format!("stat output: {}", worksheet.path.display()))?
        .len();
    println!("✓ Worksheet saved: {} ({size} bytes)", worksheet.path.display());
    if worksheet.source.is_degraded() {
        println!(
            "! No PDF was captured from the site; saved a screenshot of the page instead (use --no-screenshot-fallback to fail)"
        );
    }

    Ok(())
}

fn print_banner(request: &WorksheetRequest) {
    println!("Creating handwriting worksheet");
    println!("  text:         {}", request.text());
    println!("  output:       {}", request.output().display());
    println!("  line style:   {}", request.line_style().label().to_lowercase());
    println!("  letter style: {}", request.letter_style().as_str());
    println!(
        "  browser:      {}",
        if request.visible() { "visible" } else { "headless" }
    );
}
