use anyhow::Context;
use chrono::Local;
use clap::Parser;
use serde_json::json;
use tracing::info;

use subkill::cli::{Cli, OutputFormat};
use subkill::config::Settings;
use subkill::output;
use subkill::scanner::SubdomainScanner;
use subkill::stage::{self, StageReport};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings::from_env().context("failed to load settings from environment")?;
    let plan = args.to_plan(&settings)?;
    let domain = plan.config.domain.clone();

    let out_file = output::run_dir(&plan.out_dir, &domain, Local::now()).join(&plan.file_name);
    info!("Writing results to {}", out_file.display());

    let scanner = SubdomainScanner::new(plan.config.clone()).await?;
    let (report, result) = stage::run_bruteforce(&scanner, &out_file)
        .await
        .with_context(|| format!("custom subdomain enumeration failed for {}", domain))?;

    let stages: Vec<StageReport> = vec![report];
    let total: usize = stages.iter().map(|s| s.new_lines).sum();
    info!("{} total subdomains gathered", total);

    let unique = output::dedup_lines(&out_file)
        .with_context(|| format!("error removing duplicates from {}", out_file.display()))?;
    info!("{} unique subdomains gathered", unique);

    match plan.output_format {
        OutputFormat::Text => {
            for finding in &result.findings {
                println!("{}\t{}", finding.hostname, finding.address);
            }
        }
        OutputFormat::Json => {
            let mut subdomains: Vec<&str> = result.hostnames();
            subdomains.sort_unstable();
            subdomains.dedup();

            let doc = json!({
                "target": domain,
                "results": {
                    "subdomain": subdomains,
                    "findings": result.findings,
                    "total_scanned": result.candidates,
                    "server": plan.config.server.to_string(),
                    "stages": stages,
                }
            });
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
    }

    Ok(())
}
