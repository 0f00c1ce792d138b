use anyhow::{Context, Result, bail};
use clap::Parser;
use daas_client::cli::Cli;
use daas_client::client::{DaasClient, Selection};
use daas_client::log::{
    init_logging, request_echo, show_farewell_with_timing, show_greeting, show_selection_summary,
};
use daas_client::output::write_selection;
use log::warn;
use std::time::Instant;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.map(Into::into));
    run(cli).await
}

async fn run(cli: Cli) -> Result<()> {
    let start_time = Instant::now();

    let config = cli
        .client_config()
        .context("Failed to load client configuration")?;
    show_greeting(&config.endpoint());

    let request = cli.to_select_request()?;
    request_echo(&request, &cli.outfile);

    let client = DaasClient::new(config)?.with_parallelism(usize::from(cli.njobs));
    let selection = client.select(&request).await?;
    show_selection_summary(&selection);

    let Selection::Merged { mut merged, .. } = selection else {
        bail!("expected a merged selection");
    };
    if let Some(hours) = cli.offset_inittime
        && !merged.shift_time(hours).context("Failed to apply --offset-inittime")?
    {
        warn!("--offset-inittime ignored: the result has no time axis");
    }
    for rename in &cli.name_map {
        merged
            .rename(&rename.from, &rename.to)
            .with_context(|| format!("Failed to apply --name-map {}:{}", rename.from, rename.to))?;
    }

    write_selection(&merged, &cli.outfile, cli.complevel)
        .with_context(|| format!("Failed to write {}", cli.outfile.display()))?;

    show_farewell_with_timing(start_time.elapsed());
    Ok(())
}
