//! Gallery Downloader - CLI entry point.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use gallery_downloader::{
    cli::Args,
    client::HttpSession,
    config::{validate_config, Config},
    error::{exit_codes, Error, Result},
    extract::{absolutize, CandidateLink, GenericExtractor, LinkExtractor},
    fs::prepare_download_dir,
    output::{
        print_banner, print_config_summary, print_error, print_global_stats, print_info,
        print_run_stats, print_success, print_warning,
    },
    pipeline::{Pipeline, RunStats},
    rate::RateLimiter,
};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(e) => {
            print_error(&format!("{}", e));
            match e {
                Error::Config(_) | Error::ConfigValidation { .. } | Error::MissingConfig(_) => {
                    ExitCode::from(exit_codes::CONFIG_ERROR as u8)
                }
                Error::Download(_) | Error::ConnectionExhausted { .. } => {
                    ExitCode::from(exit_codes::DOWNLOAD_ERROR as u8)
                }
                _ => ExitCode::from(exit_codes::UNEXPECTED_ERROR as u8),
            }
        }
    }
}

async fn run() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    fmt().with_env_filter(filter).with_target(false).init();

    // Print banner
    print_banner();

    // Load configuration
    let mut config = if args.config.exists() {
        Config::load(&args.config)?
    } else {
        Config::default()
    };

    // Merge CLI arguments into config
    args.merge_into_config(&mut config);

    // Validate configuration
    validate_config(&config)?;

    // Gather input URLs
    let inputs = gather_inputs(&args)?;

    print_config_summary(
        &inputs,
        &config.download_directory().display().to_string(),
        config.options.export_urls,
    );

    if config.sources.cdn_hosts.is_empty() {
        print_warning("No CDN hosts configured; gallery redirects cannot be resolved");
    }

    // Assemble the pipeline
    let config = Arc::new(config);
    let limiter = Arc::new(RateLimiter::new(
        &config.rate_limit,
        config.pools.download_workers,
    ));
    let session = Arc::new(HttpSession::new(&config.session, limiter.clone())?);
    let extractor: Arc<dyn LinkExtractor> = Arc::new(GenericExtractor::new());
    let pipeline = Pipeline::new(config.clone(), session.clone(), extractor.clone());

    let mut totals = RunStats::default();
    let mut runs = 0u64;
    let mut runs_failed = 0u64;

    // Process each input URL; a failure on one never aborts the rest.
    for input in &inputs {
        print_info(&format!("Processing {}", input));

        match process_album(&pipeline, &session, extractor.as_ref(), &config, input).await {
            Ok(stats) => {
                print_run_stats(input, &stats);
                accumulate(&mut totals, &stats);
                runs += 1;
            }
            Err(e) => {
                print_error(&format!("Error processing \"{}\": {}", input, e));
                runs_failed += 1;
            }
        }
    }

    print_global_stats(runs, runs_failed, &totals, &limiter.snapshot().await);

    if runs_failed > 0 && runs == 0 {
        return Err(Error::Download(format!(
            "all {} input URL(s) failed",
            runs_failed
        )));
    }

    if config.options.export_urls {
        print_success("URL list export complete");
    } else {
        print_success("All downloads completed");
    }

    Ok(())
}

/// Fetch one album page, resolve its destination directory, and run the
/// pipeline over its item links.
async fn process_album(
    pipeline: &Pipeline,
    session: &HttpSession,
    extractor: &dyn LinkExtractor,
    config: &Config,
    album_url: &str,
) -> Result<RunStats> {
    let response = session.get(album_url).await?;
    let status = response.status();
    if status != 200 {
        return Err(Error::AlbumPage(format!("HTTP error {}", status)));
    }

    let body = response.text().await?;
    let album = extractor.parse_album(album_url, &body)?;

    let candidates: Vec<CandidateLink> = album
        .candidates
        .into_iter()
        .filter_map(|mut candidate| {
            match absolutize(album_url, &candidate.page_url) {
                Ok(url) => {
                    candidate.page_url = url;
                    Some(candidate)
                }
                Err(e) => {
                    tracing::warn!("Dropping malformed link {}: {}", candidate.page_url, e);
                    None
                }
            }
        })
        .collect();

    tracing::info!(
        "Found {} item link(s) in album {}",
        candidates.len(),
        album.album_name.as_deref().unwrap_or("(unnamed)")
    );

    let root = config.download_directory();
    let dest_dir = prepare_download_dir(&root, album.album_name.as_deref())?;

    pipeline.run(candidates, &dest_dir).await
}

fn gather_inputs(args: &Args) -> Result<Vec<String>> {
    match (&args.url, &args.file) {
        (Some(_), Some(_)) => Err(Error::Config(
            "Provide either a URL or a file, not both".to_string(),
        )),
        (Some(url), None) => Ok(vec![url.clone()]),
        (None, Some(path)) => {
            let content = std::fs::read_to_string(path)?;
            let urls: Vec<String> = content
                .lines()
                .map(|line| line.trim().to_string())
                .filter(|line| !line.is_empty())
                .collect();
            if urls.is_empty() {
                return Err(Error::Config(format!(
                    "No URLs found in {}",
                    path.display()
                )));
            }
            Ok(urls)
        }
        (None, None) => Err(Error::MissingConfig(
            "No URL or file provided (use -u or -f)".to_string(),
        )),
    }
}

fn accumulate(totals: &mut RunStats, stats: &RunStats) {
    totals.candidates += stats.candidates;
    totals.resolved += stats.resolved;
    totals.downloaded += stats.downloaded;
    totals.exported += stats.exported;
    totals.filtered += stats.filtered;
    totals.already_done += stats.already_done;
    totals.duplicate_skips += stats.duplicate_skips;
    totals.resolution_failed += stats.resolution_failed;
    totals.download_failed += stats.download_failed;
}
