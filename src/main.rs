use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use npkcarve::{
    cli, config, container,
    logging, metadata,
    metadata::{MetadataSink, RunProvenance, RunSummary},
    pipeline::{ExtractionPipeline, RunState},
    report::CliReporter,
};

fn main() -> Result<()> {
    let cli_opts = cli::parse();
    logging::init_logging(cli_opts.log_json, cli_opts.log_file.as_deref())?;

    let loaded = config::load_config(cli_opts.config_path.as_deref())?;
    let mut cfg = loaded.config;
    cli_opts.apply_overrides(&mut cfg);
    cfg.validate()?;

    let run_output_dir = cli_opts.output.join(&cfg.run_id);
    std::fs::create_dir_all(&run_output_dir)
        .with_context(|| format!("creating {}", run_output_dir.display()))?;

    let tool_version = env!("CARGO_PKG_VERSION");
    info!(
        "starting run_id={} input={} output={} policy={} fast_mode={} threads={} dedup={}",
        cfg.run_id,
        cli_opts.input.display(),
        run_output_dir.display(),
        cfg.bound_policy.as_str(),
        cfg.fast_mode,
        cfg.max_threads,
        cfg.enable_dedup
    );

    let provenance = RunProvenance::new(&cfg.run_id, tool_version, &loaded.config_hash, &cli_opts.input);
    let meta_sink: Arc<dyn MetadataSink> = Arc::from(metadata::build_sink(
        cli_opts.metadata_backend.into(),
        provenance,
        &run_output_dir,
    )?);

    let reporter = Arc::new(CliReporter::new(
        meta_sink.clone(),
        &run_output_dir,
        Duration::from_secs(1),
    ));
    let pipeline = ExtractionPipeline::new(cfg, reporter.clone());

    let cancel = pipeline.cancel_token();
    ctrlc::set_handler(move || {
        warn!("stop requested, finishing in-flight frames");
        cancel.cancel();
    })
    .context("installing Ctrl+C handler")?;

    let summary = if cli_opts.input.is_dir() {
        let sources = container::collect_sources(&cli_opts.input)?;
        if sources.is_empty() {
            warn!("no container files found in {}", cli_opts.input.display());
        }
        let batch = pipeline.run_batch(&sources, &run_output_dir)?;
        RunSummary::from(&batch)
    } else {
        let result = pipeline.run(&cli_opts.input, &run_output_dir)?;
        RunSummary::from(&result)
    };

    meta_sink.record_run_summary(&summary)?;
    meta_sink.flush()?;

    if summary.state == RunState::Stopped {
        warn!(
            "run stopped: {} of {} frames extracted before the stop",
            summary.artifacts_extracted, summary.total_frames_found
        );
    }
    if reporter.metadata_errors() > 0 {
        warn!("{} metadata records failed", reporter.metadata_errors());
    }
    info!("npkcarve run finished");
    Ok(())
}
