//! `feather slim` - run the cleanup pipeline over a batch of files

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use feather_core::config::{Defaults, FeatherConfig};
use feather_core::document::memory::MemoryDocument;
use feather_core::error::{FeatherError, Result};
use feather_core::header;
use feather_core::host::{BlenderHost, HostOptions};
use feather_core::inputs;
use feather_core::pipeline::{self, Level, PipelineOptions, PipelineReport, PurgePolicy};
use feather_core::trace_time;
use tracing::{debug, info, warn};

use crate::cli::args::{HostKind, SlimArgs};
use crate::commands::dispatch::CommandContext;
use crate::output_by_format;

pub fn execute(ctx: &CommandContext, args: &SlimArgs) -> Result<()> {
    let config = ctx.load_config()?;
    let options = pipeline_options(args, &config.defaults)?;
    let timeout = Duration::from_secs(args.timeout.unwrap_or(config.defaults.timeout_secs));

    let extension = args.host.extension();
    let files = inputs::expand(&args.paths, extension, args.recursive)?;
    if files.is_empty() {
        feather_core::bail_usage!(format!("no .{extension} files to process"));
    }
    debug!(files = files.len(), host = ?args.host, "slim_batch");

    let interrupted = interrupt_flag();

    for (done, file) in files.iter().enumerate() {
        if interrupted.load(Ordering::SeqCst) {
            warn!(done, remaining = files.len() - done, "batch interrupted");
            return Err(FeatherError::Interrupted);
        }

        inputs::check_input(file, extension)?;
        let report = match args.host {
            HostKind::Memory => slim_memory(file, &options)?,
            HostKind::Blender => slim_blender(file, &options, &config, args, timeout)?,
        };
        trace_time!(ctx.start, "file_done");
        print_report(ctx, &report)?;
    }

    info!(files = files.len(), elapsed = ?ctx.start.elapsed(), "slim_done");
    Ok(())
}

/// Flags win over config defaults
fn pipeline_options(args: &SlimArgs, defaults: &Defaults) -> Result<PipelineOptions> {
    let level = match args.level {
        Some(level) => level,
        None => Level::try_from(defaults.level)?,
    };
    Ok(PipelineOptions {
        level,
        compress: !args.no_compress && (args.compress || defaults.compress),
        delete_worlds: args.delete_worlds,
        experimental_append: args.experimental_append,
        purge: PurgePolicy::from_passes(args.purge_passes.or(defaults.purge_passes)),
    })
}

/// Set once Ctrl-C is pressed; checked between files
fn interrupt_flag() -> Arc<AtomicBool> {
    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    if let Err(e) = ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    }) {
        debug!(error = %e, "ctrl-c handler not installed");
    }
    interrupted
}

fn slim_memory(file: &Path, options: &PipelineOptions) -> Result<PipelineReport> {
    let mut doc = MemoryDocument::open(file)?;
    pipeline::run(&mut doc, file, options)
}

fn slim_blender(
    file: &Path,
    options: &PipelineOptions,
    config: &FeatherConfig,
    args: &SlimArgs,
    timeout: Duration,
) -> Result<PipelineReport> {
    let file_version = match header::sniff(file) {
        Ok(header) => Some(header.version),
        Err(e) => {
            warn!(file = %file.display(), error = %e, "header not readable; picking newest installation");
            None
        }
    };
    let executable = config.select_blender(args.blender.as_deref(), file_version)?;

    let mut host = BlenderHost::launch(
        file,
        &HostOptions {
            executable,
            timeout,
        },
    )?;
    debug!(
        blender = %host.hello().blender,
        file_version = %host.hello().file_version,
        "host_ready"
    );
    pipeline::run(&mut host, file, options)
}

fn print_report(ctx: &CommandContext, report: &PipelineReport) -> Result<()> {
    output_by_format!(ctx.cli.format, json => {
        println!("{}", serde_json::to_string(report)?);
    }, human => {
        if ctx.cli.quiet {
            println!("{}", report.output.display());
        } else {
            println!(
                "{} -> {} ({} -> {} blocks)",
                report.input.display(),
                report.output.display(),
                report.blocks_before,
                report.blocks_after
            );
        }
    });
    Ok(())
}
