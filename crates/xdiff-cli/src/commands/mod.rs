//! Subcommand orchestration: wires `bootstrap`, `input`, the render driver
//! and the processor together for each entry point (§1, §6.2).

pub mod comp;
pub mod xr;

use std::collections::HashMap;
use std::sync::Arc;

use xdiff_diff::DiffOptions;
use xdiff_pipeline::{ProcessorConfig, ProcessorReport};

use crate::cli::{CommonArgs, OutputFormat};
use crate::error::{CliError, Result};
use crate::render::ProcessRenderer;
use xdiff_render::Renderer;

/// Build the shared `ProcessorConfig` from the common flags (§6.2): the
/// `--max-nested-depth`/`--timeout` caps, the merged `--ignore-paths` set,
/// `--compact`, and the `--function-credentials` override map.
pub fn processor_config(common: &CommonArgs, credential_namespace_overrides: HashMap<String, String>) -> Result<ProcessorConfig> {
    let ignore_paths = crate::ignore_paths::collect(&common.ignore_paths, common.ignore_paths_file.as_deref())?;
    let diff_options = DiffOptions {
        compact: common.compact,
        ..DiffOptions::default()
    }
    .with_ignore_paths(ignore_paths);

    Ok(ProcessorConfig {
        max_nested_depth: common.max_nested_depth,
        diff_options,
        deadline: common.timeout,
        credential_namespace_overrides,
        ..ProcessorConfig::default()
    })
}

/// The concrete `Renderer` realizing the §6.1 contract for this invocation.
pub fn renderer(common: &CommonArgs) -> Arc<dyn Renderer> {
    Arc::new(ProcessRenderer::new(common.render_command.clone(), common.render_args.clone()))
}

/// Print the report in the requested `--output` format and return the exit
/// code it implies (§6.4, §7).
pub fn print_report(report: &ProcessorReport, common: &CommonArgs) -> Result<i32> {
    match common.output {
        OutputFormat::Text => println!("{}", crate::output::render_text(report, !common.no_color)),
        OutputFormat::Json => {
            let json = crate::output::render_json(report).map_err(|e| CliError::InvalidInput {
                message: format!("could not encode JSON report: {e}"),
                help: None,
            })?;
            println!("{json}");
        }
    }
    Ok(report.exit_code())
}
