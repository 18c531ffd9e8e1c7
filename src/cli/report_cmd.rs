//! Report rendering from a stored result store

use std::path::Path;

use anyhow::Result;

use super::app::build_runner;
use super::output::Output;
use crate::storage::{Config, ResultStore};

pub fn run(output: &Output, config: &Config, results: &Path, tool: Option<&str>) -> Result<()> {
    let store = ResultStore::read_json(results)?;
    let results_dir = results
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let tool = tool.unwrap_or(&config.rebase.output_tool);

    let runner = build_runner(config);
    runner.run_output_tool(tool, &[], &store, results_dir)?;

    if output.is_json() {
        output.data(&store);
    } else {
        let mut stdout = std::io::stdout().lock();
        runner.print_cli_summary(tool, &store, results_dir, &mut stdout)?;
    }

    Ok(())
}
