//! Combine pages of several sources in any order

use std::path::Path;

use log::{debug, trace};

use super::params::{CombineReorderParameters, CopyPlanEntry, OutputOptions};
use super::state::TaskState;
use super::Execution;
use crate::error::Result;
use crate::pdf::{DestinationGraph, PageCopier};

pub(crate) fn run(parameters: &CombineReorderParameters, execution: &mut Execution) -> Result<()> {
    parameters.validate()?;
    execution.sources.open(&parameters.sources)?;
    for entry in &parameters.plan {
        execution.sources.get(entry.source)?.page(entry.page)?;
    }
    copy_plan(
        execution,
        &parameters.plan,
        &parameters.output,
        &parameters.options,
        parameters.copy_form_fields,
    )?;
    debug!(
        "Input documents combined correctly and staged for {}",
        parameters.output.display()
    );
    Ok(())
}

/// Copy the plan into a single destination, releasing each source after its last plan entry
pub(crate) fn copy_plan(
    execution: &mut Execution,
    plan: &[CopyPlanEntry],
    output: &Path,
    options: &OutputOptions,
    form_fields: bool,
) -> Result<()> {
    let Execution {
        sources,
        monitor,
        sink,
    } = execution;
    for index in 0..sources.len() {
        if !plan.iter().any(|entry| entry.source == index) {
            debug!("Input {} is not used by the plan", index);
            sources.release(index, monitor);
        }
    }
    monitor.prepared(plan.len() as u32)?;
    monitor.transition(TaskState::Running)?;

    let copier = PageCopier::new(options.copy_mode);
    let mut destination = DestinationGraph::new(options.version);
    for (position, entry) in plan.iter().enumerate() {
        monitor.check_cancelled()?;
        let source = sources.get(entry.source)?;
        let page = source.page(entry.page)?;
        trace!("Retaining page {} of {}", entry.page, source.name());
        let copied = copier.copy_of(source, page, &mut destination)?;
        monitor.warnings(&copied.warnings);
        monitor.step_completed();

        if !is_source_still_needed(plan, position, entry.source) {
            sources.release(entry.source, monitor);
        }
    }

    monitor.transition(TaskState::Finalizing)?;
    let finished = destination.finish(&options.finish_options(form_fields))?;
    sink.stage(finished, output.to_path_buf())?;
    Ok(())
}

/// Whether any entry after `position` reads from `source`
fn is_source_still_needed(plan: &[CopyPlanEntry], position: usize, source: usize) -> bool {
    plan[position + 1..].iter().any(|entry| entry.source == source)
}
