//! Crop pages to one or more areas

use log::{debug, trace};

use super::params::CropParameters;
use super::state::TaskState;
use super::Execution;
use crate::error::{Error, Result};
use crate::pdf::{DestinationGraph, PageCopier};

/// Every source page is copied once per area, in area order, with its media and crop boxes
/// set to that area. Copies of one page share its content and resources.
pub(crate) fn run(parameters: &CropParameters, execution: &mut Execution) -> Result<()> {
    parameters.validate()?;
    let Execution {
        sources,
        monitor,
        sink,
    } = execution;
    sources.open(std::slice::from_ref(&parameters.source))?;
    let source = sources.get(0)?;
    if source.page_count() == 0 {
        return Err(Error::EmptyPdf(source.name().to_string()));
    }
    monitor.prepared(source.page_count())?;
    monitor.transition(TaskState::Running)?;

    let options = &parameters.options;
    let copier = PageCopier::new(options.copy_mode);
    let mut destination = DestinationGraph::new(options.version);
    for page in source.pages() {
        monitor.check_cancelled()?;
        for area in &parameters.areas {
            trace!("Cropping page {} to {:?}", page.number, area);
            let copied = copier.copy_of(source, page, &mut destination)?;
            destination.set_page_boxes(copied.id, area)?;
            monitor.warnings(&copied.warnings);
        }
        monitor.step_completed();
    }

    monitor.transition(TaskState::Finalizing)?;
    let finished = destination.finish(&options.finish_options(false))?;
    debug!(
        "Cropped {} pages into {} areas each",
        source.page_count(),
        parameters.areas.len()
    );
    sink.stage(finished, parameters.output.clone())?;
    Ok(())
}
