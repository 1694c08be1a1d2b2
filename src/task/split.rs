//! Split one source into several outputs

use std::path::PathBuf;

use log::{debug, trace};

use super::params::SplitParameters;
use super::state::TaskState;
use super::Execution;
use crate::error::{Error, Result};
use crate::naming::{generate_name, NameRequest};
use crate::pdf::{DestinationGraph, PageCopier};

/// An output being filled
struct OpenOutput {
    destination: DestinationGraph,
    path: PathBuf,
}

pub(crate) fn run(parameters: &SplitParameters, execution: &mut Execution) -> Result<()> {
    parameters.validate()?;
    let Execution {
        sources,
        monitor,
        sink,
    } = execution;
    sources.open(std::slice::from_ref(&parameters.source))?;
    let source = sources.get(0)?;
    let total_pages = source.page_count();
    if total_pages == 0 {
        return Err(Error::EmptyPdf(source.name().to_string()));
    }
    let strategy = parameters.policy.resolve(source)?;
    monitor.prepared(total_pages)?;
    monitor.transition(TaskState::Running)?;

    let options = &parameters.options;
    let copier = PageCopier::new(options.copy_mode);
    let mut current: Option<OpenOutput> = None;
    let mut file_number = 0;

    for page in source.pages() {
        monitor.check_cancelled()?;
        let mut output = match current.take() {
            Some(output) if !strategy.is_opening(page.number) => output,
            _ => {
                if monitor.state() == TaskState::Finalizing {
                    monitor.transition(TaskState::Running)?;
                }
                file_number += 1;
                let request = NameRequest::new(&parameters.source)
                    .file_number(file_number)
                    .page(page.number)
                    .bookmark(strategy.bookmark_at(page.number).map(str::to_string));
                let name = generate_name(&parameters.prefix, &request);
                debug!("Starting split at page {} of the original document", page.number);
                OpenOutput {
                    destination: DestinationGraph::new(options.version),
                    path: parameters.output_dir.join(name),
                }
            }
        };

        trace!("Retaining page {} of the original document", page.number);
        let copied = copier.copy_of(source, page, &mut output.destination)?;
        monitor.warnings(&copied.warnings);
        monitor.step_completed();

        if strategy.is_closing(page.number) || page.number == total_pages {
            monitor.transition(TaskState::Finalizing)?;
            let finished = output.destination.finish(&options.finish_options(false))?;
            sink.stage(finished, output.path)?;
            debug!("Ending split at page {} of the original document", page.number);
        } else {
            current = Some(output);
        }
    }
    Ok(())
}
