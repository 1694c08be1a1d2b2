//! Assembly tasks
//!
//! A task opens its sources, copies pages into one or more destinations, stages them and
//! commits them only once everything succeeded. [`execute`] runs any task described by
//! [`TaskParameters`], reporting progress through [`TaskEvents`].
//!
//! On failure, from any state, open sources are released and staged outputs are deleted
//! before the error is returned. Outputs are never left half written under their final name.

mod combine;
mod crop;
mod events;
mod mix;
mod params;
mod sink;
mod split;
mod state;
mod strategy;

use std::path::PathBuf;

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::pdf::{CopyWarning, DocumentGraph};

pub use events::{SilentEvents, TaskEvents};
pub use mix::{mix_plan, MixFragment};
pub use params::{
    CombineReorderParameters, CopyPlanEntry, CropParameters, MixInput, MixParameters,
    OutputOptions, SplitParameters,
};
pub use sink::{OutputDescriptor, OutputSink};
pub use state::TaskState;
pub use strategy::{OutputStrategy, SplitPolicy};

/// Parameters of any task
#[derive(Debug, Clone)]
pub enum TaskParameters {
    Split(SplitParameters),
    CombineReorder(CombineReorderParameters),
    Mix(MixParameters),
    Crop(CropParameters),
}

impl TaskParameters {
    pub fn options(&self) -> &OutputOptions {
        match self {
            TaskParameters::Split(p) => &p.options,
            TaskParameters::CombineReorder(p) => &p.options,
            TaskParameters::Mix(p) => &p.options,
            TaskParameters::Crop(p) => &p.options,
        }
    }
}

/// Run a task to completion and return the committed outputs
pub fn execute(parameters: &TaskParameters, events: &mut dyn TaskEvents) -> Result<Vec<OutputDescriptor>> {
    let mut execution = Execution::new(events, parameters.options().overwrite);
    let result = match parameters {
        TaskParameters::Split(p) => split::run(p, &mut execution),
        TaskParameters::CombineReorder(p) => combine::run(p, &mut execution),
        TaskParameters::Mix(p) => mix::run(p, &mut execution),
        TaskParameters::Crop(p) => crop::run(p, &mut execution),
    };
    match result {
        Ok(()) => execution.complete(),
        Err(e) => Err(execution.fail(e)),
    }
}

/// State of one running task, split into parts that can be borrowed independently
pub(crate) struct Execution<'e> {
    pub sources: Sources,
    pub monitor: Monitor<'e>,
    pub sink: OutputSink,
}

impl<'e> Execution<'e> {
    fn new(events: &'e mut dyn TaskEvents, overwrite: bool) -> Self {
        Self {
            sources: Sources::default(),
            monitor: Monitor::new(events),
            sink: OutputSink::new(overwrite),
        }
    }

    /// Commit the staged outputs
    fn complete(self) -> Result<Vec<OutputDescriptor>> {
        let Execution {
            mut sources,
            mut monitor,
            sink,
        } = self;
        sources.release_all(&mut monitor);
        match sink.commit() {
            Ok(committed) => {
                monitor.transition(TaskState::Done)?;
                Ok(committed)
            }
            Err(e) => {
                monitor.force_failed();
                Err(e)
            }
        }
    }

    fn fail(self, error: Error) -> Error {
        let Execution {
            mut sources,
            mut monitor,
            sink,
        } = self;
        warn!("Task failed: {}", error);
        monitor.force_failed();
        sources.release_all(&mut monitor);
        sink.discard();
        error
    }
}

/// Task state, progress and event delivery
pub(crate) struct Monitor<'e> {
    state: TaskState,
    completed: u32,
    total: u32,
    events: &'e mut dyn TaskEvents,
}

impl<'e> Monitor<'e> {
    fn new(events: &'e mut dyn TaskEvents) -> Self {
        Self {
            state: TaskState::Idle,
            completed: 0,
            total: 0,
            events,
        }
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn transition(&mut self, next: TaskState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(Error::General(format!(
                "Invalid task state change from {} to {}",
                self.state, next
            )));
        }
        debug!("Task {} -> {}", self.state, next);
        let previous = std::mem::replace(&mut self.state, next);
        self.events.state_changed(previous, next);
        Ok(())
    }

    fn force_failed(&mut self) {
        if !self.state.is_terminal() {
            let previous = std::mem::replace(&mut self.state, TaskState::Failed);
            self.events.state_changed(previous, TaskState::Failed);
        }
    }

    /// Sources are open, `total` steps to go
    pub fn prepared(&mut self, total: u32) -> Result<()> {
        self.total = total;
        self.transition(TaskState::Prepared)
    }

    pub fn step_completed(&mut self) {
        self.completed += 1;
        self.events.step_completed(self.completed, self.total);
    }

    pub fn warnings(&mut self, warnings: &[CopyWarning]) {
        for warning in warnings {
            self.events.warning(warning);
        }
    }

    pub fn check_cancelled(&self) -> Result<()> {
        if self.events.is_cancelled() {
            Err(Error::Cancelled {
                completed: self.completed,
                total: self.total,
            })
        } else {
            Ok(())
        }
    }
}

/// Source graphs opened by a task, released individually once no longer needed
#[derive(Default)]
pub(crate) struct Sources {
    graphs: Vec<Option<DocumentGraph>>,
}

impl Sources {
    /// Open every source and check it allows assembly
    pub fn open(&mut self, paths: &[PathBuf]) -> Result<()> {
        for path in paths {
            debug!("Opening input {}", path.display());
            self.admit(DocumentGraph::open(path)?)?;
        }
        Ok(())
    }

    /// Take ownership of an opened source
    pub fn admit(&mut self, graph: DocumentGraph) -> Result<()> {
        graph.permissions().ensure_assembly(graph.name())?;
        self.graphs.push(Some(graph));
        Ok(())
    }

    pub fn get(&self, index: usize) -> Result<&DocumentGraph> {
        self.graphs
            .get(index)
            .and_then(Option::as_ref)
            .ok_or_else(|| Error::General(format!("Source {} is not open", index)))
    }

    pub fn len(&self) -> usize {
        self.graphs.len()
    }

    pub fn release(&mut self, index: usize, monitor: &mut Monitor) {
        if let Some(graph) = self.graphs.get_mut(index).and_then(Option::take) {
            graph.close();
            monitor.events.source_released(index);
        }
    }

    fn release_all(&mut self, monitor: &mut Monitor) {
        for index in 0..self.graphs.len() {
            self.release(index, monitor);
        }
    }
}
