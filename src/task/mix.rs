//! Alternate the pages of two sources

use log::debug;

use super::combine::copy_plan;
use super::params::{CopyPlanEntry, MixInput, MixParameters};
use super::Execution;
use crate::error::{Error, Result};

/// Cursor over the pages of one mix input
#[derive(Debug, Clone)]
pub struct MixFragment {
    source: usize,
    pages: u32,
    current: u32,
    reverse: bool,
    step: u32,
}

impl MixFragment {
    pub fn new(source: usize, pages: u32, reverse: bool, step: u32) -> Self {
        Self {
            source,
            pages,
            current: if reverse { pages } else { 1 },
            reverse,
            step,
        }
    }

    fn from_input(source: usize, pages: u32, input: &MixInput) -> Self {
        Self::new(source, pages, input.reverse, input.step)
    }

    pub fn has_next_page(&self) -> bool {
        self.current > 0 && self.current <= self.pages
    }

    /// Plan entry for the next page. Call only when [`has_next_page`](Self::has_next_page).
    fn next_entry(&mut self) -> CopyPlanEntry {
        let entry = CopyPlanEntry::new(self.source, self.current);
        if self.reverse {
            self.current -= 1;
        } else {
            self.current += 1;
        }
        entry
    }

    /// Take up to `step` pages
    fn take_step(&mut self, plan: &mut Vec<CopyPlanEntry>) {
        for _ in 0..self.step {
            if !self.has_next_page() {
                break;
            }
            plan.push(self.next_entry());
        }
    }
}

/// Alternate `first` and `second` until both are exhausted. A fragment that runs out first
/// stops contributing and the other one continues alone.
pub fn mix_plan(mut first: MixFragment, mut second: MixFragment) -> Vec<CopyPlanEntry> {
    let mut plan = Vec::with_capacity((first.pages + second.pages) as usize);
    if first.step == 0 || second.step == 0 {
        return plan;
    }
    while first.has_next_page() || second.has_next_page() {
        first.take_step(&mut plan);
        second.take_step(&mut plan);
    }
    plan
}

pub(crate) fn run(parameters: &MixParameters, execution: &mut Execution) -> Result<()> {
    parameters.validate()?;
    execution
        .sources
        .open(&[parameters.first.path.clone(), parameters.second.path.clone()])?;
    let first = MixFragment::from_input(0, execution.sources.get(0)?.page_count(), &parameters.first);
    let second = MixFragment::from_input(1, execution.sources.get(1)?.page_count(), &parameters.second);
    let plan = mix_plan(first, second);
    if plan.is_empty() {
        return Err(Error::EmptyPdf(format!(
            "{} and {}",
            parameters.first.path.display(),
            parameters.second.path.display()
        )));
    }
    debug!("Mixing {} pages", plan.len());

    copy_plan(execution, &plan, &parameters.output, &parameters.options, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn describe(plan: &[CopyPlanEntry]) -> Vec<String> {
        plan.iter()
            .map(|e| format!("{}{}", if e.source == 0 { 'A' } else { 'B' }, e.page))
            .collect()
    }

    #[test]
    fn test_shorter_fragment_stops_contributing() {
        let plan = mix_plan(MixFragment::new(0, 5, false, 1), MixFragment::new(1, 3, false, 1));
        assert_eq!(
            describe(&plan),
            ["A1", "B1", "A2", "B2", "A3", "B3", "A4", "A5"]
        );
    }

    #[test]
    fn test_steps_and_reverse() {
        let plan = mix_plan(MixFragment::new(0, 4, false, 2), MixFragment::new(1, 3, true, 1));
        assert_eq!(describe(&plan), ["A1", "A2", "B3", "A3", "A4", "B2", "B1"]);
    }

    #[test]
    fn test_equal_lengths_end_together() {
        let plan = mix_plan(MixFragment::new(0, 2, true, 1), MixFragment::new(1, 2, true, 1));
        assert_eq!(describe(&plan), ["A2", "B2", "A1", "B1"]);
    }

    #[test]
    fn test_empty_fragment() {
        let plan = mix_plan(MixFragment::new(0, 0, false, 1), MixFragment::new(1, 2, false, 3));
        assert_eq!(describe(&plan), ["B1", "B2"]);
    }
}
