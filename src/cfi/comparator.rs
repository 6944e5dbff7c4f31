//! Reading-order comparison for CFIs

use std::cmp::Ordering;

use super::types::*;

impl Ord for Cfi {
    fn cmp(&self, other: &Self) -> Ordering {
        self.start_path()
            .cmp(&other.start_path())
            .then_with(|| self.end_path().cmp(&other.end_path()))
            // keep Ord consistent with Eq when only assertions differ
            .then_with(|| self.to_string().cmp(&other.to_string()))
    }
}

impl PartialOrd for Cfi {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Cfi {
    /// Absolute path of the start of this location.
    fn start_path(&self) -> CfiPath {
        match &self.range {
            Some(range) => self.path.joined(&range.start),
            None => self.path.clone(),
        }
    }

    fn end_path(&self) -> CfiPath {
        match &self.range {
            Some(range) => self.path.joined(&range.end),
            None => self.path.clone(),
        }
    }
}

impl CfiPath {
    fn joined(&self, tail: &CfiPath) -> CfiPath {
        let mut steps = self.steps.clone();
        steps.extend(tail.steps.iter().cloned());
        CfiPath {
            steps,
            character_offset: tail.character_offset.clone(),
        }
    }
}

impl Ord for CfiPath {
    fn cmp(&self, other: &Self) -> Ordering {
        let by_steps = self
            .steps
            .iter()
            .map(|s| s.step_type)
            .cmp(other.steps.iter().map(|s| s.step_type));
        if by_steps != Ordering::Equal {
            return by_steps;
        }

        match (self.offset(), other.offset()) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        }
    }
}

impl PartialOrd for CfiPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StepType {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (StepType::Indirection, StepType::Indirection) => Ordering::Equal,
            (StepType::Element(a), StepType::Element(b)) => a.cmp(b),
            // indirection marks a document boundary and sorts first at a level
            (StepType::Indirection, StepType::Element(_)) => Ordering::Less,
            (StepType::Element(_), StepType::Indirection) => Ordering::Greater,
        }
    }
}

impl PartialOrd for StepType {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
