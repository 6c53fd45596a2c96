use super::types::{Step, StepIndex};

/// Ordered log of recorded transitions plus the navigation cursor
#[derive(Debug, Clone, Default)]
pub struct HistoryLogState {
    /// Steps in append order; the tip is the last element
    pub history: Vec<Step>,
    /// Index of the step currently selected, if any
    pub selection: Option<StepIndex>,
    /// When false, replays are not sent to peers
    pub broadcast_enabled: bool,
    /// Index handed to the next appended step
    next_index: StepIndex,
}

impl HistoryLogState {
    pub fn new(broadcast_enabled: bool) -> Self {
        Self {
            history: Vec::new(),
            selection: None,
            broadcast_enabled,
            next_index: 0,
        }
    }

    pub fn with_history(history: Vec<Step>, broadcast_enabled: bool) -> Self {
        let next_index = history.iter().map(|s| s.index + 1).max().unwrap_or(0);
        Self {
            history,
            selection: None,
            broadcast_enabled,
            next_index,
        }
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Index the next appended step receives.
    ///
    /// Equals the log length until a step is deleted; deleted indices are
    /// never handed out again.
    pub fn next_index(&self) -> StepIndex {
        self.next_index
    }

    /// Append a new step at the tip and return its index
    pub fn push(&mut self, action: String, resulting_state: Option<Vec<u8>>) -> StepIndex {
        let index = self.next_index;
        self.history.push(Step::new(index, action, resulting_state));
        self.next_index += 1;
        index
    }

    /// Position of a step in the log
    pub fn position(&self, index: StepIndex) -> Option<usize> {
        self.history.iter().position(|s| s.index == index)
    }

    pub fn contains(&self, index: StepIndex) -> bool {
        self.position(index).is_some()
    }

    pub fn get(&self, index: StepIndex) -> Option<&Step> {
        self.history.iter().find(|s| s.index == index)
    }

    /// Most recently appended step
    pub fn tip(&self) -> Option<&Step> {
        self.history.last()
    }

    pub fn is_tip(&self, index: StepIndex) -> bool {
        self.tip().map(|s| s.index == index).unwrap_or(false)
    }

    pub fn selected(&self) -> Option<&Step> {
        self.selection.and_then(|index| self.get(index))
    }

    /// The step immediately earlier in the log
    pub fn step_before(&self, index: StepIndex) -> Option<&Step> {
        let pos = self.position(index)?;
        if pos == 0 {
            return None;
        }
        self.history.get(pos - 1)
    }

    /// The step immediately later in the log
    pub fn step_after(&self, index: StepIndex) -> Option<&Step> {
        let pos = self.position(index)?;
        self.history.get(pos + 1)
    }

    /// Remove a step, returning it if it was present
    pub fn remove(&mut self, index: StepIndex) -> Option<Step> {
        let pos = self.position(index)?;
        Some(self.history.remove(pos))
    }

    /// Steps newest first, the order a history list displays them in
    pub fn reversed(&self) -> impl Iterator<Item = &Step> {
        self.history.iter().rev()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> HistoryLogState {
        HistoryLogState::with_history(
            (0..4)
                .map(|i| Step::new(i, format!("action {}", i), Some(b"foo".to_vec())))
                .collect(),
            false,
        )
    }

    #[test]
    fn test_neighbours() {
        let state = sample();
        assert_eq!(state.step_before(0), None);
        assert_eq!(state.step_before(2).map(|s| s.index), Some(1));
        assert_eq!(state.step_after(2).map(|s| s.index), Some(3));
        assert_eq!(state.step_after(3), None);
        assert_eq!(state.step_after(42), None);
    }

    #[test]
    fn test_neighbours_skip_removed_steps() {
        let mut state = sample();
        state.remove(1);
        assert_eq!(state.step_before(2).map(|s| s.index), Some(0));
        assert_eq!(state.step_after(0).map(|s| s.index), Some(2));
    }

    #[test]
    fn test_next_index_never_reuses_after_delete() {
        let mut state = sample();
        assert_eq!(state.next_index(), 4);
        state.remove(0);
        assert_eq!(state.next_index(), 4);
        state.remove(3);
        assert_eq!(state.next_index(), 4);
        assert_eq!(state.push("again".to_string(), None), 4);
    }

    #[test]
    fn test_reversed_order() {
        let state = sample();
        let indices: Vec<_> = state.reversed().map(|s| s.index).collect();
        assert_eq!(indices, vec![3, 2, 1, 0]);
    }
}
