use crate::domain::Bar;

/// Checkpointed incremental state.
///
/// `committed` is the state after the last closed bar. `pending` holds the provisional
/// state after the still-open bar, keyed by its bucket time. A patch for the open bar
/// recomputes from `committed`; a later bar commits `pending` and advances.
#[derive(Debug, Clone, PartialEq)]
pub struct Patchable<S> {
    committed: S,
    pending: Option<(i64, S)>,
}

impl<S: Clone> Patchable<S> {
    pub fn new(initial: S) -> Self {
        Self {
            committed: initial,
            pending: None,
        }
    }

    /// Run `step` over a whole series, leaving the last bar open for patching.
    pub fn from_history<O>(
        initial: S,
        bars: &[Bar],
        mut step: impl FnMut(&mut S, &Bar) -> O,
    ) -> (Self, Vec<O>) {
        let mut out = Vec::with_capacity(bars.len());
        let Some((last, closed)) = bars.split_last() else {
            return (Self::new(initial), out);
        };
        let mut state = initial;
        for bar in closed {
            out.push(step(&mut state, bar));
        }
        let mut patchable = Self::new(state);
        if let Some(o) = patchable.apply(last, step) {
            out.push(o);
        }
        (patchable, out)
    }

    /// Fold one new or updated bar. `None` when the bar is older than the open one.
    pub fn apply<O>(&mut self, bar: &Bar, mut step: impl FnMut(&mut S, &Bar) -> O) -> Option<O> {
        match self.open_time() {
            Some(open_time) if bar.time < open_time => return None,
            Some(open_time) if bar.time == open_time => {}
            _ => {
                if let Some((_, state)) = self.pending.take() {
                    self.committed = state;
                }
            }
        }
        let mut next = self.committed.clone();
        let out = step(&mut next, bar);
        self.pending = Some((bar.time, next));
        Some(out)
    }

    /// Bucket time of the open bar, if any.
    pub fn open_time(&self) -> Option<i64> {
        self.pending.as_ref().map(|(time, _)| *time)
    }

    /// State including the open bar.
    pub fn latest(&self) -> &S {
        self.pending.as_ref().map_or(&self.committed, |(_, state)| state)
    }
}
