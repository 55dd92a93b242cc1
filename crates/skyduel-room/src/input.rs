//! Per-slot input cells.
//!
//! Connection handlers write samples straight into a session's cells; the
//! tick loop takes them. Nothing here goes through the session actor, so a
//! busy actor never delays input and input never waits for a tick.
//!
//! Each cell queues up to `backlog` pending samples in sequence order and
//! the tick takes the oldest, one per tick. When the queue is full the
//! oldest pending sample is dropped, so the newest always survives and the
//! backlog stays bounded. A sample whose `seq` is not above the highest
//! accepted so far is stale and dropped. The push and poll paths share the
//! cell, so the same sample arriving on both is applied once, and a poll
//! batch carrying several ticks' worth of samples is spread over as many
//! ticks.
//!
//! Cells start closed: nothing is accepted until the session starts
//! playing, and nothing after it finishes.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use skyduel_protocol::{InputSample, PlayerAddress, Slot};
use tracing::trace;

/// Pending samples kept per slot unless configured otherwise.
pub const DEFAULT_INPUT_BACKLOG: usize = 6;

/// Result of submitting a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOutcome {
    /// Queued for an upcoming tick.
    Accepted,
    /// Dropped: old sequence number, unknown sender or session not playing.
    Stale,
}

#[derive(Debug, Default)]
struct CellState {
    owner: Option<PlayerAddress>,
    last_seq: u64,
    pending: VecDeque<InputSample>,
    open: bool,
}

/// One slot's input cell.
#[derive(Debug)]
pub struct InputCell {
    state: Mutex<CellState>,
    backlog: usize,
}

impl Default for InputCell {
    fn default() -> Self {
        Self::with_backlog(DEFAULT_INPUT_BACKLOG)
    }
}

impl InputCell {
    pub fn with_backlog(backlog: usize) -> Self {
        Self {
            state: Mutex::default(),
            backlog: backlog.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CellState> {
        // A panic while holding the guard cannot leave the state torn.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn submit(&self, sample: InputSample) -> InputOutcome {
        let mut state = self.lock();
        if !state.open || state.owner.is_none() || sample.seq <= state.last_seq {
            return InputOutcome::Stale;
        }
        state.last_seq = sample.seq;
        state.pending.push_back(sample);
        while state.pending.len() > self.backlog {
            state.pending.pop_front();
        }
        InputOutcome::Accepted
    }

    /// Takes the oldest pending sample.
    pub fn take(&self) -> Option<InputSample> {
        self.lock().pending.pop_front()
    }

    pub fn pending(&self) -> usize {
        self.lock().pending.len()
    }

    /// Highest sequence number accepted so far.
    pub fn last_seq(&self) -> u64 {
        self.lock().last_seq
    }

    fn owner(&self) -> Option<PlayerAddress> {
        self.lock().owner.clone()
    }

    fn set_owner(&self, owner: Option<PlayerAddress>) {
        let mut state = self.lock();
        if state.owner != owner {
            // A new occupant starts its own sequence.
            *state = CellState {
                owner,
                open: state.open,
                ..CellState::default()
            };
        }
    }

    fn set_open(&self, open: bool) {
        let mut state = self.lock();
        state.open = open;
        state.pending.clear();
    }
}

/// The two cells of a session, indexed by [`Slot`].
#[derive(Debug, Default)]
pub struct InputCells {
    cells: [InputCell; 2],
}

impl InputCells {
    /// Cells that keep up to `backlog` pending samples each.
    pub fn with_backlog(backlog: usize) -> Self {
        Self {
            cells: [
                InputCell::with_backlog(backlog),
                InputCell::with_backlog(backlog),
            ],
        }
    }

    pub fn cell(&self, slot: Slot) -> &InputCell {
        &self.cells[slot.index()]
    }

    /// Submits a sample for `slot`.
    pub fn submit(&self, slot: Slot, sample: InputSample) -> InputOutcome {
        let outcome = self.cell(slot).submit(sample);
        trace!(%slot, seq = sample.seq, ?outcome, "input submitted");
        outcome
    }

    /// Submits a batch in sequence order. Returns how many were accepted.
    pub fn submit_batch(&self, slot: Slot, samples: &[InputSample]) -> usize {
        let mut ordered = samples.to_vec();
        ordered.sort_unstable_by_key(|s| s.seq);
        ordered
            .into_iter()
            .filter(|s| self.submit(slot, *s) == InputOutcome::Accepted)
            .count()
    }

    /// Submits a sample on behalf of whoever sits at `address`.
    pub fn submit_from(&self, address: &PlayerAddress, sample: InputSample) -> InputOutcome {
        match self.slot_of(address) {
            Some(slot) => self.submit(slot, sample),
            None => InputOutcome::Stale,
        }
    }

    /// The slot `address` currently occupies.
    pub fn slot_of(&self, address: &PlayerAddress) -> Option<Slot> {
        Slot::ALL
            .into_iter()
            .find(|slot| self.cell(*slot).owner().as_ref() == Some(address))
    }

    /// Takes one pending sample per slot for one tick.
    pub(crate) fn take_all(&self) -> [Option<InputSample>; 2] {
        [self.cells[0].take(), self.cells[1].take()]
    }

    pub(crate) fn set_owner(&self, slot: Slot, owner: Option<PlayerAddress>) {
        self.cell(slot).set_owner(owner);
    }

    /// Starts accepting samples.
    pub(crate) fn open(&self) {
        for cell in &self.cells {
            cell.set_open(true);
        }
    }

    /// Rejects every further sample and drops what is pending.
    pub(crate) fn close(&self) {
        for cell in &self.cells {
            cell.set_open(false);
        }
    }
}
