//! Per-slot card state and the two-phase abort handshake.

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SlotState {
    pub present: bool,
    pub active: bool,
    /// Set whenever presence changes, cleared once NotifySlotChange went out.
    pub changed: bool,
}

impl SlotState {
    /// bit 0: card present, bit 1: slot marker (always set)
    pub fn bits(&self) -> u8 {
        0b10 | self.present as u8
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AbortError {
    /// An abort is pending, but for another slot or sequence number.
    Mismatch,
    NoneInProgress,
}

/// The abort requested over the control pipe, if any.
///
/// Holds the `(slot, seq)` of the ABORT control request until the bulk
/// Abort message with the same slot and sequence number confirms it.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct AbortState {
    pending: Option<(u8, u8)>,
}

impl AbortState {
    pub const fn new() -> Self {
        Self { pending: None }
    }

    /// Called for the ABORT control request. A newer request replaces an older one.
    pub fn request(&mut self, slot: u8, seq: u8) {
        self.pending = Some((slot, seq));
    }

    /// Called for the bulk Abort message; clears the request on an exact match.
    pub fn confirm(&mut self, slot: u8, seq: u8) -> Result<(), AbortError> {
        match self.pending {
            None => Err(AbortError::NoneInProgress),
            Some(pending) if pending == (slot, seq) => {
                self.pending = None;
                Ok(())
            }
            Some(_) => Err(AbortError::Mismatch),
        }
    }

    /// `(slot, seq)` of the pending abort.
    pub fn pending(&self) -> Option<(u8, u8)> {
        self.pending
    }

    pub fn is_pending_for(&self, slot: u8) -> bool {
        matches!(self.pending, Some((pending_slot, _)) if pending_slot == slot)
    }

    pub fn clear(&mut self) {
        self.pending = None;
    }
}

/// State of `N` slots, packed four to a byte for NotifySlotChange.
#[derive(Debug)]
pub struct Slots<const N: usize> {
    slots: [SlotState; N],
    abort: AbortState,
}

impl<const N: usize> Default for Slots<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Slots<N> {
    /// Bytes needed for the slot states of all `N` slots.
    pub const STATE_BYTES: usize = (N + 3) / 4;

    pub fn new() -> Self {
        Self {
            slots: [SlotState::default(); N],
            abort: AbortState::new(),
        }
    }

    pub fn count(&self) -> usize {
        N
    }

    pub fn get(&self, slot: u8) -> Option<&SlotState> {
        self.slots.get(slot as usize)
    }

    /// Returns `false` when the slot does not exist.
    pub fn set_presence(&mut self, slot: u8, present: bool) -> bool {
        let Some(state) = self.slots.get_mut(slot as usize) else {
            return false;
        };
        state.present = present;
        state.changed = true;
        if !present {
            state.active = false;
        }
        true
    }

    pub fn set_active(&mut self, slot: u8, active: bool) -> bool {
        let Some(state) = self.slots.get_mut(slot as usize) else {
            return false;
        };
        state.active = active;
        true
    }

    /// The two state bits of `slot`, already shifted to their place in byte `slot / 4`.
    pub fn encode_slot_bits(&self, slot: u8) -> u8 {
        self.get(slot)
            .map_or(0, |state| state.bits() << ((slot % 4) * 2))
    }

    /// Fills `out` with the packed state of every slot; returns the bytes used.
    ///
    /// Writes nothing when `out` is shorter than [`Self::STATE_BYTES`].
    pub fn encode_slot_states(&self, out: &mut [u8]) -> usize {
        let len = Self::STATE_BYTES;
        let Some(out) = out.get_mut(..len) else {
            return 0;
        };
        out.fill(0);
        for slot in 0..N {
            out[slot / 4] |= self.encode_slot_bits(slot as u8);
        }
        len
    }

    pub fn any_changed(&self) -> bool {
        self.slots.iter().any(|state| state.changed)
    }

    pub fn clear_changed(&mut self) {
        for state in self.slots.iter_mut() {
            state.changed = false;
        }
    }

    pub fn abort(&self) -> &AbortState {
        &self.abort
    }

    pub fn abort_mut(&mut self) -> &mut AbortState {
        &mut self.abort
    }

    pub fn reset(&mut self) {
        for state in self.slots.iter_mut() {
            state.active = false;
        }
        self.abort.clear();
    }
}
