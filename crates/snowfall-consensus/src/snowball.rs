//! The Snowball decision primitive.
//!
//! Snowball is an n-ary, single-shot finality mechanism: the caller polls
//! k validators repeatedly, feeds each tally in through [`record_poll`],
//! and the instance converges to a locked preference once enough
//! consecutive polls agree.
//!
//! The primitive is memoryless past the confidence counter; there is no
//! vote history.
//!
//! [`record_poll`]: Snowball::record_poll

use snowfall_ids::Id;

use crate::bag::Bag;
use crate::params::Parameters;
use crate::Result;

/// An n-ary Snowball instance for one decision slot.
#[derive(Debug)]
pub struct Snowball {
    params: Parameters,

    /// The currently leading choice.
    preference: Id,

    /// Consecutive successful polls on `preference`.
    confidence: u32,

    /// Whether a conflicting choice has been reported through [`add`].
    /// A rogue slot requires `beta_rogue` consecutive successes instead
    /// of `beta_virtuous`.
    ///
    /// [`add`]: Snowball::add
    rogue: bool,

    /// Once true, `preference` is locked.
    finalized: bool,
}

impl Snowball {
    /// Creates a new instance preferring `initial_choice`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidParameters` if `params` fails validation.
    pub fn new(params: Parameters, initial_choice: Id) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            preference: initial_choice,
            confidence: 0,
            rogue: false,
            finalized: false,
        })
    }

    /// Observes `choice` as a possible outcome for this slot.
    ///
    /// Observing any choice other than the current preference promotes
    /// the slot to rogue, raising the finalization threshold.
    pub fn add(&mut self, choice: Id) {
        self.rogue = self.rogue || choice != self.preference;
    }

    /// Records the tally of one poll of k validators.
    ///
    /// Returns true if the poll was successful (the winning choice
    /// reached the alpha quorum), false otherwise.
    pub fn record_poll(&mut self, votes: &Bag) -> bool {
        if let Some((mode, count)) = votes.mode() {
            if count >= self.params.alpha {
                self.record_successful_poll(mode);
                return true;
            }
        }
        self.record_unsuccessful_poll();
        false
    }

    /// Records a successful poll for `choice`.
    ///
    /// A poll for a choice other than the current preference switches the
    /// preference and resets the confidence counter; it does not promote
    /// the slot to rogue. Only [`add`] does that.
    ///
    /// [`add`]: Snowball::add
    pub fn record_successful_poll(&mut self, choice: Id) {
        if self.finalized {
            return;
        }

        if choice == self.preference {
            self.confidence += 1;
        } else {
            self.preference = choice;
            self.confidence = 1;
        }

        let beta = if self.rogue {
            self.params.beta_rogue
        } else {
            self.params.beta_virtuous
        };
        if self.confidence >= beta {
            self.finalized = true;
        }
    }

    /// Records a poll that failed to reach the alpha quorum, resetting
    /// the confidence counter.
    pub fn record_unsuccessful_poll(&mut self) {
        if !self.finalized {
            self.confidence = 0;
        }
    }

    /// The currently leading choice.
    pub fn preference(&self) -> Id {
        self.preference
    }

    /// Consecutive successful polls on the current preference.
    pub fn confidence(&self) -> u32 {
        self.confidence
    }

    /// Whether this slot has observed a conflicting choice.
    pub fn rogue(&self) -> bool {
        self.rogue
    }

    /// Whether the preference is locked.
    pub fn finalized(&self) -> bool {
        self.finalized
    }
}
