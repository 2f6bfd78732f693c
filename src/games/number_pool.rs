use crate::errors::RoundError;
use crate::games::types::MAX_NUMBER;
use rand::Rng;
use std::collections::BTreeSet;

/// The 75 numbers of a round, drawn without replacement
#[derive(Debug, Clone)]
pub struct NumberPool {
    drawn: BTreeSet<u8>,
    /// Ascending; numbers not yet called
    remaining: Vec<u8>,
}

impl NumberPool {
    pub fn new() -> Self {
        Self {
            drawn: BTreeSet::new(),
            remaining: (1..=MAX_NUMBER).collect(),
        }
    }

    /// Pick uniformly from the remaining numbers and move it to `drawn`
    pub fn draw<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<u8, RoundError> {
        if self.remaining.is_empty() {
            return Err(RoundError::ExhaustedPool);
        }

        let index = rng.gen_range(0..self.remaining.len());
        let number = self.remaining.remove(index);
        self.drawn.insert(number);
        Ok(number)
    }

    pub fn reset(&mut self) {
        self.drawn.clear();
        self.remaining = (1..=MAX_NUMBER).collect();
    }

    pub fn drawn(&self) -> &BTreeSet<u8> {
        &self.drawn
    }

    pub fn remaining(&self) -> &[u8] {
        &self.remaining
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining.is_empty()
    }

    pub fn is_drawn(&self, number: u8) -> bool {
        self.drawn.contains(&number)
    }
}

impl Default for NumberPool {
    fn default() -> Self {
        Self::new()
    }
}
