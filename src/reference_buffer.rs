//! Reference bases around the track window.
//!
//! The buffer starts out covering the window plus one step to the right and
//! grows outward whenever a read (optionally extended by its soft clips)
//! reaches past either end. Growth is quantized to the step so that a run of
//! reads creeping past the boundary costs one fetch per step, not one per read.

use crate::errors::{Result, TrackError};
use crate::sequence_index::ReferenceProvider;
use log::debug;

pub struct ReferenceWindowBuffer<'a> {
    provider: &'a dyn ReferenceProvider,
    chromosome: String,
    reference_id: u64,
    step: i64,
    min: i64,
    max: i64,
    sequence: Vec<u8>,
    // Set once the provider returns a short tail; the contig ends at `max`
    tail_exhausted: bool,
}

impl<'a> ReferenceWindowBuffer<'a> {
    /// Fetch the initial `[min, max]` range
    pub fn new(
        provider: &'a dyn ReferenceProvider,
        chromosome: &str,
        reference_id: u64,
        step: i64,
        min: i64,
        max: i64,
    ) -> Result<Self> {
        if step <= 0 {
            return Err(TrackError::InvalidReferenceStep(step));
        }
        let min = min.max(1);
        let sequence = fetch(provider, chromosome, reference_id, min, max)?;
        let tail_exhausted = (sequence.len() as i64) < max - min + 1;
        let max = min + sequence.len() as i64 - 1;
        debug!("Reference buffer {chromosome}:{min}-{max} initialised");
        Ok(Self {
            provider,
            chromosome: chromosome.to_string(),
            reference_id,
            step,
            min,
            max,
            sequence,
            tail_exhausted,
        })
    }

    pub fn min(&self) -> i64 {
        self.min
    }

    pub fn max(&self) -> i64 {
        self.max
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.sequence
    }

    /// Grow to the left so that `start` is covered; the new minimum is a whole
    /// number of steps below the current one, never below 1.
    pub fn extend_head(&mut self, start: i64) -> Result<()> {
        if start >= self.min || self.min <= 1 {
            return Ok(());
        }
        let new_min = if start <= 0 {
            1
        } else {
            (self.min - ((self.min - start) / self.step + 1) * self.step).max(1)
        };

        let head = fetch(
            self.provider,
            &self.chromosome,
            self.reference_id,
            new_min,
            self.min - 1,
        )?;
        let expected = (self.min - new_min) as usize;
        if head.len() != expected {
            return Err(TrackError::Reference {
                chromosome: self.chromosome.clone(),
                start: new_min,
                end: self.min - 1,
                source: std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("expected {expected} bases, got {}", head.len()),
                ),
            });
        }

        let mut sequence = Vec::new();
        sequence.try_reserve_exact(head.len() + self.sequence.len())?;
        sequence.extend_from_slice(&head);
        sequence.extend_from_slice(&self.sequence);
        self.sequence = sequence;
        debug!(
            "Reference buffer head {}:{} -> {}",
            self.chromosome, self.min, new_min
        );
        self.min = new_min;
        Ok(())
    }

    /// Grow to the right so that `end` is covered, a whole number of steps at a
    /// time. Near the contig end the provider may return fewer bases.
    pub fn extend_tail(&mut self, end: i64) -> Result<()> {
        if end <= self.max || self.tail_exhausted {
            return Ok(());
        }
        let new_max = self.max + ((end - self.max) / self.step + 1) * self.step;
        let tail = fetch(
            self.provider,
            &self.chromosome,
            self.reference_id,
            self.max + 1,
            new_max,
        )?;
        if (tail.len() as i64) < new_max - self.max {
            debug!("Reference {} ends at {}", self.chromosome, self.max + tail.len() as i64);
            self.tail_exhausted = true;
        }
        if tail.is_empty() {
            return Ok(());
        }

        self.sequence.try_reserve(tail.len())?;
        self.sequence.extend_from_slice(&tail);
        let grown_max = self.max + tail.len() as i64;
        debug!(
            "Reference buffer tail {}:{} -> {}",
            self.chromosome, self.max, grown_max
        );
        self.max = grown_max;
        Ok(())
    }
}

fn fetch(
    provider: &dyn ReferenceProvider,
    chromosome: &str,
    reference_id: u64,
    start: i64,
    end: i64,
) -> Result<Vec<u8>> {
    let mut bases = provider
        .get_sequence(start, end, reference_id, chromosome)
        .map_err(|source| TrackError::Reference {
            chromosome: chromosome.to_string(),
            start,
            end,
            source,
        })?;
    bases.make_ascii_uppercase();
    Ok(bases)
}
