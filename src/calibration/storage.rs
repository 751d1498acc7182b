//! Calibration record exchanged with the persistence collaborator.
//!
//! The record is postcard-encoded. The magic word versions the layout; a
//! mismatch discards the stored calibration instead of misreading it.

use heapless::Vec;
use serde::{Deserialize, Serialize};

use super::{CalStatus, Calibration, TERM_COUNT};
use crate::{frequency::FrequencyPlan, Complex};

pub const CALIBRATION_MAGIC: u32 = 0x434f_4e56;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("Encoding failed: {0}")]
    Encode(postcard::Error),
    #[error("Decoding failed: {0}")]
    Decode(postcard::Error),
    #[error("Unexpected magic {0:#010x}")]
    Magic(u32),
    #[error("Term layout does not match {0} points")]
    Layout(u16),
}

/// Stored form of [Calibration]: `[term][point][re, im]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord<const N: usize> {
    pub magic: u32,
    pub status: u16,
    pub start: u32,
    pub stop: u32,
    pub points: u16,
    pub terms: [Vec<[f32; 2], N>; TERM_COUNT],
}

impl<const N: usize> CalibrationRecord<N> {
    pub fn encode<'a>(&self, buf: &'a mut [u8]) -> Result<&'a mut [u8], Error> {
        postcard::to_slice(self, buf).map_err(Error::Encode)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        postcard::from_bytes(bytes).map_err(Error::Decode)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.magic != CALIBRATION_MAGIC {
            return Err(Error::Magic(self.magic));
        }
        if self.points as usize > N
            || self.terms.iter().any(|t| t.len() != self.points as usize)
        {
            return Err(Error::Layout(self.points));
        }
        Ok(())
    }
}

impl<const N: usize> Calibration<N> {
    pub fn to_record(&self) -> CalibrationRecord<N> {
        let points = self.points();
        CalibrationRecord {
            magic: CALIBRATION_MAGIC,
            status: self.status.raw_value(),
            start: self.plan.start(),
            stop: self.plan.stop(),
            points: points as u16,
            terms: core::array::from_fn(|slot| {
                self.data[slot][..points].iter().map(|v| [v.re, v.im]).collect()
            }),
        }
    }

    /// Adopt a stored calibration.
    ///
    /// # Args
    /// * `record` - Decoded record.
    /// * `slot` - Storage slot the record came from.
    ///
    /// # Returns
    /// A rejected record leaves the calibration reset and reports why.
    pub fn load_record(
        &mut self,
        record: &CalibrationRecord<N>,
        slot: u16,
    ) -> Result<(), Error> {
        if let Err(err) = record.validate() {
            log::warn!("Discarding stored calibration in slot {slot}: {err}");
            self.reset();
            return Err(err);
        }
        self.status = CalStatus::new_with_raw_value(record.status);
        self.plan = FrequencyPlan::new(record.start, record.stop, record.points);
        for (dst, src) in self.data.iter_mut().zip(record.terms.iter()) {
            for (d, s) in dst.iter_mut().zip(src.iter()) {
                *d = Complex::new(s[0], s[1]);
            }
        }
        self.save_slot = slot;
        Ok(())
    }

    /// Decode and adopt a stored record.
    pub fn restore(&mut self, bytes: &[u8], slot: u16) -> Result<(), Error> {
        match CalibrationRecord::<N>::decode(bytes) {
            Ok(record) => self.load_record(&record, slot),
            Err(err) => {
                log::warn!("Discarding stored calibration in slot {slot}: {err}");
                self.reset();
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::{Standard, Term};

    const N: usize = 6;

    fn calibrated() -> Calibration<N> {
        let mut cal = Calibration::<N>::new();
        cal.plan = FrequencyPlan::new(100_000, 600_000, 5);
        cal.status = cal.status.with_open(true);
        for (i, v) in cal.data[Standard::Open as usize].iter_mut().enumerate() {
            *v = Complex::new(i as f32, -(i as f32));
        }
        cal.done();
        cal
    }

    #[test]
    fn restore_reproduces_tables() {
        let cal = calibrated();
        let mut buf = [0u8; 512];
        let bytes = cal.to_record().encode(&mut buf).unwrap();

        let mut restored = Calibration::<N>::new();
        restored.restore(bytes, 3).unwrap();
        assert_eq!(restored.status(), cal.status());
        assert_eq!(restored.plan(), cal.plan());
        assert_eq!(restored.save_slot(), 3);
        assert_eq!(restored.term(Term::Er), cal.term(Term::Er));
        assert_eq!(restored.term(Term::Et).len(), 5);
    }

    #[test]
    fn stale_magic_resets() {
        let mut record = calibrated().to_record();
        record.magic = 0x434f_4e54;
        let mut target = calibrated();
        assert_eq!(
            target.load_record(&record, 0),
            Err(Error::Magic(0x434f_4e54))
        );
        assert_eq!(target.status(), CalStatus::DEFAULT);
    }

    #[test]
    fn short_term_array_is_a_layout_error() {
        let mut record = calibrated().to_record();
        record.terms[2].pop();
        let mut target = Calibration::<N>::new();
        assert_eq!(target.load_record(&record, 0), Err(Error::Layout(5)));
    }

    #[test]
    fn garbage_is_rejected() {
        let mut target = calibrated();
        assert!(matches!(
            target.restore(&[0xff; 3], 1),
            Err(Error::Decode(_))
        ));
        assert!(!target.status().apply());
    }
}
