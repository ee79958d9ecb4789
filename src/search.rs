//! Public entry point: validate a batch, stage it, reduce it.

use crate::buffer::{WorkingBuffer, check_capacity};
use crate::error::BottomError;
use crate::kernel::Bottom;
use crate::strategy::Strategy;

/// Batch size used by [`find_bottom`] and [`BottomSearch::default`].
pub const DEFAULT_CAPACITY: usize = 1024;

/// Finds the bottom of up to [`DEFAULT_CAPACITY`] samples with the detected
/// strategy.
///
/// Allocates one working buffer per call; use [`BottomSearch::find_with`] to
/// reuse one instead.
///
/// ```
/// use simd_bottom::find_bottom;
///
/// let bottom = find_bottom(&[3.0, 1.0, 4.0, 1.0, 5.0]).unwrap();
/// assert_eq!((bottom.value, bottom.index), (1.0, 1));
/// ```
pub fn find_bottom(samples: &[f32]) -> Result<Bottom, BottomError> {
    BottomSearch::default().find(samples)
}

/// A configured bottom search: batch capacity plus execution strategy.
///
/// Holds no buffers, so one value can be shared freely between threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BottomSearch {
    capacity: usize,
    strategy: Strategy,
}

impl BottomSearch {
    /// A search over batches of up to `capacity` samples using the detected
    /// strategy.
    pub fn new(capacity: usize) -> Result<Self, BottomError> {
        check_capacity(capacity)?;
        Ok(Self {
            capacity,
            strategy: Strategy::detected(),
        })
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// A fresh working buffer sized for this search.
    pub fn scratch(&self) -> WorkingBuffer {
        WorkingBuffer::with_checked_capacity(self.capacity)
    }

    /// Finds the bottom of `samples` using a per-call working buffer.
    pub fn find(&self, samples: &[f32]) -> Result<Bottom, BottomError> {
        self.check_len(samples)?;
        let mut scratch = self.scratch();
        self.find_with(&mut scratch, samples)
    }

    /// Finds the bottom of `samples`, staging them in a caller-owned buffer.
    ///
    /// # Errors
    ///
    /// - [`BottomError::ScratchMismatch`] if `scratch` was sized for another capacity.
    /// - [`BottomError::NotFound`] if `samples` is empty or entirely NaN.
    /// - [`BottomError::InvalidLength`] if `samples` exceeds the capacity.
    pub fn find_with(
        &self,
        scratch: &mut WorkingBuffer,
        samples: &[f32],
    ) -> Result<Bottom, BottomError> {
        if scratch.capacity() != self.capacity {
            return Err(BottomError::ScratchMismatch {
                expected: self.capacity,
                actual: scratch.capacity(),
            });
        }
        self.check_len(samples)?;

        let staged = scratch.stage(samples)?;
        match self.strategy.reduce(staged) {
            // Padding can only win when no real sample is comparable.
            Some(bottom) if bottom.index < samples.len() => Ok(bottom),
            _ => {
                tracing::trace!(len = samples.len(), "no comparable sample in batch");
                Err(BottomError::NotFound)
            }
        }
    }

    fn check_len(&self, samples: &[f32]) -> Result<(), BottomError> {
        if samples.is_empty() {
            tracing::trace!("empty batch");
            return Err(BottomError::NotFound);
        }
        if samples.len() > self.capacity {
            tracing::trace!(
                len = samples.len(),
                capacity = self.capacity,
                "batch exceeds capacity"
            );
            return Err(BottomError::InvalidLength {
                len: samples.len(),
                capacity: self.capacity,
            });
        }
        Ok(())
    }
}

impl Default for BottomSearch {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            strategy: Strategy::detected(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{SimdLevel, Strategy, VectorIsa};
    use proptest::prelude::*;
    use proptest::strategy::Strategy as _;

    fn reference_bottom(values: &[f32]) -> Option<(u32, usize)> {
        let mut best: Option<(f32, usize)> = None;
        for (i, &v) in values.iter().enumerate() {
            if v.is_nan() {
                continue;
            }
            match best {
                Some((b, _)) if v >= b => {}
                _ => best = Some((v, i)),
            }
        }
        best.map(|(v, i)| (v.to_bits(), i))
    }

    fn key(result: Result<Bottom, BottomError>) -> Result<(u32, usize), BottomError> {
        result.map(|b| (b.value_bits(), b.index))
    }

    /// Every strategy the running CPU can execute.
    fn strategies() -> Vec<Strategy> {
        let mut out = vec![Strategy::Scalar];
        for level in [
            SimdLevel::Sse41,
            SimdLevel::Avx2,
            SimdLevel::Avx512,
            SimdLevel::Neon,
        ] {
            out.extend(VectorIsa::new(level).map(Strategy::Vectorized));
        }
        out
    }

    fn sample() -> impl proptest::strategy::Strategy<Value = f32> {
        prop_oneof![
            8 => -1.0e3f32..1.0e3f32,
            1 => Just(f32::NAN),
            1 => Just(f32::INFINITY),
            1 => Just(-0.0f32),
        ]
    }

    fn batch_len() -> impl proptest::strategy::Strategy<Value = usize> {
        prop_oneof![
            Just(0usize),
            Just(1usize),
            Just(DEFAULT_CAPACITY - 1),
            Just(DEFAULT_CAPACITY),
            0usize..=DEFAULT_CAPACITY,
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(1000))]

        #[test]
        fn strategies_are_bit_identical(
            samples in batch_len().prop_flat_map(|len| proptest::collection::vec(sample(), len))
        ) {
            let expected = match reference_bottom(&samples) {
                Some(found) => Ok(found),
                None => Err(BottomError::NotFound),
            };

            let mut scratch = WorkingBuffer::new(DEFAULT_CAPACITY).unwrap();
            for strategy in strategies() {
                let search = BottomSearch::default().with_strategy(strategy);
                prop_assert_eq!(key(search.find(&samples)), expected, "{}", strategy.name());
                prop_assert_eq!(
                    key(search.find_with(&mut scratch, &samples)),
                    expected,
                    "{} with reused scratch",
                    strategy.name()
                );
            }
        }
    }

    #[test]
    fn first_occurrence_of_minimum() {
        let bottom = find_bottom(&[3.0, 1.0, 4.0, 1.0, 5.0]).unwrap();
        assert_eq!(bottom, Bottom { value: 1.0, index: 1 });
    }

    #[test]
    fn constant_full_batch() {
        let samples = [2.5f32; DEFAULT_CAPACITY];
        assert_eq!(
            find_bottom(&samples),
            Ok(Bottom {
                value: 2.5,
                index: 0
            })
        );
    }

    #[test]
    fn nan_is_skipped() {
        let samples = [f32::NAN, 5.0, 3.0];
        for strategy in strategies() {
            let search = BottomSearch::default().with_strategy(strategy);
            assert_eq!(
                search.find(&samples),
                Ok(Bottom {
                    value: 3.0,
                    index: 2
                }),
                "{}",
                strategy.name()
            );
        }
    }

    #[test]
    fn all_nan_is_not_found() {
        for strategy in strategies() {
            let search = BottomSearch::default().with_strategy(strategy);
            assert_eq!(search.find(&[f32::NAN; 5]), Err(BottomError::NotFound));
            assert_eq!(
                search.find(&[f32::NAN; DEFAULT_CAPACITY]),
                Err(BottomError::NotFound)
            );
        }
    }

    #[test]
    fn infinity_is_a_real_bottom() {
        assert_eq!(
            find_bottom(&[f32::NAN, f32::INFINITY, f32::INFINITY]),
            Ok(Bottom {
                value: f32::INFINITY,
                index: 1
            })
        );
    }

    #[test]
    fn empty_batch_is_not_found() {
        assert_eq!(find_bottom(&[]), Err(BottomError::NotFound));
    }

    #[test]
    fn oversized_batch_is_rejected() {
        let samples = vec![0.0f32; DEFAULT_CAPACITY + 1];
        assert_eq!(
            find_bottom(&samples),
            Err(BottomError::InvalidLength {
                len: 1025,
                capacity: 1024
            })
        );
    }

    #[test]
    fn repeated_calls_are_identical() {
        let samples: Vec<f32> = (0..700).map(|i| ((i * 37 + 11) % 101) as f32 - 50.0).collect();
        let first = find_bottom(&samples);
        let second = find_bottom(&samples);
        assert_eq!(first, second);
        assert_eq!(first.map(|b| b.index), Ok(27));
    }

    #[test]
    fn reused_scratch_does_not_leak_between_calls() {
        let search = BottomSearch::default();
        let mut scratch = search.scratch();

        let low = vec![-100.0f32; DEFAULT_CAPACITY];
        assert_eq!(search.find_with(&mut scratch, &low).map(|b| b.index), Ok(0));

        let short = [7.0, 6.0, 8.0];
        assert_eq!(
            search.find_with(&mut scratch, &short),
            Ok(Bottom {
                value: 6.0,
                index: 1
            })
        );

        let nan = [f32::NAN; 3];
        assert_eq!(
            search.find_with(&mut scratch, &nan),
            Err(BottomError::NotFound)
        );
    }

    #[test]
    fn capacities_coexist() {
        let small = BottomSearch::new(16).unwrap();
        let large = BottomSearch::new(4096).unwrap();
        let samples: Vec<f32> = (0..20).map(|i| 20.0 - i as f32).collect();

        assert_eq!(
            small.find(&samples),
            Err(BottomError::InvalidLength {
                len: 20,
                capacity: 16
            })
        );
        assert_eq!(small.find(&samples[..16]).map(|b| b.index), Ok(15));
        assert_eq!(large.find(&samples).map(|b| b.index), Ok(19));
    }

    #[test]
    fn mismatched_scratch_is_rejected() {
        let search = BottomSearch::new(32).unwrap();
        let mut scratch = WorkingBuffer::new(64).unwrap();
        assert_eq!(
            search.find_with(&mut scratch, &[1.0]),
            Err(BottomError::ScratchMismatch {
                expected: 32,
                actual: 64
            })
        );
    }

    #[test]
    fn invalid_capacity_is_rejected() {
        assert_eq!(
            BottomSearch::new(100),
            Err(BottomError::InvalidCapacity {
                capacity: 100,
                lanes: 16
            })
        );
    }
}
