//! Capability-queried selection between the vectorized and scalar paths.
//!
//! CPU detection runs once per process and is cached. Callers that want a
//! particular path (tests, benchmarks) construct a [`Strategy`] directly; a
//! [`VectorIsa`] can only be obtained for an extension the running CPU
//! actually supports, so every `Strategy` value is safe to execute.
//!
//! # Environment
//!
//! - `BOTTOM_AVX512=1` opts into AVX-512 when AVX2 is also present. Otherwise
//!   AVX2 is preferred.
//! - `BOTTOM_FORCE_SCALAR=1` makes [`Strategy::detected`] return
//!   [`Strategy::Scalar`].

use std::sync::OnceLock;

use crate::kernel::{self, Bottom};

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
const AVX512_ENV: &str = "BOTTOM_AVX512";
const FORCE_SCALAR_ENV: &str = "BOTTOM_FORCE_SCALAR";

/// Vector instruction set extensions with a bottom-search kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimdLevel {
    /// SSE4.1 (128-bit, 4 lanes).
    Sse41,
    /// AVX2 (256-bit, 8 lanes).
    Avx2,
    /// AVX-512F (512-bit, 16 lanes), `x86_64` only.
    Avx512,
    /// NEON (128-bit, 4 lanes), always present on aarch64.
    Neon,
}

impl SimdLevel {
    /// Number of `f32` lanes processed per comparison.
    pub const fn lanes(self) -> usize {
        match self {
            SimdLevel::Sse41 | SimdLevel::Neon => 4,
            SimdLevel::Avx2 => 8,
            SimdLevel::Avx512 => 16,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            SimdLevel::Sse41 => "sse4.1",
            SimdLevel::Avx2 => "avx2",
            SimdLevel::Avx512 => "avx512f",
            SimdLevel::Neon => "neon",
        }
    }

    /// Whether the running CPU can execute this level's kernel.
    pub fn is_supported(self) -> bool {
        match self {
            SimdLevel::Sse41 => kernel::sse41_available(),
            SimdLevel::Avx2 => kernel::avx2_available(),
            SimdLevel::Avx512 => kernel::avx512_available(),
            SimdLevel::Neon => cfg!(target_arch = "aarch64"),
        }
    }
}

/// A vector extension verified to be available on this CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VectorIsa {
    level: SimdLevel,
}

impl VectorIsa {
    /// Returns `None` if the running CPU lacks `level`.
    pub fn new(level: SimdLevel) -> Option<Self> {
        level.is_supported().then_some(Self { level })
    }

    /// The widest usable extension, detected once and cached.
    pub fn best() -> Option<Self> {
        static BEST: OnceLock<Option<VectorIsa>> = OnceLock::new();
        *BEST.get_or_init(detect_best)
    }

    pub fn level(self) -> SimdLevel {
        self.level
    }

    pub fn lanes(self) -> usize {
        self.level.lanes()
    }
}

/// How a bottom search is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Lane-parallel kernel for a verified vector extension.
    Vectorized(VectorIsa),
    /// Sequential scan.
    Scalar,
}

impl Strategy {
    /// The process-wide strategy, selected on first use.
    pub fn detected() -> Self {
        static DETECTED: OnceLock<Strategy> = OnceLock::new();
        *DETECTED.get_or_init(detect_strategy)
    }

    /// The vectorized strategy for `level`, if the CPU supports it.
    pub fn vectorized(level: SimdLevel) -> Option<Self> {
        VectorIsa::new(level).map(Strategy::Vectorized)
    }

    pub fn name(self) -> &'static str {
        match self {
            Strategy::Vectorized(isa) => isa.level().name(),
            Strategy::Scalar => "scalar",
        }
    }

    pub fn lanes(self) -> usize {
        match self {
            Strategy::Vectorized(isa) => isa.lanes(),
            Strategy::Scalar => 1,
        }
    }

    pub fn is_vectorized(self) -> bool {
        matches!(self, Strategy::Vectorized(_))
    }

    /// Finds the bottom of `values` with this strategy.
    ///
    /// Works on slices of any length; lengths that are not a multiple of the
    /// lane count finish with a scalar tail.
    pub fn reduce(self, values: &[f32]) -> Option<Bottom> {
        match self {
            Strategy::Vectorized(isa) => kernel::bottom_with(isa, values),
            Strategy::Scalar => kernel::bottom_scalar(values),
        }
    }
}

impl Default for Strategy {
    fn default() -> Self {
        Strategy::detected()
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| {
            let v = v.to_ascii_lowercase();
            matches!(v.as_str(), "1" | "true" | "yes" | "on")
        })
        .unwrap_or(false)
}

fn detect_best() -> Option<VectorIsa> {
    #[cfg(target_arch = "aarch64")]
    {
        VectorIsa::new(SimdLevel::Neon)
    }

    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    {
        let avx2_ok = kernel::avx2_available();
        let level = if kernel::avx512_available() && (env_flag(AVX512_ENV) || !avx2_ok) {
            SimdLevel::Avx512
        } else if avx2_ok {
            SimdLevel::Avx2
        } else {
            SimdLevel::Sse41
        };
        VectorIsa::new(level)
    }

    #[cfg(not(any(target_arch = "aarch64", target_arch = "x86", target_arch = "x86_64")))]
    {
        None
    }
}

fn detect_strategy() -> Strategy {
    let strategy = if env_flag(FORCE_SCALAR_ENV) {
        Strategy::Scalar
    } else {
        VectorIsa::best().map_or(Strategy::Scalar, Strategy::Vectorized)
    };

    tracing::debug!(
        strategy = strategy.name(),
        lanes = strategy.lanes(),
        "selected bottom search strategy"
    );
    strategy
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_is_stable() {
        assert_eq!(Strategy::detected(), Strategy::detected());
        assert_eq!(VectorIsa::best(), VectorIsa::best());
    }

    #[test]
    fn lane_counts() {
        assert_eq!(SimdLevel::Sse41.lanes(), 4);
        assert_eq!(SimdLevel::Avx2.lanes(), 8);
        assert_eq!(SimdLevel::Avx512.lanes(), 16);
        assert_eq!(SimdLevel::Neon.lanes(), 4);
        assert_eq!(Strategy::Scalar.lanes(), 1);
        assert_eq!(Strategy::Scalar.name(), "scalar");
        assert!(!Strategy::Scalar.is_vectorized());
    }

    #[test]
    fn unsupported_levels_are_rejected() {
        if !cfg!(target_arch = "aarch64") {
            assert!(VectorIsa::new(SimdLevel::Neon).is_none());
        }
        if !cfg!(any(target_arch = "x86", target_arch = "x86_64")) {
            assert!(Strategy::vectorized(SimdLevel::Avx2).is_none());
        }
    }

    #[test]
    fn best_is_supported() {
        if let Some(isa) = VectorIsa::best() {
            assert!(isa.level().is_supported());
            assert_eq!(Strategy::vectorized(isa.level()), Some(Strategy::Vectorized(isa)));
        }
    }

    #[test]
    fn scalar_and_vectorized_agree_on_small_input() {
        let values = [3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0, 5.0, 3.0];
        let expected = Strategy::Scalar.reduce(&values);
        assert_eq!(Strategy::detected().reduce(&values), expected);
    }
}
