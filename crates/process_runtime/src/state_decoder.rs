// =============================================================================
// Quantum Process Runtime - State Decoder
// =============================================================================
// Table of Contents:
//   1. StateDecoder - Packed snapshot records to amplitude mapping
//   2. DecodedState - Normalized basis-state -> amplitude mapping
//   3. Sampling - Seed-stable shot sampling from the distribution
//   4. Rendering - Formatted listing with square-root annotation
// =============================================================================
// Purpose: Converts the engine's packed amplitude records into a
//          probability-preserving mapping from basis state to complex
//          amplitude. Chunked bit patterns are concatenated most-significant
//          chunk first, amplitudes for equal basis states are summed, and the
//          result is renormalized when accumulated probability mass deviates
//          from 1 beyond tolerance. Rendering annotations are cosmetic and
//          never alter the authoritative amplitudes.
// =============================================================================

use std::collections::BTreeMap;

use num_complex::Complex64;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use engine_interface::contract::SnapshotRecord;

use crate::error::{RuntimeError, RuntimeResult};

/// Probability mass may drift from 1 by at most this much before the
/// decoder rescales every amplitude.
pub const NORMALIZATION_TOLERANCE: f64 = 1e-10;

const CHUNK_BIT_WIDTH: usize = 64;
const MAX_BASIS_CHUNKS: usize = 2;

// =============================================================================
// 1. StateDecoder
// =============================================================================

#[derive(Debug)]
pub struct StateDecoder;

impl StateDecoder {
    /// Decode raw snapshot records over `qubit_count` qubits. Runs once per
    /// snapshot; the result is cached by the owning deferred result.
    pub fn decode(
        records: &[SnapshotRecord],
        qubit_count: usize,
    ) -> RuntimeResult<DecodedState> {
        let mut states: BTreeMap<u128, Complex64> = BTreeMap::new();

        for record in records {
            if record.basis_chunks.len() > MAX_BASIS_CHUNKS {
                return Err(RuntimeError::RegisterTooWide {
                    qubits: record.basis_chunks.len() * CHUNK_BIT_WIDTH,
                    max_width: MAX_BASIS_CHUNKS * CHUNK_BIT_WIDTH,
                });
            }

            // Most-significant chunk first.
            let mut label = 0u128;
            for chunk in &record.basis_chunks {
                label = (label << CHUNK_BIT_WIDTH) | u128::from(*chunk);
            }

            let amplitude = Complex64::new(record.amplitude_real, record.amplitude_imag);
            *states.entry(label).or_insert(Complex64::new(0.0, 0.0)) += amplitude;
        }

        let mass: f64 = states.values().map(|amplitude| amplitude.norm_sqr()).sum();
        if (mass - 1.0).abs() > NORMALIZATION_TOLERANCE {
            let scale = mass.sqrt();
            for amplitude in states.values_mut() {
                *amplitude /= scale;
            }
            tracing::debug!(mass = mass, "snapshot_renormalized");
        }

        Ok(DecodedState {
            states,
            qubit_count,
        })
    }
}

// =============================================================================
// 2. DecodedState
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedState {
    states: BTreeMap<u128, Complex64>,
    qubit_count: usize,
}

impl DecodedState {
    pub fn states(&self) -> &BTreeMap<u128, Complex64> {
        &self.states
    }

    pub fn qubit_count(&self) -> usize {
        self.qubit_count
    }

    /// Basis state to squared-magnitude probability.
    pub fn probabilities(&self) -> BTreeMap<u128, f64> {
        self.states
            .iter()
            .map(|(label, amplitude)| (*label, amplitude.norm_sqr()))
            .collect()
    }
}

// =============================================================================
// 3. Sampling
// =============================================================================

impl DecodedState {
    /// Draw `shots` independent basis-state outcomes from the distribution.
    /// Deterministic for a given seed.
    pub fn sample(&self, shots: u64, seed: Option<u64>) -> BTreeMap<u128, u64> {
        let mut rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let distribution: Vec<(u128, f64)> = self
            .states
            .iter()
            .map(|(label, amplitude)| (*label, amplitude.norm_sqr()))
            .collect();

        let mut histogram: BTreeMap<u128, u64> = BTreeMap::new();
        for _ in 0..shots {
            let draw: f64 = rng.gen();
            let mut cumulative = 0.0;
            let mut outcome = distribution
                .last()
                .map(|(label, _)| *label)
                .unwrap_or_default();
            for (label, probability) in &distribution {
                cumulative += probability;
                if draw < cumulative {
                    outcome = *label;
                    break;
                }
            }
            *histogram.entry(outcome).or_insert(0) += 1;
        }
        histogram
    }
}

// =============================================================================
// 4. Rendering
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegmentBase {
    Binary,
    Decimal,
}

#[derive(Debug, Clone, Copy)]
struct FormatSegment {
    base: SegmentBase,
    begin: usize,
    end: usize,
}

impl DecodedState {
    /// Render the state as an ascending-by-label listing of
    /// "label (probability) / amplitude" entries.
    ///
    /// `format` follows `(i|b)\d*(:(i|b)\d+)*`: each segment names a
    /// sub-field width over the most-significant bits, rendered in decimal
    /// (`i`) or binary (`b`); remaining least-significant bits render in
    /// binary. `None` renders the whole register in binary.
    pub fn show(&self, format: Option<&str>) -> RuntimeResult<String> {
        let segments = self.parse_format(format)?;

        let mut lines = Vec::with_capacity(self.states.len());
        for (label, amplitude) in &self.states {
            lines.push(self.render_entry(*label, *amplitude, &segments));
        }
        Ok(lines.join("\n"))
    }

    fn parse_format(&self, format: Option<&str>) -> RuntimeResult<Vec<FormatSegment>> {
        let format = match format {
            None => {
                return Ok(vec![FormatSegment {
                    base: SegmentBase::Binary,
                    begin: 0,
                    end: self.qubit_count,
                }])
            }
            Some(format) => format,
        };

        // Bare "b" / "i" means the full register width.
        let expanded;
        let format = if format == "b" || format == "i" {
            expanded = format!("{format}{}", self.qubit_count);
            &expanded
        } else {
            format
        };

        let mut segments = Vec::new();
        let mut consumed = 0usize;
        for part in format.split(':') {
            let mut chars = part.chars();
            let base = match chars.next() {
                Some('b') => SegmentBase::Binary,
                Some('i') => SegmentBase::Decimal,
                _ => return Err(RuntimeError::MalformedFormat(format.to_string())),
            };
            let width: usize = chars
                .as_str()
                .parse()
                .map_err(|_| RuntimeError::MalformedFormat(format.to_string()))?;
            if consumed + width > self.qubit_count {
                return Err(RuntimeError::MalformedFormat(format.to_string()));
            }
            segments.push(FormatSegment {
                base,
                begin: consumed,
                end: consumed + width,
            });
            consumed += width;
        }
        if consumed < self.qubit_count {
            segments.push(FormatSegment {
                base: SegmentBase::Binary,
                begin: consumed,
                end: self.qubit_count,
            });
        }
        Ok(segments)
    }

    fn render_entry(
        &self,
        label: u128,
        amplitude: Complex64,
        segments: &[FormatSegment],
    ) -> String {
        let bits: String = (0..self.qubit_count)
            .rev()
            .map(|position| {
                if (label >> position) & 1 == 1 {
                    '1'
                } else {
                    '0'
                }
            })
            .collect();

        let mut entry = String::new();
        for segment in segments {
            let field = &bits[segment.begin..segment.end];
            match segment.base {
                SegmentBase::Binary => entry.push_str(&format!("|{field}⟩")),
                SegmentBase::Decimal => {
                    let value = u128::from_str_radix(field, 2).unwrap_or(0);
                    entry.push_str(&format!("|{value}⟩"));
                }
            }
        }
        entry.push_str(&format!("\t({:.2}%)\n", 100.0 * amplitude.norm_sqr()));
        entry.push_str(&render_amplitude(amplitude));
        entry
    }
}

/// Numeric amplitude rendering with opportunistic square-root annotation.
/// Display convenience only: tolerances here are cosmetic and the annotated
/// form never feeds back into the amplitude mapping.
fn render_amplitude(amplitude: Complex64) -> String {
    let real = amplitude.re.abs() > 1e-10;
    let real_negative = amplitude.re < 0.0;
    let imag = amplitude.im.abs() > 1e-10;
    let imag_negative = amplitude.im < 0.0;

    let inverse_mass = 1.0 / amplitude.norm_sqr();
    let mut use_sqrt = (inverse_mass.round() - inverse_mass).abs() < 0.001;
    use_sqrt = use_sqrt
        && ((amplitude.re.abs() - amplitude.im.abs()).abs() < 1e-6 || real != imag);

    if real && imag {
        let denominator = format!("/√{}", (2.0 * inverse_mass).round() as i64);
        let numerator = format!(
            "{}{}",
            if real_negative { "(-1" } else { " (1" },
            if imag_negative { "-i" } else { "+i" }
        );
        let annotation = if use_sqrt {
            format!("\t≅ {numerator}){denominator}")
        } else {
            String::new()
        };
        format!(
            "{:9.6}{:+.6}i{annotation}",
            amplitude.re, amplitude.im
        )
    } else if real {
        let denominator = format!("/√{}", inverse_mass.round() as i64);
        let numerator = if real_negative { "  -1" } else { "   1" };
        let annotation = if use_sqrt {
            format!("\t≅   {numerator}{denominator}")
        } else {
            String::new()
        };
        format!("{:9.6}       {annotation}", amplitude.re)
    } else {
        let denominator = format!("/√{}", inverse_mass.round() as i64);
        let numerator = if imag_negative { "  -i" } else { "   i" };
        let annotation = if use_sqrt {
            format!("\t≅   {numerator}{denominator}")
        } else {
            String::new()
        };
        format!(" {:17.6}i{annotation}", amplitude.im)
    }
}
