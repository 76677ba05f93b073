// SPDX-License-Identifier: AGPL-3.0-or-later
// SiftDB - Bit-Sliced Signature Search Engine
// Copyright (C) 2026 SiftDB contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Term treatments.
//!
//! A treatment is a pure function from a term's frequency band to a
//! [`RowConfiguration`]: how many private and shared rows, at which
//! ranks, the term's signature occupies. The arithmetic is driven by two
//! knobs: the target bit density `density` of shared rows and the
//! signal-to-noise ratio `snr`. With `k` rows at density `d`, the
//! probability that a non-matching document survives every row is about
//! `d^k`, so rows are added until `d^k <= 1/snr`.
//!
//! Frequency bands quantize a term's document frequency `f` as
//! `band = floor(-log2 f)`: band 0 appears in every document, each
//! further band halves the frequency.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use siftdb_core::types::Rank;

/// Frequency band: `f ~ 2^-band`.
pub type FrequencyBand = u8;

/// Rarest band the treatments distinguish. Anything rarer is clamped.
pub const MAX_FREQUENCY_BAND: FrequencyBand = 26;

/// Band for a document frequency fraction in `(0, 1]`.
pub fn band_for_frequency(frequency: f64) -> FrequencyBand {
    assert!(
        frequency > 0.0 && frequency <= 1.0,
        "document frequency must be in (0, 1]"
    );
    let band = (-frequency.log2()).floor();
    (band as u32).min(MAX_FREQUENCY_BAND as u32) as FrequencyBand
}

/// One rank's worth of a term's row assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowConfigEntry {
    pub rank: Rank,
    pub row_count: u8,
    pub is_private: bool,
}

/// Per-rank row counts a treatment assigns to one term.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowConfiguration {
    entries: SmallVec<[RowConfigEntry; 4]>,
}

impl RowConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, rank: Rank, row_count: u8, is_private: bool) {
        if row_count == 0 {
            return;
        }
        self.entries.push(RowConfigEntry {
            rank,
            row_count,
            is_private,
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &RowConfigEntry> {
        self.entries.iter()
    }

    pub fn total_rows(&self) -> usize {
        self.entries.iter().map(|e| e.row_count as usize).sum()
    }

    pub fn has_private_rows(&self) -> bool {
        self.entries.iter().any(|e| e.is_private)
    }
}

/// The rule mapping a term's frequency profile to its rows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TermTreatment {
    /// One private rank-0 row per term. Used by small synthetic indexes
    /// where every term is registered up front.
    PrivateRank0,

    /// Frequent terms get a private rank-0 row; everything else shares
    /// rank-0 rows at the target density.
    PrivateSharedRank0 { density: f64, snr: f64 },

    /// Like `PrivateSharedRank0`, but terms frequent enough to fill a
    /// rank-3 row near the target density get a private rank-3 row
    /// (an eighth of the bits read per query) topped up with shared
    /// rank-0 rows until the noise bound holds again.
    PrivateSharedRank0And3 { density: f64, snr: f64 },
}

impl TermTreatment {
    /// Compute the row configuration for a term in `band`.
    pub fn configuration(&self, band: FrequencyBand) -> RowConfiguration {
        let mut config = RowConfiguration::new();
        match *self {
            TermTreatment::PrivateRank0 => {
                config.push(0, 1, true);
            }
            TermTreatment::PrivateSharedRank0 { density, snr } => {
                check_parameters(density, snr);
                let frequency = frequency_of(band);
                if frequency >= density {
                    config.push(0, 1, true);
                } else {
                    config.push(0, shared_rows_needed(density, snr), false);
                }
            }
            TermTreatment::PrivateSharedRank0And3 { density, snr } => {
                check_parameters(density, snr);
                let frequency = frequency_of(band);
                if frequency >= density {
                    config.push(0, 1, true);
                } else if frequency >= density / 8.0 {
                    // A rank-3 row OR-collapses 8 documents per bit, so
                    // this term fills it to within the density target.
                    // Its noise contribution is its rank-3 bit density.
                    config.push(3, 1, true);
                    let rank3_density = (frequency * 8.0).min(1.0);
                    config.push(0, shared_rows_topup(rank3_density, density, snr), false);
                } else {
                    config.push(0, shared_rows_needed(density, snr), false);
                }
            }
        }
        config
    }

    /// Ranks this treatment can ever assign rows at.
    pub fn active_ranks(&self) -> &'static [Rank] {
        match self {
            TermTreatment::PrivateRank0 | TermTreatment::PrivateSharedRank0 { .. } => &[0],
            TermTreatment::PrivateSharedRank0And3 { .. } => &[0, 3],
        }
    }
}

fn check_parameters(density: f64, snr: f64) {
    assert!(
        density > 0.0 && density < 1.0,
        "row density must be in (0, 1)"
    );
    assert!(snr > 1.0, "signal-to-noise ratio must exceed 1");
}

fn frequency_of(band: FrequencyBand) -> f64 {
    (-(band as f64)).exp2()
}

/// Smallest k with density^k <= 1/snr.
fn shared_rows_needed(density: f64, snr: f64) -> u8 {
    let k = (snr.ln() / -density.ln()).ceil();
    (k as u8).max(1)
}

/// Shared rank-0 rows needed on top of a row of `row_density` so the
/// total noise product stays within 1/snr.
fn shared_rows_topup(row_density: f64, density: f64, snr: f64) -> u8 {
    if row_density <= 1.0 / snr {
        return 0;
    }
    let s = ((snr.ln() + row_density.ln()) / -density.ln()).ceil();
    (s.max(0.0)) as u8
}
