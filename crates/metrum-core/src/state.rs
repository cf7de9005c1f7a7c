//! The minimal persisted form of a tempo map.

use core::num::NonZeroU32;

use crate::{
    error::TempoMapError,
    map::{TempoMap, TempoMapConfig},
    meter::{Meter, MeterPoint},
    section::{Anchor, Section, SectionKind},
    tempo::{Tempo, TempoPoint},
};

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TempoRecord {
    pub sample: i64,
    pub quarters_per_minute: f64,
    pub end_quarters_per_minute: f64,
    pub ramped: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MeterRecord {
    pub sample: i64,
    pub numerator: u32,
    pub denominator: u32,
}

/// Everything needed to rebuild a [`TempoMap`]. Pulse and BBT positions
/// are not stored since they are derived from the sample positions.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TempoMapState {
    pub sample_rate: u32,
    pub tempos: Vec<TempoRecord>,
    pub meters: Vec<MeterRecord>,
}

impl TempoRecord {
    fn to_tempo(self) -> Result<Tempo, TempoMapError> {
        if self.ramped {
            Tempo::ramped(self.quarters_per_minute, self.end_quarters_per_minute)
        } else {
            Tempo::new(self.quarters_per_minute)
        }
    }
}

impl MeterRecord {
    fn to_meter(self) -> Result<Meter, TempoMapError> {
        Meter::new(self.numerator, self.denominator)
    }
}

impl TempoMap {
    pub fn state(&self) -> TempoMapState {
        TempoMapState {
            sample_rate: self.sample_rate().get(),
            tempos: self
                .tempos()
                .map(|t| TempoRecord {
                    sample: t.sample(),
                    quarters_per_minute: t.tempo().quarters_per_minute(),
                    end_quarters_per_minute: t.tempo().end_quarters_per_minute(),
                    ramped: t.tempo().is_ramped(),
                })
                .collect(),
            meters: self
                .meters()
                .map(|m| MeterRecord {
                    sample: m.sample(),
                    numerator: m.meter().numerator(),
                    denominator: m.meter().denominator(),
                })
                .collect(),
        }
    }

    /// Rebuild a map from its persisted state.
    ///
    /// Both a tempo and a meter record at sample `0` are required. Records
    /// do not need to be sorted, but two records of the same kind at the
    /// same sample are rejected.
    pub fn from_state(state: &TempoMapState, coincidence_epsilon: i64) -> Result<Self, TempoMapError> {
        let sample_rate = NonZeroU32::new(state.sample_rate)
            .ok_or(TempoMapError::InvalidSampleRate(state.sample_rate))?;

        let mut tempos = state.tempos.clone();
        let mut meters = state.meters.clone();
        tempos.sort_by_key(|r| r.sample);
        meters.sort_by_key(|r| r.sample);

        let initial_tempo = match tempos.first() {
            Some(r) if r.sample == 0 => r.to_tempo()?,
            _ => {
                return Err(TempoMapError::SectionNotFound {
                    kind: SectionKind::Tempo,
                    sample: 0,
                })
            }
        };
        let initial_meter = match meters.first() {
            Some(r) if r.sample == 0 => r.to_meter()?,
            _ => {
                return Err(TempoMapError::SectionNotFound {
                    kind: SectionKind::Meter,
                    sample: 0,
                })
            }
        };

        let mut map = TempoMap::new(TempoMapConfig {
            sample_rate,
            initial_tempo,
            initial_meter,
            coincidence_epsilon,
        });

        for pair in tempos.windows(2) {
            if pair[0].sample == pair[1].sample {
                return Err(TempoMapError::DuplicateSection {
                    kind: SectionKind::Tempo,
                    sample: pair[1].sample,
                });
            }
        }
        for pair in meters.windows(2) {
            if pair[0].sample == pair[1].sample {
                return Err(TempoMapError::DuplicateSection {
                    kind: SectionKind::Meter,
                    sample: pair[1].sample,
                });
            }
        }

        // Anchors are placeholders until the single recomputation below.
        for r in tempos.iter().skip(1) {
            map.push_unanchored(Section::Tempo(TempoPoint::new(
                r.to_tempo()?,
                Anchor {
                    sample: r.sample,
                    ..Anchor::ORIGIN
                },
            )));
        }
        for r in meters.iter().skip(1) {
            map.push_unanchored(Section::Meter(MeterPoint::new(
                r.to_meter()?,
                Anchor {
                    sample: r.sample,
                    ..Anchor::ORIGIN
                },
            )));
        }

        map.finish_unanchored()?;

        log::debug!(
            "tempo map: restored {} tempo and {} meter sections",
            map.n_tempos(),
            map.n_meters()
        );

        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bbt::BbtTime, section::TimePosition};

    fn edited_map() -> TempoMap {
        let mut map = TempoMap::default();
        map.add_tempo(Tempo::new(240.0).unwrap(), TimePosition::Samples(96_000))
            .unwrap();
        map.add_tempo(Tempo::new(160.0).unwrap(), TimePosition::Samples(144_000))
            .unwrap();
        map.add_meter(Meter::new(5, 8).unwrap(), TimePosition::Samples(144_000))
            .unwrap();

        let tp = *map.tempo_at(96_000);
        map.set_ramped(&tp, true).unwrap();
        map
    }

    #[test]
    fn state_rebuilds_the_same_map() {
        let map = edited_map();
        let state = map.state();

        assert_eq!(state.tempos.len(), 3);
        assert_eq!(state.meters.len(), 2);
        assert!(state.tempos[1].ramped);

        let restored = TempoMap::from_state(&state, 1).unwrap();
        assert_eq!(restored, map);
        assert_eq!(restored.sample_to_bbt(144_000), Ok(BbtTime::new(3, 1, 0).unwrap()));
    }

    #[test]
    fn unsorted_records_are_accepted() {
        let mut state = edited_map().state();
        state.tempos.reverse();

        assert_eq!(TempoMap::from_state(&state, 1).unwrap(), edited_map());
    }

    #[test]
    fn invalid_state_is_rejected() {
        let good = edited_map().state();

        let mut state = good.clone();
        state.sample_rate = 0;
        assert_eq!(
            TempoMap::from_state(&state, 1),
            Err(TempoMapError::InvalidSampleRate(0))
        );

        let mut state = good.clone();
        state.meters.remove(0);
        assert_eq!(
            TempoMap::from_state(&state, 1),
            Err(TempoMapError::SectionNotFound {
                kind: SectionKind::Meter,
                sample: 0
            })
        );

        let mut state = good.clone();
        let dup = state.tempos[1];
        state.tempos.push(dup);
        assert_eq!(
            TempoMap::from_state(&state, 1),
            Err(TempoMapError::DuplicateSection {
                kind: SectionKind::Tempo,
                sample: 96_000
            })
        );

        let mut state = good;
        state.tempos[2].quarters_per_minute = -1.0;
        assert_eq!(
            TempoMap::from_state(&state, 1),
            Err(TempoMapError::InvalidTempo(-1.0))
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn state_through_json() {
        let state = edited_map().state();

        let json = serde_json::to_string(&state).unwrap();
        let parsed: TempoMapState = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, state);
        assert_eq!(TempoMap::from_state(&parsed, 1).unwrap(), edited_map());
    }
}
