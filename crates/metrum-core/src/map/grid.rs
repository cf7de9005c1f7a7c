use crate::{
    bbt::{BbtOffset, BbtTime},
    error::TempoMapError,
};

use super::TempoMap;

/// One line of the beat grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridPoint {
    pub sample: i64,
    pub pulse: f64,
    pub bbt: BbtTime,
    /// The instantaneous tempo at this point.
    pub quarters_per_minute: f64,
}

impl GridPoint {
    #[inline]
    pub fn is_bar(&self) -> bool {
        self.bbt.is_bar_start()
    }
}

impl TempoMap {
    /// The beat grid in the sample range `[start, end)`.
    ///
    /// With a `bar_modulo` of `0` every beat is returned. Otherwise only
    /// every `bar_modulo`th bar line (counting from bar 1) is returned.
    pub fn grid(&self, start: i64, end: i64, bar_modulo: u32) -> Result<Vec<GridPoint>, TempoMapError> {
        let mut points = Vec::new();
        self.fill_grid(&mut points, start, end, bar_modulo)?;
        Ok(points)
    }

    /// Like [`TempoMap::grid`], but appends to `points` so that an existing
    /// allocation can be reused.
    pub fn fill_grid(
        &self,
        points: &mut Vec<GridPoint>,
        start: i64,
        end: i64,
        bar_modulo: u32,
    ) -> Result<(), TempoMapError> {
        let start = start.max(0);
        if end <= start {
            return Ok(());
        }

        let first = self.sample_to_bbt(start)?;
        let meter = *self
            .meter(self.meter_index_at_pulse(self.sample_to_pulse(start)))
            .meter();

        let (mut bbt, step) = if bar_modulo == 0 {
            (meter.round_up_to_beat(&first), BbtOffset::from_beats(1))
        } else {
            let modulo = bar_modulo.min(i32::MAX as u32) as i32;
            let bar = meter.round_up_to_bar(&first);
            let misalignment = (bar.bars() - 1) % modulo;

            let bar = if misalignment == 0 {
                bar
            } else {
                self.bbt_walk(&bar, &BbtOffset::from_bars((modulo - misalignment) as u32))
            };

            (bar, BbtOffset::from_bars(modulo as u32))
        };

        loop {
            bbt = self.skip_truncated(bbt);

            let pulse = self.bbt_to_pulse(&bbt)?;
            let sample = self.pulse_to_sample(pulse)?;
            if sample >= end {
                break;
            }

            if sample >= start {
                points.push(GridPoint {
                    sample,
                    pulse,
                    bbt,
                    quarters_per_minute: self.quarters_per_minute_at(sample),
                });
            }

            bbt = self.bbt_walk(&bbt, &step);
        }

        Ok(())
    }

    /// Beats past the point where a meter section cut their bar short do
    /// not exist. Move such positions to the start of that meter.
    fn skip_truncated(&self, mut bbt: BbtTime) -> BbtTime {
        loop {
            let n = self.meter_index_at_bbt(&bbt);

            let Some(next) = (n + 1 < self.meters.len()).then(|| self.meter(n + 1)) else {
                return bbt;
            };

            if self.meter(n).pulse_at(&bbt) < next.pulse() {
                return bbt;
            }

            bbt = *next.bbt();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{meter::Meter, section::TimePosition, tempo::Tempo};

    fn samples(points: &[GridPoint]) -> Vec<i64> {
        points.iter().map(|p| p.sample).collect()
    }

    #[test]
    fn every_beat() {
        let map = TempoMap::default();
        let grid = map.grid(0, 96_000, 0).unwrap();

        assert_eq!(samples(&grid), [0, 24_000, 48_000, 72_000]);
        assert!(grid[0].is_bar());
        assert!(!grid[1].is_bar());
        assert_eq!(grid[2].quarters_per_minute, 120.0);
    }

    #[test]
    fn starts_on_the_next_beat() {
        let map = TempoMap::default();
        let grid = map.grid(30_000, 80_000, 0).unwrap();

        assert_eq!(samples(&grid), [48_000, 72_000]);
        assert_eq!(grid[0].bbt, BbtTime::new(1, 3, 0).unwrap());
    }

    #[test]
    fn every_other_bar() {
        let mut map = TempoMap::default();
        map.set_tempo(Tempo::new(240.0).unwrap(), TimePosition::Samples(192_000))
            .unwrap();

        let grid = map.grid(10, 400_000, 2).unwrap();

        // Bars 3, 5 and 7. Bars from bar 3 on are half as long.
        assert_eq!(samples(&grid), [192_000, 288_000, 384_000]);
        assert!(grid.iter().all(GridPoint::is_bar));
    }

    #[test]
    fn truncated_bars_are_skipped() {
        let mut map = TempoMap::default();
        map.add_meter(Meter::new(3, 4).unwrap(), TimePosition::Samples(144_000))
            .unwrap();

        let grid = map.grid(0, 216_000, 0).unwrap();

        assert_eq!(
            samples(&grid),
            [0, 24_000, 48_000, 72_000, 96_000, 120_000, 144_000, 168_000, 192_000]
        );
        assert_eq!(grid[6].bbt, BbtTime::new(3, 1, 0).unwrap());
    }

    #[test]
    fn empty_ranges() {
        let map = TempoMap::default();

        assert!(map.grid(50_000, 50_000, 0).unwrap().is_empty());
        assert!(map.grid(-100, -10, 0).unwrap().is_empty());
    }
}
