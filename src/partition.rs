// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Horizontal strip partitioning.
//!
//! An image of `height` rows is split into `degree` contiguous bands of
//! `height / degree` rows, the last band absorbing the remainder. Bands with
//! fewer rows than the kernel neighborhood are skipped: they are reported but
//! never dispatched, and their output rows keep their prior contents.

use core::fmt;

use tracing::debug;

use crate::error::Error;

/// Rows in the kernel neighborhood, the smallest band worth dispatching.
pub const MIN_BAND_ROWS: usize = 3;

/// Half-open range of rows `[start, end)` assigned to band `index`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RowRange {
    pub index: usize,
    pub start: usize,
    pub end: usize,
}

impl RowRange {
    pub const fn new(index: usize, start: usize, end: usize) -> Self {
        Self { index, start, end }
    }

    /// Number of rows in the band.
    pub const fn rows(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub const fn contains(&self, row: usize) -> bool {
        self.start <= row && row < self.end
    }
}

impl fmt::Display for RowRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}[{}, {})", self.index, self.start, self.end)
    }
}

/// Splits `height` rows into exactly `degree` bands without skipping any.
///
/// Band `i` starts at `i * (height / degree)`; every band but the last ends
/// where the next begins and the last ends at `height`. When `degree > height`
/// all bands but the last are empty.
pub fn split_rows(height: usize, degree: usize) -> Vec<RowRange> {
    if degree == 0 {
        return Vec::new();
    }
    let chunk = height / degree;
    (0..degree)
        .map(|i| {
            let start = i * chunk;
            let end = if i == degree - 1 {
                height
            } else {
                (i + 1) * chunk
            };
            RowRange::new(i, start, end)
        })
        .collect()
}

/// The bands of one dispatch, split into those that will run and those
/// skipped for being thinner than the minimum band height.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Partition {
    height: usize,
    degree: usize,
    min_rows: usize,
    bands: Vec<RowRange>,
    skipped: Vec<RowRange>,
}

impl Partition {
    /// Partitions with the default [`MIN_BAND_ROWS`].
    pub fn new(height: usize, degree: usize) -> Result<Self, Error> {
        Self::with_min_rows(height, degree, MIN_BAND_ROWS)
    }

    /// Partitions `height` rows into `degree` bands, skipping those with fewer
    /// than `min_rows` rows. A `min_rows` of zero is treated as one so that
    /// empty bands are never dispatched.
    ///
    /// Skipping every band is not an error here; the dispatcher reports it as
    /// [`Error::EmptyPartition`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDegree`] for a degree of zero and
    /// [`Error::InvalidBuffer`] for a height of zero.
    pub fn with_min_rows(height: usize, degree: usize, min_rows: usize) -> Result<Self, Error> {
        if degree == 0 {
            return Err(Error::InvalidDegree(degree));
        }
        if height == 0 {
            return Err(Error::InvalidBuffer("cannot partition zero rows".into()));
        }
        let min_rows = min_rows.max(1);

        let (bands, skipped): (Vec<_>, Vec<_>) = split_rows(height, degree)
            .into_iter()
            .partition(|band| band.rows() >= min_rows);
        for band in &skipped {
            debug!(%band, rows = band.rows(), min_rows, "skipping thin band");
        }

        Ok(Self {
            height,
            degree,
            min_rows,
            bands,
            skipped,
        })
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn min_rows(&self) -> usize {
        self.min_rows
    }

    /// Bands that will be dispatched, in ascending row order.
    pub fn bands(&self) -> &[RowRange] {
        &self.bands
    }

    /// Bands left unprocessed because they were too thin.
    pub fn skipped(&self) -> &[RowRange] {
        &self.skipped
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    /// Rows adjacent to a seam between two bands. These lack part of their
    /// neighborhood when processed band by band, so their output differs from
    /// a single unpartitioned pass.
    pub fn seam_rows(&self) -> Vec<usize> {
        let mut rows: Vec<usize> = split_rows(self.height, self.degree)
            .iter()
            .skip(1)
            .map(|band| band.start)
            .filter(|&seam| seam > 0 && seam < self.height)
            .flat_map(|seam| [seam - 1, seam])
            .filter(|&row| row > 0 && row + 1 < self.height)
            .collect();
        rows.sort_unstable();
        rows.dedup();
        rows
    }
}

/// Computes the dispatchable bands for `height` rows and `degree` workers
/// using the default [`MIN_BAND_ROWS`].
pub fn partition(height: usize, degree: usize) -> Result<Vec<RowRange>, Error> {
    Ok(Partition::new(height, degree)?.bands)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remainder_folds_into_last_band() {
        let bands = partition(100, 3).unwrap();
        assert_eq!(
            bands,
            vec![
                RowRange::new(0, 0, 33),
                RowRange::new(1, 33, 66),
                RowRange::new(2, 66, 100),
            ]
        );
    }

    #[test]
    fn test_single_band() {
        assert_eq!(partition(7, 1).unwrap(), vec![RowRange::new(0, 0, 7)]);
    }

    #[test]
    fn test_cover_and_disjoint() {
        for height in 3..=64 {
            for degree in 1..=height {
                let bands = split_rows(height, degree);
                assert_eq!(bands.len(), degree);
                let mut next = 0;
                for band in &bands {
                    assert_eq!(band.start, next, "h={height} d={degree}");
                    assert!(band.end >= band.start);
                    next = band.end;
                }
                assert_eq!(next, height);

                let p = Partition::new(height, degree).unwrap();
                assert_eq!(p.bands().len() + p.skipped().len(), degree);
                let covered: usize = p.bands().iter().chain(p.skipped()).map(|b| b.rows()).sum();
                assert_eq!(covered, height);
            }
        }
    }

    #[test]
    fn test_thin_bands_skipped() {
        let p = Partition::new(2, 5).unwrap();
        assert!(p.is_empty());
        assert_eq!(p.skipped().len(), 5);

        // 10 / 4 = 2 rows per band; only the last band (4 rows) survives
        let p = Partition::new(10, 4).unwrap();
        assert_eq!(p.bands(), &[RowRange::new(3, 6, 10)]);
        assert_eq!(p.skipped().len(), 3);
    }

    #[test]
    fn test_degree_above_height() {
        // every band but the last is empty, the last spans the image
        let p = Partition::new(10, 20).unwrap();
        assert_eq!(p.bands(), &[RowRange::new(19, 0, 10)]);
        assert_eq!(p.skipped().len(), 19);
    }

    #[test]
    fn test_min_rows_override() {
        let p = Partition::with_min_rows(10, 4, 1).unwrap();
        assert_eq!(p.bands().len(), 4);
        let p = Partition::with_min_rows(10, 20, 0).unwrap();
        assert_eq!(p.min_rows(), 1);
        assert_eq!(p.bands().len(), 1);
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(matches!(Partition::new(10, 0), Err(Error::InvalidDegree(0))));
        assert!(matches!(
            Partition::new(0, 2),
            Err(Error::InvalidBuffer(_))
        ));
    }

    #[test]
    fn test_seam_rows() {
        let p = Partition::new(100, 3).unwrap();
        assert_eq!(p.seam_rows(), vec![32, 33, 65, 66]);
        assert!(Partition::new(100, 1).unwrap().seam_rows().is_empty());
    }
}
