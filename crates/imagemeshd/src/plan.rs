//! Partition planning: how one request becomes independent work units.
//!
//! A single image is split into contiguous row bands, one per worker. Several
//! images are sent whole, round-robin across at most one worker per image.
//! Plans are pure functions of the image shapes and the worker count, so
//! resubmitting the same request always produces the same boundaries.

use std::ops::Range;

use thiserror::Error;

use imagemesh_wire::Image;

/// Errors raised before any unit is dispatched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub(crate) enum PlanError {
    #[error("no workers are configured; at least one worker endpoint is required")]
    NoWorkers,
    #[error("request contains no images")]
    NoImages,
    #[error("image has no rows to partition")]
    EmptyImage,
}

/// Shape of the response a plan reassembles into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PlanMode {
    /// One image split by rows; reassembled into one image.
    RowChunks { source_rows: usize, source_cols: usize },
    /// One unit per submitted image; returned in submission order.
    MultiImage { count: usize },
}

/// One piece of dispatched work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct WorkUnit {
    position: usize,
    rank: usize,
    rows: Range<usize>,
    image: Image,
}

impl WorkUnit {
    /// Token restoring output order: chunk index or image index.
    pub(crate) const fn position(&self) -> usize {
        self.position
    }

    /// Destination worker identity, starting at 1.
    pub(crate) const fn rank(&self) -> usize {
        self.rank
    }

    /// Rows of the source image covered by this unit.
    pub(crate) fn rows(&self) -> Range<usize> {
        self.rows.clone()
    }

    pub(crate) fn image(&self) -> &Image {
        &self.image
    }
}

/// Work units for one session plus the shape to rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PartitionPlan {
    mode: PlanMode,
    workers_used: usize,
    units: Vec<WorkUnit>,
}

impl PartitionPlan {
    /// Partitions `images` across `workers` worker identities.
    pub(crate) fn build(images: Vec<Image>, workers: usize) -> Result<Self, PlanError> {
        if workers == 0 {
            return Err(PlanError::NoWorkers);
        }
        match images.len() {
            0 => Err(PlanError::NoImages),
            1 => images
                .into_iter()
                .next()
                .ok_or(PlanError::NoImages)
                .and_then(|image| Self::row_chunks(&image, workers)),
            _ => Ok(Self::multi_image(images, workers)),
        }
    }

    fn row_chunks(image: &Image, workers: usize) -> Result<Self, PlanError> {
        let units = chunk_ranges(image.rows(), workers)
            .into_iter()
            .enumerate()
            .map(|(position, rows)| {
                image
                    .row_band(rows.clone())
                    .map(|band| WorkUnit {
                        position,
                        rank: position + 1,
                        rows,
                        image: band,
                    })
                    .ok_or(PlanError::EmptyImage)
            })
            .collect::<Result<Vec<_>, _>>()?;
        if units.is_empty() {
            return Err(PlanError::EmptyImage);
        }
        Ok(Self {
            mode: PlanMode::RowChunks {
                source_rows: image.rows(),
                source_cols: image.cols(),
            },
            workers_used: units.len(),
            units,
        })
    }

    fn multi_image(images: Vec<Image>, workers: usize) -> Self {
        let count = images.len();
        let workers_used = count.min(workers);
        let units = images
            .into_iter()
            .enumerate()
            .map(|(position, image)| WorkUnit {
                position,
                rank: 1 + position.checked_rem(workers_used).unwrap_or(0),
                rows: 0..image.rows(),
                image,
            })
            .collect();
        Self {
            mode: PlanMode::MultiImage { count },
            workers_used,
            units,
        }
    }

    pub(crate) const fn mode(&self) -> PlanMode {
        self.mode
    }

    /// Number of distinct worker identities the plan addresses.
    pub(crate) const fn workers_used(&self) -> usize {
        self.workers_used
    }

    pub(crate) fn units(&self) -> &[WorkUnit] {
        &self.units
    }

    /// Groups units so no worker appears twice in one group.
    ///
    /// Round-robin assignment makes every run of `workers_used` consecutive
    /// units address distinct workers.
    pub(crate) fn waves(&self) -> impl Iterator<Item = &[WorkUnit]> {
        self.units.chunks(self.workers_used.max(1))
    }
}

/// Row ranges for splitting `rows` across `workers`.
///
/// Every range holds `ceil(rows / workers)` rows except the last, which takes
/// the remainder. Ranges stop at the final row, so fewer than `workers`
/// ranges come back when there are not enough rows to go round.
pub(crate) fn chunk_ranges(rows: usize, workers: usize) -> Vec<Range<usize>> {
    if rows == 0 || workers == 0 {
        return Vec::new();
    }
    let chunk = rows.div_ceil(workers);
    (0..workers)
        .map(|index| index * chunk)
        .take_while(|start| *start < rows)
        .map(|start| start..(start + chunk).min(rows))
        .collect()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn image(rows: usize, cols: usize) -> Image {
        let pixels = (0..rows * cols * 3)
            .map(|value| u8::try_from(value & 0xff).unwrap_or_default())
            .collect();
        Image::new(rows, cols, pixels).expect("valid image")
    }

    fn sizes(ranges: &[Range<usize>]) -> Vec<usize> {
        ranges.iter().map(ExactSizeIterator::len).collect()
    }

    #[rstest]
    #[case(100, 4, vec![25, 25, 25, 25])]
    #[case(102, 4, vec![26, 26, 26, 24])]
    #[case(7, 1, vec![7])]
    #[case(3, 4, vec![1, 1, 1])]
    #[case(5, 4, vec![2, 2, 1])]
    #[case(9, 3, vec![3, 3, 3])]
    fn chunk_sizes_follow_ceiling_split(
        #[case] rows: usize,
        #[case] workers: usize,
        #[case] expected: Vec<usize>,
    ) {
        assert_eq!(sizes(&chunk_ranges(rows, workers)), expected);
    }

    #[rstest]
    #[case(1, 1)]
    #[case(17, 5)]
    #[case(1000, 7)]
    #[case(2, 9)]
    fn chunks_cover_every_row_once_in_order(#[case] rows: usize, #[case] workers: usize) {
        let ranges = chunk_ranges(rows, workers);
        assert!(ranges.len() <= workers);
        assert_eq!(ranges.first().map(|range| range.start), Some(0));
        assert_eq!(ranges.last().map(|range| range.end), Some(rows));
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        assert!(ranges.iter().all(|range| !range.is_empty()));
        assert_eq!(sizes(&ranges).iter().sum::<usize>(), rows);
    }

    #[test]
    fn planning_is_deterministic() {
        let first = PartitionPlan::build(vec![image(102, 3)], 4).expect("plan");
        let second = PartitionPlan::build(vec![image(102, 3)], 4).expect("plan");
        assert_eq!(first, second);
    }

    #[test]
    fn single_image_units_carry_their_rows() {
        let source = image(10, 2);
        let plan = PartitionPlan::build(vec![source.clone()], 3).expect("plan");
        assert_eq!(
            plan.mode(),
            PlanMode::RowChunks {
                source_rows: 10,
                source_cols: 2
            }
        );
        let ranks: Vec<_> = plan.units().iter().map(WorkUnit::rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
        for unit in plan.units() {
            assert_eq!(
                unit.image(),
                &source.row_band(unit.rows()).expect("band in range")
            );
        }
        assert_eq!(plan.waves().count(), 1);
    }

    #[test]
    fn multiple_images_round_robin_across_workers() {
        let plan =
            PartitionPlan::build(vec![image(2, 2), image(3, 3), image(4, 4)], 2).expect("plan");
        let ranks: Vec<_> = plan.units().iter().map(WorkUnit::rank).collect();
        assert_eq!(ranks, vec![1, 2, 1]);
        assert_eq!(plan.mode(), PlanMode::MultiImage { count: 3 });
        assert_eq!(plan.workers_used(), 2);
    }

    #[test]
    fn waves_never_address_a_worker_twice() {
        let images = (1..=7).map(|rows| image(rows, 2)).collect();
        let plan = PartitionPlan::build(images, 3).expect("plan");
        let waves: Vec<Vec<usize>> = plan
            .waves()
            .map(|wave| wave.iter().map(WorkUnit::rank).collect())
            .collect();
        assert_eq!(waves, vec![vec![1, 2, 3], vec![1, 2, 3], vec![1]]);
    }

    #[test]
    fn fewer_images_than_workers_use_only_what_they_need() {
        let plan = PartitionPlan::build(vec![image(1, 1), image(1, 1)], 8).expect("plan");
        assert_eq!(plan.workers_used(), 2);
    }

    #[rstest]
    #[case(Vec::new(), 2, PlanError::NoImages)]
    #[case(vec![image(4, 4)], 0, PlanError::NoWorkers)]
    fn invalid_requests_are_not_planned(
        #[case] images: Vec<Image>,
        #[case] workers: usize,
        #[case] expected: PlanError,
    ) {
        assert_eq!(PartitionPlan::build(images, workers), Err(expected));
    }
}
