//! Meta mapper that stacks several mappers side by side.

use ndarray::{concatenate, Array2, ArrayD, ArrayViewD, Axis, Ix1, Slice};
use tracing::{debug, instrument};

use super::{into_matrix, Mapper, MapperBase, MapperData, MapperError};
use crate::data::{Dataset, DatasetError};

const NAME: &str = "CombinedMapper";

/// Maps several IN spaces into one common OUT space.
///
/// `forward` takes a [`MapperData::Sequence`] with one block per embedded
/// mapper and stacks the mapped blocks feature-wise. `reverse` splits an
/// array (or a dataset's samples) into per-mapper feature blocks by each
/// mapper's `out_size` and returns the reverse-mapped blocks as a sequence.
///
/// Embedded mappers produce `[n_samples, n_features]` output, or a 1-D
/// vector for a single sample. When every block is a single sample the
/// stacked result is a 1-D vector too, matching what `reverse` accepts.
#[derive(Debug, Clone)]
pub struct CombinedMapper {
    base: MapperBase,
    mappers: Vec<Box<dyn Mapper>>,
}

impl CombinedMapper {
    /// Combine `mappers`; their order fixes the order of the input blocks.
    pub fn new(mappers: Vec<Box<dyn Mapper>>) -> Result<Self, MapperError> {
        if mappers.is_empty() {
            return Err(MapperError::NoMappers { mapper: NAME });
        }
        Ok(Self {
            base: MapperBase::default(),
            mappers,
        })
    }

    pub fn mappers(&self) -> &[Box<dyn Mapper>] {
        &self.mappers
    }

    pub fn mappers_mut(&mut self) -> &mut [Box<dyn Mapper>] {
        &mut self.mappers
    }

    /// Half-open OUT feature range of each embedded mapper.
    fn blocks(&self) -> Vec<(usize, usize)> {
        let mut start = 0;
        self.mappers
            .iter()
            .map(|m| {
                let end = start + m.out_size();
                let block = (start, end);
                start = end;
                block
            })
            .collect()
    }

    /// Embedded mapper owning `out_id`, with the id local to it and the
    /// offset of its block.
    fn owner(&self, out_id: usize) -> Option<(&dyn Mapper, usize, usize)> {
        self.blocks()
            .into_iter()
            .zip(&self.mappers)
            .find(|((start, end), _)| (*start..*end).contains(&out_id))
            .map(|((start, _), m)| (m.as_ref(), out_id - start, start))
    }

    fn split(&self, data: ArrayViewD<'_, f64>) -> Result<Vec<MapperData>, MapperError> {
        let axis = match data.ndim() {
            1 | 2 => Axis(data.ndim() - 1),
            ndim => {
                return Err(MapperError::UnsupportedRank {
                    mapper: NAME.to_string(),
                    ndim,
                    supported: "1 or 2".to_string(),
                })
            }
        };
        let nfeatures = data.len_of(axis);
        if nfeatures != self.out_size() {
            return Err(MapperError::ShapeMismatch {
                mapper: NAME.to_string(),
                expected: vec![self.out_size()],
                got: vec![nfeatures],
            });
        }
        self.blocks()
            .into_iter()
            .zip(&self.mappers)
            .map(|((start, end), m)| {
                let block = data.slice_axis(axis, Slice::from(start..end)).to_owned();
                m.reverse(MapperData::Array(block))
            })
            .collect()
    }
}

/// Mapped block as `[n_samples, n_features]`, and whether it was a single
/// 1-D sample. A 1-D block is one sample, so it becomes a `1 x k` row.
fn block_matrix(data: MapperData) -> Result<(Array2<f64>, bool), MapperError> {
    match data {
        MapperData::Array(a) if a.ndim() == 1 => {
            let row = a.into_dimensionality::<Ix1>().map_err(DatasetError::from)?;
            Ok((row.insert_axis(Axis(0)), true))
        }
        MapperData::Array(a) => Ok((into_matrix(NAME, a)?, false)),
        MapperData::Dataset(ds) => Ok((ds.samples().to_array(), false)),
        MapperData::Sequence(_) => Err(MapperError::UnsupportedInput {
            mapper: NAME.to_string(),
            kind: "nested sequence",
        }),
    }
}

impl Mapper for CombinedMapper {
    fn name(&self) -> &str {
        NAME
    }

    fn base(&self) -> &MapperBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut MapperBase {
        &mut self.base
    }

    /// A single array cannot be split into IN spaces; use a sequence.
    fn forward_data(&self, _data: ArrayViewD<'_, f64>) -> Result<ArrayD<f64>, MapperError> {
        Err(MapperError::UnsupportedInput {
            mapper: NAME.to_string(),
            kind: "array (expects one block per embedded mapper)",
        })
    }

    /// Reverse mapping yields a sequence; see [`Mapper::reverse`].
    fn reverse_data(&self, _data: ArrayViewD<'_, f64>) -> Result<ArrayD<f64>, MapperError> {
        Err(MapperError::UnsupportedInput {
            mapper: NAME.to_string(),
            kind: "array (reverse yields one block per embedded mapper)",
        })
    }

    fn forward_dataset(&self, _ds: &Dataset) -> Result<Dataset, MapperError> {
        Err(MapperError::UnsupportedInput {
            mapper: NAME.to_string(),
            kind: "dataset (expects one block per embedded mapper)",
        })
    }

    #[instrument(skip_all, fields(blocks = seq.len()))]
    fn forward_sequence(&self, seq: Vec<MapperData>) -> Result<MapperData, MapperError> {
        if seq.len() != self.mappers.len() {
            return Err(MapperError::SequenceLength {
                mapper: NAME.to_string(),
                expected: self.mappers.len(),
                got: seq.len(),
            });
        }
        let blocks = seq
            .into_iter()
            .zip(&self.mappers)
            .map(|(d, m)| m.forward(d).and_then(block_matrix))
            .collect::<Result<Vec<_>, _>>()?;
        let single = blocks.iter().all(|(_, one)| *one);
        let blocks: Vec<Array2<f64>> = blocks.into_iter().map(|(b, _)| b).collect();

        let nsamples = blocks[0].nrows();
        if let Some(bad) = blocks.iter().find(|b| b.nrows() != nsamples) {
            return Err(MapperError::SampleCountMismatch {
                mapper: NAME.to_string(),
                expected: nsamples,
                got: bad.nrows(),
            });
        }
        let views: Vec<_> = blocks.iter().map(|b| b.view()).collect();
        let stacked = concatenate(Axis(1), &views).map_err(DatasetError::from)?;
        debug!(shape = ?stacked.dim(), single, "stacked embedded mapper output");
        if single {
            Ok(MapperData::Array(stacked.index_axis_move(Axis(0), 0).into_dyn()))
        } else {
            Ok(MapperData::Array(stacked.into_dyn()))
        }
    }

    /// Splits OUT features into per-mapper blocks and reverse-maps each.
    ///
    /// Arrays split into arrays; a dataset splits into feature subsets of
    /// itself, each reverse-mapped as a dataset.
    fn reverse(&self, data: MapperData) -> Result<MapperData, MapperError> {
        match data {
            MapperData::Array(a) => self.split(a.view()).map(MapperData::Sequence),
            MapperData::Dataset(ds) => {
                if ds.nfeatures() != self.out_size() {
                    return Err(MapperError::ShapeMismatch {
                        mapper: NAME.to_string(),
                        expected: vec![self.out_size()],
                        got: vec![ds.nfeatures()],
                    });
                }
                self.blocks()
                    .into_iter()
                    .zip(&self.mappers)
                    .map(|((start, end), m)| {
                        let part = ds.select_features(start..end)?;
                        m.reverse(MapperData::Dataset(part))
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(MapperData::Sequence)
            }
            MapperData::Sequence(seq) => self.reverse_sequence(seq),
        }
    }

    /// Trains each embedded mapper on its block of features.
    #[instrument(skip_all, fields(n_mappers = self.mappers.len()))]
    fn train_impl(&mut self, ds: &Dataset) -> Result<(), MapperError> {
        if ds.nfeatures() != self.out_size() {
            return Err(MapperError::TrainingFeatureMismatch {
                mapper: NAME.to_string(),
                expected: self.out_size(),
                got: ds.nfeatures(),
            });
        }
        let blocks = self.blocks();
        for ((start, end), m) in blocks.into_iter().zip(self.mappers.iter_mut()) {
            let part = ds.select_features(start..end)?;
            m.train(&part)?;
        }
        Ok(())
    }

    fn in_size(&self) -> usize {
        self.mappers.iter().map(|m| m.in_size()).sum()
    }

    fn out_size(&self) -> usize {
        self.mappers.iter().map(|m| m.out_size()).sum()
    }

    /// Each embedded mapper receives the ids falling in its block, rebased
    /// to its own numbering and in the requested order. Mappers without a
    /// selected id receive an empty selection.
    fn select_out(&mut self, ids: &[usize]) -> Result<(), MapperError> {
        let total = self.out_size();
        if let Some(&bad) = ids.iter().find(|&&id| id >= total) {
            return Err(MapperError::InvalidOutId {
                mapper: NAME.to_string(),
                id: bad,
            });
        }
        let blocks = self.blocks();
        for ((start, end), m) in blocks.into_iter().zip(self.mappers.iter_mut()) {
            let local: Vec<usize> = ids
                .iter()
                .filter(|&&id| (start..end).contains(&id))
                .map(|&id| id - start)
                .collect();
            m.select_out(&local)?;
        }
        Ok(())
    }

    /// Neighbors come from the embedded mapper owning `out_id`, shifted into
    /// the combined OUT numbering.
    fn neighbor(&self, out_id: usize, radius: f64) -> Result<Box<dyn Iterator<Item = usize> + '_>, MapperError> {
        let (m, local, offset) = self.owner(out_id).ok_or_else(|| MapperError::InvalidOutId {
            mapper: NAME.to_string(),
            id: out_id,
        })?;
        Ok(Box::new(m.neighbor(local, radius)?.map(move |id| id + offset)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::{FixedProjection, GridMetric, MaskMapper, ProjectionConfig, ProjectionMapper};
    use ndarray::{array, Array1, Array2};
    use std::sync::Arc;

    fn mask(n: usize) -> Box<dyn Mapper> {
        Box::new(MaskMapper::new(Array1::<f64>::ones(n)).unwrap())
    }

    fn combined() -> CombinedMapper {
        CombinedMapper::new(vec![mask(2), mask(3)]).unwrap()
    }

    #[test]
    fn empty_is_rejected() {
        assert!(matches!(CombinedMapper::new(vec![]), Err(MapperError::NoMappers { .. })));
    }

    #[test]
    fn sizes_are_sums() {
        let m = combined();
        assert_eq!(m.in_size(), 5);
        assert_eq!(m.out_size(), 5);
    }

    #[test]
    fn forward_stacks_blocks() {
        let m = combined();
        let seq = vec![array![[1.0, 2.0]].into(), array![[3.0, 4.0, 5.0]].into()];
        let out = m.forward(MapperData::Sequence(seq)).unwrap().into_array().unwrap();
        assert_eq!(out, array![[1.0, 2.0, 3.0, 4.0, 5.0]].into_dyn());
    }

    #[test]
    fn single_samples_stack_into_one_vector() {
        let m = combined();
        let seq = vec![array![1.0, 2.0].into(), array![3.0, 4.0, 5.0].into()];
        let out = m.forward(MapperData::Sequence(seq)).unwrap().into_array().unwrap();
        assert_eq!(out, array![1.0, 2.0, 3.0, 4.0, 5.0].into_dyn());

        let same = CombinedMapper::new(vec![mask(3), mask(3)]).unwrap();
        let seq = vec![array![1.0, 2.0, 3.0].into(), array![4.0, 5.0, 6.0].into()];
        let out = same.forward(MapperData::Sequence(seq)).unwrap().into_array().unwrap();
        assert_eq!(out, array![1.0, 2.0, 3.0, 4.0, 5.0, 6.0].into_dyn());
    }

    #[test]
    fn single_sample_round_trip() {
        let m = CombinedMapper::new(vec![
            mask(2),
            Box::new(MaskMapper::new(array![1.0, 0.0, 1.0]).unwrap()),
        ])
        .unwrap();
        let seq = vec![array![1.0, 2.0].into(), array![3.0, 4.0, 5.0].into()];
        let out = m.forward(MapperData::Sequence(seq)).unwrap();
        assert_eq!(out.as_array().unwrap(), &array![1.0, 2.0, 3.0, 5.0].into_dyn());

        let parts = m.reverse(out).unwrap().into_sequence().unwrap();
        assert_eq!(parts[0].as_array().unwrap(), &array![1.0, 2.0].into_dyn());
        assert_eq!(parts[1].as_array().unwrap(), &array![3.0, 0.0, 5.0].into_dyn());
    }

    #[test]
    fn single_sample_mixed_with_matrix_is_one_row() {
        let m = combined();
        let seq = vec![array![1.0, 2.0].into(), array![[3.0, 4.0, 5.0]].into()];
        let out = m.forward(MapperData::Sequence(seq)).unwrap().into_array().unwrap();
        assert_eq!(out, array![[1.0, 2.0, 3.0, 4.0, 5.0]].into_dyn());

        let seq = vec![array![1.0, 2.0].into(), Array2::<f64>::zeros((2, 3)).into()];
        assert!(matches!(
            m.forward(MapperData::Sequence(seq)),
            Err(MapperError::SampleCountMismatch { expected: 1, got: 2, .. })
        ));
    }

    #[test]
    fn forward_checks_sequence_and_samples() {
        let m = combined();
        let err = m.forward(MapperData::Sequence(vec![array![[1.0, 2.0]].into()])).unwrap_err();
        assert!(matches!(err, MapperError::SequenceLength { expected: 2, got: 1, .. }));

        let seq = vec![array![[1.0, 2.0]].into(), Array2::<f64>::zeros((2, 3)).into()];
        let err = m.forward(MapperData::Sequence(seq)).unwrap_err();
        assert!(matches!(err, MapperError::SampleCountMismatch { expected: 1, got: 2, .. }));

        assert!(matches!(
            m.forward(array![[1.0]].into()),
            Err(MapperError::UnsupportedInput { .. })
        ));
    }

    #[test]
    fn reverse_splits_blocks() {
        let m = combined();
        let parts = m
            .reverse(array![[1.0, 2.0, 3.0, 4.0, 5.0]].into())
            .unwrap()
            .into_sequence()
            .unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].as_array().unwrap(), &array![[1.0, 2.0]].into_dyn());
        assert_eq!(parts[1].as_array().unwrap(), &array![[3.0, 4.0, 5.0]].into_dyn());

        assert!(matches!(
            m.reverse(array![[1.0, 2.0]].into()),
            Err(MapperError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn train_splits_features() {
        let proj = |n| -> Box<dyn Mapper> {
            Box::new(ProjectionMapper::new(
                FixedProjection::new(Array2::eye(n)),
                ProjectionConfig::default(),
            ))
        };
        let mut m = CombinedMapper::new(vec![proj(1), proj(2)]).unwrap();
        // Untrained projections have no size yet.
        assert!(matches!(
            m.train(&Dataset::new(Array2::zeros((2, 3)))),
            Err(MapperError::TrainingFeatureMismatch { expected: 0, got: 3, .. })
        ));
    }

    #[test]
    fn select_out_rebases_ids() {
        let mut m = combined();
        m.select_out(&[0, 2, 4]).unwrap();
        assert_eq!(m.out_size(), 3);
        assert_eq!(m.mappers()[0].out_size(), 1);
        assert_eq!(m.mappers()[1].out_size(), 2);
        assert!(matches!(m.select_out(&[7]), Err(MapperError::InvalidOutId { id: 7, .. })));
    }

    #[test]
    fn neighbors_are_shifted_into_combined_ids() {
        let metric = Arc::new(GridMetric::new(vec![1.0]));
        let second = MaskMapper::new(Array1::<f64>::ones(3)).unwrap().with_metric(metric);
        let m = CombinedMapper::new(vec![mask(2), Box::new(second)]).unwrap();

        assert_eq!(m.neighbors(3, 1.0).unwrap(), vec![2, 3, 4]);
        assert!(matches!(m.neighbors(0, 1.0), Err(MapperError::NoMetric { .. })));
        assert!(matches!(m.neighbors(9, 1.0), Err(MapperError::InvalidOutId { .. })));
    }
}
