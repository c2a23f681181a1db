//! Meta mapper that applies several mappers in sequence.

use ndarray::{ArrayD, ArrayViewD};
use tracing::instrument;

use super::{Coord, Mapper, MapperBase, MapperData, MapperError};
use crate::data::Dataset;

const NAME: &str = "ChainMapper";

/// Pipeline of mappers.
///
/// `forward` runs the mappers first to last, `reverse` last to first. All
/// but the last mapper are fixed pre/post-processing steps: training,
/// output selection, output ids and neighborhoods belong to the last mapper,
/// so neighborhoods are those of the last mapper's IN space rather than the
/// chain's.
#[derive(Debug, Clone)]
pub struct ChainMapper {
    base: MapperBase,
    mappers: Vec<Box<dyn Mapper>>,
}

impl ChainMapper {
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

    fn first(&self) -> &dyn Mapper {
        self.mappers[0].as_ref()
    }

    fn last(&self) -> &dyn Mapper {
        self.mappers[self.mappers.len() - 1].as_ref()
    }

    fn last_mut(&mut self) -> &mut dyn Mapper {
        let n = self.mappers.len();
        self.mappers[n - 1].as_mut()
    }
}

impl Mapper for ChainMapper {
    fn name(&self) -> &str {
        NAME
    }

    fn base(&self) -> &MapperBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut MapperBase {
        &mut self.base
    }

    fn forward_data(&self, data: ArrayViewD<'_, f64>) -> Result<ArrayD<f64>, MapperError> {
        let mut mapped = self.first().forward_data(data)?;
        for m in &self.mappers[1..] {
            mapped = m.forward_data(mapped.view())?;
        }
        Ok(mapped)
    }

    fn reverse_data(&self, data: ArrayViewD<'_, f64>) -> Result<ArrayD<f64>, MapperError> {
        let mut mapped = self.last().reverse_data(data)?;
        for m in self.mappers[..self.mappers.len() - 1].iter().rev() {
            mapped = m.reverse_data(mapped.view())?;
        }
        Ok(mapped)
    }

    /// Each step sees the previous step's output, so dataset hooks such as
    /// feature attribute selection apply at every stage.
    #[instrument(skip_all, fields(steps = self.mappers.len()))]
    fn forward(&self, data: MapperData) -> Result<MapperData, MapperError> {
        self.mappers.iter().try_fold(data, |d, m| m.forward(d))
    }

    #[instrument(skip_all, fields(steps = self.mappers.len()))]
    fn reverse(&self, data: MapperData) -> Result<MapperData, MapperError> {
        self.mappers.iter().rev().try_fold(data, |d, m| m.reverse(d))
    }

    fn forward_dataset(&self, ds: &Dataset) -> Result<Dataset, MapperError> {
        let mut mapped = self.first().forward_dataset(ds)?;
        for m in &self.mappers[1..] {
            mapped = m.forward_dataset(&mapped)?;
        }
        Ok(mapped)
    }

    fn reverse_dataset(&self, ds: &Dataset) -> Result<Dataset, MapperError> {
        let mut mapped = self.last().reverse_dataset(ds)?;
        for m in self.mappers[..self.mappers.len() - 1].iter().rev() {
            mapped = m.reverse_dataset(&mapped)?;
        }
        Ok(mapped)
    }

    /// Trains only the last mapper, which validates its own input size.
    fn train_impl(&mut self, ds: &Dataset) -> Result<(), MapperError> {
        self.last_mut().train(ds)
    }

    fn in_size(&self) -> usize {
        self.first().in_size()
    }

    fn out_size(&self) -> usize {
        self.last().out_size()
    }

    fn select_out(&mut self, ids: &[usize]) -> Result<(), MapperError> {
        self.last_mut().select_out(ids)
    }

    fn is_valid_outid(&self, id: usize) -> bool {
        self.last().is_valid_outid(id)
    }

    /// No element-wise correspondence is tracked across the chain.
    fn map_in_ids(&self, _in_ids: &[Coord]) -> Result<Vec<usize>, MapperError> {
        Ok(Vec::new())
    }

    fn neighbor(&self, out_id: usize, radius: f64) -> Result<Box<dyn Iterator<Item = usize> + '_>, MapperError> {
        self.last().neighbor(out_id, radius)
    }
}
