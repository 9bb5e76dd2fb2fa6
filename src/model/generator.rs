//! Layer-by-layer model corruption

use super::{LayerOrder, ModelInterface};
use crate::error::Result;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use tracing::debug;

/// Single-pass iterator of `(layer name, corrupted model)` pairs.
///
/// The RNG for layer `i` is seeded with `seed + i`, so a layer's random
/// parameters never depend on which other layers were visited. Every yielded
/// model is its own clone; the source model is only read.
pub struct RandomLayerGenerator<'a, M: ModelInterface> {
    original: &'a M,
    order: LayerOrder,
    seed: u64,
    names: Vec<String>,
    schedule: std::vec::IntoIter<usize>,
    cascade: Option<M>,
}

impl<'a, M: ModelInterface> RandomLayerGenerator<'a, M> {
    pub fn new(original: &'a M, order: LayerOrder, seed: u64) -> Self {
        let names = original.layer_names();
        let mut schedule: Vec<usize> = (0..names.len()).collect();
        if order == LayerOrder::TopDown {
            schedule.reverse();
        }

        Self {
            original,
            order,
            seed,
            names,
            schedule: schedule.into_iter(),
            cascade: None,
        }
    }

    pub fn order(&self) -> LayerOrder {
        self.order
    }

    fn corrupt(&mut self, index: usize) -> Result<(String, M)> {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.seed.wrapping_add(index as u64));
        let name = self.names[index].clone();

        let model = match self.order {
            LayerOrder::Independent => {
                let mut model = self.original.clone();
                model.randomise_layer(index, &mut rng)?;
                model
            }
            LayerOrder::TopDown => {
                let mut model = match self.cascade.take() {
                    Some(previous) => previous,
                    None => self.original.clone(),
                };
                model.randomise_layer(index, &mut rng)?;
                self.cascade = Some(model.clone());
                model
            }
        };

        debug!(layer = %name, order = %self.order, "Randomised layer");
        Ok((name, model))
    }
}

impl<'a, M: ModelInterface> Iterator for RandomLayerGenerator<'a, M> {
    type Item = Result<(String, M)>;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.schedule.next()?;
        let step = self.corrupt(index);
        if step.is_err() {
            // A failed step ends the sequence
            self.schedule = Vec::new().into_iter();
            self.cascade = None;
        }
        Some(step)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.schedule.size_hint()
    }
}

impl<'a, M: ModelInterface> ExactSizeIterator for RandomLayerGenerator<'a, M> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Activation, DenseNetwork};

    fn network() -> DenseNetwork {
        DenseNetwork::new(&[4, 3, 3, 2], Activation::Tanh, 11).unwrap()
    }

    #[test]
    fn test_step_count_matches_layers() {
        let model = network();
        for order in [LayerOrder::Independent, LayerOrder::TopDown] {
            let generator = model.random_layer_generator(order, 42);
            assert_eq!(generator.len(), model.random_layer_generator_length());
            assert_eq!(generator.count(), 3);
        }
    }

    #[test]
    fn test_independent_visits_forward_order() {
        let model = network();
        let names: Vec<String> = model
            .random_layer_generator(LayerOrder::Independent, 42)
            .map(|step| step.unwrap().0)
            .collect();
        assert_eq!(names, vec!["dense_0", "dense_1", "dense_2"]);
    }

    #[test]
    fn test_top_down_visits_output_first() {
        let model = network();
        let names: Vec<String> = model
            .random_layer_generator(LayerOrder::TopDown, 42)
            .map(|step| step.unwrap().0)
            .collect();
        assert_eq!(names, vec!["dense_2", "dense_1", "dense_0"]);
    }

    #[test]
    fn test_independent_changes_one_layer() {
        let model = network();
        for (i, step) in model.random_layer_generator(LayerOrder::Independent, 42).enumerate() {
            let (_, corrupted) = step.unwrap();
            for (j, (orig, new)) in model.layers().iter().zip(corrupted.layers()).enumerate() {
                if i == j {
                    assert_ne!(orig.weights, new.weights);
                } else {
                    assert_eq!(orig.weights, new.weights);
                    assert_eq!(orig.bias, new.bias);
                }
            }
        }
    }

    #[test]
    fn test_original_is_untouched() {
        let model = network();
        let snapshot = model.clone();
        let _: Vec<_> = model.random_layer_generator(LayerOrder::TopDown, 1).collect();
        assert_eq!(model.layers(), snapshot.layers());
    }
}
