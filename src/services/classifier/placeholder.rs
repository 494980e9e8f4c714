// Deterministic stand-in model used when no trained weights are shipped.
//
// Global average pool over the RGB channels feeds a fixed linear projection
// whose weights come from a seeded RNG, followed by softmax. Predictions are
// plausible but untrained; the same input always scores the same way, within
// a run and across restarts.

use ndarray::{Array1, Array2, Array4};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const WEIGHT_SEED: u64 = 42;

pub struct PlaceholderModel {
    weights: Array2<f32>,
    bias: Array1<f32>,
}

impl PlaceholderModel {
    pub fn new(classes: usize) -> Self {
        let mut rng = StdRng::seed_from_u64(WEIGHT_SEED);

        let mut weights = Vec::with_capacity(3 * classes);
        for _ in 0..3 * classes {
            weights.push(rng.gen_range(-1.0..1.0));
        }
        let mut bias = Vec::with_capacity(classes);
        for _ in 0..classes {
            bias.push(rng.gen_range(-0.1..0.1));
        }

        Self {
            // Vec order is fixed, so the projection is identical on every
            // construction with the same class count.
            weights: Array2::from_shape_vec((3, classes), weights)
                .expect("placeholder weight shape is static"),
            bias: Array1::from_vec(bias),
        }
    }

    /// Forward pass over a unit-interval NHWC tensor, returning softmax
    /// probabilities over all classes.
    pub fn infer(&self, input: &Array4<f32>) -> Vec<f32> {
        let shape = input.shape();
        let (height, width) = (shape[1], shape[2]);
        let pixels = (height * width) as f32;

        // Global average pool per channel
        let mut means = [0.0f32; 3];
        for y in 0..height {
            for x in 0..width {
                for c in 0..3 {
                    means[c] += input[[0, y, x, c]];
                }
            }
        }
        for m in &mut means {
            *m /= pixels;
        }

        let features = Array1::from_vec(means.to_vec());
        let logits = features.dot(&self.weights) + &self.bias;

        softmax(logits.as_slice().expect("logits are contiguous"))
    }
}

fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tensor(fill: f32) -> Array4<f32> {
        Array4::from_elem((1, 8, 8, 3), fill)
    }

    #[test]
    fn identical_inputs_score_identically() {
        let model = PlaceholderModel::new(66);
        let a = model.infer(&sample_tensor(0.5));
        let b = model.infer(&sample_tensor(0.5));
        assert_eq!(a, b);
    }

    #[test]
    fn reconstructed_model_scores_identically() {
        let first = PlaceholderModel::new(66).infer(&sample_tensor(0.25));
        let second = PlaceholderModel::new(66).infer(&sample_tensor(0.25));
        assert_eq!(first, second);
    }

    #[test]
    fn probabilities_sum_to_one() {
        let model = PlaceholderModel::new(12);
        let probs = model.infer(&sample_tensor(0.9));
        assert_eq!(probs.len(), 12);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(probs.iter().all(|&p| (0.0..=1.0).contains(&p)));
    }
}
