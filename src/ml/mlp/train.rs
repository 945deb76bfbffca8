use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::model::{
    BatchNorm, DenseLayer, HiddenBlock, MODEL_VERSION, MlpModel, argmax, softmax_into,
};

const LOG_FLOOR: f32 = 1e-7;

#[derive(Debug, Clone)]
pub struct TrainOptions {
    /// Width of each hidden block, input side first.
    pub hidden_sizes: Vec<usize>,
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f32,
    /// L2 coefficient on hidden kernels (loss term `l2 * sum(w^2)`).
    pub l2_penalty: f32,
    pub dropout: f32,
    /// Fraction of rows, taken from the end, held out for early stopping.
    pub validation_split: f32,
    /// Epochs without validation improvement before stopping.
    pub patience: usize,
    /// Weight kept by batch-norm running statistics on every update.
    pub batch_norm_momentum: f32,
    pub seed: u64,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            hidden_sizes: vec![128, 64],
            epochs: 30,
            batch_size: 16,
            learning_rate: 0.001,
            l2_penalty: 0.01,
            dropout: 0.3,
            validation_split: 0.1,
            patience: 5,
            batch_norm_momentum: 0.9,
            seed: 42,
        }
    }
}

/// In-memory rows and class indices ready for fitting.
#[derive(Debug, Clone)]
pub struct TrainSet {
    pub feature_len_f32: usize,
    /// Class names; `y` values index into this list.
    pub classes: Vec<String>,
    pub x: Vec<Vec<f32>>,
    pub y: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainReport {
    pub epochs_run: usize,
    /// Epoch whose weights were kept (1-based).
    pub best_epoch: usize,
    pub stopped_early: bool,
    pub train_rows: usize,
    pub validation_rows: usize,
    pub train_loss: f32,
    pub validation_loss: Option<f32>,
    pub train_accuracy: f32,
}

/// Fit a fresh classifier to `set`.
///
/// The network is rebuilt from scratch on every call: weights are drawn from
/// the seeded RNG, so identical inputs and options give identical models.
pub fn train_mlp(set: &TrainSet, options: &TrainOptions) -> Result<(MlpModel, TrainReport), String> {
    if set.x.len() != set.y.len() {
        return Err("Mismatched X/Y lengths".to_string());
    }
    if set.x.is_empty() {
        return Err("Empty dataset".to_string());
    }
    let n_classes = set.classes.len();
    if n_classes == 0 {
        return Err("Need at least 1 class".to_string());
    }
    let d = set.feature_len_f32;
    if d == 0 {
        return Err("Feature length must be positive".to_string());
    }
    if let Some(row) = set.x.iter().position(|row| row.len() != d) {
        return Err(format!(
            "Row {row} has {} features (expected {d})",
            set.x[row].len()
        ));
    }
    if set.y.iter().any(|&y| y >= n_classes) {
        return Err("Class index out of range".to_string());
    }

    let n = set.x.len();
    let train_rows = train_row_count(n, options.validation_split);
    let step = StepParams {
        dropout: options.dropout.clamp(0.0, 0.9),
        momentum: options.batch_norm_momentum.clamp(0.0, 0.999),
        l2: options.l2_penalty.max(0.0),
    };
    let (mean, std) = feature_mean_std(&set.x[..train_rows], d);
    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut model = init_model(set, &options.hidden_sizes, mean, std, &mut rng);

    let normalized: Vec<Vec<f32>> = set.x.iter().map(|row| model.normalize(row)).collect();
    let (train_x, val_x) = normalized.split_at(train_rows);
    let (train_y, val_y) = set.y.split_at(train_rows);

    let mut adam = Adam::new(&model, options.learning_rate);
    let mut order: Vec<usize> = (0..train_rows).collect();
    let mut best: Option<BestWeights> = None;
    let mut wait = 0usize;
    let mut epochs_run = 0usize;
    let mut stopped_early = false;
    let mut train_loss = 0.0f32;

    for epoch in 1..=options.epochs {
        order.shuffle(&mut rng);
        let mut loss_sum = 0.0f32;
        for batch in order.chunks(options.batch_size.max(1)) {
            let (loss, grads) = train_batch(&mut model, train_x, train_y, batch, &step, &mut rng);
            adam.apply(&mut model, &grads);
            loss_sum += loss * batch.len() as f32;
        }
        epochs_run = epoch;
        train_loss = loss_sum / train_rows as f32;

        if val_x.is_empty() {
            tracing::debug!("epoch {epoch}: loss={train_loss:.4}");
            continue;
        }
        let val_loss = mean_loss(&model, val_x, val_y) + l2_term(&model, step.l2);
        tracing::debug!("epoch {epoch}: loss={train_loss:.4} val_loss={val_loss:.4}");
        let improved =
            val_loss.is_finite() && best.as_ref().is_none_or(|best| val_loss < best.loss);
        if improved {
            best = Some(BestWeights {
                loss: val_loss,
                epoch,
                hidden: model.hidden.clone(),
                output: model.output.clone(),
            });
            wait = 0;
        } else {
            wait += 1;
            if wait >= options.patience {
                stopped_early = true;
                break;
            }
        }
    }

    let (best_epoch, validation_loss) = match best {
        Some(best) => {
            model.hidden = best.hidden;
            model.output = best.output;
            (best.epoch, Some(best.loss))
        }
        None => (epochs_run, None),
    };

    let report = TrainReport {
        epochs_run,
        best_epoch,
        stopped_early,
        train_rows,
        validation_rows: n - train_rows,
        train_loss,
        validation_loss,
        train_accuracy: accuracy(&model, train_x, train_y),
    };
    Ok((model, report))
}

/// Rows kept for training; the remainder at the end is the validation split.
fn train_row_count(n: usize, validation_split: f32) -> usize {
    let split = validation_split.clamp(0.0, 0.9);
    let held_out = (n as f32 * split).floor() as usize;
    n.saturating_sub(held_out).max(1)
}

struct StepParams {
    dropout: f32,
    momentum: f32,
    l2: f32,
}

struct BestWeights {
    loss: f32,
    epoch: usize,
    hidden: Vec<HiddenBlock>,
    output: DenseLayer,
}

fn init_model(
    set: &TrainSet,
    hidden_sizes: &[usize],
    feature_mean: Vec<f32>,
    feature_std: Vec<f32>,
    rng: &mut StdRng,
) -> MlpModel {
    let mut hidden = Vec::with_capacity(hidden_sizes.len());
    let mut width = set.feature_len_f32;
    for &units in hidden_sizes {
        let units = units.max(1);
        hidden.push(HiddenBlock {
            dense: glorot_dense(width, units, rng),
            norm: BatchNorm::identity(units),
        });
        width = units;
    }
    MlpModel {
        model_version: MODEL_VERSION,
        feature_len_f32: set.feature_len_f32,
        classes: set.classes.clone(),
        hidden,
        output: glorot_dense(width, set.classes.len(), rng),
        feature_mean,
        feature_std,
    }
}

fn glorot_dense(inputs: usize, outputs: usize, rng: &mut StdRng) -> DenseLayer {
    let limit = (6.0 / (inputs + outputs) as f32).sqrt();
    let mut layer = DenseLayer::zeros(inputs, outputs);
    for w in &mut layer.weights {
        *w = rng.random_range(-limit..limit);
    }
    layer
}

struct BlockCache {
    input: Vec<f32>,
    pre: Vec<f32>,
    x_hat: Vec<f32>,
    inv_std: Vec<f32>,
    mask: Vec<f32>,
}

struct BlockGrads {
    weights: Vec<f32>,
    bias: Vec<f32>,
    gamma: Vec<f32>,
    beta: Vec<f32>,
}

struct Gradients {
    hidden: Vec<BlockGrads>,
    output_weights: Vec<f32>,
    output_bias: Vec<f32>,
}

/// Forward and backward pass over one mini-batch in training mode.
///
/// Updates batch-norm running statistics as a side effect and returns the
/// regularized mean cross-entropy with its gradients.
fn train_batch(
    model: &mut MlpModel,
    x: &[Vec<f32>],
    y: &[usize],
    batch: &[usize],
    step: &StepParams,
    rng: &mut StdRng,
) -> (f32, Gradients) {
    let m = batch.len();
    let mf = m as f32;
    let mut input: Vec<f32> = batch.iter().flat_map(|&i| x[i].iter().copied()).collect();
    let mut caches = Vec::with_capacity(model.hidden.len());

    for block in model.hidden.iter_mut() {
        let in_w = block.dense.inputs;
        let units = block.dense.outputs;
        let mut pre = vec![0.0f32; m * units];
        for r in 0..m {
            block
                .dense
                .forward(&input[r * in_w..(r + 1) * in_w], &mut pre[r * units..(r + 1) * units]);
        }

        let mut mean = vec![0.0f32; units];
        let mut var = vec![0.0f32; units];
        for r in 0..m {
            for j in 0..units {
                mean[j] += pre[r * units + j].max(0.0);
            }
        }
        mean.iter_mut().for_each(|v| *v /= mf);
        for r in 0..m {
            for j in 0..units {
                let diff = pre[r * units + j].max(0.0) - mean[j];
                var[j] += diff * diff;
            }
        }
        var.iter_mut().for_each(|v| *v /= mf);

        let norm = &mut block.norm;
        let inv_std: Vec<f32> = var.iter().map(|v| 1.0 / (v + norm.epsilon).sqrt()).collect();
        let keep_scale = 1.0 / (1.0 - step.dropout);
        let mut x_hat = vec![0.0f32; m * units];
        let mut mask = vec![1.0f32; m * units];
        let mut out = vec![0.0f32; m * units];
        for r in 0..m {
            for j in 0..units {
                let idx = r * units + j;
                x_hat[idx] = (pre[idx].max(0.0) - mean[j]) * inv_std[j];
                if step.dropout > 0.0 {
                    mask[idx] = if rng.random::<f32>() >= step.dropout {
                        keep_scale
                    } else {
                        0.0
                    };
                }
                out[idx] = (norm.gamma[j] * x_hat[idx] + norm.beta[j]) * mask[idx];
            }
        }
        for j in 0..units {
            norm.running_mean[j] = step.momentum * norm.running_mean[j] + (1.0 - step.momentum) * mean[j];
            norm.running_var[j] = step.momentum * norm.running_var[j] + (1.0 - step.momentum) * var[j];
        }

        caches.push(BlockCache {
            input: std::mem::replace(&mut input, out),
            pre,
            x_hat,
            inv_std,
            mask,
        });
    }

    let hidden_w = model.output.inputs;
    let classes = model.output.outputs;
    let mut d_logits = vec![0.0f32; m * classes];
    let mut logits = vec![0.0f32; classes];
    let mut loss = 0.0f32;
    for (r, &row) in batch.iter().enumerate() {
        let probs = &mut d_logits[r * classes..(r + 1) * classes];
        model
            .output
            .forward(&input[r * hidden_w..(r + 1) * hidden_w], &mut logits);
        softmax_into(&logits, probs);
        let target = y[row];
        loss -= probs[target].max(LOG_FLOOR).ln();
        probs[target] -= 1.0;
        probs.iter_mut().for_each(|g| *g /= mf);
    }
    loss = loss / mf + l2_term(model, step.l2);

    let mut output_weights = vec![0.0f32; classes * hidden_w];
    let mut output_bias = vec![0.0f32; classes];
    let mut upstream = vec![0.0f32; m * hidden_w];
    for r in 0..m {
        let row = r * hidden_w;
        for c in 0..classes {
            let g = d_logits[r * classes + c];
            output_bias[c] += g;
            let w_row = c * hidden_w;
            for h in 0..hidden_w {
                output_weights[w_row + h] += g * input[row + h];
                upstream[row + h] += g * model.output.weights[w_row + h];
            }
        }
    }

    let mut hidden_grads = Vec::with_capacity(model.hidden.len());
    for (block, cache) in model.hidden.iter().zip(caches).rev() {
        let in_w = block.dense.inputs;
        let units = block.dense.outputs;

        let mut d_gamma = vec![0.0f32; units];
        let mut d_beta = vec![0.0f32; units];
        let mut d_x_hat = vec![0.0f32; m * units];
        let mut sum_d_x_hat = vec![0.0f32; units];
        let mut sum_d_x_hat_x_hat = vec![0.0f32; units];
        for r in 0..m {
            for j in 0..units {
                let idx = r * units + j;
                let g = upstream[idx] * cache.mask[idx];
                d_beta[j] += g;
                d_gamma[j] += g * cache.x_hat[idx];
                d_x_hat[idx] = g * block.norm.gamma[j];
                sum_d_x_hat[j] += d_x_hat[idx];
                sum_d_x_hat_x_hat[j] += d_x_hat[idx] * cache.x_hat[idx];
            }
        }

        let mut d_weights: Vec<f32> = block
            .dense
            .weights
            .iter()
            .map(|w| 2.0 * step.l2 * w)
            .collect();
        let mut d_bias = vec![0.0f32; units];
        let mut d_input = vec![0.0f32; m * in_w];
        for r in 0..m {
            for j in 0..units {
                let idx = r * units + j;
                if cache.pre[idx] <= 0.0 {
                    continue;
                }
                let g = cache.inv_std[j] / mf
                    * (mf * d_x_hat[idx] - sum_d_x_hat[j] - cache.x_hat[idx] * sum_d_x_hat_x_hat[j]);
                d_bias[j] += g;
                let w_row = j * in_w;
                let in_row = r * in_w;
                for i in 0..in_w {
                    d_weights[w_row + i] += g * cache.input[in_row + i];
                    d_input[in_row + i] += g * block.dense.weights[w_row + i];
                }
            }
        }

        hidden_grads.push(BlockGrads {
            weights: d_weights,
            bias: d_bias,
            gamma: d_gamma,
            beta: d_beta,
        });
        upstream = d_input;
    }
    hidden_grads.reverse();

    (
        loss,
        Gradients {
            hidden: hidden_grads,
            output_weights,
            output_bias,
        },
    )
}

fn l2_term(model: &MlpModel, l2: f32) -> f32 {
    if l2 == 0.0 {
        return 0.0;
    }
    let sum: f32 = model
        .hidden
        .iter()
        .flat_map(|block| block.dense.weights.iter())
        .map(|w| w * w)
        .sum();
    l2 * sum
}

fn mean_loss(model: &MlpModel, x: &[Vec<f32>], y: &[usize]) -> f32 {
    let total: f32 = x
        .iter()
        .zip(y)
        .map(|(row, &target)| -model.forward_normalized(row)[target].max(LOG_FLOOR).ln())
        .sum();
    total / x.len().max(1) as f32
}

fn accuracy(model: &MlpModel, x: &[Vec<f32>], y: &[usize]) -> f32 {
    if x.is_empty() {
        return 0.0;
    }
    let correct = x
        .iter()
        .zip(y)
        .filter(|(row, target)| argmax(&model.forward_normalized(row)) == Some(**target))
        .count();
    correct as f32 / x.len() as f32
}

#[derive(Clone, Copy)]
struct AdamParams {
    learning_rate: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
}

struct Moments {
    m: Vec<f32>,
    v: Vec<f32>,
}

impl Moments {
    fn new(len: usize) -> Self {
        Self {
            m: vec![0.0; len],
            v: vec![0.0; len],
        }
    }

    fn update(&mut self, params: &mut [f32], grads: &[f32], adam: AdamParams, t: i32) {
        let correction1 = 1.0 - adam.beta1.powi(t);
        let correction2 = 1.0 - adam.beta2.powi(t);
        for i in 0..params.len() {
            let g = grads[i];
            self.m[i] = adam.beta1 * self.m[i] + (1.0 - adam.beta1) * g;
            self.v[i] = adam.beta2 * self.v[i] + (1.0 - adam.beta2) * g * g;
            let m_hat = self.m[i] / correction1;
            let v_hat = self.v[i] / correction2;
            params[i] -= adam.learning_rate * m_hat / (v_hat.sqrt() + adam.epsilon);
        }
    }
}

struct BlockMoments {
    weights: Moments,
    bias: Moments,
    gamma: Moments,
    beta: Moments,
}

/// Adam optimizer state mirroring the model's parameter tensors.
struct Adam {
    params: AdamParams,
    t: i32,
    hidden: Vec<BlockMoments>,
    output_weights: Moments,
    output_bias: Moments,
}

impl Adam {
    fn new(model: &MlpModel, learning_rate: f32) -> Self {
        Self {
            params: AdamParams {
                learning_rate,
                beta1: 0.9,
                beta2: 0.999,
                epsilon: 1e-7,
            },
            t: 0,
            hidden: model
                .hidden
                .iter()
                .map(|block| BlockMoments {
                    weights: Moments::new(block.dense.weights.len()),
                    bias: Moments::new(block.dense.bias.len()),
                    gamma: Moments::new(block.norm.gamma.len()),
                    beta: Moments::new(block.norm.beta.len()),
                })
                .collect(),
            output_weights: Moments::new(model.output.weights.len()),
            output_bias: Moments::new(model.output.bias.len()),
        }
    }

    fn apply(&mut self, model: &mut MlpModel, grads: &Gradients) {
        self.t += 1;
        let (params, t) = (self.params, self.t);
        for ((block, moments), g) in model
            .hidden
            .iter_mut()
            .zip(self.hidden.iter_mut())
            .zip(&grads.hidden)
        {
            moments.weights.update(&mut block.dense.weights, &g.weights, params, t);
            moments.bias.update(&mut block.dense.bias, &g.bias, params, t);
            moments.gamma.update(&mut block.norm.gamma, &g.gamma, params, t);
            moments.beta.update(&mut block.norm.beta, &g.beta, params, t);
        }
        self.output_weights
            .update(&mut model.output.weights, &grads.output_weights, params, t);
        self.output_bias
            .update(&mut model.output.bias, &grads.output_bias, params, t);
    }
}

fn feature_mean_std(rows: &[Vec<f32>], d: usize) -> (Vec<f32>, Vec<f32>) {
    let mut mean = vec![0.0f32; d];
    for row in rows {
        for i in 0..d {
            mean[i] += row[i];
        }
    }
    let n = rows.len().max(1) as f32;
    for v in &mut mean {
        *v /= n;
    }

    let mut std = vec![0.0f32; d];
    for row in rows {
        for i in 0..d {
            let diff = row[i] - mean[i];
            std[i] += diff * diff;
        }
    }
    for v in &mut std {
        *v = (*v / n).sqrt();
    }
    (mean, std)
}
