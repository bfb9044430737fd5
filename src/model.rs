use crate::error::{CloudMaskError, Result};
use log::{debug, info};
use ndarray::Array2;
use rayon::prelude::*;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable naming the model file when `--model` is not given.
pub const MODEL_ENV_VAR: &str = "S2_CLOUD_DETECTOR_MODEL";

/// A gradient-boosted tree ensemble loaded from a LightGBM text dump.
///
/// Only what the pixel cloud detector needs is supported: a binary-objective
/// model with numerical splits. Categorical splits and multiclass models are
/// rejected at load time.
#[derive(Debug)]
pub struct Model {
    trees: Vec<Tree>,
    sigmoid: f64,
    num_features: usize,
}

#[derive(Debug)]
struct Tree {
    split_feature: Vec<usize>,
    threshold: Vec<f64>,
    left_child: Vec<i32>,
    right_child: Vec<i32>,
    leaf_value: Vec<f64>,
}

/// Resolves the model path from the CLI flag or the environment.
pub fn resolve_model_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    match env::var_os(MODEL_ENV_VAR) {
        Some(path) => Ok(PathBuf::from(path)),
        None => Err(CloudMaskError::ModelNotConfigured),
    }
}

impl Model {
    pub fn from_path(path: &Path) -> Result<Model> {
        info!("Loading cloud detector model: {}", path.display());
        let text = std::fs::read_to_string(path)?;
        let model = Model::from_text(&text)
            .map_err(|e| match e {
                CloudMaskError::InvalidModel(reason) => {
                    CloudMaskError::InvalidModel(format!("{}: {}", path.display(), reason))
                }
                other => other,
            })?;
        debug!(
            "Model: {} trees over {} features",
            model.trees.len(),
            model.num_features
        );
        Ok(model)
    }

    /// Parses the LightGBM text dump format: a key=value header followed by
    /// `Tree=N` blocks, terminated by `end of trees`.
    pub fn from_text(text: &str) -> Result<Model> {
        let mut sigmoid = 1.0;
        let mut num_class = 1usize;
        let mut max_feature_idx: Option<usize> = None;
        let mut objective_is_binary = false;

        let mut lines = text.lines().peekable();

        // Header runs until the first tree block
        while let Some(&line) = lines.peek() {
            if line.starts_with("Tree=") {
                break;
            }
            lines.next();
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            match key {
                "num_class" => num_class = parse_scalar(key, value)?,
                "max_feature_idx" => max_feature_idx = Some(parse_scalar(key, value)?),
                "objective" => {
                    objective_is_binary = value.starts_with("binary");
                    if let Some(param) = value.split("sigmoid:").nth(1) {
                        sigmoid = parse_scalar("sigmoid", param.trim())?;
                    }
                }
                _ => {}
            }
        }

        if num_class != 1 {
            return Err(invalid(format!(
                "multiclass model (num_class={num_class}), expected a binary cloud detector"
            )));
        }
        if !objective_is_binary {
            return Err(invalid("objective is not binary".to_string()));
        }
        let max_feature_idx =
            max_feature_idx.ok_or_else(|| invalid("missing max_feature_idx".to_string()))?;

        let mut trees = Vec::new();
        while let Some(line) = lines.next() {
            if line == "end of trees" {
                break;
            }
            if !line.starts_with("Tree=") {
                continue;
            }
            trees.push(parse_tree(&mut lines, max_feature_idx)?);
        }

        if trees.is_empty() {
            return Err(invalid("no trees".to_string()));
        }

        Ok(Model {
            trees,
            sigmoid,
            num_features: max_feature_idx + 1,
        })
    }

    pub fn num_features(&self) -> usize {
        self.num_features
    }

    /// Raw ensemble score for one feature row (before the sigmoid).
    fn score(&self, features: &[f32]) -> f64 {
        self.trees.iter().map(|t| t.predict(features)).sum()
    }

    /// Cloud probability for one feature row.
    pub fn predict_row(&self, features: &[f32]) -> f32 {
        let score = self.score(features);
        (1.0 / (1.0 + (-self.sigmoid * score).exp())) as f32
    }

    /// Cloud probabilities for a `(pixels, features)` matrix, reshaped onto
    /// the given raster shape.
    pub fn predict(&self, features: &Array2<f32>, shape: (usize, usize)) -> Result<Array2<f32>> {
        let (pixels, width) = features.dim();
        if width != self.num_features {
            return Err(invalid(format!(
                "model expects {} features, feature matrix has {}",
                self.num_features, width
            )));
        }

        info!(
            "Classifying {} pixels with {} trees",
            pixels,
            self.trees.len()
        );

        // Rows are independent, classify them in parallel
        let probabilities: Vec<f32> = (0..pixels)
            .into_par_iter()
            .map(|i| {
                let row = features.row(i);
                let row_slice = row.as_slice().expect("row must be contiguous");
                self.predict_row(row_slice)
            })
            .collect();

        Ok(Array2::from_shape_vec(shape, probabilities)?)
    }
}

impl Tree {
    fn predict(&self, features: &[f32]) -> f64 {
        // Single-leaf trees carry no split arrays
        if self.left_child.is_empty() {
            return self.leaf_value[0];
        }

        let mut node = 0i32;
        loop {
            let idx = node as usize;
            let value = f64::from(features[self.split_feature[idx]]);
            node = if value <= self.threshold[idx] {
                self.left_child[idx]
            } else {
                self.right_child[idx]
            };
            if node < 0 {
                // Negative child encodes the leaf as ~index
                return self.leaf_value[!node as usize];
            }
        }
    }
}

fn invalid(reason: String) -> CloudMaskError {
    CloudMaskError::InvalidModel(reason)
}

fn parse_scalar<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse::<T>()
        .map_err(|_| invalid(format!("malformed value for {key}: {value}")))
}

fn parse_list<T: FromStr>(key: &str, value: &str) -> Result<Vec<T>> {
    value
        .split_whitespace()
        .map(|v| parse_scalar(key, v))
        .collect()
}

fn parse_tree<'a, I>(lines: &mut std::iter::Peekable<I>, max_feature_idx: usize) -> Result<Tree>
where
    I: Iterator<Item = &'a str>,
{
    let mut num_leaves = 0usize;
    let mut split_feature: Vec<usize> = Vec::new();
    let mut threshold: Vec<f64> = Vec::new();
    let mut decision_type: Vec<u32> = Vec::new();
    let mut left_child: Vec<i32> = Vec::new();
    let mut right_child: Vec<i32> = Vec::new();
    let mut leaf_value: Vec<f64> = Vec::new();

    // A tree block ends at the blank line before the next block
    for line in lines.by_ref() {
        if line.trim().is_empty() {
            break;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        match key {
            "num_leaves" => num_leaves = parse_scalar(key, value)?,
            "split_feature" => split_feature = parse_list(key, value)?,
            "threshold" => threshold = parse_list(key, value)?,
            "decision_type" => decision_type = parse_list(key, value)?,
            "left_child" => left_child = parse_list(key, value)?,
            "right_child" => right_child = parse_list(key, value)?,
            "leaf_value" => leaf_value = parse_list(key, value)?,
            _ => {}
        }
    }

    if num_leaves == 0 || leaf_value.len() != num_leaves {
        return Err(invalid(format!(
            "tree with {} leaf values, num_leaves={}",
            leaf_value.len(),
            num_leaves
        )));
    }

    let splits = num_leaves - 1;
    if split_feature.len() != splits
        || threshold.len() != splits
        || left_child.len() != splits
        || right_child.len() != splits
    {
        return Err(invalid(format!(
            "tree split arrays do not match num_leaves={num_leaves}"
        )));
    }

    if let Some(feature) = split_feature.iter().find(|&&f| f > max_feature_idx) {
        return Err(invalid(format!(
            "split on feature {feature}, max_feature_idx is {max_feature_idx}"
        )));
    }

    // Bit 0 of decision_type marks a categorical split
    if decision_type.iter().any(|dt| dt & 1 != 0) {
        return Err(invalid("categorical splits are not supported".to_string()));
    }

    // Child indices must stay inside the tree: negative children encode
    // leaves as ~index, non-negative children name internal nodes
    for &child in left_child.iter().chain(right_child.iter()) {
        if child < 0 {
            if !child as usize >= num_leaves {
                return Err(invalid(format!(
                    "leaf index {} out of range, tree has {} leaves",
                    !child, num_leaves
                )));
            }
        } else if child as usize >= splits {
            return Err(invalid(format!(
                "node index {child} out of range, tree has {splits} internal nodes"
            )));
        }
    }

    // Walk the tree once; a revisited node means the child graph has a cycle
    // and prediction would never terminate
    let mut seen = vec![false; splits];
    let mut pending = if splits > 0 { vec![0i32] } else { Vec::new() };
    while let Some(node) = pending.pop() {
        if node < 0 {
            continue;
        }
        let idx = node as usize;
        if seen[idx] {
            return Err(invalid("cyclic tree structure".to_string()));
        }
        seen[idx] = true;
        pending.push(left_child[idx]);
        pending.push(right_child[idx]);
    }

    Ok(Tree {
        split_feature,
        threshold,
        left_child,
        right_child,
        leaf_value,
    })
}
