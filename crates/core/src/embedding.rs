//! Embedding Matcher (spec §4.10), feature-gated `semantic`.
//!
//! Adapted from `server/src/semantic.rs`'s model resolution, device selection, and
//! mean-pooling encode path, retargeted from file-chunk embeddings to per-identifier
//! embeddings. Embeddings are cached on disk keyed by identifier hash + model id.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use hf_hub::{api::sync::Api, Repo, RepoType};
use sha2::{Digest, Sha256};
use tokenizers::Tokenizer;
use tracing::{info, warn};

use crate::types::Identifier;

/// Resolved embedding model parameters, mirroring the teacher's preset resolution.
pub struct ModelConfig {
    pub model_id: String,
    pub dim: usize,
}

pub fn resolve_model(name: Option<&str>) -> ModelConfig {
    match name {
        None | Some("minilm") => {
            ModelConfig { model_id: "sentence-transformers/all-MiniLM-L6-v2".into(), dim: 384 }
        }
        Some("codebert") => ModelConfig { model_id: "microsoft/codebert-base".into(), dim: 768 },
        Some(custom) => ModelConfig { model_id: custom.to_string(), dim: 768 },
    }
}

fn select_device() -> Device {
    #[cfg(feature = "cuda")]
    {
        if let Ok(dev) = Device::new_cuda(0) {
            return dev;
        }
    }
    Device::Cpu
}

fn cache_key(identifier: &str, model_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(identifier.as_bytes());
    hasher.update(b"::");
    hasher.update(model_id.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// On-disk embedding cache, keyed by identifier hash + model id (spec §4.10
/// "Degradation"; spec §6 cache file layout: "raw 32-bit floats prefixed with a
/// length header and the model identifier"). File format: `u32 LE` dimension count,
/// `u32 LE` model-identifier byte length, the model identifier's UTF-8 bytes, then
/// `dim` little-endian `f32`s.
struct EmbeddingDiskCache {
    dir: PathBuf,
}

impl EmbeddingDiskCache {
    fn new(dir: PathBuf) -> Self {
        let _ = std::fs::create_dir_all(&dir);
        Self { dir }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.bin"))
    }

    fn get(&self, key: &str) -> Option<Vec<f32>> {
        let bytes = std::fs::read(self.path_for(key)).ok()?;
        decode_embedding(&bytes)
    }

    fn put(&self, key: &str, model_id: &str, vector: &[f32]) {
        let _ = std::fs::write(self.path_for(key), encode_embedding(model_id, vector));
    }
}

fn encode_embedding(model_id: &str, vector: &[f32]) -> Vec<u8> {
    let model_bytes = model_id.as_bytes();
    let mut out = Vec::with_capacity(8 + model_bytes.len() + vector.len() * 4);
    out.extend_from_slice(&(vector.len() as u32).to_le_bytes());
    out.extend_from_slice(&(model_bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(model_bytes);
    for f in vector {
        out.extend_from_slice(&f.to_le_bytes());
    }
    out
}

fn decode_embedding(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() < 8 {
        return None;
    }
    let dim = u32::from_le_bytes(bytes[0..4].try_into().ok()?) as usize;
    let model_len = u32::from_le_bytes(bytes[4..8].try_into().ok()?) as usize;
    let floats_start = 8 + model_len;
    let expected_len = floats_start + dim * 4;
    if bytes.len() != expected_len {
        return None;
    }
    let mut vector = Vec::with_capacity(dim);
    for chunk in bytes[floats_start..].chunks_exact(4) {
        vector.push(f32::from_le_bytes(chunk.try_into().ok()?));
    }
    Some(vector)
}

fn load_model(config: &ModelConfig) -> Result<(BertModel, Tokenizer, Device), String> {
    let device = select_device();
    let api = Api::new().map_err(|e| format!("failed to create HF API: {e}"))?;
    let repo = api.repo(Repo::with_revision(config.model_id.clone(), RepoType::Model, "main".into()));

    let config_path = repo.get("config.json").map_err(|e| e.to_string())?;
    let tokenizer_path = repo.get("tokenizer.json").map_err(|e| e.to_string())?;
    let weights_path = repo.get("model.safetensors").map_err(|e| e.to_string())?;

    let config_str = std::fs::read_to_string(config_path).map_err(|e| e.to_string())?;
    let bert_config: BertConfig = serde_json::from_str(&config_str).map_err(|e| e.to_string())?;
    let tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|e| e.to_string())?;

    let vb = unsafe {
        VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device)
            .map_err(|e| e.to_string())?
    };
    let model = BertModel::load(vb, &bert_config).map_err(|e| e.to_string())?;
    Ok((model, tokenizer, device))
}

fn encode_batch(
    model: &BertModel,
    tokenizer: &Tokenizer,
    device: &Device,
    texts: &[&str],
    dim: usize,
) -> Result<Vec<Vec<f32>>, String> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }
    let encodings = tokenizer.encode_batch(texts.to_vec(), true).map_err(|e| e.to_string())?;
    let max_len = encodings.iter().map(|e| e.get_ids().len()).max().unwrap_or(0);

    let mut all_ids = Vec::new();
    let mut all_mask = Vec::new();
    let mut all_type_ids = Vec::new();
    for enc in &encodings {
        let pad = max_len - enc.get_ids().len();
        all_ids.extend_from_slice(enc.get_ids());
        all_ids.extend(std::iter::repeat(0u32).take(pad));
        all_mask.extend_from_slice(enc.get_attention_mask());
        all_mask.extend(std::iter::repeat(0u32).take(pad));
        all_type_ids.extend_from_slice(enc.get_type_ids());
        all_type_ids.extend(std::iter::repeat(0u32).take(pad));
    }

    let batch_size = texts.len();
    let input_ids =
        Tensor::from_vec(all_ids, (batch_size, max_len), device).map_err(|e| e.to_string())?;
    let attention_mask = Tensor::from_vec(
        all_mask.iter().map(|&x| x as f32).collect::<Vec<_>>(),
        (batch_size, max_len),
        device,
    )
    .map_err(|e| e.to_string())?;
    let token_type_ids =
        Tensor::from_vec(all_type_ids, (batch_size, max_len), device).map_err(|e| e.to_string())?;

    let output = model
        .forward(&input_ids, &token_type_ids, Some(&attention_mask))
        .map_err(|e| e.to_string())?;

    let mask_expanded = attention_mask
        .unsqueeze(2)
        .and_then(|m| m.broadcast_as(output.shape()))
        .map_err(|e| e.to_string())?;
    let summed =
        output.mul(&mask_expanded).and_then(|m| m.sum(1)).map_err(|e| e.to_string())?;
    let mask_sum = mask_expanded
        .sum(1)
        .and_then(|s| s.clamp(1e-9, f64::MAX))
        .map_err(|e| e.to_string())?;
    let mean_pooled = summed.div(&mask_sum).map_err(|e| e.to_string())?;

    let norms = mean_pooled
        .sqr()
        .and_then(|s| s.sum(1))
        .and_then(|s| s.sqrt())
        .and_then(|s| s.unsqueeze(1))
        .and_then(|s| s.broadcast_as(mean_pooled.shape()))
        .and_then(|s| s.clamp(1e-9, f64::MAX))
        .map_err(|e| e.to_string())?;
    let normalized = mean_pooled.div(&norms).map_err(|e| e.to_string())?;

    let flat: Vec<f32> =
        normalized.flatten_all().and_then(|t| t.to_vec1()).map_err(|e| e.to_string())?;

    let mut result = Vec::with_capacity(batch_size);
    for i in 0..batch_size {
        result.push(flat[i * dim..(i + 1) * dim].to_vec());
    }
    Ok(result)
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingMatch {
    pub identifier: String,
    pub score: f64,
}

/// Dense embedding matcher. Degrades to `enabled() == false` if model loading
/// fails at construction time (spec §4.10 "Degradation") — the rest of the system
/// must keep functioning without it.
pub struct EmbeddingMatcher {
    model: Option<(BertModel, Tokenizer, Device)>,
    config: ModelConfig,
    cache: EmbeddingDiskCache,
}

impl EmbeddingMatcher {
    pub fn load(model_name: Option<&str>, cache_dir: &Path) -> Self {
        let config = resolve_model(model_name);
        let cache = EmbeddingDiskCache::new(cache_dir.join("embeddings"));
        let model = match load_model(&config) {
            Ok(m) => {
                info!(model = %config.model_id, "embedding model loaded");
                Some(m)
            }
            Err(e) => {
                warn!(model = %config.model_id, error = %e, "embedding model failed to load, matcher disabled");
                None
            }
        };
        Self { model, config, cache }
    }

    pub fn enabled(&self) -> bool {
        self.model.is_some()
    }

    fn embed_one(&self, text: &str) -> Option<Vec<f32>> {
        let key = cache_key(text, &self.config.model_id);
        if let Some(cached) = self.cache.get(&key) {
            return Some(cached);
        }
        let (model, tokenizer, device) = self.model.as_ref()?;
        let vector = encode_batch(model, tokenizer, device, &[text], self.config.dim).ok()?.pop()?;
        self.cache.put(&key, &self.config.model_id, &vector);
        Some(vector)
    }

    fn embed_many(&self, texts: &[String]) -> HashMap<String, Vec<f32>> {
        let mut result = HashMap::new();
        let mut to_embed = Vec::new();
        for text in texts {
            let key = cache_key(text, &self.config.model_id);
            if let Some(cached) = self.cache.get(&key) {
                result.insert(text.clone(), cached);
            } else {
                to_embed.push(text.clone());
            }
        }
        if !to_embed.is_empty() {
            if let Some((model, tokenizer, device)) = &self.model {
                let refs: Vec<&str> = to_embed.iter().map(String::as_str).collect();
                if let Ok(vectors) = encode_batch(model, tokenizer, device, &refs, self.config.dim) {
                    for (text, vector) in to_embed.iter().zip(vectors) {
                        self.cache.put(&cache_key(text, &self.config.model_id), &self.config.model_id, &vector);
                        result.insert(text.clone(), vector);
                    }
                }
            }
        }
        result
    }

    /// Rank `identifiers` against `query` by cosine similarity of dense embeddings.
    /// Returns an empty vector (never an error) if the matcher is disabled.
    pub fn search(&self, identifiers: &[Identifier], query: &str, threshold: f64, top_k: usize) -> Vec<EmbeddingMatch> {
        if !self.enabled() {
            return Vec::new();
        }
        let Some(query_vec) = self.embed_one(query) else { return Vec::new() };

        let names: Vec<String> = identifiers.iter().map(|i| i.name.clone()).collect();
        let embeddings = self.embed_many(&names);

        let mut matches: Vec<EmbeddingMatch> = identifiers
            .iter()
            .filter_map(|ident| {
                let vector = embeddings.get(&ident.name)?;
                let score = cosine(&query_vec, vector) as f64;
                (score >= threshold).then_some(EmbeddingMatch { identifier: ident.name.clone(), score })
            })
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.identifier.cmp(&b.identifier))
        });
        matches.truncate(top_k);
        matches
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_presets() {
        assert_eq!(resolve_model(None).dim, 384);
        assert_eq!(resolve_model(Some("codebert")).dim, 768);
    }

    #[test]
    fn cache_key_is_stable_for_same_identifier_and_model() {
        let a = cache_key("getUser", "minilm");
        let b = cache_key("getUser", "minilm");
        assert_eq!(a, b);
        assert_ne!(a, cache_key("getUser", "codebert"));
    }

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn disk_cache_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = EmbeddingDiskCache::new(dir.path().to_path_buf());
        cache.put("k1", "minilm", &[1.0, 2.0, 3.0]);
        assert_eq!(cache.get("k1"), Some(vec![1.0, 2.0, 3.0]));
    }

    #[test]
    fn disk_cache_encodes_length_header_and_model_id() {
        let dir = tempfile::tempdir().unwrap();
        let cache = EmbeddingDiskCache::new(dir.path().to_path_buf());
        cache.put("k2", "minilm", &[1.0, 2.0]);
        let bytes = std::fs::read(cache.path_for("k2")).unwrap();
        assert_eq!(u32::from_le_bytes(bytes[0..4].try_into().unwrap()), 2);
        assert_eq!(u32::from_le_bytes(bytes[4..8].try_into().unwrap()), "minilm".len() as u32);
        assert_eq!(&bytes[8..8 + "minilm".len()], b"minilm");
    }
}
