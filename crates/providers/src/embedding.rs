//! Embedding-backed research capability. Runs entirely on the local CPU.
//!
//! Uses [Candle](https://github.com/huggingface/candle) with
//! `all-MiniLM-L6-v2` (384 dimensions). At construction every passage of the
//! local corpus is embedded once; a query is answered by embedding it and
//! ranking passages by cosine similarity.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use deepresearch_config::ModelConfig;
use deepresearch_core::{
    CapabilityFactory, ComputeDevice, Finding, MemoryProfile, ResearchCapability, ResearchError,
    ResearchResult,
};
use tokenizers::Tokenizer;
use tracing::{debug, info};

use crate::cache::{ModelCache, ModelPaths, get_or_download_model};
use crate::corpus::{Passage, load_corpus};

/// Embedding dimension for all-MiniLM-L6-v2
pub const EMBEDDING_DIM: usize = 384;

/// Maximum sequence length
pub const MAX_SEQ_LENGTH: usize = 256;

/// Passages embedded per forward pass during indexing
pub const DEFAULT_BATCH_SIZE: usize = 16;

fn candle_err(e: candle_core::Error) -> ResearchError {
    ResearchError::Embedding(e.to_string())
}

/// Tokenizer + BERT weights.
struct Embedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
}

impl Embedder {
    fn load(paths: &ModelPaths, device: Device) -> Result<Self, ResearchError> {
        info!("Loading embedding model...");

        let config_str = std::fs::read_to_string(&paths.config)
            .map_err(|e| ResearchError::ModelNotFound(format!("{}: {e}", paths.config.display())))?;
        let config: BertConfig = serde_json::from_str(&config_str)
            .map_err(|e| ResearchError::ModelNotFound(format!("Invalid config: {e}")))?;

        let tokenizer = Tokenizer::from_file(&paths.tokenizer)
            .map_err(|e| ResearchError::Tokenizer(e.to_string()))?;

        // SAFETY: the weights file is owned by the model cache and not
        // modified while mapped.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[paths.weights.clone()], DType::F32, &device)
                .map_err(candle_err)?
        };
        let model = BertModel::load(vb, &config).map_err(candle_err)?;

        info!(dim = EMBEDDING_DIM, max_seq = MAX_SEQ_LENGTH, "Model loaded successfully");
        Ok(Self {
            model,
            tokenizer,
            device,
        })
    }

    /// Embed texts into unit-length vectors.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, ResearchError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| ResearchError::Tokenizer(e.to_string()))?;

        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0)
            .min(MAX_SEQ_LENGTH);

        let mut ids_flat = Vec::with_capacity(texts.len() * max_len);
        let mut mask_flat = Vec::with_capacity(texts.len() * max_len);
        for encoding in &encodings {
            let len = encoding.get_ids().len().min(max_len);
            let mut ids = encoding.get_ids()[..len].to_vec();
            let mut mask = encoding.get_attention_mask()[..len].to_vec();
            ids.resize(max_len, 0);
            mask.resize(max_len, 0);
            ids_flat.extend(ids);
            mask_flat.extend(mask);
        }

        let shape = (texts.len(), max_len);
        let input_ids = Tensor::from_vec(ids_flat, shape, &self.device).map_err(candle_err)?;
        let attention_mask = Tensor::from_vec(mask_flat, shape, &self.device).map_err(candle_err)?;
        let token_type_ids = input_ids.zeros_like().map_err(candle_err)?;

        let output = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))
            .map_err(candle_err)?;

        let pooled = mean_pooling(&output, &attention_mask).map_err(candle_err)?;
        let rows: Vec<Vec<f32>> = pooled.to_vec2().map_err(candle_err)?;
        Ok(rows.into_iter().map(normalize).collect())
    }
}

/// Mean over token embeddings, excluding padding.
fn mean_pooling(embeddings: &Tensor, attention_mask: &Tensor) -> candle_core::Result<Tensor> {
    let mask = attention_mask
        .unsqueeze(2)?
        .broadcast_as(embeddings.shape())?
        .to_dtype(DType::F32)?;
    let sum = embeddings.broadcast_mul(&mask)?.sum(1)?;
    let count = mask.sum(1)?.clamp(1e-9, f64::MAX)?;
    sum.broadcast_div(&count)
}

fn normalize(values: Vec<f32>) -> Vec<f32> {
    let norm: f32 = values.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        values.into_iter().map(|x| x / norm).collect()
    } else {
        values
    }
}

/// Dot product of two unit vectors.
fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Passages with their unit-length embeddings, index-aligned.
struct EmbeddedCorpus {
    passages: Vec<Passage>,
    vectors: Vec<Vec<f32>>,
}

impl EmbeddedCorpus {
    /// Top `top_k` passages by cosine similarity to `query_vec`.
    fn rank(&self, query_vec: &[f32], top_k: usize) -> Vec<Finding> {
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, cosine(query_vec, v)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_k);

        scored
            .iter()
            .map(|&(i, score)| Finding {
                content: self.passages[i].content.clone(),
                source: self.passages[i].source.clone(),
                relevance: f64::from(score).clamp(0.0, 1.0),
            })
            .collect()
    }

    /// Drop spare capacity left over from batched indexing.
    fn compact(&mut self) {
        for passage in &mut self.passages {
            passage.content.shrink_to_fit();
            passage.source.shrink_to_fit();
        }
        self.passages.shrink_to_fit();
        for vector in &mut self.vectors {
            vector.shrink_to_fit();
        }
        self.vectors.shrink_to_fit();
    }
}

/// Embedded corpus ready for search.
struct SearchIndex {
    embedder: Embedder,
    corpus: EmbeddedCorpus,
    top_k: usize,
}

impl SearchIndex {
    fn search(&self, query: &str) -> Result<ResearchResult, ResearchError> {
        let started = Instant::now();
        let query_vec = self
            .embedder
            .embed_batch(&[query])?
            .into_iter()
            .next()
            .ok_or_else(|| ResearchError::Embedding("empty embedding batch".into()))?;

        let findings = self.corpus.rank(&query_vec, self.top_k);
        let sources: HashSet<&str> = findings.iter().map(|f| f.source.as_str()).collect();
        let confidence = findings.first().map(|f| f.relevance).unwrap_or(0.0);

        debug!(findings = findings.len(), confidence, "Query ranked");
        Ok(ResearchResult {
            query: query.to_string(),
            sources: sources.len(),
            confidence,
            reasoning: format!(
                "Ranked {} passages by semantic similarity to: {query}",
                self.corpus.passages.len()
            ),
            findings,
            processing_time: started.elapsed().as_secs_f64(),
        })
    }
}

/// Research capability backed by local sentence embeddings.
pub struct EmbeddingResearcher {
    index: RwLock<Arc<SearchIndex>>,
}

impl EmbeddingResearcher {
    fn index(&self) -> Arc<SearchIndex> {
        let guard = self.index.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }
}

#[async_trait]
impl ResearchCapability for EmbeddingResearcher {
    fn name(&self) -> &str {
        "embedding"
    }

    /// Compacts the corpus. Runs before the first query, while the index is
    /// not shared with any search task.
    fn trim_memory(&self) {
        let mut guard = self.index.write().unwrap_or_else(|e| e.into_inner());
        match Arc::get_mut(&mut guard) {
            Some(index) => {
                index.corpus.compact();
                debug!(passages = index.corpus.passages.len(), "Compacted embedded corpus");
            }
            None => debug!("Index in use; skipping compaction"),
        }
    }

    async fn process(&self, query: &str) -> Result<ResearchResult, ResearchError> {
        // Inference is CPU-bound; keep it off the async workers.
        let index = self.index();
        let query = query.to_string();
        tokio::task::spawn_blocking(move || index.search(&query))
            .await
            .map_err(|e| ResearchError::Processing(format!("Search task failed: {e}")))?
    }
}

/// Builds an [`EmbeddingResearcher`] from the model cache and corpus directory.
pub struct EmbeddingFactory {
    cache: ModelCache,
    corpus_dir: PathBuf,
    top_k: usize,
}

impl EmbeddingFactory {
    pub fn from_config(config: &ModelConfig) -> Self {
        Self {
            cache: ModelCache::from_config(config),
            corpus_dir: config.corpus_dir.clone(),
            top_k: config.top_k,
        }
    }
}

impl CapabilityFactory for EmbeddingFactory {
    fn name(&self) -> &str {
        "embedding"
    }

    fn build(&self, profile: &MemoryProfile) -> Result<Arc<dyn ResearchCapability>, ResearchError> {
        let device = match profile.device {
            ComputeDevice::Cpu => Device::Cpu,
        };

        let paths = get_or_download_model(&self.cache)?;
        let embedder = Embedder::load(&paths, device)?;

        let passages = load_corpus(&self.corpus_dir)?;
        info!(passages = passages.len(), dir = %self.corpus_dir.display(), "Embedding corpus");

        let mut vectors = Vec::with_capacity(passages.len());
        for batch in passages.chunks(DEFAULT_BATCH_SIZE) {
            let texts: Vec<&str> = batch.iter().map(|p| p.content.as_str()).collect();
            vectors.extend(embedder.embed_batch(&texts)?);
        }

        Ok(Arc::new(EmbeddingResearcher {
            index: RwLock::new(Arc::new(SearchIndex {
                embedder,
                corpus: EmbeddedCorpus { passages, vectors },
                top_k: self.top_k,
            })),
        }))
    }
}
