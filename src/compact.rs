//! Compact (TOON) rendering of result envelopes
//!
//! Every tool result is serialized to pretty JSON, handed to an external TOON
//! encoder, and returned fenced together with a token-savings note. When the
//! encoder fails the JSON is returned inside an error fence, so the caller
//! always gets the data.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use thiserror::Error;
use tiktoken_rs::CoreBPE;
use tokio::process::Command;
use tracing::{info, warn};

use crate::dispatch::ResultEnvelope;
use crate::error::{NetdevMcpError, Result};

/// Why the external encoder produced nothing
#[derive(Debug, Error)]
pub enum CompactError {
    /// Encoder ran and exited non-zero
    #[error("TOON CLI failed:\n{0}")]
    Cli(String),

    /// Encoder could not be run, or its files could not be used
    #[error("TOON subprocess error:\n{0}")]
    Subprocess(String),
}

impl From<std::io::Error> for CompactError {
    fn from(e: std::io::Error) -> Self {
        CompactError::Subprocess(e.to_string())
    }
}

/// Token estimate for a piece of text
pub trait TokenCounter: Send + Sync {
    /// `None` when no estimate can be made
    fn count(&self, text: &str) -> Option<usize>;
}

/// `o200k_base` tokenizer
pub struct TiktokenCounter {
    bpe: CoreBPE,
}

impl TiktokenCounter {
    /// Load the tokenizer; `None` if it is unavailable
    pub fn load() -> Option<Self> {
        match tiktoken_rs::o200k_base() {
            Ok(bpe) => {
                info!("Loaded o200k_base tokenizer for token savings reporting");
                Some(Self { bpe })
            }
            Err(e) => {
                warn!("Tokenizer unavailable, token savings will not be reported: {}", e);
                None
            }
        }
    }
}

impl TokenCounter for TiktokenCounter {
    fn count(&self, text: &str) -> Option<usize> {
        Some(self.bpe.encode_with_special_tokens(text).len())
    }
}

/// Runs `<program> <args...> <input.json> -o <output.toon>`
#[derive(Debug, Clone)]
pub struct CompactEncoder {
    program: String,
    args: Vec<String>,
}

impl CompactEncoder {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Encode a JSON document; temp files are removed before returning
    pub async fn encode(&self, json: &str) -> std::result::Result<String, CompactError> {
        let workdir = tempfile::tempdir()?;
        let input = workdir.path().join("input.json");
        let output = workdir.path().join("output.toon");

        tokio::fs::write(&input, json).await?;
        self.run(&input, &output).await?;

        let toon = tokio::fs::read_to_string(&output).await?;
        Ok(toon)
    }

    async fn run(&self, input: &Path, output: &Path) -> std::result::Result<(), CompactError> {
        info!(
            "[TOON] Running: {} {} {} -o {}",
            self.program,
            self.args.join(" "),
            input.display(),
            output.display()
        );

        // stdin belongs to the MCP transport
        let result = Command::new(&self.program)
            .args(&self.args)
            .arg(input)
            .arg("-o")
            .arg(output)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if !result.status.success() {
            return Err(CompactError::Cli(
                String::from_utf8_lossy(&result.stderr).into_owned(),
            ));
        }
        Ok(())
    }
}

/// Turns envelopes into the text blob every tool returns
#[derive(Clone)]
pub struct Renderer {
    encoder: CompactEncoder,
    tokens: Option<Arc<dyn TokenCounter>>,
}

impl Renderer {
    pub fn new(encoder: CompactEncoder, tokens: Option<Arc<dyn TokenCounter>>) -> Self {
        Self { encoder, tokens }
    }

    pub async fn render(&self, envelope: &ResultEnvelope) -> String {
        let json = match to_json(envelope) {
            Ok(json) => json,
            Err(e) => return format!("```error\n{}\n```", e),
        };

        match self.encoder.encode(&json).await {
            Ok(toon) => format!("```toon\n{}\n```{}", toon, self.savings(&json, &toon)),
            Err(e) => {
                warn!("TOON encoding failed: {}", e);
                format!("```error\n{}\n\nJSON OUTPUT:\n{}\n```", e, json)
            }
        }
    }

    fn savings(&self, json: &str, toon: &str) -> String {
        let counts = self
            .tokens
            .as_ref()
            .and_then(|counter| Some((counter.count(json)?, counter.count(toon)?)));

        match counts {
            Some((json_tokens, toon_tokens)) if json_tokens > 0 && toon_tokens > 0 => {
                let reduction = 100.0 * (1.0 - toon_tokens as f64 / json_tokens as f64);
                format!(
                    "\n\n# Token Savings\n- JSON tokens: {}\n- TOON tokens: {}\n- Saved: {:.1}%\n",
                    json_tokens, toon_tokens, reduction
                )
            }
            _ => "\n\n# Token Savings\n(unavailable)\n".to_string(),
        }
    }
}

fn to_json(envelope: &ResultEnvelope) -> Result<String> {
    serde_json::to_string_pretty(envelope).map_err(|e| NetdevMcpError::Serialization(e.to_string()))
}
