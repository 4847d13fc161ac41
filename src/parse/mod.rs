//! Structured parsing of command output
//!
//! A [`Grammar`] turns the raw text of one command on a set of platforms
//! into a JSON record. The [`GrammarRegistry`] picks the grammar for a
//! (platform, command) pair; when none matches the caller falls back to raw
//! text.

mod interfaces;
mod ping;
mod route;
mod version;

use serde_json::Value;

use crate::device::{DeviceSession, Os};
use crate::error::{NetdevMcpError, Result};

pub use interfaces::ShowIpInterfaceBrief;
pub use ping::Ping;
pub use route::ShowIpRoute;
pub use version::ShowVersion;

/// Keyword abbreviations expanded before grammar lookup
const ABBREVIATIONS: &[(&str, &str)] = &[
    ("int", "interface"),
    ("br", "brief"),
    ("ver", "version"),
];

/// Parser for one command's output
pub trait Grammar: Send + Sync {
    /// Canonical command text, lowercase and single-spaced
    fn command(&self) -> &'static str;

    /// Platforms whose output this grammar understands
    fn platforms(&self) -> &'static [Os];

    /// Whether a normalized command is handled by this grammar
    fn matches(&self, command: &str) -> bool {
        command == self.command()
    }

    /// Parse raw output, failing when it does not have the expected shape
    fn parse(&self, output: &str) -> Result<Value>;
}

/// Set of known grammars
pub struct GrammarRegistry {
    grammars: Vec<Box<dyn Grammar>>,
}

impl GrammarRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            grammars: Vec::new(),
        }
    }

    /// Registry with every bundled grammar
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(ShowIpInterfaceBrief));
        registry.register(Box::new(ShowIpRoute));
        registry.register(Box::new(ShowVersion));
        registry.register(Box::new(Ping));
        registry
    }

    /// Add a grammar; later registrations do not shadow earlier ones
    pub fn register(&mut self, grammar: Box<dyn Grammar>) {
        self.grammars.push(grammar);
    }

    /// Find the grammar for `command` on `os`
    pub fn lookup(&self, os: Os, command: &str) -> Option<&dyn Grammar> {
        let normalized = normalize_command(command);
        self.grammars
            .iter()
            .find(|g| g.platforms().contains(&os) && g.matches(&normalized))
            .map(|g| g.as_ref())
    }

    /// Run `command` on `session` and parse the output with its grammar.
    ///
    /// Nothing is executed when no grammar applies. Output that the grammar
    /// rejects is a parse error, same as a missing grammar.
    pub async fn run_and_parse(
        &self,
        session: &mut dyn DeviceSession,
        os: Os,
        command: &str,
    ) -> Result<Value> {
        let grammar = self.lookup(os, command).ok_or_else(|| {
            NetdevMcpError::parse(format!("No parser available for '{}' on {}", command, os))
        })?;

        let raw = session.execute(command).await?;
        grammar.parse(&raw)
    }

    pub fn len(&self) -> usize {
        self.grammars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grammars.is_empty()
    }
}

impl Default for GrammarRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Lowercase, collapse whitespace and expand common keyword abbreviations
pub fn normalize_command(command: &str) -> String {
    command
        .split_whitespace()
        .map(|word| {
            let lower = word.to_lowercase();
            ABBREVIATIONS
                .iter()
                .find(|(short, _)| *short == lower)
                .map_or(lower, |(_, long)| long.to_string())
        })
        .collect::<Vec<_>>()
        .join(" ")
}
