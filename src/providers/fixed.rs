use crate::core::config::FixedSourceConfig;
use crate::core::quote::RawQuote;
use crate::core::source::{AdapterError, SourceAdapter};
use async_trait::async_trait;

/// Always answers with a configured price. Meant as the last tier so a cycle
/// still records something when every network source is down.
pub struct FixedAdapter {
    name: String,
    price: f64,
    note: Option<String>,
}

impl FixedAdapter {
    pub fn new(config: &FixedSourceConfig) -> Self {
        Self {
            name: config.name.clone(),
            price: config.price,
            note: config.note.clone(),
        }
    }
}

#[async_trait]
impl SourceAdapter for FixedAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn attempt(&self) -> Result<RawQuote, AdapterError> {
        let raw = RawQuote::new(&self.name, self.price);
        Ok(match &self.note {
            Some(note) => raw.with_note(note),
            None => raw,
        })
    }
}
