//! Invoice rendering collaborators.
//!
//! A renderer turns an [`InvoiceDocument`] into a stored artifact and returns
//! the URL it can be fetched from. Rendering may be slow; the workflow calls it
//! outside of any store transaction.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use thiserror::Error;

use orderflow_invoicing::InvoiceDocument;
use orderflow_orders::OrderId;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to serialize invoice: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write invoice: {0}")]
    Io(#[from] std::io::Error),

    #[error("renderer unavailable: {0}")]
    Unavailable(String),
}

pub trait InvoiceRenderer: Send + Sync {
    /// Render and store the document; returns its URL.
    fn render(&self, document: &InvoiceDocument) -> Result<String, RenderError>;
}

impl<R> InvoiceRenderer for Arc<R>
where
    R: InvoiceRenderer + ?Sized,
{
    fn render(&self, document: &InvoiceDocument) -> Result<String, RenderError> {
        (**self).render(document)
    }
}

/// Keeps rendered documents in memory.
#[derive(Debug, Default)]
pub struct InMemoryInvoiceRenderer {
    documents: Mutex<HashMap<OrderId, InvoiceDocument>>,
    renders: Mutex<usize>,
}

impl InMemoryInvoiceRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document(&self, order_id: OrderId) -> Option<InvoiceDocument> {
        self.documents
            .lock()
            .ok()
            .and_then(|docs| docs.get(&order_id).cloned())
    }

    /// How many times `render` succeeded.
    pub fn render_count(&self) -> usize {
        self.renders.lock().map(|n| *n).unwrap_or(0)
    }
}

impl InvoiceRenderer for InMemoryInvoiceRenderer {
    fn render(&self, document: &InvoiceDocument) -> Result<String, RenderError> {
        let mut docs = self
            .documents
            .lock()
            .map_err(|_| RenderError::Unavailable("lock poisoned".to_string()))?;
        docs.insert(document.order_id, document.clone());

        let mut renders = self
            .renders
            .lock()
            .map_err(|_| RenderError::Unavailable("lock poisoned".to_string()))?;
        *renders += 1;

        Ok(format!("memory://invoices/{}", document.order_id))
    }
}

/// Writes each invoice as pretty JSON under a directory.
#[derive(Debug, Clone)]
pub struct JsonFileInvoiceRenderer {
    dir: PathBuf,
}

impl JsonFileInvoiceRenderer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, order_id: OrderId) -> PathBuf {
        self.dir.join(format!("invoice-{order_id}.json"))
    }
}

impl InvoiceRenderer for JsonFileInvoiceRenderer {
    fn render(&self, document: &InvoiceDocument) -> Result<String, RenderError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(document.order_id);
        let body = serde_json::to_vec_pretty(document)?;
        std::fs::write(&path, body)?;
        Ok(format!("file://{}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn document() -> InvoiceDocument {
        InvoiceDocument {
            order_id: OrderId::generate(),
            time: Utc::now(),
            lines: Vec::new(),
            total: 0,
        }
    }

    #[test]
    fn in_memory_renderer_keeps_the_document() {
        let renderer = InMemoryInvoiceRenderer::new();
        let doc = document();

        let url = renderer.render(&doc).unwrap();

        assert_eq!(url, format!("memory://invoices/{}", doc.order_id));
        assert_eq!(renderer.document(doc.order_id), Some(doc));
        assert_eq!(renderer.render_count(), 1);
    }

    #[test]
    fn json_renderer_writes_a_readable_file() {
        let dir = std::env::temp_dir().join(format!("orderflow-render-{}", uuid::Uuid::now_v7()));
        let renderer = JsonFileInvoiceRenderer::new(&dir);
        let doc = document();

        let url = renderer.render(&doc).unwrap();

        let path = renderer.path_for(doc.order_id);
        assert_eq!(url, format!("file://{}", path.display()));
        let written: InvoiceDocument =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(written, doc);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
