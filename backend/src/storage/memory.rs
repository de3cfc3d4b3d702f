//! In-memory storage backend for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;

use super::StorageBackend;
use crate::error::{AppError, Result};

#[derive(Default)]
pub struct MemoryStorage {
    blobs: Mutex<HashMap<String, Bytes>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().unwrap().len()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn put(&self, key: &str, content: Bytes) -> Result<()> {
        self.blobs.lock().unwrap().insert(key.to_string(), content);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        self.blobs
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| AppError::Storage(format!("Failed to read {}: not found", key)))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.blobs.lock().unwrap().contains_key(key))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.blobs
            .lock()
            .unwrap()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| AppError::Storage(format!("Failed to delete {}: not found", key)))
    }
}
