//! In-memory gateways for exercising the handlers without MySQL or S3.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use crate::db::UserStore;
use crate::error::{ApiError, ApiResult};
use crate::s3::PhotoStore;
use crate::types::User;

pub const FORM_BOUNDARY: &str = "users-test-boundary";
pub const FORM_CONTENT_TYPE: &str = "multipart/form-data; boundary=users-test-boundary";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ========== USERS ==========

#[derive(Default)]
pub struct MemoryUserStore {
    rows: Mutex<BTreeMap<i64, User>>,
    last_id: AtomicU64,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryUserStore {
    /// Every lookup (and the health ping) fails from now on
    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    /// Inserts, updates and deletes fail from now on
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    pub fn get(&self, id: i64) -> Option<User> {
        lock(&self.rows).get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.rows).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self, flag: &AtomicBool) -> ApiResult<()> {
        if flag.load(Ordering::SeqCst) {
            Err(ApiError::Persistence(sqlx::Error::PoolTimedOut))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_user(&self, id: i64) -> ApiResult<Option<User>> {
        self.check(&self.fail_reads)?;
        Ok(self.get(id))
    }

    async fn insert_user(&self, name: &str, photo_url: Option<&str>) -> ApiResult<User> {
        self.check(&self.fail_writes)?;

        let id = (self.last_id.fetch_add(1, Ordering::SeqCst) + 1) as i64;
        let now = Utc::now();
        let user = User {
            id,
            name: name.to_string(),
            photo_url: photo_url.map(str::to_string),
            created_at: now,
            updated_at: now,
        };
        lock(&self.rows).insert(id, user.clone());
        Ok(user)
    }

    async fn update_user(
        &self,
        id: i64,
        name: &str,
        photo_url: Option<&str>,
    ) -> ApiResult<Option<User>> {
        self.check(&self.fail_writes)?;

        let mut rows = lock(&self.rows);
        Ok(rows.get_mut(&id).map(|user| {
            user.name = name.to_string();
            user.photo_url = photo_url.map(str::to_string);
            user.updated_at = Utc::now();
            user.clone()
        }))
    }

    async fn delete_user(&self, id: i64) -> ApiResult<bool> {
        self.check(&self.fail_writes)?;
        Ok(lock(&self.rows).remove(&id).is_some())
    }

    async fn ping(&self) -> bool {
        !self.fail_reads.load(Ordering::SeqCst)
    }
}

// ========== PHOTOS ==========

/// What the handlers asked of the photo store, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotoCall {
    Store(String),
    Remove(String),
}

#[derive(Default)]
pub struct MemoryPhotoStore {
    calls: Mutex<Vec<PhotoCall>>,
    objects: Mutex<HashSet<String>>,
    uploads: AtomicU64,
    fail_stores: AtomicBool,
    fail_removals: AtomicBool,
}

impl MemoryPhotoStore {
    pub fn fail_stores(&self) {
        self.fail_stores.store(true, Ordering::SeqCst);
    }

    pub fn fail_removals(&self) {
        self.fail_removals.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<PhotoCall> {
        lock(&self.calls).clone()
    }

    /// Objects currently held, orphans included
    pub fn stored_count(&self) -> usize {
        lock(&self.objects).len()
    }
}

#[async_trait]
impl PhotoStore for MemoryPhotoStore {
    async fn store(
        &self,
        file_name: &str,
        _bytes: Vec<u8>,
        _content_type: &str,
    ) -> ApiResult<String> {
        lock(&self.calls).push(PhotoCall::Store(file_name.to_string()));
        if self.fail_stores.load(Ordering::SeqCst) {
            return Err(ApiError::Storage(
                "Failed to upload photo: simulated outage".to_string(),
            ));
        }

        let n = self.uploads.fetch_add(1, Ordering::SeqCst) + 1;
        let url = format!("memory://user-photos/{}-{}", n, file_name);
        lock(&self.objects).insert(url.clone());
        Ok(url)
    }

    async fn remove(&self, url: &str) -> ApiResult<()> {
        lock(&self.calls).push(PhotoCall::Remove(url.to_string()));
        if self.fail_removals.load(Ordering::SeqCst) {
            return Err(ApiError::Storage(
                "Failed to delete photo: simulated outage".to_string(),
            ));
        }

        lock(&self.objects).remove(url);
        Ok(())
    }

    async fn exists(&self, url: &str) -> bool {
        lock(&self.objects).contains(url)
    }
}

// ========== MULTIPART BODIES ==========

pub fn text_part(name: &str, value: &str) -> Vec<u8> {
    format!(
        "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
        FORM_BOUNDARY, name, value
    )
    .into_bytes()
}

pub fn file_part(name: &str, file_name: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut part = format!(
        "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
        FORM_BOUNDARY, name, file_name, content_type
    )
    .into_bytes();
    part.extend_from_slice(data);
    part.extend_from_slice(b"\r\n");
    part
}

/// Join parts and append the closing boundary
pub fn finish_form(parts: Vec<Vec<u8>>) -> Vec<u8> {
    let mut body: Vec<u8> = parts.concat();
    body.extend_from_slice(format!("--{}--\r\n", FORM_BOUNDARY).as_bytes());
    body
}

/// Body with an optional `nama` field and an optional `foto`
/// `(file name, content type, bytes)` part
pub fn multipart_body(name: Option<&str>, photo: Option<(&str, &str, &[u8])>) -> Vec<u8> {
    let mut parts = Vec::new();
    if let Some(name) = name {
        parts.push(text_part("nama", name));
    }
    if let Some((file_name, content_type, data)) = photo {
        parts.push(file_part("foto", file_name, content_type, data));
    }
    finish_form(parts)
}
