pub mod config;
pub mod db;
pub mod error;
pub mod form;
pub mod response;
pub mod s3;
pub mod types;
pub mod users;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

use std::sync::Arc;

use crate::db::UserStore;
use crate::s3::PhotoStore;

/// Shared application state, built once per cold start
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub photos: Arc<dyn PhotoStore>,
}

impl AppState {
    pub fn new(users: Arc<dyn UserStore>, photos: Arc<dyn PhotoStore>) -> Arc<Self> {
        Arc::new(Self { users, photos })
    }
}
