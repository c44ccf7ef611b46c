//! azrm State Management
//!
//! Persists the resources azrm manages and keeps that record consistent with
//! what the provider reports.
//!
//! - **StateFile**: the state structure containing all managed resources
//! - **StateBackend**: a trait for state storage backends (currently a local JSON file)
//! - **LockInfo**: the lock a backend holds while it checks and replaces the state
//! - **Reconciler**: runs provider CRUD calls and writes state only after they succeed
//!
//! # Example
//!
//! ```ignore
//! use azrm_state::{create_backend, BackendConfig, Reconciler};
//!
//! let backend = create_backend(&BackendConfig::local("azrm.state.json"))?;
//! let mut reconciler = Reconciler::load(provider, backend).await?;
//!
//! reconciler.create(&data).await?;
//! reconciler.refresh(&data.address).await?;
//! reconciler.destroy(&data.address).await?;
//! ```

pub mod backend;
pub mod backends;
pub mod lock;
pub mod reconciler;
pub mod state;

pub use backend::{BackendConfig, BackendError, BackendResult, StateBackend};
pub use backends::{LocalBackend, create_backend};
pub use lock::LockInfo;
pub use reconciler::{ReconcileError, ReconcileResult, Reconciler, Refreshed};
pub use state::{ResourceState, StateFile};
