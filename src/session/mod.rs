//! Session lifecycle
//!
//! ```text
//!                 login ok
//!  Unauthenticated ────────► Authenticated
//!        ▲                        │
//!        └────────────────────────┘
//!   logout / credential rotation / validation rejected
//! ```
//!
//! | Module        | Responsibility                                   |
//! |---------------|--------------------------------------------------|
//! | `store`       | Client-held (uid, token) pair                    |
//! | `manager`     | Login, validation, logout, credential rotation   |
//! | `best_effort` | Outcome type for operations that cannot fail     |

mod best_effort;
mod manager;
mod store;

pub use best_effort::BestEffort;
pub use manager::{CredentialRotation, SessionManager};
pub use store::{FileSessionStore, MemorySessionStore, Session, SessionStore};
