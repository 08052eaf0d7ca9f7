//! Client side of the messaging core: keeps a local view of a user's
//! conversations in step with the service, either by polling or by waking
//! on pushed events, and layers optimistic sends on top.

pub mod backend;
pub mod badge;
pub mod config;
pub mod handle;
pub mod http;
pub mod optimistic;
pub mod poller;
pub mod view;

pub use backend::ChatBackend;
pub use badge::UnreadBadge;
pub use config::SyncConfig;
pub use handle::SyncHandle;
pub use http::HttpBackend;
pub use optimistic::{PendingSend, PendingSends, SendState};
pub use poller::{ChatSync, SyncTrigger};
pub use view::{ChatView, Delivery, Notice, Pane, ViewMessage};
