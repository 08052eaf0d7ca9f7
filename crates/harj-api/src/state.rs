use std::sync::Arc;

use harj_chat::MessagingService;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub service: MessagingService,
}

impl AppStateInner {
    pub fn new(service: MessagingService) -> AppState {
        Arc::new(Self { service })
    }
}
