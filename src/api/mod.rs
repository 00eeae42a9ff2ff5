// Thin namespace wrapper for API-layer components
pub mod handlers {
    pub use crate::handlers::*;
}

pub mod chat_handler {
    pub use crate::chat_handler::*;
}
