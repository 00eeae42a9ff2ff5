// Domain-layer modules and shared errors/models
pub mod scoring {
    pub use crate::scoring::*;
}

pub mod badges {
    pub use crate::badges::*;
}

pub mod prompt {
    pub use crate::prompt::*;
}

pub mod citations {
    pub use crate::citations::*;
}

pub mod rate_limiter {
    pub use crate::rate_limiter::*;
}

pub mod assistant {
    pub use crate::assistant::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod errors {
    pub use crate::errors::*;
}
