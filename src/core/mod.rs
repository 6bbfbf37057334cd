// Domain-layer modules and shared errors/models
pub mod credit_limit {
    pub use crate::credit_limit::*;
}

pub mod features {
    pub use crate::features::*;
}

pub mod scoring {
    pub use crate::scoring::*;
}

pub mod services {
    pub use crate::services::*;
}

pub mod import {
    pub use crate::import::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod errors {
    pub use crate::errors::*;
}
