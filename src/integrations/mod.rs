//! External service integrations.

pub mod prediction_client {
    pub use crate::prediction_client::*;
}

pub mod promo {
    pub use crate::promo::*;
}

pub mod client_store {
    pub use crate::client_store::*;
}
