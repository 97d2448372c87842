pub mod io_core;
pub mod outbound;
mod error;
mod tls;

/* öffentliche Typen, die andere nutzen sollen */
pub use error::{ClientError, Phase};
pub use outbound::OneShotClient;
