pub mod completion;
pub mod config;
pub mod decode;
pub mod errors;
pub mod manager;
pub mod queue;
pub mod request;
pub mod telemetry;
pub mod transport;

pub use completion::Completion;
pub use config::{Config, ConfigLocation};
pub use errors::{Error, FireResult, NetworkError};
pub use manager::RequestManager;
pub use queue::{ReplayQueue, RoundToken, WaitingEntry, WaitingQueue};
pub use request::{
    BearerAuth, HttpMethod, NetworkRequest, NoAuth, OAuthHandler, RefreshOutcome,
    RequestDescriptor, TokenRefresh,
};
pub use transport::{
    OutgoingRequest, ReqwestTransport, ResponseHead, Transport, TransportError, TransportResponse,
};
