mod auth;
mod bearer;
mod descriptor;
mod outgoing;

pub use auth::{NoAuth, OAuthHandler, RefreshCallback, RefreshOutcome};
pub use bearer::{BearerAuth, TokenRefresh};
pub use descriptor::{HttpMethod, NetworkRequest, RequestDescriptor};
pub(crate) use outgoing::{Assembly, assemble};
