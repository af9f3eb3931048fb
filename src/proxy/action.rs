//! What a handler does with a request once its headers are in.

use crate::config::{ActionKind, ProxyConfig};
use crate::error::ProxyResult;
use crate::http::request::{ClientConnection, InboundRequest};
use crate::proxy::echo::EchoAction;
use crate::proxy::forward::ForwardAction;

/// Request action. Each variant owns writing the reply to the client.
#[derive(Debug, Clone)]
pub enum Action {
    Forward(ForwardAction),
    Echo(EchoAction),
}

impl Action {
    pub fn from_config(config: &ProxyConfig) -> Self {
        match config.action {
            ActionKind::Forward => Action::Forward(ForwardAction::from_config(config)),
            ActionKind::Echo => Action::Echo(EchoAction::from_config(config)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::Forward(_) => "forward",
            Action::Echo(_) => "echo",
        }
    }

    /// Run the action. `Ok(false)` is a logical failure; `Err` is a fault,
    /// which may be fatal (see [`ProxyError::is_fatal`](crate::error::ProxyError::is_fatal)).
    pub async fn execute(
        &self,
        request: &mut InboundRequest,
        client: ClientConnection,
    ) -> ProxyResult<bool> {
        match self {
            Action::Forward(forward) => forward.execute(request, client).await,
            Action::Echo(echo) => echo.execute(request, client).await,
        }
    }
}
