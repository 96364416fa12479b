use thiserror::Error;

use trl_broker::BrokerError;
use trl_exec::ExecError;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("runner process error: {0}")]
    Exec(#[from] ExecError),
}
