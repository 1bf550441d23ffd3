use thiserror::Error;

use crate::model::{ParseIdError, PayloadError, PercentageError};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Percentage(#[from] PercentageError),
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error(transparent)]
    ParseId(#[from] ParseIdError),
}
