use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum BusError {
    #[error("invalid topic pattern \"{pattern}\": {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("event bus is closed")]
    Closed,

    #[error("unknown subscription {id}")]
    UnknownSubscription { id: Uuid },
}

pub type BusResult<T> = Result<T, BusError>;
