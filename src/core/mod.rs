pub mod clock;
pub mod error;
pub mod record;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{
    ConfigError, LifecycleError, ProfileError, Result, StoreError, WorldError,
};
pub use record::{PlayerRecord, RecordField, RecordRow};
pub use types::{LifeState, Location, PlayerId};
