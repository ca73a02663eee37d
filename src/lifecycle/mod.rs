pub mod format;
pub mod machine;
pub mod prestige;
pub mod restrictions;
pub mod scheduler;

pub use format::format_duration;
pub use machine::{
    DepletionOutcome, EnterOutcome, LifecycleDeps, LifecycleService, PresenceOutcome,
    ReleaseCause, ReleaseOutcome, SweepReport,
};
pub use prestige::{
    PRESTIGE_MULTIPLIER, PrestigeService, multiplier_for_level, multiplier_from_permissions,
    multiplier_permission,
};
pub use restrictions::{AfterlifePolicy, Decision, TeleportCause};
pub use scheduler::ReleaseScheduler;
