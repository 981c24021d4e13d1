pub mod types;
pub mod capacity;
pub mod tiers;
pub mod model;
pub mod builder;
pub mod engine;
pub mod cohort;
pub mod diagnostics;
pub mod sequencer;

pub use types::{Assignment, ForcedAssignment, Period, SlotKey};
pub use capacity::CapacityTable;
pub use tiers::{RandomFillPolicy, Tier, ZoneTiers};
pub use builder::{CohortModel, ModelBuilder, PinnedSlots, SolveOptions};
pub use engine::{Engine, MicroLpEngine, Outcome};
pub use cohort::{CohortOutcome, CohortSolver, Feasibility};
pub use diagnostics::{
    check_individually, diagnose_cohort, find_duplicates, DuplicateAssignment, SoloCheck,
};
pub use sequencer::{partition_cohorts, Cohort, CohortSummary, RunPhase, RunReport, Sequencer};
