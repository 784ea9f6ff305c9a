//! Cost evaluation and run orchestration: per-pixel pricing, parallel tile evaluation
//! with retries, and run events.
pub mod evaluator;
pub mod events;
pub mod runner;

pub use evaluator::{
    raw_cost, CostEvaluator, CostOptions, PixelContext, PixelEvaluation, RegionGapPolicy,
    TileStats, DEFAULT_DISTANCE_DIVISOR,
};
pub use events::{
    AsEventSink, CostEvent, CostEventKind, EventSink, FnSink, MultiSink, VecSink,
};
pub use runner::{
    CostSurfaceRunner, RunConfig, RunResult, RunStats, RunSummary, DEFAULT_MAX_TILE_RETRIES,
};
