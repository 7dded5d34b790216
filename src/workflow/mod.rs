pub mod stage_ctx;
pub mod stage_flow;
pub mod stage_graph;

pub use stage_ctx::StageCtx;
pub use stage_flow::StageFlow;
pub use stage_graph::StageGraph;
