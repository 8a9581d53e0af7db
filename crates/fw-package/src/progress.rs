/// One level of the two-level progress report: the top-level pipeline
/// step, or the per-slave sub-step within "programming slaves".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepStatus {
    pub current_op: String,
    pub step: u32,
    pub total_steps: u32,
}

/// A progress update handed to the caller's callback. `problem` carries a
/// non-fatal issue (a slave that failed to program, for instance) alongside
/// whatever status was last reported; it does not replace `process`.
#[derive(Debug, Clone, Default)]
pub struct ProgressEvent {
    pub process: StepStatus,
    pub subprocess: StepStatus,
    pub problem: Option<String>,
}
