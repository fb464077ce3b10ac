use crate::MonitorMode;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ArtifactingError {
    #[error("unable to reserve {bytes} bytes of frame history")]
    Allocation { bytes: usize },
    #[error("tint color requires a monochrome monitor, got {monitor:?}")]
    TintWithColorMonitor { monitor: MonitorMode },
    #[error("color correction matrix cannot be combined with monochrome monitor {monitor:?}")]
    CorrectionWithMonoMonitor { monitor: MonitorMode },
    #[error("gamma correction must be finite and positive, got {0}")]
    InvalidGamma(f32),
}
