/// High-level response after a surface error.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SurfaceErrorAction {
    /// Surface was reconfigured; rendering may resume next frame.
    Reconfigured,
    /// Transient error; skip the current frame.
    SkipFrame,
    /// Fatal error (commonly OOM); the context is lost.
    Fatal,
}

impl SurfaceErrorAction {
    /// Whether the frame loop may keep ticking after this action.
    #[inline]
    pub fn is_recoverable(self) -> bool {
        !matches!(self, Self::Fatal)
    }
}
