/// Defines session phases and which inputs they accept
pub trait Phase: Copy + Clone + PartialEq + Send + Sync + std::fmt::Debug + Default {
    /// Whether the per-trial "advance" input may start a trial.
    fn allows_advance(&self) -> bool;
    /// Whether the dedicated "continue" input is being waited on.
    fn awaits_continue(&self) -> bool;
    fn next(&self) -> Option<Self>;

    fn is_complete(&self) -> bool {
        false
    }
}

#[derive(Copy, Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Welcome,
    Training,
    Block,
    Break,
    Complete,
}

impl Phase for SessionPhase {
    fn allows_advance(&self) -> bool {
        matches!(self, Self::Welcome | Self::Training | Self::Block)
    }

    fn awaits_continue(&self) -> bool {
        matches!(self, Self::Break)
    }

    /// Nominal successor. Whether training is skipped or a break leads to the
    /// end is decided by the controller, which knows the block plan.
    fn next(&self) -> Option<Self> {
        use SessionPhase::*;
        Some(match self {
            Welcome => Training,
            Training => Break,
            Block => Break,
            Break => Block,
            Complete => return None,
        })
    }

    fn is_complete(&self) -> bool {
        matches!(self, SessionPhase::Complete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn break_only_accepts_continue() {
        assert!(!SessionPhase::Break.allows_advance());
        assert!(SessionPhase::Break.awaits_continue());
        assert!(SessionPhase::Block.allows_advance());
        assert!(!SessionPhase::Block.awaits_continue());
    }

    #[test]
    fn complete_is_terminal() {
        assert_eq!(SessionPhase::Complete.next(), None);
        assert!(!SessionPhase::Complete.allows_advance());
    }
}
