use api_types::ExtensionUuid;
use derive_more::Display;

/// Lifecycle of an [`super::ExtensionServer`], published on a watch channel.
#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum ServerState {
    #[display("unregistered")]
    Unregistered,

    #[display("registering")]
    Registering,

    #[display("serving as extension {uuid}")]
    Serving { uuid: ExtensionUuid },

    /// registration never completed
    #[display("failed: {reason}")]
    Failed { reason: String },

    #[display("terminated: {reason}")]
    Terminated { reason: String },
}

impl ServerState {
    /// No further transitions follow.
    pub fn is_final(&self) -> bool {
        matches!(self, ServerState::Failed { .. } | ServerState::Terminated { .. })
    }
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    #[test]
    fn final_states() {
        assert!(!ServerState::Unregistered.is_final());
        assert!(!ServerState::Serving { uuid: 3 }.is_final());
        assert!(ServerState::Failed {
            reason: "refused".into()
        }
        .is_final());
        assert!(ServerState::Terminated {
            reason: "shutdown".into()
        }
        .is_final());
    }

    #[test]
    fn display() {
        assert_eq!(
            ServerState::Serving { uuid: 7 }.to_string(),
            "serving as extension 7"
        );
    }
}
