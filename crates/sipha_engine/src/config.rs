//! Replication strategy and engine configuration.

use sipha_snapshot::DialogState;

/// Process-wide replication strategy.
///
/// Selected at stack startup and immutable thereafter. Governs which
/// dialog states and response classes trigger a cache write, whether
/// transactions are replicated at all, and whether application data may
/// travel with the dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicationStrategy {
    /// Replicate early and confirmed dialogs, and transactions.
    ///
    /// The only strategy that replicates transactions: an early dialog
    /// may not yet exist as a confirmed object, so the transaction is
    /// the unit of recovery.
    EarlyDialog,
    /// Replicate confirmed dialogs only.
    ConfirmedDialog,
    /// Replicate confirmed dialogs only, never application data.
    ConfirmedDialogNoAppData,
}

impl ReplicationStrategy {
    /// Returns true if transactions are replicated under this strategy.
    pub fn replicates_transactions(self) -> bool {
        matches!(self, ReplicationStrategy::EarlyDialog)
    }

    /// Returns true if application data may ever be replicated.
    pub fn replicates_application_data(self) -> bool {
        !matches!(self, ReplicationStrategy::ConfirmedDialogNoAppData)
    }

    /// Returns true if a dialog in `state` is replication-worthy.
    pub fn replicates_dialog_state(self, state: DialogState) -> bool {
        match self {
            ReplicationStrategy::EarlyDialog => {
                matches!(state, DialogState::Early | DialogState::Confirmed)
            }
            ReplicationStrategy::ConfirmedDialog
            | ReplicationStrategy::ConfirmedDialogNoAppData => {
                matches!(state, DialogState::Confirmed)
            }
        }
    }

    /// Returns true if a response with `status` is replication-worthy.
    pub fn replicates_response(self, status: u16) -> bool {
        match self {
            ReplicationStrategy::EarlyDialog => status >= 101,
            ReplicationStrategy::ConfirmedDialog
            | ReplicationStrategy::ConfirmedDialogNoAppData => status >= 200,
        }
    }
}

/// Configuration for the replication engine.
#[derive(Debug, Clone)]
pub struct ReplicationConfig {
    /// The process-wide strategy.
    pub strategy: ReplicationStrategy,
    /// Application-data toggle, independent of the strategy.
    ///
    /// Effective only when the strategy also permits application data.
    pub replicate_application_data: bool,
}

impl ReplicationConfig {
    /// Creates a configuration for the given strategy.
    pub fn new(strategy: ReplicationStrategy) -> Self {
        Self {
            strategy,
            replicate_application_data: strategy.replicates_application_data(),
        }
    }

    /// Sets the application-data toggle.
    pub fn with_application_data(mut self, replicate: bool) -> Self {
        self.replicate_application_data = replicate;
        self
    }

    /// Returns true if application data should actually be replicated.
    pub fn application_data_enabled(&self) -> bool {
        self.replicate_application_data && self.strategy.replicates_application_data()
    }
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self::new(ReplicationStrategy::ConfirmedDialog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_replication_is_early_dialog_only() {
        assert!(ReplicationStrategy::EarlyDialog.replicates_transactions());
        assert!(!ReplicationStrategy::ConfirmedDialog.replicates_transactions());
        assert!(!ReplicationStrategy::ConfirmedDialogNoAppData.replicates_transactions());
    }

    #[test]
    fn dialog_state_gating() {
        let early = ReplicationStrategy::EarlyDialog;
        assert!(early.replicates_dialog_state(DialogState::Early));
        assert!(early.replicates_dialog_state(DialogState::Confirmed));
        assert!(!early.replicates_dialog_state(DialogState::Terminated));

        let confirmed = ReplicationStrategy::ConfirmedDialog;
        assert!(!confirmed.replicates_dialog_state(DialogState::Early));
        assert!(confirmed.replicates_dialog_state(DialogState::Confirmed));
        assert!(!confirmed.replicates_dialog_state(DialogState::Terminated));
    }

    #[test]
    fn response_gating() {
        let early = ReplicationStrategy::EarlyDialog;
        assert!(!early.replicates_response(100));
        assert!(early.replicates_response(101));
        assert!(early.replicates_response(180));
        assert!(early.replicates_response(200));

        let confirmed = ReplicationStrategy::ConfirmedDialog;
        assert!(!confirmed.replicates_response(180));
        assert!(confirmed.replicates_response(200));
    }

    #[test]
    fn app_data_toggle_is_anded_with_strategy() {
        let config = ReplicationConfig::new(ReplicationStrategy::ConfirmedDialog);
        assert!(config.application_data_enabled());

        let config = config.with_application_data(false);
        assert!(!config.application_data_enabled());

        // The strategy wins even if the toggle is forced on.
        let config = ReplicationConfig::new(ReplicationStrategy::ConfirmedDialogNoAppData)
            .with_application_data(true);
        assert!(!config.application_data_enabled());
    }
}
