pub mod alert;
pub mod poller;
pub mod state;

pub use alert::{AlertController, AlertError, AlertSettings};
pub use poller::{PollerSettings, ReminderPoller, ScanScope, TickOutcome};
pub use state::AlertMode;
