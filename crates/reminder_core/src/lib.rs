pub mod domain;
pub mod ports;
pub mod recurrence;

pub use domain::{AlertSession, Clip, Frequency, Reminder, ReminderId, TimeRange};
pub use ports::{
    AlertSurface, AudioPlayer, DismissSignal, PortError, PortResult, ReminderStore,
    SpeechSynthesizer,
};
pub use recurrence::{advance, advance_past, first_due_at};
