// Feature modules - one directory per user-facing capability

pub mod digest;
pub mod notes;
pub mod reminders;
pub mod tasks;

pub use digest::DigestScheduler;
pub use notes::NotesController;
pub use reminders::{parse_remind_time, ReminderScheduler, RemindersController};
pub use tasks::TasksController;
