pub mod form;
pub mod quota;
pub mod record;
pub mod target;

pub use form::{
    Control, FieldDescriptor, FieldKind, FormStep, LandingPage, PageSnapshot, ProfileCard,
    RawField, UploadSlot,
};
pub use quota::{ActedEntry, QuotaState, SlotKeys};
pub use record::ApplicationRecord;
pub use target::{RawTarget, Target};
