pub mod attempt_ctx;
pub mod connect_flow;
pub mod form_flow;
pub mod form_state;
pub mod outreach;

pub use attempt_ctx::AttemptCtx;
pub use connect_flow::{clip_note, invitation_prompt, ConnectFlow, ConnectSettings};
pub use form_flow::{AttemptOutcome, FlowSettings, FormFlow, FormPage};
pub use form_state::{
    landing_state, settle_validation, transition, Effect, FormState, PendingUploads, Transition,
    ValidationVerdict,
};
pub use outreach::Outreach;
