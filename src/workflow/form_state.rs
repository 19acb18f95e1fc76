//! 表单状态机 - 纯转移函数
//!
//! 每一轮观察页面得到 `PageSnapshot`，由 [`transition`] 计算下一个状态
//! 以及本轮要执行的动作（`Effect`）。这里不接触页面，动作由
//! [`crate::workflow::FormFlow`] 执行。
//!
//! 每轮的判断顺序：
//! 1. 有待上传的附件 → 上传（不影响状态）；否则未勾选的"关注公司" → 勾选
//! 2. 提交按钮 → 回答问题 → 提交 → `Submitted`
//! 3. 校验错误 → 页面已显示发送成功则 `Submitted`，否则回答问题并轮询
//! 4. 下一步 / 检查按钮 → 回答问题 → 点击
//! 5. 都没有 → 保持当前状态，由调用方计入停滞次数

use crate::models::{Control, LandingPage, PageSnapshot, UploadSlot};

/// 表单状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormState {
    Started,
    AwaitUpload,
    AwaitAnswers,
    AwaitNext,
    AwaitReview,
    AwaitSubmit,
    Submitted,
    AlreadyDone,
    Blocked,
    Abandoned,
}

impl FormState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            FormState::Submitted | FormState::AlreadyDone | FormState::Blocked | FormState::Abandoned
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            FormState::Started => "STARTED",
            FormState::AwaitUpload => "AWAIT_UPLOAD",
            FormState::AwaitAnswers => "AWAIT_ANSWERS",
            FormState::AwaitNext => "AWAIT_NEXT",
            FormState::AwaitReview => "AWAIT_REVIEW",
            FormState::AwaitSubmit => "AWAIT_SUBMIT",
            FormState::Submitted => "SUBMITTED",
            FormState::AlreadyDone => "ALREADY_DONE",
            FormState::Blocked => "BLOCKED",
            FormState::Abandoned => "ABANDONED",
        }
    }
}

/// 一轮中要执行的动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Upload(UploadSlot),
    FollowCompany,
    /// 分类并回答当前步骤的问题
    ResolveFields,
    Click(Control),
    /// 等待校验错误消失
    PollValidation,
}

/// 还没有上传、并且已配置文件的附件
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingUploads {
    pub resume: bool,
    pub cover_letter: bool,
}

impl PendingUploads {
    pub fn is_pending(&self, slot: UploadSlot) -> bool {
        match slot {
            UploadSlot::Resume => self.resume,
            UploadSlot::CoverLetter => self.cover_letter,
        }
    }
}

/// 转移结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: FormState,
    pub effects: Vec<Effect>,
}

impl Transition {
    /// 本轮是否点击了推进表单的按钮
    pub fn advances(&self) -> bool {
        self.effects.iter().any(|e| {
            matches!(
                e,
                Effect::Click(Control::Next | Control::Review | Control::Submit)
            )
        })
    }
}

/// 落地页检查：之前已完成 / 没有入口 / 可以开始
pub fn landing_state(landing: &LandingPage) -> FormState {
    if landing.already_done {
        FormState::AlreadyDone
    } else if !landing.entry_available {
        FormState::Blocked
    } else {
        FormState::Started
    }
}

/// 计算一轮的转移
pub fn transition(state: FormState, snapshot: &PageSnapshot, pending: PendingUploads) -> Transition {
    if state.is_terminal() {
        return Transition {
            next: state,
            effects: Vec::new(),
        };
    }

    let mut effects = Vec::new();

    let uploads: Vec<UploadSlot> = [UploadSlot::Resume, UploadSlot::CoverLetter]
        .into_iter()
        .filter(|slot| pending.is_pending(*slot) && snapshot.offers_upload(*slot))
        .collect();
    let uploading = !uploads.is_empty();

    if uploading {
        effects.extend(uploads.into_iter().map(Effect::Upload));
    } else if snapshot.follow_company == Some(false) && !snapshot.error_indicator {
        effects.push(Effect::FollowCompany);
    }

    let resolve = |effects: &mut Vec<Effect>| {
        if snapshot.has_questions {
            effects.push(Effect::ResolveFields);
        }
    };

    let next = if snapshot.submit {
        resolve(&mut effects);
        effects.push(Effect::Click(Control::Submit));
        FormState::Submitted
    } else if snapshot.error_indicator {
        if snapshot.success_text {
            FormState::Submitted
        } else {
            resolve(&mut effects);
            effects.push(Effect::PollValidation);
            FormState::AwaitAnswers
        }
    } else if snapshot.next {
        resolve(&mut effects);
        effects.push(Effect::Click(Control::Next));
        FormState::AwaitNext
    } else if snapshot.review {
        resolve(&mut effects);
        effects.push(Effect::Click(Control::Review));
        FormState::AwaitSubmit
    } else if uploading {
        FormState::AwaitUpload
    } else {
        state
    };

    Transition { next, effects }
}

/// 校验错误轮询时的一次判断
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationVerdict {
    /// 页面显示已经发送
    Sent,
    /// 入口按钮重新出现，表单已关闭
    EntryReappeared,
    /// 错误提示已消失
    Cleared,
    /// 仍在等待
    Pending,
}

pub fn settle_validation(snapshot: &PageSnapshot) -> ValidationVerdict {
    if snapshot.success_text {
        ValidationVerdict::Sent
    } else if snapshot.entry_button {
        ValidationVerdict::EntryReappeared
    } else if !snapshot.error_indicator {
        ValidationVerdict::Cleared
    } else {
        ValidationVerdict::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn none_pending() -> PendingUploads {
        PendingUploads::default()
    }

    #[test]
    fn test_submit_only_step_submits_in_one_iteration() {
        let snapshot = PageSnapshot {
            submit: true,
            ..PageSnapshot::default()
        };
        let t = transition(FormState::Started, &snapshot, none_pending());

        assert_eq!(t.next, FormState::Submitted);
        assert_eq!(t.effects, vec![Effect::Click(Control::Submit)]);
    }

    #[test]
    fn test_questions_are_resolved_before_submit() {
        let snapshot = PageSnapshot {
            submit: true,
            has_questions: true,
            ..PageSnapshot::default()
        };
        let t = transition(FormState::AwaitSubmit, &snapshot, none_pending());
        assert_eq!(
            t.effects,
            vec![Effect::ResolveFields, Effect::Click(Control::Submit)]
        );
    }

    #[test]
    fn test_upload_happens_alongside_step_progression() {
        let snapshot = PageSnapshot {
            upload_resume: true,
            upload_cover_letter: true,
            follow_company: Some(false),
            next: true,
            ..PageSnapshot::default()
        };
        let pending = PendingUploads {
            resume: true,
            cover_letter: false,
        };
        let t = transition(FormState::Started, &snapshot, pending);

        // 上传时不勾选关注
        assert_eq!(
            t.effects,
            vec![Effect::Upload(UploadSlot::Resume), Effect::Click(Control::Next)]
        );
        assert_eq!(t.next, FormState::AwaitNext);
    }

    #[test]
    fn test_upload_only_step_waits_for_upload() {
        let snapshot = PageSnapshot {
            upload_resume: true,
            ..PageSnapshot::default()
        };
        let pending = PendingUploads {
            resume: true,
            cover_letter: false,
        };
        let t = transition(FormState::Started, &snapshot, pending);
        assert_eq!(t.next, FormState::AwaitUpload);
        assert!(!t.advances());
    }

    #[test]
    fn test_follow_company_is_idempotent() {
        let unchecked = PageSnapshot {
            follow_company: Some(false),
            submit: true,
            ..PageSnapshot::default()
        };
        let first = transition(FormState::AwaitSubmit, &unchecked, none_pending());
        assert_eq!(first.effects[0], Effect::FollowCompany);

        let checked = PageSnapshot {
            follow_company: Some(true),
            ..unchecked
        };
        let second = transition(FormState::AwaitSubmit, &checked, none_pending());
        assert!(!second.effects.contains(&Effect::FollowCompany));
    }

    #[test]
    fn test_follow_company_skipped_when_blocked_by_error() {
        let snapshot = PageSnapshot {
            follow_company: Some(false),
            error_indicator: true,
            ..PageSnapshot::default()
        };
        let t = transition(FormState::AwaitNext, &snapshot, none_pending());
        assert!(!t.effects.contains(&Effect::FollowCompany));
        assert_eq!(t.effects.last(), Some(&Effect::PollValidation));
        assert_eq!(t.next, FormState::AwaitAnswers);
    }

    #[test]
    fn test_error_with_success_text_is_submitted() {
        let snapshot = PageSnapshot {
            error_indicator: true,
            success_text: true,
            ..PageSnapshot::default()
        };
        let t = transition(FormState::AwaitAnswers, &snapshot, none_pending());
        assert_eq!(t.next, FormState::Submitted);
    }

    #[test]
    fn test_next_then_review() {
        let next = PageSnapshot {
            next: true,
            has_questions: true,
            ..PageSnapshot::default()
        };
        let t = transition(FormState::Started, &next, none_pending());
        assert_eq!(t.next, FormState::AwaitNext);
        assert_eq!(
            t.effects,
            vec![Effect::ResolveFields, Effect::Click(Control::Next)]
        );
        assert!(t.advances());

        let review = PageSnapshot {
            review: true,
            ..PageSnapshot::default()
        };
        let t = transition(FormState::AwaitNext, &review, none_pending());
        assert_eq!(t.next, FormState::AwaitSubmit);
        assert_eq!(t.effects, vec![Effect::Click(Control::Review)]);
    }

    #[test]
    fn test_no_controls_keeps_state() {
        let t = transition(FormState::AwaitNext, &PageSnapshot::default(), none_pending());
        assert_eq!(t.next, FormState::AwaitNext);
        assert!(t.effects.is_empty());
    }

    #[test]
    fn test_terminal_state_is_final() {
        let snapshot = PageSnapshot {
            submit: true,
            ..PageSnapshot::default()
        };
        let t = transition(FormState::Abandoned, &snapshot, none_pending());
        assert_eq!(t.next, FormState::Abandoned);
        assert!(t.effects.is_empty());
    }

    #[test]
    fn test_landing_state() {
        let done = LandingPage {
            already_done: true,
            entry_available: true,
            ..LandingPage::default()
        };
        assert_eq!(landing_state(&done), FormState::AlreadyDone);

        let closed = LandingPage::default();
        assert_eq!(landing_state(&closed), FormState::Blocked);

        let open = LandingPage {
            entry_available: true,
            ..LandingPage::default()
        };
        assert_eq!(landing_state(&open), FormState::Started);
    }

    #[test]
    fn test_settle_validation_order() {
        let sent = PageSnapshot {
            success_text: true,
            entry_button: true,
            ..PageSnapshot::default()
        };
        assert_eq!(settle_validation(&sent), ValidationVerdict::Sent);

        let closed = PageSnapshot {
            entry_button: true,
            error_indicator: true,
            ..PageSnapshot::default()
        };
        assert_eq!(settle_validation(&closed), ValidationVerdict::EntryReappeared);

        let waiting = PageSnapshot {
            error_indicator: true,
            ..PageSnapshot::default()
        };
        assert_eq!(settle_validation(&waiting), ValidationVerdict::Pending);
        assert_eq!(settle_validation(&PageSnapshot::default()), ValidationVerdict::Cleared);
    }
}
