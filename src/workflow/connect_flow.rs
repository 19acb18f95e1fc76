//! 好友邀请流程 - 流程层
//!
//! 核心职责：对一个个人主页发送一次带留言的好友邀请
//!
//! 流程顺序：
//! 1. 打开个人主页，已有待处理的邀请 → `AlreadyDone`，没有邀请入口 → `Blocked`
//! 2. 点击 "Connect"；主按钮不存在时走 "More" → 下拉菜单中的 "Connect"
//! 3. 让 Oracle 根据主页摘要生成留言，截断到字符上限后写入
//! 4. 发送邀请
//!
//! 留言失败不影响发送；找不到 Connect 或发送按钮时本次尝试以 `Abandoned` 结束。

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::models::{Control, ProfileCard, Target};
use crate::services::AnswerResolver;
use crate::utils::{parse_page_title, truncate_text};
use crate::workflow::attempt_ctx::AttemptCtx;
use crate::workflow::form_flow::{AttemptOutcome, FormPage};
use crate::workflow::form_state::{landing_state, FormState};

/// 主页摘要在提示词中的最大长度
const PROFILE_SUMMARY_CHARS: usize = 1500;

/// 邀请流程设置
#[derive(Debug, Clone)]
pub struct ConnectSettings {
    /// 留言字符上限（站点限制 300）
    pub note_max_chars: usize,
    /// 留言中的本人名字
    pub sender_name: String,
    /// 每次点击后等待页面稳定
    pub settle_delay: Duration,
}

impl ConnectSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            note_max_chars: config.note_max_chars,
            sender_name: config.sender_name.clone(),
            settle_delay: config.settle_delay(),
        }
    }
}

/// 好友邀请流程
///
/// - 只依赖 `FormPage` 与答案解析服务
/// - 不持有页面资源
pub struct ConnectFlow {
    settings: ConnectSettings,
}

impl ConnectFlow {
    pub fn new(settings: ConnectSettings) -> Self {
        Self { settings }
    }

    pub async fn run(
        &self,
        page: &mut dyn FormPage,
        target: &Target,
        resolver: &AnswerResolver,
        ctx: &AttemptCtx,
    ) -> AttemptOutcome {
        let mut outcome = AttemptOutcome {
            state: FormState::Started,
            attempted: false,
            title: target.title.clone(),
            company: target.company.clone(),
        };

        // ========== 个人主页检查 ==========
        let landing = match page.open_target(target).await {
            Ok(landing) => landing,
            Err(e) => {
                warn!("{} ⚠️ 无法打开个人主页: {}", ctx, e);
                outcome.state = FormState::Abandoned;
                return outcome;
            }
        };
        if outcome.title.is_empty() {
            outcome.title = parse_page_title(&landing.page_title).0;
        }

        match landing_state(&landing) {
            FormState::AlreadyDone => {
                info!("{} ⏭️ 邀请已发送过，跳过", ctx);
                outcome.state = FormState::AlreadyDone;
                return outcome;
            }
            FormState::Blocked => {
                info!("{} ⏭️ 没有邀请入口，跳过", ctx);
                outcome.state = FormState::Blocked;
                return outcome;
            }
            _ => {}
        }

        let profile = page.read_profile().await.unwrap_or_else(|e| {
            debug!("{} 无法读取主页摘要: {}", ctx, e);
            ProfileCard::default()
        });

        // ========== 打开邀请对话框 ==========
        outcome.attempted = true;
        if let Err(e) = self.open_invitation(page, ctx).await {
            warn!("{} ⚠️ {}", ctx, e);
            outcome.state = FormState::Abandoned;
            return outcome;
        }

        // ========== 留言 ==========
        match self.compose_note(resolver, &profile).await {
            Some(note) => match self.add_note(page, &note).await {
                Ok(()) => info!("{} 📝 已添加留言 ({} 字)", ctx, note.chars().count()),
                Err(e) => warn!("{} ⚠️ 添加留言失败，直接发送: {}", ctx, e),
            },
            None => warn!("{} ⚠️ 没有生成留言，直接发送", ctx),
        }

        // ========== 发送 ==========
        if let Err(e) = page.click(Control::SendInvitation).await {
            warn!("{} ⚠️ 无法发送邀请: {}", ctx, e);
            outcome.state = FormState::Abandoned;
            return outcome;
        }
        info!("{} ✅ 邀请已发送", ctx);
        outcome.state = FormState::Submitted;
        outcome
    }

    /// 先点主按钮，失败时从 "More" 菜单中点击
    async fn open_invitation(&self, page: &mut dyn FormPage, ctx: &AttemptCtx) -> anyhow::Result<()> {
        match page.click(Control::Connect).await {
            Ok(()) => {
                self.settle().await;
                return Ok(());
            }
            Err(e) => debug!("{} 主按钮不可用，尝试 More 菜单: {}", ctx, e),
        }

        page.click(Control::More)
            .await
            .map_err(|e| anyhow::anyhow!("找不到 More 菜单: {}", e))?;
        self.settle().await;
        page.click(Control::MenuConnect)
            .await
            .map_err(|e| anyhow::anyhow!("菜单中没有 Connect: {}", e))?;
        self.settle().await;
        Ok(())
    }

    async fn compose_note(&self, resolver: &AnswerResolver, profile: &ProfileCard) -> Option<String> {
        let prompt = invitation_prompt(&self.settings.sender_name, profile);
        let text = resolver.compose(&prompt).await?;
        let note = clip_note(&text, self.settings.note_max_chars);
        (!note.is_empty()).then_some(note)
    }

    async fn add_note(&self, page: &mut dyn FormPage, note: &str) -> anyhow::Result<()> {
        page.click(Control::AddNote).await?;
        self.settle().await;
        page.write_note(note).await
    }

    async fn settle(&self) {
        if !self.settings.settle_delay.is_zero() {
            sleep(self.settings.settle_delay).await;
        }
    }
}

/// 邀请留言的提示词
pub fn invitation_prompt(sender_name: &str, profile: &ProfileCard) -> String {
    let recipient = if profile.first_name.trim().is_empty() {
        "unknown (address them with just \"Hi!\")".to_string()
    } else {
        profile.first_name.trim().to_string()
    };

    let mut prompt = format!(
        "I am sending a connection request to someone on LinkedIn. \
         Write the note for the request in less than 200 characters, polite and professional, \
         saying why I would like to connect. The person's name is {}.",
        recipient
    );
    if !sender_name.trim().is_empty() {
        prompt.push_str(&format!(" My name is {}.", sender_name.trim()));
    }
    if !profile.summary.trim().is_empty() {
        prompt.push_str(&format!(
            " Their profile: {}.",
            truncate_text(profile.summary.trim(), PROFILE_SUMMARY_CHARS)
        ));
    }
    prompt.push_str(" Do not leave any placeholders; the note is sent exactly as written.");
    prompt
}

/// 去掉换行后按字符数截断
pub fn clip_note(text: &str, max_chars: usize) -> String {
    let flat = text.replace(['\r', '\n'], " ");
    flat.trim().chars().take(max_chars).collect::<String>().trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LandingPage, PageSnapshot, RawField, UploadSlot};
    use crate::services::{
        AnswerCache, FieldAction, Oracle, OracleError, OracleRequest, ProfileFacts, StaticAnswers,
    };
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    /// 固定返回留言并记录提示词的 Oracle
    struct NoteOracle {
        note: Option<String>,
        prompts: Mutex<Vec<String>>,
    }

    impl NoteOracle {
        fn new(note: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                note: note.map(str::to_string),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Oracle for NoteOracle {
        async fn answer(&self, request: &OracleRequest<'_>) -> Result<String, OracleError> {
            self.prompts.lock().unwrap().push(request.question.to_string());
            self.note.clone().ok_or(OracleError::Empty)
        }
    }

    /// 个人主页假页面：`missing` 中的控件点击失败
    #[derive(Default)]
    struct ProfilePage {
        landing: LandingPage,
        profile: ProfileCard,
        missing: Vec<Control>,
        clicks: Vec<Control>,
        notes: Vec<String>,
    }

    #[async_trait]
    impl FormPage for ProfilePage {
        async fn open_target(&mut self, _target: &Target) -> Result<LandingPage> {
            Ok(self.landing.clone())
        }
        async fn observe(&mut self) -> Result<PageSnapshot> {
            Ok(PageSnapshot::default())
        }
        async fn read_fields(&mut self) -> Result<Vec<RawField>> {
            Ok(Vec::new())
        }
        async fn apply(&mut self, _index: usize, _action: &FieldAction) -> Result<()> {
            Ok(())
        }
        async fn upload(&mut self, _slot: UploadSlot, _path: &Path) -> Result<()> {
            Ok(())
        }
        async fn click(&mut self, control: Control) -> Result<()> {
            if self.missing.contains(&control) {
                bail!("找不到控件 {:?}", control);
            }
            self.clicks.push(control);
            Ok(())
        }
        async fn read_profile(&mut self) -> Result<ProfileCard> {
            Ok(self.profile.clone())
        }
        async fn write_note(&mut self, text: &str) -> Result<()> {
            self.notes.push(text.to_string());
            Ok(())
        }
    }

    fn settings(max_chars: usize) -> ConnectSettings {
        ConnectSettings {
            note_max_chars: max_chars,
            sender_name: "Alex".to_string(),
            settle_delay: Duration::ZERO,
        }
    }

    fn resolver(dir: &tempfile::TempDir, oracle: Arc<dyn Oracle>) -> AnswerResolver {
        let cache = AnswerCache::open(dir.path().join("qa.csv")).unwrap();
        AnswerResolver::new(cache, oracle, StaticAnswers::default(), ProfileFacts::default())
    }

    fn person() -> Target {
        Target {
            id: "jane-doe-123".to_string(),
            title: "Staff Engineer".to_string(),
            company: "Acme".to_string(),
            cursor: 0,
        }
    }

    fn profile_page() -> ProfilePage {
        ProfilePage {
            landing: LandingPage {
                page_title: "(4) Jane Doe | LinkedIn".to_string(),
                already_done: false,
                entry_available: true,
            },
            profile: ProfileCard {
                first_name: "Jane".to_string(),
                summary: "Experience: Staff Engineer at Acme".to_string(),
            },
            ..ProfilePage::default()
        }
    }

    #[tokio::test]
    async fn test_invitation_with_note_from_primary_button() {
        let dir = tempfile::tempdir().unwrap();
        let oracle = NoteOracle::new(Some("Hi Jane,\nlet's connect!"));
        let mut page = profile_page();

        let outcome = ConnectFlow::new(settings(300))
            .run(&mut page, &person(), &resolver(&dir, oracle.clone()), &AttemptCtx::new("jane", 1))
            .await;

        assert_eq!(outcome.state, FormState::Submitted);
        assert!(outcome.attempted);
        assert_eq!(
            page.clicks,
            vec![Control::Connect, Control::AddNote, Control::SendInvitation]
        );
        assert_eq!(page.notes, vec!["Hi Jane, let's connect!".to_string()]);

        let prompts = oracle.prompts.lock().unwrap();
        assert!(prompts[0].contains("Jane"));
        assert!(prompts[0].contains("My name is Alex"));
        assert!(prompts[0].contains("Staff Engineer at Acme"));
    }

    #[tokio::test]
    async fn test_falls_back_to_more_menu() {
        let dir = tempfile::tempdir().unwrap();
        let mut page = ProfilePage {
            missing: vec![Control::Connect],
            ..profile_page()
        };

        let outcome = ConnectFlow::new(settings(300))
            .run(&mut page, &person(), &resolver(&dir, NoteOracle::new(Some("Hello!"))), &AttemptCtx::new("jane", 1))
            .await;

        assert_eq!(outcome.state, FormState::Submitted);
        assert_eq!(
            page.clicks,
            vec![
                Control::More,
                Control::MenuConnect,
                Control::AddNote,
                Control::SendInvitation
            ]
        );
    }

    #[tokio::test]
    async fn test_no_connect_anywhere_is_abandoned() {
        let dir = tempfile::tempdir().unwrap();
        let mut page = ProfilePage {
            missing: vec![Control::Connect, Control::MenuConnect],
            ..profile_page()
        };

        let outcome = ConnectFlow::new(settings(300))
            .run(&mut page, &person(), &resolver(&dir, NoteOracle::new(Some("Hello!"))), &AttemptCtx::new("jane", 1))
            .await;

        assert_eq!(outcome.state, FormState::Abandoned);
        assert!(outcome.attempted);
        assert!(!page.clicks.contains(&Control::SendInvitation));
    }

    #[tokio::test]
    async fn test_note_is_truncated_to_limit() {
        let dir = tempfile::tempdir().unwrap();
        let long = "x".repeat(500);
        let mut page = profile_page();

        ConnectFlow::new(settings(300))
            .run(&mut page, &person(), &resolver(&dir, NoteOracle::new(Some(long.as_str()))), &AttemptCtx::new("jane", 1))
            .await;

        assert_eq!(page.notes.len(), 1);
        assert_eq!(page.notes[0].chars().count(), 300);
    }

    #[tokio::test]
    async fn test_oracle_failure_still_sends_without_note() {
        let dir = tempfile::tempdir().unwrap();
        let mut page = profile_page();

        let outcome = ConnectFlow::new(settings(300))
            .run(&mut page, &person(), &resolver(&dir, NoteOracle::new(None)), &AttemptCtx::new("jane", 1))
            .await;

        assert_eq!(outcome.state, FormState::Submitted);
        assert_eq!(page.clicks, vec![Control::Connect, Control::SendInvitation]);
        assert!(page.notes.is_empty());
    }

    #[tokio::test]
    async fn test_pending_invitation_is_already_done() {
        let dir = tempfile::tempdir().unwrap();
        let oracle = NoteOracle::new(Some("Hello!"));
        let mut page = ProfilePage {
            landing: LandingPage {
                already_done: true,
                ..profile_page().landing
            },
            ..profile_page()
        };

        let outcome = ConnectFlow::new(settings(300))
            .run(&mut page, &person(), &resolver(&dir, oracle.clone()), &AttemptCtx::new("jane", 1))
            .await;

        assert_eq!(outcome.state, FormState::AlreadyDone);
        assert!(!outcome.attempted);
        assert!(page.clicks.is_empty());
        assert!(oracle.prompts.lock().unwrap().is_empty());
    }

    #[test]
    fn test_clip_note_counts_characters() {
        assert_eq!(clip_note("你好，很高兴认识你", 4), "你好，很");
        assert_eq!(clip_note("  line one\nline two  ", 300), "line one line two");
        assert_eq!(clip_note("ab cd", 3), "ab");
    }

    #[test]
    fn test_prompt_without_name_asks_for_plain_greeting() {
        let prompt = invitation_prompt("", &ProfileCard::default());
        assert!(prompt.contains("Hi!"));
        assert!(!prompt.contains("My name is"));
        assert!(!prompt.contains("Their profile"));
    }
}
