//! 基于 chromiumoxide 的表单驱动 - 基础设施层
//!
//! 通过 `JsExecutor` 注入脚本来观察和操作表单，选择器集中在 `Locators` 中

use std::path::Path;

use anyhow::{bail, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::config::{Config, OutreachMode};
use crate::infrastructure::JsExecutor;
use crate::models::{
    Control, LandingPage, PageSnapshot, ProfileCard, RawField, Target, UploadSlot,
};
use crate::services::FieldAction;
use crate::workflow::FormPage;

/// 页面选择器与标记文字
#[derive(Debug, Clone)]
pub struct Locators {
    pub entry: String,
    pub next: String,
    pub review: String,
    pub submit: String,
    pub error: String,
    pub upload_resume: String,
    pub upload_cover_letter: String,
    pub follow_input: String,
    pub follow_label: String,
    pub field_group: String,
    pub text_input: String,
    /// 落地页上表示之前已完成的文字（为空时不检查）
    pub already_done_marker: String,
    /// 落地页上表示之前已完成的元素（为空时不检查）
    pub already_done_selector: String,
    /// 表示已经发送成功的文字
    pub success_marker: String,

    // --- 个人主页 ---
    /// 主按钮，按文字 `connect_text` 匹配
    pub connect_button: String,
    pub more_button: String,
    /// 下拉菜单项，按文字 `connect_text` 匹配
    pub menu_item: String,
    pub connect_text: String,
    pub add_note: String,
    pub note_input: String,
    pub send_invitation: String,
    /// aria-label 形如 "Invite Jane to connect" 的元素
    pub invite_label: String,
    pub profile_card: String,
}

impl Default for Locators {
    fn default() -> Self {
        Self {
            entry: "button.jobs-apply-button".to_string(),
            next: "button[aria-label='Continue to next step']".to_string(),
            review: "button[aria-label='Review your application']".to_string(),
            submit: "button[aria-label='Submit application']".to_string(),
            error: ".artdeco-inline-feedback__message".to_string(),
            upload_resume: "[id*='jobs-document-upload-file-input-upload-resume']".to_string(),
            upload_cover_letter: "[id*='jobs-document-upload-file-input-upload-cover-letter']"
                .to_string(),
            follow_input: "#follow-company-checkbox".to_string(),
            follow_label: "label[for='follow-company-checkbox']".to_string(),
            field_group: ".fb-dash-form-element".to_string(),
            text_input: "input.artdeco-text-input--input, input[type='text'], textarea".to_string(),
            already_done_marker: "You applied on".to_string(),
            already_done_selector: String::new(),
            success_marker: "application was sent".to_string(),
            connect_button: "button.artdeco-button--primary".to_string(),
            more_button: "button.artdeco-dropdown__trigger[aria-label*='More']".to_string(),
            menu_item: "div.artdeco-dropdown__item".to_string(),
            connect_text: "Connect".to_string(),
            add_note: "button[aria-label='Add a note']".to_string(),
            note_input: "#custom-message".to_string(),
            send_invitation: "button[aria-label='Send invitation'], button[aria-label='Send now'], \
                              button[aria-label='Send without a note']"
                .to_string(),
            invite_label: "[aria-label*='Invite'][aria-label*='to connect']".to_string(),
            profile_card: "section.artdeco-card.pv-profile-card".to_string(),
        }
    }
}

impl Locators {
    /// 按运行模式调整落地页检查：个人主页的入口是邀请按钮，已邀请时显示 "Pending"
    pub fn for_mode(mode: OutreachMode) -> Self {
        let base = Self::default();
        match mode {
            OutreachMode::Apply => base,
            OutreachMode::Connect => Self {
                entry: base.invite_label.clone(),
                already_done_marker: String::new(),
                already_done_selector: "button[aria-label*='Pending']".to_string(),
                ..base
            },
        }
    }

    fn control(&self, control: Control) -> Clickable<'_> {
        match control {
            Control::Entry => Clickable::Selector(&self.entry),
            Control::Next => Clickable::Selector(&self.next),
            Control::Review => Clickable::Selector(&self.review),
            Control::Submit => Clickable::Selector(&self.submit),
            Control::FollowCompany => Clickable::Selector(&self.follow_label),
            Control::Connect => Clickable::WithText(&self.connect_button, &self.connect_text),
            Control::More => Clickable::Selector(&self.more_button),
            Control::MenuConnect => Clickable::WithText(&self.menu_item, &self.connect_text),
            Control::AddNote => Clickable::Selector(&self.add_note),
            Control::SendInvitation => Clickable::Selector(&self.send_invitation),
        }
    }

    fn upload(&self, slot: UploadSlot) -> &str {
        match slot {
            UploadSlot::Resume => &self.upload_resume,
            UploadSlot::CoverLetter => &self.upload_cover_letter,
        }
    }
}

/// 点击目标：选择器，或选择器 + 元素文字
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Clickable<'a> {
    Selector(&'a str),
    WithText(&'a str, &'a str),
}

/// 基于浏览器的表单驱动
pub struct ChromiumFormPage {
    executor: JsExecutor,
    url_template: String,
    locators: Locators,
}

impl ChromiumFormPage {
    pub fn new(executor: JsExecutor, config: &Config) -> Self {
        Self {
            executor,
            url_template: config.target_url_template.clone(),
            locators: Locators::for_mode(config.mode),
        }
    }

    fn target_url(&self, target_id: &str) -> String {
        self.url_template.replace("{id}", target_id)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LandingScan {
    already_done: bool,
    entry_available: bool,
}

/// 把字符串编码为 JS 字面量
fn js_str(value: &str) -> String {
    json!(value).to_string()
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ProfileScan {
    invite_label: String,
    cards: Vec<String>,
}

fn landing_script(locators: &Locators) -> String {
    format!(
        r#"
        (() => {{
            const text = document.body ? document.body.innerText : "";
            const marker = {marker};
            const doneSel = {done};
            return {{
                alreadyDone: (marker !== "" && text.includes(marker))
                    || (doneSel !== "" && document.querySelector(doneSel) !== null),
                entryAvailable: document.querySelector({entry}) !== null
            }};
        }})()
        "#,
        marker = js_str(&locators.already_done_marker),
        done = js_str(&locators.already_done_selector),
        entry = js_str(&locators.entry),
    )
}

fn observe_script(locators: &Locators) -> String {
    format!(
        r#"
        (() => {{
            const has = (sel) => document.querySelector(sel) !== null;
            const follow = document.querySelector({follow});
            const text = document.body ? document.body.innerText : "";
            return {{
                uploadResume: has({resume}),
                uploadCoverLetter: has({cover}),
                followCompany: follow ? follow.checked === true : null,
                submit: has({submit}),
                next: has({next}),
                review: has({review}),
                errorIndicator: has({error}),
                entryButton: has({entry}),
                successText: text.includes({success}),
                hasQuestions: has({group})
            }};
        }})()
        "#,
        follow = js_str(&locators.follow_input),
        resume = js_str(&locators.upload_resume),
        cover = js_str(&locators.upload_cover_letter),
        submit = js_str(&locators.submit),
        next = js_str(&locators.next),
        review = js_str(&locators.review),
        error = js_str(&locators.error),
        entry = js_str(&locators.entry),
        success = js_str(&locators.success_marker),
        group = js_str(&locators.field_group),
    )
}

fn fields_script(locators: &Locators) -> String {
    format!(
        r#"
        (() => {{
            const groups = Array.from(document.querySelectorAll({group}));
            return groups.map((g) => {{
                const labelEl = g.querySelector("legend, label");
                const label = (labelEl ? labelEl.innerText : g.innerText) || "";
                return {{
                    label: label.trim(),
                    radioValues: Array.from(g.querySelectorAll("input[type='radio']")).map((r) => r.value),
                    textInputs: g.querySelectorAll({text}).length,
                    options: Array.from(g.querySelectorAll("select option")).map((o) => o.innerText.trim()),
                    hasFileInput: g.querySelector("input[type='file']") !== null
                }};
            }});
        }})()
        "#,
        group = js_str(&locators.field_group),
        text = js_str(&locators.text_input),
    )
}

fn apply_script(locators: &Locators, index: usize, action: &FieldAction) -> Option<String> {
    let body = match action {
        FieldAction::Fill(value) => format!(
            r#"
            const input = g.querySelector({text});
            if (!input) return false;
            const proto = input.tagName === "TEXTAREA" ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype;
            Object.getOwnPropertyDescriptor(proto, "value").set.call(input, {value});
            input.dispatchEvent(new Event("input", {{ bubbles: true }}));
            input.dispatchEvent(new Event("change", {{ bubbles: true }}));
            return true;
            "#,
            text = js_str(&locators.text_input),
            value = js_str(value),
        ),
        FieldAction::SelectRadio(value) => format!(
            r#"
            const radio = Array.from(g.querySelectorAll("input[type='radio']")).find((r) => r.value === {value});
            if (!radio) return false;
            radio.click();
            return true;
            "#,
            value = js_str(value),
        ),
        FieldAction::SelectOption { index: option, .. } => format!(
            r#"
            const select = g.querySelector("select");
            if (!select || select.options.length <= {option}) return false;
            select.selectedIndex = {option};
            select.dispatchEvent(new Event("change", {{ bubbles: true }}));
            return true;
            "#,
            option = option,
        ),
        FieldAction::Leave(_) => return None,
    };

    Some(format!(
        r#"
        (() => {{
            const g = document.querySelectorAll({group})[{index}];
            if (!g) return false;
            {body}
        }})()
        "#,
        group = js_str(&locators.field_group),
        index = index,
        body = body,
    ))
}

fn profile_script(locators: &Locators) -> String {
    format!(
        r#"
        (() => {{
            const invite = document.querySelector({invite});
            return {{
                inviteLabel: invite ? (invite.getAttribute("aria-label") || "") : "",
                cards: Array.from(document.querySelectorAll({card})).map((c) => c.innerText.trim())
            }};
        }})()
        "#,
        invite = js_str(&locators.invite_label),
        card = js_str(&locators.profile_card),
    )
}

fn note_script(locators: &Locators, text: &str) -> String {
    format!(
        r#"
        (() => {{
            const input = document.querySelector({sel});
            if (!input) return false;
            const proto = input.tagName === "TEXTAREA" ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype;
            Object.getOwnPropertyDescriptor(proto, "value").set.call(input, {value});
            input.dispatchEvent(new Event("input", {{ bubbles: true }}));
            return true;
        }})()
        "#,
        sel = js_str(&locators.note_input),
        value = js_str(text),
    )
}

/// 点击第一个文字（去掉首尾空白后）等于 `text` 的匹配元素
fn click_text_script(selector: &str, text: &str) -> String {
    format!(
        r#"
        (() => {{
            const el = Array.from(document.querySelectorAll({sel}))
                .find((e) => e.innerText.trim() === {text});
            if (!el) return false;
            el.click();
            return true;
        }})()
        "#,
        sel = js_str(selector),
        text = js_str(text),
    )
}

/// "Invite Jane to connect" → "Jane"
fn first_name_from_invite(label: &str) -> String {
    Regex::new(r"Invite\s+([A-Za-z]+)")
        .ok()
        .and_then(|re| re.captures(label).map(|c| c[1].to_string()))
        .unwrap_or_default()
}

fn click_script(selector: &str) -> String {
    format!(
        r#"
        (() => {{
            const el = document.querySelector({sel});
            if (!el) return false;
            el.click();
            return true;
        }})()
        "#,
        sel = js_str(selector),
    )
}

#[async_trait]
impl FormPage for ChromiumFormPage {
    async fn open_target(&mut self, target: &Target) -> Result<LandingPage> {
        let url = self.target_url(&target.id);
        self.executor.goto(&url).await?;

        let scan: LandingScan = self.executor.eval_as(landing_script(&self.locators)).await?;
        let page_title = self.executor.title().await.unwrap_or_default();
        debug!("落地页: {} ({:?})", page_title, scan);

        Ok(LandingPage {
            page_title,
            already_done: scan.already_done,
            entry_available: scan.entry_available,
        })
    }

    async fn observe(&mut self) -> Result<PageSnapshot> {
        self.executor.eval_as(observe_script(&self.locators)).await
    }

    async fn read_fields(&mut self) -> Result<Vec<RawField>> {
        self.executor.eval_as(fields_script(&self.locators)).await
    }

    async fn apply(&mut self, index: usize, action: &FieldAction) -> Result<()> {
        let Some(script) = apply_script(&self.locators, index, action) else {
            return Ok(());
        };
        let applied: bool = self.executor.eval_as(script).await?;
        if !applied {
            bail!("字段 {} 无法写入 {:?}", index, action);
        }
        Ok(())
    }

    async fn upload(&mut self, slot: UploadSlot, path: &Path) -> Result<()> {
        self.executor
            .set_input_file(self.locators.upload(slot), path)
            .await
    }

    async fn click(&mut self, control: Control) -> Result<()> {
        let script = match self.locators.control(control) {
            Clickable::Selector(selector) => click_script(selector),
            Clickable::WithText(selector, text) => click_text_script(selector, text),
        };
        let clicked: bool = self.executor.eval_as(script).await?;
        if !clicked {
            bail!("找不到控件 {:?}", control);
        }
        Ok(())
    }

    async fn read_profile(&mut self) -> Result<ProfileCard> {
        let scan: ProfileScan = self.executor.eval_as(profile_script(&self.locators)).await?;
        Ok(ProfileCard {
            first_name: first_name_from_invite(&scan.invite_label),
            summary: scan.cards.join("\n"),
        })
    }

    async fn write_note(&mut self, text: &str) -> Result<()> {
        let written: bool = self.executor.eval_as(note_script(&self.locators, text)).await?;
        if !written {
            bail!("找不到留言输入框");
        }
        Ok(())
    }
}
