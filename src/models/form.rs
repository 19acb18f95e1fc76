//! 表单相关的数据结构
//!
//! 这些结构只在一次尝试内存在，由驱动层（`FormPage`）观察页面后产生

use serde::{Deserialize, Serialize};

/// 字段的语义类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    Text,
    Radio,
    MultiSelect,
    FileUpload,
    Email,
    Phone,
    CountryCode,
    /// 无法识别，跳过
    Unknown,
}

/// 页面上一个字段分组的原始描述
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawField {
    /// 标签 / 问题文本
    pub label: String,
    /// 单选框可选的值
    #[serde(default)]
    pub radio_values: Vec<String>,
    /// 文本输入框的数量
    #[serde(default)]
    pub text_inputs: usize,
    /// 下拉列表中可见的选项
    #[serde(default)]
    pub options: Vec<String>,
    /// 是否包含文件上传控件
    #[serde(default)]
    pub has_file_input: bool,
}

/// 分类后的字段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// 在当前步骤中的位置
    pub index: usize,
    pub label: String,
    pub kind: FieldKind,
    pub options: Vec<String>,
}

/// 表单的一个步骤
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormStep {
    pub fields: Vec<FieldDescriptor>,
}

impl FormStep {
    /// 需要回答的字段（排除上传和无法识别的字段）
    pub fn answerable(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields
            .iter()
            .filter(|f| !matches!(f.kind, FieldKind::Unknown | FieldKind::FileUpload))
    }
}

/// 表单上可点击的控件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Control {
    /// 入口按钮（如 "Easy Apply"）
    Entry,
    Next,
    Review,
    Submit,
    FollowCompany,
    /// 个人主页上的主按钮 "Connect"
    Connect,
    /// "More" 下拉菜单
    More,
    /// 下拉菜单中的 "Connect"
    MenuConnect,
    /// 邀请对话框中的 "Add a note"
    AddNote,
    /// 发送邀请
    SendInvitation,
}

/// 可上传的附件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UploadSlot {
    Resume,
    CoverLetter,
}

/// 表单当前状态的一次观察
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageSnapshot {
    pub upload_resume: bool,
    pub upload_cover_letter: bool,
    /// 关注公司的勾选框：None 表示不存在，Some(true) 表示已勾选
    pub follow_company: Option<bool>,
    pub submit: bool,
    pub next: bool,
    pub review: bool,
    /// 行内校验错误提示
    pub error_indicator: bool,
    /// 入口按钮重新出现（表单已被关闭）
    pub entry_button: bool,
    /// 页面文字显示已成功发送
    pub success_text: bool,
    /// 当前步骤是否有问题字段
    pub has_questions: bool,
}

impl PageSnapshot {
    pub fn offers_upload(&self, slot: UploadSlot) -> bool {
        match slot {
            UploadSlot::Resume => self.upload_resume,
            UploadSlot::CoverLetter => self.upload_cover_letter,
        }
    }
}

/// 目标落地页的观察结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LandingPage {
    /// 页面标题
    pub page_title: String,
    /// 页面显示之前已经完成过
    pub already_done: bool,
    /// 是否存在入口按钮
    pub entry_available: bool,
}

/// 个人主页摘要，用于生成邀请留言
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileCard {
    /// 名字（取自 "Invite <名字> to connect"）
    pub first_name: String,
    /// 主页卡片文字
    pub summary: String,
}
