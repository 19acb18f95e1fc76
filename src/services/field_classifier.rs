//! 字段分类服务 - 业务能力层
//!
//! 只负责给一个步骤里的字段打上语义类型，不关心答案

use tracing::debug;

use crate::models::{FieldDescriptor, FieldKind, FormStep, RawField};

/// 按优先级分类单个字段（第一条命中的规则生效）
pub fn classify(field: &RawField) -> FieldKind {
    let label = field.label.to_lowercase();

    if label.contains("email") {
        FieldKind::Email
    } else if label.contains("country code") {
        FieldKind::CountryCode
    } else if label.contains("mobile phone number") {
        FieldKind::Phone
    } else if !field.radio_values.is_empty() {
        FieldKind::Radio
    } else if field.text_inputs == 1 {
        FieldKind::Text
    } else if !field.options.is_empty() {
        FieldKind::MultiSelect
    } else if field.has_file_input {
        FieldKind::FileUpload
    } else {
        FieldKind::Unknown
    }
}

/// 分类一个步骤的全部字段
pub fn classify_step(fields: &[RawField]) -> FormStep {
    let fields = fields
        .iter()
        .enumerate()
        .map(|(index, raw)| {
            let kind = classify(raw);
            // 固定答案的字段（如国家代码）也可能是下拉框，保留选项
            let options = match kind {
                FieldKind::Radio => raw.radio_values.clone(),
                _ => raw.options.clone(),
            };
            if kind == FieldKind::Unknown {
                debug!("无法识别的字段，跳过: {:?}", raw.label);
            }
            FieldDescriptor {
                index,
                label: raw.label.trim().to_string(),
                kind,
                options,
            }
        })
        .collect();

    FormStep { fields }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(label: &str) -> RawField {
        RawField {
            label: label.to_string(),
            ..RawField::default()
        }
    }

    #[test]
    fn test_label_rules_take_priority_over_controls() {
        let email = RawField {
            options: vec!["a@example.com".to_string()],
            ..field("Email address")
        };
        assert_eq!(classify(&email), FieldKind::Email);

        let code = RawField {
            options: vec!["India (+91)".to_string()],
            ..field("Phone country code")
        };
        assert_eq!(classify(&code), FieldKind::CountryCode);

        let phone = RawField {
            text_inputs: 1,
            ..field("Mobile phone number")
        };
        assert_eq!(classify(&phone), FieldKind::Phone);
    }

    #[test]
    fn test_control_rules() {
        let radio = RawField {
            radio_values: vec!["Yes".to_string(), "No".to_string()],
            text_inputs: 1,
            ..field("Will you relocate?")
        };
        assert_eq!(classify(&radio), FieldKind::Radio);

        let text = RawField {
            text_inputs: 1,
            ..field("Years of experience with Rust?")
        };
        assert_eq!(classify(&text), FieldKind::Text);

        let select = RawField {
            options: vec!["Select an option".to_string(), "Native".to_string()],
            ..field("English proficiency")
        };
        assert_eq!(classify(&select), FieldKind::MultiSelect);

        let upload = RawField {
            has_file_input: true,
            ..field("Resume")
        };
        assert_eq!(classify(&upload), FieldKind::FileUpload);
    }

    #[test]
    fn test_unrecognised_field_is_unknown() {
        let two_inputs = RawField {
            text_inputs: 2,
            ..field("Address")
        };
        assert_eq!(classify(&two_inputs), FieldKind::Unknown);
        assert_eq!(classify(&field("Notes")), FieldKind::Unknown);
    }

    #[test]
    fn test_classify_step_keeps_order_and_options() {
        let step = classify_step(&[
            RawField {
                radio_values: vec!["Yes".to_string(), "No".to_string()],
                ..field("  Authorized to work?  ")
            },
            field("Notes"),
        ]);

        assert_eq!(step.fields.len(), 2);
        assert_eq!(step.fields[0].index, 0);
        assert_eq!(step.fields[0].label, "Authorized to work?");
        assert_eq!(step.fields[0].options, vec!["Yes", "No"]);
        assert_eq!(step.answerable().count(), 1);
    }
}
