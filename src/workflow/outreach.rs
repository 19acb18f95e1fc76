//! 按运行模式选择对目标执行的流程

use crate::config::{Config, OutreachMode};
use crate::models::Target;
use crate::services::AnswerResolver;
use crate::workflow::attempt_ctx::AttemptCtx;
use crate::workflow::connect_flow::{ConnectFlow, ConnectSettings};
use crate::workflow::form_flow::{AttemptOutcome, FlowSettings, FormFlow, FormPage};

/// 一次尝试所走的流程
pub enum Outreach {
    /// 申请表单
    Apply(FormFlow),
    /// 好友邀请
    Connect(ConnectFlow),
}

impl Outreach {
    pub fn from_config(config: &Config) -> Self {
        match config.mode {
            OutreachMode::Apply => Self::Apply(FormFlow::new(FlowSettings::from_config(config))),
            OutreachMode::Connect => {
                Self::Connect(ConnectFlow::new(ConnectSettings::from_config(config)))
            }
        }
    }

    pub async fn run(
        &self,
        page: &mut dyn FormPage,
        target: &Target,
        resolver: &mut AnswerResolver,
        ctx: &AttemptCtx,
    ) -> AttemptOutcome {
        match self {
            Self::Apply(flow) => flow.run(page, target, resolver, ctx).await,
            Self::Connect(flow) => flow.run(page, target, resolver, ctx).await,
        }
    }
}

impl From<FormFlow> for Outreach {
    fn from(flow: FormFlow) -> Self {
        Self::Apply(flow)
    }
}

impl From<ConnectFlow> for Outreach {
    fn from(flow: ConnectFlow) -> Self {
        Self::Connect(flow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_selects_flow() {
        let apply = Outreach::from_config(&Config::default());
        assert!(matches!(apply, Outreach::Apply(_)));

        let connect = Outreach::from_config(&Config {
            mode: OutreachMode::Connect,
            ..Config::default()
        });
        assert!(matches!(connect, Outreach::Connect(_)));
    }
}
