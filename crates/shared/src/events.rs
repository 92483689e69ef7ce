//! 市场事件模型
//!
//! 库存服务在转账、上传、购买成功后发布事件，看板服务消费并统计。
//! 事件为扁平 JSON，通过 `type` 字段区分类型：
//!
//! ```json
//! {"type":"transfer","user":"alice","target":"bob","amount":10}
//! {"type":"upload","user":"alice","image_uuid":"..."}
//! {"type":"buy","user":"alice","image_uuid":"...","amount":25}
//! ```

use serde::{Deserialize, Serialize};

/// 市场事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MarketEvent {
    /// 金币转账
    Transfer {
        user: String,
        target: String,
        amount: i64,
    },
    /// 用户上传图片
    Upload { user: String, image_uuid: String },
    /// 购买付费图片
    Buy {
        user: String,
        image_uuid: String,
        amount: i64,
    },
}

impl MarketEvent {
    /// 事件发起人
    pub fn actor(&self) -> &str {
        match self {
            Self::Transfer { user, .. } | Self::Upload { user, .. } | Self::Buy { user, .. } => {
                user
            }
        }
    }

    /// 事件类型标签，与序列化后的 `type` 字段一致
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Transfer { .. } => "transfer",
            Self::Upload { .. } => "upload",
            Self::Buy { .. } => "buy",
        }
    }

    pub fn image_uuid(&self) -> Option<&str> {
        match self {
            Self::Upload { image_uuid, .. } | Self::Buy { image_uuid, .. } => Some(image_uuid),
            Self::Transfer { .. } => None,
        }
    }

    pub fn amount(&self) -> Option<i64> {
        match self {
            Self::Transfer { amount, .. } | Self::Buy { amount, .. } => Some(*amount),
            Self::Upload { .. } => None,
        }
    }

    pub fn target(&self) -> Option<&str> {
        match self {
            Self::Transfer { target, .. } => Some(target),
            _ => None,
        }
    }
}
