use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

// 目录语言，决定列表接口参数、落地页以及输出子目录
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Hindi,
    English,
}

impl Language {
    // 列表接口使用的语言参数
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Hindi => "hindi",
            Language::English => "english",
        }
    }

    /// 用于解析部署令牌的落地页路径
    pub fn landing_path(&self) -> &'static str {
        match self {
            Language::Hindi => "/",
            Language::English => "/audio-english",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
