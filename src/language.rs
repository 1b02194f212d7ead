use serde::{Deserialize, Deserializer};

/// Language selector shared by every endpoint.
///
/// Unknown or missing tags select [`Language::English`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Language {
    Cantonese,
    Mandarin,
    Japanese,
    #[default]
    English,
}

impl Language {
    pub const ALL: [Language; 4] = [
        Language::Cantonese,
        Language::Mandarin,
        Language::Japanese,
        Language::English,
    ];

    pub fn from_tag(tag: &str) -> Self {
        Language::ALL
            .into_iter()
            .find(|language| language.tag() == tag)
            .unwrap_or_default()
    }

    pub fn tag(self) -> &'static str {
        match self {
            Language::Cantonese => "cantonese",
            Language::Mandarin => "mandarin",
            Language::Japanese => "japanese",
            Language::English => "english",
        }
    }

    pub fn system_prompt(self) -> &'static str {
        match self {
            Language::Cantonese => "你是一個港鐵廣東話人工智能助手，只用廣東話回答問題，用字要口語化，符合香港人日常用語。全部都係港紙HK$價錢。唔係用美元。",
            Language::Mandarin => "你是一個港鐵中文智能助手，請使用現代簡體中文回答問題，語氣自然友好。所有價格都以港幣HK$顯示，不使用美元。",
            Language::Japanese => "あなたはMTRの日本語AIアシスタントです。丁寧で分かりやすい日本語で回答してください。料金はすべて香港ドル（HK$）で案内し、米ドルは使わないでください。",
            Language::English => "You are MTR English-speaking AI assistant. Be helpful, concise, and friendly. All price in HK Dollar. No USD",
        }
    }

    /// Localized message for a failed chat upstream call.
    pub fn chat_error(self, status: u16) -> String {
        let unauthorized = status == 401;
        match self {
            Language::Cantonese if unauthorized => "阿里雲API密鑰無效。請檢查你嘅設定。".to_string(),
            Language::Cantonese => format!("阿里雲API返回錯誤：{}", status),
            Language::Mandarin if unauthorized => "阿里云 API 密钥无效。请检查你的设置。".to_string(),
            Language::Mandarin => format!("阿里云 API 返回错误：{}", status),
            Language::Japanese if unauthorized => {
                "Alibaba Cloud の API キーが無効です。設定を確認してください。".to_string()
            }
            Language::Japanese => format!("Alibaba Cloud API からエラーが返されました：{}", status),
            Language::English if unauthorized => {
                "Invalid Alibaba Cloud API key. Please check your configuration.".to_string()
            }
            Language::English => format!("Alibaba Cloud API returned an error: {}", status),
        }
    }

    pub fn locale(self) -> &'static str {
        match self {
            Language::Cantonese => "zh-HK",
            Language::Mandarin => "zh-CN",
            Language::Japanese => "ja-JP",
            Language::English => "en-US",
        }
    }

    pub fn language_boost(self) -> &'static str {
        match self {
            Language::Cantonese => "Chinese,Yue",
            Language::Mandarin => "Chinese",
            Language::Japanese => "Japanese",
            Language::English => "English",
        }
    }

    pub fn pronunciation_language(self) -> &'static str {
        match self {
            Language::Cantonese => "Cantonese",
            Language::Mandarin => "Chinese",
            Language::Japanese => "Japanese",
            Language::English => "English",
        }
    }
}

impl<'de> Deserialize<'de> for Language {
    // Non-string values fall back to the default instead of rejecting the body.
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<serde_json::Value>::deserialize(deserializer)?;
        Ok(value
            .as_ref()
            .and_then(serde_json::Value::as_str)
            .map(Language::from_tag)
            .unwrap_or_default())
    }
}
