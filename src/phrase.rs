// phrase.rs — 搜索短语来源
// 短语可以来自命令行/配置，也可以从一组候选词里随机挑一个

use rand::seq::SliceRandom;

use crate::error::{Error, Result};

/// 内置的随机关键词
pub const DEFAULT_PHRASES: &[&str] = &[
    "galaxy",
    "nebula",
    "aurora",
    "earth",
    "moon",
    "mars",
    "saturn",
    "mountains",
    "ocean",
    "forest",
];

/// 提供“最近一次搜索”的外部协作者
///
/// 没有内容时返回 [`Error::HistoryEmpty`]，调用方可以回退到默认短语。
pub trait PhraseSource: Send + Sync {
    fn last_search(&self) -> Result<String>;
}

/// 固定短语
#[derive(Debug, Clone)]
pub struct FixedPhrase(pub String);

impl PhraseSource for FixedPhrase {
    fn last_search(&self) -> Result<String> {
        if self.0.trim().is_empty() {
            return Err(Error::HistoryEmpty);
        }
        Ok(self.0.clone())
    }
}

/// 每次随机挑一个短语
#[derive(Debug, Clone)]
pub struct RandomPhrase {
    phrases: Vec<String>,
}

impl RandomPhrase {
    pub fn new(phrases: Vec<String>) -> Self {
        Self { phrases }
    }
}

impl Default for RandomPhrase {
    fn default() -> Self {
        Self::new(DEFAULT_PHRASES.iter().map(|s| s.to_string()).collect())
    }
}

impl PhraseSource for RandomPhrase {
    fn last_search(&self) -> Result<String> {
        self.phrases
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or(Error::HistoryEmpty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_picks_from_list() {
        let src = RandomPhrase::new(vec!["a".into(), "b".into()]);
        for _ in 0..20 {
            let p = src.last_search().unwrap();
            assert!(p == "a" || p == "b");
        }
    }

    #[test]
    fn empty_sources_report_history_empty() {
        assert!(matches!(
            RandomPhrase::new(Vec::new()).last_search(),
            Err(Error::HistoryEmpty)
        ));
        assert!(matches!(
            FixedPhrase("  ".into()).last_search(),
            Err(Error::HistoryEmpty)
        ));
    }

    #[test]
    fn default_list_is_not_empty() {
        assert!(RandomPhrase::default().last_search().is_ok());
    }
}
