// source/filter.rs — 候选图过滤规则
// 内容过滤（按停用词排除图表类结果）与宽高比检查

use crate::error::{Error, Result};
use crate::output::Resolution;

/// 与壁纸无关的内容关键词，出现在标题、描述或关键词中即排除
pub const STOPWORDS: &[&str] = &[
    "chart",
    "diagram",
    "graph",
    "plot",
    "spectrum",
    "mosaic",
    "panorama",
    "schematic",
    "infographic",
    "illustration",
    "logo",
    "poster",
];

/// 包含 "graph" 但不应被排除的词
const GRAPH_EXCEPTIONS: &[&str] = &["photograph", "graphic"];

/// 未指定目标分辨率时允许的宽高比范围
pub const MIN_RATIO: f64 = 0.4;
pub const MAX_RATIO: f64 = 2.5;

/// 指定目标分辨率时允许的最大宽高比差值
pub const MAX_RATIO_DIFF: f64 = 1.0;

/// 候选图的元数据
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Candidate {
    /// 元数据或资源地址
    pub href: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub keywords: Vec<String>,
}

impl Candidate {
    fn texts(&self) -> impl Iterator<Item = &str> {
        self.title
            .iter()
            .chain(self.description.iter())
            .chain(self.keywords.iter())
            .map(String::as_str)
    }

    /// 返回命中的停用词，没有则为 `None`
    pub fn blocked_by(&self) -> Option<&'static str> {
        self.texts().find_map(blocked_term)
    }
}

/// 检查单段文本是否包含停用词
///
/// 子串匹配，不区分大小写。"graph" 出现在 photograph / graphic 中时不算。
pub fn blocked_term(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    STOPWORDS.iter().copied().find(|&term| {
        if term == "graph" {
            let mut stripped = lower.clone();
            for exception in GRAPH_EXCEPTIONS {
                stripped = stripped.replace(exception, " ");
            }
            stripped.contains(term)
        } else {
            lower.contains(term)
        }
    })
}

/// 过滤掉命中停用词的候选
///
/// 如果全部被过滤，返回原列表（fail open），第二个返回值为 `true`。
pub fn filter_candidates(candidates: Vec<Candidate>) -> (Vec<Candidate>, bool) {
    let total = candidates.len();
    let (kept, rejected): (Vec<_>, Vec<_>) = candidates
        .into_iter()
        .partition(|c| c.blocked_by().is_none());

    if kept.is_empty() && total > 0 {
        return (rejected, true);
    }
    tracing::debug!(kept = kept.len(), rejected = rejected.len(), "content filter applied");
    (kept, false)
}

/// 宽高比检查
///
/// - 没有目标分辨率：宽高比必须在 [0.4, 2.5] 内
/// - 有目标分辨率：与目标宽高比的差不能超过 1.0
pub fn check_aspect(actual: Resolution, target: Option<Resolution>) -> Result<()> {
    let ratio = actual.ratio();
    let ok = match target {
        None => (MIN_RATIO..=MAX_RATIO).contains(&ratio),
        Some(target) => (target.ratio() - ratio).abs() <= MAX_RATIO_DIFF,
    };
    if ok {
        Ok(())
    } else {
        Err(Error::AspectRatio { actual, ratio })
    }
}
